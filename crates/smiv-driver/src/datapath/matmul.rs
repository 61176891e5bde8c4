// SPDX-License-Identifier: AGPL-3.0-only

//! Matrix multiply with bias

use crate::datapath::activation::activate;
use crate::error::{Result, SmivError};
use smiv_models::{Activation, Dims};

/// `result = act(activations × W + b)` for `batch` row vectors.
///
/// `activations` holds one row of `inputs.cols` values per image at a stride
/// of `inputs.elements()`. `weights` is `[n_in + 1][n_out + pad]` with the
/// bias in the last row. Each result row is `weights.padded_cols()` wide with
/// zeroed padding.
///
/// # Errors
///
/// Returns error if the weight rows do not match the input width or a buffer
/// is too short.
pub fn matrix_multiply_with_bias(
    activations: &[f32],
    inputs: Dims,
    batch: usize,
    weights: &[f32],
    weights_dims: Dims,
    act: Activation,
    result: &mut [f32],
) -> Result<()> {
    let n_in = inputs.cols;
    if weights_dims.rows != n_in + 1 {
        return Err(SmivError::SizeMismatch {
            what: "weight rows",
            got: weights_dims.rows,
            expected: n_in + 1,
        });
    }
    let in_stride = inputs.elements();
    let w_stride = weights_dims.padded_cols();
    check_len("activations", activations.len(), batch * in_stride)?;
    check_len("weights", weights.len(), weights_dims.elements())?;
    check_len("result", result.len(), batch * w_stride)?;

    let bias = &weights[n_in * w_stride..(n_in + 1) * w_stride];
    for (row, out) in activations
        .chunks(in_stride)
        .zip(result.chunks_mut(w_stride))
        .take(batch)
    {
        out.fill(0.0);
        for (o, y) in out.iter_mut().enumerate().take(weights_dims.cols) {
            let dot: f32 = row[..n_in]
                .iter()
                .enumerate()
                .map(|(i, &x)| x * weights[i * w_stride + o])
                .sum();
            *y = activate(act, dot + bias[o]);
        }
    }
    Ok(())
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got < expected {
        return Err(SmivError::SizeMismatch {
            what,
            got,
            expected,
        });
    }
    Ok(())
}
