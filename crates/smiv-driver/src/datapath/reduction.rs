// SPDX-License-Identifier: AGPL-3.0-only

//! Channel-axis reduction
//!
//! Partial convolution results are kept unreduced, one channel per input
//! channel, so that a layer split into several channel chunks recombines
//! exactly: reducing each chunk and then reducing the per-chunk results is
//! the same sum as reducing everything at once.

use crate::datapath::activation::activate_rows;
use crate::error::Result;
use crate::tensor::{TensorView, TensorViewMut};
use smiv_models::{Activation, Dims};

/// Sum the `dims.height` channels of `input` into one channel of `output`,
/// then apply `act`.
///
/// Only the first `dims.cols` elements of each row are accumulated; padding
/// in the output is written as zero.
///
/// # Errors
///
/// Returns error if a buffer is too short.
pub fn reduce_channels(input: &[f32], dims: Dims, act: Activation, output: &mut [f32]) -> Result<()> {
    let input = TensorView::from_dims(input, 1, dims)?;
    let mut out = TensorViewMut::from_dims(output, 1, dims.with_height(1))?;
    out.fill(0.0);

    for r in 0..dims.rows {
        for c in 0..dims.cols {
            out[[0, 0, r, c]] = (0..dims.height).map(|ch| input[[0, ch, r, c]]).sum::<f32>();
        }
    }
    let padded = dims.padded_cols();
    activate_rows(out.channels_mut(0, 0, 1)?, dims.cols, padded, act);
    Ok(())
}
