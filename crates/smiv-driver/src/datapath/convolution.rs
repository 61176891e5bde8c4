// SPDX-License-Identifier: AGPL-3.0-only

//! 3-D convolution producing one unreduced output channel per input channel

use crate::error::{Result, SmivError};
use crate::tensor::{TensorView, TensorViewMut};
use smiv_models::Dims;

/// Convolve each input channel with the matching kernel channel.
///
/// `input` is one image laid out per `in_dims`, `kernel` one kernel laid out
/// per `kernel_dims` (same channel count). The output holds
/// `in_dims.height` channels of `out_dims.rows × out_dims.padded_cols()`;
/// summing them over the channel axis gives the convolution result. Output
/// padding is zeroed.
///
/// # Errors
///
/// Returns error if the channel counts differ or a buffer is too short.
pub fn convolution3d_unreduced(
    input: &[f32],
    in_dims: Dims,
    kernel: &[f32],
    kernel_dims: Dims,
    stride: usize,
    out_dims: Dims,
    output: &mut [f32],
) -> Result<()> {
    if kernel_dims.height != in_dims.height {
        return Err(SmivError::SizeMismatch {
            what: "kernel channels",
            got: kernel_dims.height,
            expected: in_dims.height,
        });
    }
    let input = TensorView::from_dims(input, 1, in_dims)?;
    let kernel = TensorView::from_dims(kernel, 1, kernel_dims)?;
    let mut out = TensorViewMut::from_dims(output, 1, out_dims.with_height(in_dims.height))?;
    out.fill(0.0);

    for c in 0..in_dims.height {
        for r in 0..out_dims.rows {
            for col in 0..out_dims.cols {
                let mut acc = 0.0f32;
                for i in 0..kernel_dims.rows {
                    for j in 0..kernel_dims.cols {
                        acc += input[[0, c, r * stride + i, col * stride + j]] * kernel[[0, c, i, j]];
                    }
                }
                out[[0, c, r, col]] = acc;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_channel_outputs_stay_separate() {
        // 2 channels of 3x3, 2x2 kernel of ones
        let in_dims = Dims::dense(3, 3, 2);
        let input: Vec<f32> = (0..18).map(|i| i as f32).collect();
        let k_dims = Dims::dense(2, 2, 2);
        let kernel = vec![1.0; 8];
        let out_dims = Dims::dense(2, 2, 1);
        let mut out = vec![f32::NAN; 8];

        convolution3d_unreduced(&input, in_dims, &kernel, k_dims, 1, out_dims, &mut out).unwrap();
        // channel 0: 0+1+3+4 = 8, channel 1 is offset by 9 per element
        assert_eq!(out[0], 8.0);
        assert_eq!(out[3], 4.0 + 5.0 + 7.0 + 8.0);
        assert_eq!(out[4], 8.0 + 36.0);
    }

    #[test]
    fn stride_and_padding() {
        let in_dims = Dims::aligned(4, 4, 1);
        let mut input = vec![0.0; in_dims.elements()];
        for r in 0..4 {
            for c in 0..4 {
                input[r * in_dims.padded_cols() + c] = (r * 4 + c) as f32;
            }
        }
        let k_dims = Dims::aligned(1, 1, 1);
        let mut kernel = vec![0.0; k_dims.elements()];
        kernel[0] = 2.0;
        let out_dims = Dims::aligned(2, 2, 1);
        let mut out = vec![f32::NAN; out_dims.elements()];

        convolution3d_unreduced(&input, in_dims, &kernel, k_dims, 2, out_dims, &mut out).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 4.0);
        assert_eq!(out[8], 16.0);
        assert_eq!(out[9], 20.0);
        assert!(out[2..8].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn mismatched_channels_are_rejected() {
        let err = convolution3d_unreduced(
            &[0.0; 9],
            Dims::dense(3, 3, 1),
            &[0.0; 8],
            Dims::dense(2, 2, 2),
            1,
            Dims::dense(2, 2, 1),
            &mut [0.0; 4],
        )
        .unwrap_err();
        assert!(matches!(err, SmivError::SizeMismatch { .. }));
    }
}
