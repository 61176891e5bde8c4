// SPDX-License-Identifier: AGPL-3.0-only

//! Max pooling

use crate::error::Result;
use crate::tensor::{TensorView, TensorViewMut};
use smiv_models::Dims;

/// Max-pool `images` images channel by channel with a `size × size` window.
///
/// # Errors
///
/// Returns error if a buffer is too short.
pub fn max_pooling(
    input: &[f32],
    in_dims: Dims,
    images: usize,
    size: usize,
    stride: usize,
    out_dims: Dims,
    output: &mut [f32],
) -> Result<()> {
    let input = TensorView::from_dims(input, images, in_dims)?;
    let mut out = TensorViewMut::from_dims(output, images, out_dims)?;
    out.fill(0.0);

    for n in 0..images {
        for c in 0..out_dims.height {
            for r in 0..out_dims.rows {
                for col in 0..out_dims.cols {
                    let mut best = f32::NEG_INFINITY;
                    for i in 0..size {
                        for j in 0..size {
                            best = best.max(input[[n, c, r * stride + i, col * stride + j]]);
                        }
                    }
                    out[[n, c, r, col]] = best;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_windows() {
        let in_dims = Dims::dense(2, 4, 1);
        let input = [1.0, 5.0, -1.0, -2.0, 3.0, 2.0, -3.0, -4.0];
        let out_dims = Dims::aligned(1, 2, 1);
        let mut out = vec![f32::NAN; out_dims.elements()];
        max_pooling(&input, in_dims, 1, 2, 2, out_dims, &mut out).unwrap();
        assert_eq!(out[..2], [5.0, -1.0]);
        assert!(out[2..].iter().all(|&x| x == 0.0));
    }
}
