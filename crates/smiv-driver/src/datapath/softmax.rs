// SPDX-License-Identifier: AGPL-3.0-only

//! Softmax over flat per-image rows

use smiv_models::Dims;

/// Replace the first `dims.cols` values of each of `images` rows with their
/// softmax. Rows are `dims.elements()` apart; padding is untouched.
pub fn softmax(data: &mut [f32], dims: Dims, images: usize) {
    let stride = dims.elements();
    if stride == 0 {
        return;
    }
    for row in data.chunks_mut(stride).take(images) {
        let n = dims.cols.min(row.len());
        let values = &mut row[..n];
        let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut total = 0.0f32;
        for x in values.iter_mut() {
            *x = (*x - max).exp();
            total += *x;
        }
        for x in values.iter_mut() {
            *x /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_sum_to_one() {
        let dims = Dims::aligned(1, 3, 1);
        let mut data = vec![0.0; 2 * dims.elements()];
        data[..3].copy_from_slice(&[1.0, 2.0, 3.0]);
        data[8..11].copy_from_slice(&[1000.0, 1000.0, 1000.0]);
        softmax(&mut data, dims, 2);

        let first: f32 = data[..3].iter().sum();
        assert!((first - 1.0).abs() < 1e-6);
        assert!(data[2] > data[1] && data[1] > data[0]);
        for x in &data[8..11] {
            assert!((x - 1.0 / 3.0).abs() < 1e-6);
        }
        assert_eq!(data[3], 0.0);
    }
}
