// SPDX-License-Identifier: AGPL-3.0-only

//! Datapath parameters.

/// Bytes per simulated element (f32).
pub const ELEMENT_BYTES: usize = std::mem::size_of::<f32>();

/// SIMD lanes per vector operation.
pub const VECTOR_SIZE: usize = 8;

/// Innermost-dimension alignment, in elements. Rows are padded to a multiple
/// of this so each row starts on a vector boundary.
pub const DATA_ALIGNMENT: usize = VECTOR_SIZE;

/// Largest batch the datapath handles in one pass.
pub const MAX_BATCH: usize = 8;

/// Default number of images pushed through one forward pass.
pub const NUM_TEST_CASES: usize = 2;

/// Padding (in elements) needed to bring `value` up to a multiple of
/// `alignment`. An alignment of zero means no alignment.
#[must_use]
pub const fn calc_padding(value: usize, alignment: usize) -> usize {
    if alignment == 0 || value % alignment == 0 {
        0
    } else {
        alignment - (value % alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_up_to_alignment() {
        assert_eq!(calc_padding(8, 8), 0);
        assert_eq!(calc_padding(10, 8), 6);
        assert_eq!(calc_padding(1, 8), 7);
        assert_eq!(calc_padding(13, 0), 0);
    }
}
