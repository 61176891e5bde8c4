// SPDX-License-Identifier: AGPL-3.0-only

//! Tensor dimension records.
//!
//! Activations and weights are stored channel-major with each row padded out
//! to the datapath alignment: `[height][rows][cols + align_pad]`.

use smiv_chip::params::{calc_padding, DATA_ALIGNMENT, ELEMENT_BYTES};

/// Dimensions of one image (or one kernel) of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dims {
    /// Rows
    pub rows: usize,
    /// Columns (unpadded)
    pub cols: usize,
    /// Channels
    pub height: usize,
    /// Elements of padding appended to every row
    pub align_pad: usize,
}

impl Dims {
    /// Create dims with row padding computed for the datapath alignment.
    #[must_use]
    pub const fn aligned(rows: usize, cols: usize, height: usize) -> Self {
        Self {
            rows,
            cols,
            height,
            align_pad: calc_padding(cols, DATA_ALIGNMENT),
        }
    }

    /// Create dims with no row padding.
    #[must_use]
    pub const fn dense(rows: usize, cols: usize, height: usize) -> Self {
        Self {
            rows,
            cols,
            height,
            align_pad: 0,
        }
    }

    /// Row stride in elements.
    #[must_use]
    pub const fn padded_cols(&self) -> usize {
        self.cols + self.align_pad
    }

    /// Elements in one padded channel.
    #[must_use]
    pub const fn channel_elements(&self) -> usize {
        self.rows * self.padded_cols()
    }

    /// Elements in the padded tensor.
    #[must_use]
    pub const fn elements(&self) -> usize {
        self.height * self.channel_elements()
    }

    /// Bytes in the padded tensor.
    #[must_use]
    pub const fn bytes(&self) -> usize {
        self.elements() * ELEMENT_BYTES
    }

    /// Elements excluding padding.
    #[must_use]
    pub const fn unpadded_elements(&self) -> usize {
        self.rows * self.cols * self.height
    }

    /// Same dims with a different channel count.
    #[must_use]
    pub fn with_height(self, height: usize) -> Self {
        Self { height, ..self }
    }
}

impl std::fmt::Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.rows, self.cols, self.height)?;
        if self.align_pad > 0 {
            write!(f, " (+{})", self.align_pad)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_dims_pad_rows() {
        let d = Dims::aligned(10, 10, 3);
        assert_eq!(d.align_pad, 6);
        assert_eq!(d.padded_cols(), 16);
        assert_eq!(d.channel_elements(), 160);
        assert_eq!(d.elements(), 480);
        assert_eq!(d.bytes(), 480 * 4);
        assert_eq!(d.unpadded_elements(), 300);
    }

    #[test]
    fn display_shows_padding_only_when_present() {
        assert_eq!(Dims::aligned(8, 8, 4).to_string(), "8x8x4");
        assert_eq!(Dims::aligned(5, 5, 1).to_string(), "5x5x1 (+3)");
    }
}
