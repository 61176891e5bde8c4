// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator-local memory layout.
//!
//! ```text
//! Region  Size     Role
//! ─────── ──────── ─────────────────────────────────────────────
//!  UMEM   3 MiB    unified buffer, holds a full input image
//!  SPAD0  128 KiB  scratchpad
//!  SPAD1  128 KiB  scratchpad
//! ```
//!
//! Each SMIV block has two 64 KiB scratchpads of 16-bit data. The simulator
//! computes in 32-bit floats, so the per-scratchpad size is doubled to keep
//! the same number of elements resident.

use crate::params::ELEMENT_BYTES;

/// Scratchpad capacity in bytes.
pub const SPAD_SIZE: usize = 131_072;

/// Unified memory capacity in bytes (three 1 MiB blocks on the NIC).
pub const UMEM_SIZE: usize = 3 * 1_048_576;

/// Scratchpad capacity in elements.
pub const SPAD_ELEMENTS: usize = SPAD_SIZE / ELEMENT_BYTES;

/// Unified memory capacity in elements.
pub const UMEM_ELEMENTS: usize = UMEM_SIZE / ELEMENT_BYTES;

/// One of the three accelerator-local memory regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferId {
    /// Unified buffer.
    Umem,
    /// First scratchpad.
    Spad0,
    /// Second scratchpad.
    Spad1,
}

impl BufferId {
    /// All regions, in allocation order.
    pub const ALL: [Self; 3] = [Self::Umem, Self::Spad0, Self::Spad1];

    /// Default capacity of this region in bytes.
    #[must_use]
    pub const fn default_capacity(&self) -> usize {
        match self {
            Self::Umem => UMEM_SIZE,
            Self::Spad0 | Self::Spad1 => SPAD_SIZE,
        }
    }

    /// Dense index (0, 1, 2) used for per-region tables.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Umem => 0,
            Self::Spad0 => 1,
            Self::Spad1 => 2,
        }
    }

    /// Whether this region is one of the two scratchpads.
    #[must_use]
    pub const fn is_scratchpad(&self) -> bool {
        matches!(self, Self::Spad0 | Self::Spad1)
    }

    /// The opposite scratchpad. UMEM has no partner and maps to itself.
    #[must_use]
    pub const fn partner(&self) -> Self {
        match self {
            Self::Umem => Self::Umem,
            Self::Spad0 => Self::Spad1,
            Self::Spad1 => Self::Spad0,
        }
    }
}

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Umem => write!(f, "UMEM"),
            Self::Spad0 => write!(f, "SPAD0"),
            Self::Spad1 => write!(f, "SPAD1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umem_is_an_order_of_magnitude_larger() {
        assert!(UMEM_SIZE / SPAD_SIZE >= 10);
    }

    #[test]
    fn scratchpads_partner_each_other() {
        assert_eq!(BufferId::Spad0.partner(), BufferId::Spad1);
        assert_eq!(BufferId::Spad1.partner(), BufferId::Spad0);
        assert_eq!(BufferId::Umem.partner(), BufferId::Umem);
    }

    #[test]
    fn indices_are_dense() {
        for (i, id) in BufferId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}
