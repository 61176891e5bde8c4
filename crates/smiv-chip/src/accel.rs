// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator identities and shared-resource tags.
//!
//! The convolution, inner-product and reduction blocks are simulated as ONE
//! datapath so that they can share scratchpads. Each block still has its own
//! [`AcceleratorId`] for array mapping, but all three carry the same
//! [`ResourceTag`], and at most one invocation per tag may be in flight.

/// Identity under which host arrays are mapped and kernels are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AcceleratorId(pub u32);

impl std::fmt::Display for AcceleratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Physical resource a group of accelerator ids executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceTag(pub &'static str);

impl std::fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// The shared SMIV datapath.
pub const SMIV_DATAPATH: ResourceTag = ResourceTag("smiv-datapath");

/// Kernel families the datapath implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Datapath {
    /// 3-D convolution producing unreduced per-channel output.
    Convolution,
    /// Matrix multiply with bias (and optional fused activation).
    InnerProduct,
    /// Channel-axis reduction.
    Reduction,
}

impl Datapath {
    /// All kernel families.
    pub const ALL: [Self; 3] = [Self::Convolution, Self::InnerProduct, Self::Reduction];

    /// Accelerator id used for mapping and invocation.
    #[must_use]
    pub const fn accelerator_id(&self) -> AcceleratorId {
        match self {
            Self::Convolution => CONVOLUTION_HW,
            Self::InnerProduct => INNER_PRODUCT_HW,
            Self::Reduction => REDUCTION_HW,
        }
    }

    /// Physical resource this kernel family runs on.
    #[must_use]
    pub const fn resource(&self) -> ResourceTag {
        SMIV_DATAPATH
    }
}

impl std::fmt::Display for Datapath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Convolution => write!(f, "convolution"),
            Self::InnerProduct => write!(f, "inner-product"),
            Self::Reduction => write!(f, "reduction"),
        }
    }
}

/// Convolution block id.
pub const CONVOLUTION_HW: AcceleratorId = AcceleratorId(0x0003);
/// Inner-product block id.
pub const INNER_PRODUCT_HW: AcceleratorId = AcceleratorId(0x0003);
/// Reduction block id.
pub const REDUCTION_HW: AcceleratorId = AcceleratorId(0x0003);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_blocks_share_one_datapath() {
        let tags: Vec<_> = Datapath::ALL.iter().map(Datapath::resource).collect();
        assert!(tags.iter().all(|t| *t == SMIV_DATAPATH));
    }

    #[test]
    fn accelerator_id_display() {
        assert_eq!(CONVOLUTION_HW.to_string(), "0x0003");
    }
}
