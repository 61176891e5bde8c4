// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator-local memory and buffer role policy.
//!
//! The [`AcceleratorMemoryContext`] is allocated at the start of a forward
//! pass and released at its end. It is passed explicitly to every invocation;
//! nothing else holds a handle to the buffers.
//!
//! Two alternation disciplines decide which buffer plays which role:
//!
//! - inner-product layers ping-pong their result between the scratchpads
//!   ([`PingPong`]), so a resident result becomes the next layer's input
//!   without a copy;
//! - convolution invocations use fixed roles ([`CONVOLUTION_ROLES`]) because
//!   each stage's output is consumed by the next stage of the same pipeline.

use crate::config::BufferCapacities;
use crate::error::{Result, SmivError};
use smiv_chip::mem::BufferId;
use smiv_chip::params::ELEMENT_BYTES;
use tracing::debug;

/// The three accelerator-local buffers.
#[derive(Debug)]
pub struct AcceleratorMemoryContext {
    /// Indexed by [`BufferId::index`]
    buffers: [Vec<f32>; 3],
    capacities: BufferCapacities,
}

impl AcceleratorMemoryContext {
    /// Allocate zeroed buffers with the given capacities.
    pub fn allocate(capacities: BufferCapacities) -> Self {
        debug!(
            "Allocating accelerator memory: UMEM {} B, SPAD0/1 {} B",
            capacities.umem_bytes, capacities.spad_bytes
        );
        let buffers = BufferId::ALL.map(|id| vec![0.0f32; capacities.elements(id)]);
        Self {
            buffers,
            capacities,
        }
    }

    /// Buffer capacities.
    pub const fn capacities(&self) -> BufferCapacities {
        self.capacities
    }

    /// Contents of one buffer.
    pub fn buffer(&self, id: BufferId) -> &[f32] {
        &self.buffers[id.index()]
    }

    /// Mutable contents of one buffer.
    pub fn buffer_mut(&mut self, id: BufferId) -> &mut [f32] {
        &mut self.buffers[id.index()]
    }

    /// Borrow the buffers for one invocation.
    pub fn bind(&mut self) -> BufferSet<'_> {
        let [umem, spad0, spad1] = &mut self.buffers;
        BufferSet {
            slots: [
                Some(umem.as_mut_slice()),
                Some(spad0.as_mut_slice()),
                Some(spad1.as_mut_slice()),
            ],
        }
    }

    /// Release the buffers at the end of a run.
    pub fn release(self) {
        let total: usize = self.buffers.iter().map(Vec::len).sum();
        debug!("Releasing accelerator memory ({} B)", total * ELEMENT_BYTES);
    }
}

/// Disjoint borrows of the buffers for one invocation.
///
/// Each buffer can be taken once, so one buffer can never serve two roles in
/// the same kernel call.
#[derive(Debug)]
pub struct BufferSet<'a> {
    slots: [Option<&'a mut [f32]>; 3],
}

impl<'a> BufferSet<'a> {
    /// Take a buffer for writing.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer was already taken from this set.
    pub fn take(&mut self, id: BufferId) -> Result<&'a mut [f32]> {
        self.slots[id.index()]
            .take()
            .ok_or(SmivError::BufferAliased { buffer: id })
    }

    /// Take a buffer for reading.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer was already taken from this set.
    pub fn read(&mut self, id: BufferId) -> Result<&'a [f32]> {
        self.take(id).map(|b| &*b)
    }
}

/// Which scratchpad receives the next inner-product result.
///
/// Starts unset. The caller advances it explicitly before each inner-product
/// invocation; the first advance selects SPAD1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingPong {
    current: Option<BufferId>,
}

impl PingPong {
    /// Fresh, unset state.
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// Flip to the other scratchpad and return it.
    pub fn advance(&mut self) -> BufferId {
        let next = match self.current {
            None | Some(BufferId::Spad0) => BufferId::Spad1,
            Some(_) => BufferId::Spad0,
        };
        self.current = Some(next);
        next
    }

    /// Scratchpad holding the most recent result, if any.
    pub const fn current(&self) -> Option<BufferId> {
        self.current
    }
}

/// Buffer assignment for one inner-product invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerProductRoles {
    /// Weight matrix
    pub weights: BufferId,
    /// Input activations (previous layer's result when resident)
    pub activations: BufferId,
    /// This layer's result
    pub result: BufferId,
}

impl InnerProductRoles {
    /// Roles when the result goes to `result`.
    pub const fn for_result(result: BufferId) -> Self {
        Self {
            weights: BufferId::Umem,
            activations: result.partner(),
            result,
        }
    }
}

/// Buffer assignment for the convolution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvolutionRoles {
    /// Activation slice of the current iteration
    pub activations: BufferId,
    /// Weight slice, live only during the compute stage
    pub weights: BufferId,
    /// Unreduced per-channel compute output
    pub unreduced: BufferId,
    /// Reduced result
    pub reduced: BufferId,
}

/// Fixed convolution roles. The weight slice and the reduced result share
/// SPAD0 because the weights are dead once the compute stage finishes.
pub const CONVOLUTION_ROLES: ConvolutionRoles = ConvolutionRoles {
    activations: BufferId::Umem,
    weights: BufferId::Spad0,
    unreduced: BufferId::Spad1,
    reduced: BufferId::Spad0,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_honours_capacities() {
        let caps = BufferCapacities {
            umem_bytes: 64,
            spad_bytes: 16,
        };
        let mem = AcceleratorMemoryContext::allocate(caps);
        assert_eq!(mem.buffer(BufferId::Umem).len(), 16);
        assert_eq!(mem.buffer(BufferId::Spad0).len(), 4);
        assert_eq!(mem.buffer(BufferId::Spad1).len(), 4);
        mem.release();
    }

    #[test]
    fn a_buffer_cannot_be_bound_twice() {
        let mut mem = AcceleratorMemoryContext::allocate(BufferCapacities {
            umem_bytes: 16,
            spad_bytes: 16,
        });
        let mut set = mem.bind();
        let a = set.take(BufferId::Spad0).unwrap();
        let b = set.read(BufferId::Spad1).unwrap();
        a[0] = b[0] + 1.0;
        assert!(matches!(
            set.take(BufferId::Spad0),
            Err(SmivError::BufferAliased {
                buffer: BufferId::Spad0
            })
        ));
    }

    #[test]
    fn ping_pong_starts_on_spad1_and_alternates() {
        let mut pp = PingPong::new();
        assert_eq!(pp.current(), None);
        let seq: Vec<_> = (0..4).map(|_| pp.advance()).collect();
        assert_eq!(
            seq,
            [BufferId::Spad1, BufferId::Spad0, BufferId::Spad1, BufferId::Spad0]
        );
    }

    #[test]
    fn inner_product_reads_from_the_other_scratchpad() {
        let roles = InnerProductRoles::for_result(BufferId::Spad0);
        assert_eq!(roles.activations, BufferId::Spad1);
        assert_eq!(roles.weights, BufferId::Umem);
    }
}
