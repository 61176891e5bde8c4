// SPDX-License-Identifier: AGPL-3.0-only

//! Hardware-simulation harness abstraction
//!
//! The orchestration code talks to the accelerator through exactly three
//! verbs, always in this order for a given array:
//!
//! 1. [`Harness::map_array`] declares a host array under a logical name for
//!    one accelerator id;
//! 2. inside [`Harness::invoke`], [`Invocation::dma_load`] and
//!    [`Invocation::dma_store`] move bytes between mapped host arrays and the
//!    accelerator buffers;
//! 3. the invocation returns when the kernel has completed.
//!
//! Transfers are synchronous and byte-exact. The harness checks every
//! transfer against its mapping and the target buffer, so protocol mistakes
//! surface as errors rather than silent corruption.

use crate::error::{Result, SmivError};
use crate::memory::{AcceleratorMemoryContext, BufferSet};
use smiv_chip::accel::{AcceleratorId, Datapath, ResourceTag};
use smiv_chip::mem::BufferId;
use smiv_chip::params::ELEMENT_BYTES;
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::trace;

/// One kernel invocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    /// Kernel family
    pub datapath: Datapath,
    /// Accelerator id the invocation (and its mappings) belong to
    pub accel: AcceleratorId,
    /// Resource the kernel occupies while running
    pub resource: ResourceTag,
}

impl Operation {
    /// Operation for `datapath` on its default accelerator and resource.
    pub const fn new(datapath: Datapath) -> Self {
        Self {
            datapath,
            accel: datapath.accelerator_id(),
            resource: datapath.resource(),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.datapath, self.accel)
    }
}

/// Simulation harness driving the accelerator.
///
/// Implementations own the mapping table and resource arbitration. The
/// accelerator-local buffers are owned by the caller and lent to each
/// invocation.
pub trait Harness: Debug + Send {
    /// Declare `bytes` of host memory under `name` for accelerator `accel`.
    ///
    /// Mapping a name again replaces the previous mapping.
    fn map_array(&mut self, accel: AcceleratorId, name: &'static str, bytes: usize);

    /// Run `body` as one blocking invocation of `op`.
    ///
    /// # Errors
    ///
    /// Returns error if the resource is busy or `body` fails.
    fn invoke(
        &mut self,
        op: &Operation,
        memory: &mut AcceleratorMemoryContext,
        body: &mut dyn FnMut(&mut Invocation<'_>) -> Result<()>,
    ) -> Result<()>;

    /// Counters accumulated so far.
    fn stats(&self) -> &HarnessStats;

    /// Recorded events, empty unless tracing was enabled.
    fn events(&self) -> &[HarnessEvent];
}

/// Host arrays mapped per accelerator id, in bytes.
#[derive(Debug, Default, Clone)]
pub struct MappingTable {
    arrays: HashMap<(AcceleratorId, &'static str), usize>,
}

impl MappingTable {
    /// Record a mapping, replacing any earlier one with the same key.
    pub fn insert(&mut self, accel: AcceleratorId, name: &'static str, bytes: usize) {
        self.arrays.insert((accel, name), bytes);
    }

    /// Mapped size of `name` for `accel`.
    pub fn get(&self, accel: AcceleratorId, name: &'static str) -> Option<usize> {
        self.arrays.get(&(accel, name)).copied()
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }
}

/// Counters over a harness's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarnessStats {
    /// `map_array` calls
    pub arrays_mapped: usize,
    /// Convolution invocations
    pub convolution_invocations: usize,
    /// Inner-product invocations
    pub inner_product_invocations: usize,
    /// Reduction invocations
    pub reduction_invocations: usize,
    /// Host to accelerator transfers
    pub loads: usize,
    /// Accelerator to host transfers
    pub stores: usize,
    /// Bytes moved host to accelerator
    pub bytes_loaded: usize,
    /// Bytes moved accelerator to host
    pub bytes_stored: usize,
}

impl HarnessStats {
    /// Invocations of one kernel family.
    pub const fn invocations(&self, datapath: Datapath) -> usize {
        match datapath {
            Datapath::Convolution => self.convolution_invocations,
            Datapath::InnerProduct => self.inner_product_invocations,
            Datapath::Reduction => self.reduction_invocations,
        }
    }

    /// Invocations of every kernel family.
    pub const fn total_invocations(&self) -> usize {
        self.convolution_invocations + self.inner_product_invocations + self.reduction_invocations
    }
}

impl std::fmt::Display for HarnessStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} mapped, {} invocations (conv {}, fc {}, reduce {}), \
             {} loads / {} B in, {} stores / {} B out",
            self.arrays_mapped,
            self.total_invocations(),
            self.convolution_invocations,
            self.inner_product_invocations,
            self.reduction_invocations,
            self.loads,
            self.bytes_loaded,
            self.stores,
            self.bytes_stored
        )
    }
}

/// One observable harness action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEvent {
    /// Host array mapped
    Map {
        /// Accelerator id
        accel: AcceleratorId,
        /// Logical array name
        name: &'static str,
        /// Mapped bytes
        bytes: usize,
    },
    /// Invocation started
    Invoke(Datapath),
    /// Host to accelerator transfer
    Load {
        /// Source array
        name: &'static str,
        /// Destination buffer
        buffer: BufferId,
        /// Bytes moved
        bytes: usize,
    },
    /// Kernel computed into a buffer
    Compute {
        /// Kernel family
        datapath: Datapath,
        /// Output buffer
        output: BufferId,
    },
    /// Accelerator to host transfer
    Store {
        /// Destination array
        name: &'static str,
        /// Source buffer
        buffer: BufferId,
        /// Bytes moved
        bytes: usize,
    },
}

/// Stats plus an optional event log.
#[derive(Debug, Default, Clone)]
pub struct RunLog {
    stats: HarnessStats,
    events: Option<Vec<HarnessEvent>>,
}

impl RunLog {
    /// Log that keeps every event if `record_trace` is set.
    pub fn new(record_trace: bool) -> Self {
        Self {
            stats: HarnessStats::default(),
            events: record_trace.then(Vec::new),
        }
    }

    /// Count `event` and keep it if tracing.
    pub fn record(&mut self, event: HarnessEvent) {
        let s = &mut self.stats;
        match event {
            HarnessEvent::Map { .. } => s.arrays_mapped += 1,
            HarnessEvent::Invoke(Datapath::Convolution) => s.convolution_invocations += 1,
            HarnessEvent::Invoke(Datapath::InnerProduct) => s.inner_product_invocations += 1,
            HarnessEvent::Invoke(Datapath::Reduction) => s.reduction_invocations += 1,
            HarnessEvent::Load { bytes, .. } => {
                s.loads += 1;
                s.bytes_loaded += bytes;
            }
            HarnessEvent::Store { bytes, .. } => {
                s.stores += 1;
                s.bytes_stored += bytes;
            }
            HarnessEvent::Compute { .. } => {}
        }
        if let Some(events) = &mut self.events {
            events.push(event);
        }
    }

    /// Counters.
    pub const fn stats(&self) -> &HarnessStats {
        &self.stats
    }

    /// Recorded events.
    pub fn events(&self) -> &[HarnessEvent] {
        self.events.as_deref().unwrap_or_default()
    }
}

/// Context of one running invocation.
#[derive(Debug)]
pub struct Invocation<'a> {
    op: Operation,
    memory: &'a mut AcceleratorMemoryContext,
    mappings: &'a MappingTable,
    log: &'a mut RunLog,
}

impl<'a> Invocation<'a> {
    /// Assemble an invocation context. Used by harness implementations.
    pub fn new(
        op: Operation,
        memory: &'a mut AcceleratorMemoryContext,
        mappings: &'a MappingTable,
        log: &'a mut RunLog,
    ) -> Self {
        Self {
            op,
            memory,
            mappings,
            log,
        }
    }

    /// The running operation.
    pub const fn operation(&self) -> &Operation {
        &self.op
    }

    fn check_transfer(&self, name: &'static str, buffer: BufferId, bytes: usize) -> Result<()> {
        let mapped = self
            .mappings
            .get(self.op.accel, name)
            .ok_or(SmivError::UnmappedArray {
                accel: self.op.accel,
                name,
            })?;
        if bytes > mapped {
            return Err(SmivError::MappingOverrun {
                name,
                bytes,
                mapped,
            });
        }
        let capacity = self.memory.capacities().bytes(buffer);
        if bytes > capacity {
            return Err(SmivError::BufferOverflow {
                buffer,
                bytes,
                capacity,
            });
        }
        Ok(())
    }

    /// Copy `src`, part of host array `name`, to the start of `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not mapped for this accelerator, or the
    /// transfer is larger than the mapping or the buffer.
    pub fn dma_load(&mut self, name: &'static str, dst: BufferId, src: &[f32]) -> Result<()> {
        let bytes = src.len() * ELEMENT_BYTES;
        self.check_transfer(name, dst, bytes)?;
        trace!("{}: load {name} -> {dst} ({bytes} B)", self.op);
        self.memory.buffer_mut(dst)[..src.len()].copy_from_slice(src);
        self.log.record(HarnessEvent::Load {
            name,
            buffer: dst,
            bytes,
        });
        Ok(())
    }

    /// Copy the start of `src` into `dst`, part of host array `name`.
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not mapped for this accelerator, or the
    /// transfer is larger than the mapping or the buffer.
    pub fn dma_store(&mut self, name: &'static str, dst: &mut [f32], src: BufferId) -> Result<()> {
        let bytes = dst.len() * ELEMENT_BYTES;
        self.check_transfer(name, src, bytes)?;
        trace!("{}: store {src} -> {name} ({bytes} B)", self.op);
        dst.copy_from_slice(&self.memory.buffer(src)[..dst.len()]);
        self.log.record(HarnessEvent::Store {
            name,
            buffer: src,
            bytes,
        });
        Ok(())
    }

    /// Run a kernel writing into `output`. `kernel` receives disjoint borrows
    /// of the buffers.
    ///
    /// # Errors
    ///
    /// Propagates the kernel's error.
    pub fn compute<F>(&mut self, output: BufferId, kernel: F) -> Result<()>
    where
        F: FnOnce(&mut BufferSet<'_>) -> Result<()>,
    {
        trace!("{}: compute -> {output}", self.op);
        kernel(&mut self.memory.bind())?;
        self.log.record(HarnessEvent::Compute {
            datapath: self.op.datapath,
            output,
        });
        Ok(())
    }
}
