// SPDX-License-Identifier: AGPL-3.0-only

//! Software harness
//!
//! Executes invocations synchronously on the host. The numeric work happens
//! in the invocation body through [`crate::datapath`]; this type supplies the
//! parts a cycle simulator would: the mapping table, resource arbitration and
//! transfer accounting.

use crate::config::RunConfig;
use crate::error::Result;
use crate::harness::{Harness, HarnessEvent, HarnessStats, Invocation, MappingTable, Operation, RunLog};
use crate::memory::AcceleratorMemoryContext;
use crate::scheduler::Scheduler;
use smiv_chip::accel::AcceleratorId;
use tracing::{debug, trace};

/// Harness that runs every kernel on the CPU.
#[derive(Debug, Default)]
pub struct SoftwareHarness {
    mappings: MappingTable,
    scheduler: Scheduler,
    log: RunLog,
}

impl SoftwareHarness {
    /// Create a harness, optionally recording every event.
    pub fn new(record_trace: bool) -> Self {
        Self {
            mappings: MappingTable::default(),
            scheduler: Scheduler::new(),
            log: RunLog::new(record_trace),
        }
    }

    /// Create a harness configured for `config`.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.record_trace)
    }

    /// Live mappings.
    pub const fn mappings(&self) -> &MappingTable {
        &self.mappings
    }
}

impl Harness for SoftwareHarness {
    fn map_array(&mut self, accel: AcceleratorId, name: &'static str, bytes: usize) {
        debug!("map {name} ({bytes} B) for accelerator {accel}");
        self.mappings.insert(accel, name, bytes);
        self.log.record(HarnessEvent::Map { accel, name, bytes });
    }

    fn invoke(
        &mut self,
        op: &Operation,
        memory: &mut AcceleratorMemoryContext,
        body: &mut dyn FnMut(&mut Invocation<'_>) -> Result<()>,
    ) -> Result<()> {
        self.scheduler.acquire(op)?;
        trace!("invoke {op}");
        self.log.record(HarnessEvent::Invoke(op.datapath));
        let result = body(&mut Invocation::new(*op, memory, &self.mappings, &mut self.log));
        self.scheduler.release(op);
        result
    }

    fn stats(&self) -> &HarnessStats {
        self.log.stats()
    }

    fn events(&self) -> &[HarnessEvent] {
        self.log.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BufferCapacities;
    use crate::error::SmivError;
    use smiv_chip::accel::Datapath;
    use smiv_chip::mem::BufferId;

    #[test]
    fn invocation_sees_mappings_and_memory() {
        let mut harness = SoftwareHarness::new(true);
        let mut mem = AcceleratorMemoryContext::allocate(BufferCapacities::default());
        let op = Operation::new(Datapath::InnerProduct);
        harness.map_array(op.accel, "host_activations", 16);

        let host = [1.0, 2.0, 3.0, 4.0];
        harness
            .invoke(&op, &mut mem, &mut |inv| {
                inv.dma_load("host_activations", BufferId::Spad0, &host)
            })
            .unwrap();

        assert_eq!(&mem.buffer(BufferId::Spad0)[..4], &host);
        assert_eq!(
            harness.events(),
            [
                HarnessEvent::Map {
                    accel: op.accel,
                    name: "host_activations",
                    bytes: 16
                },
                HarnessEvent::Invoke(Datapath::InnerProduct),
                HarnessEvent::Load {
                    name: "host_activations",
                    buffer: BufferId::Spad0,
                    bytes: 16
                },
            ]
        );
    }

    #[test]
    fn failed_body_releases_the_resource() {
        let mut harness = SoftwareHarness::default();
        let mut mem = AcceleratorMemoryContext::allocate(BufferCapacities::default());
        let op = Operation::new(Datapath::Reduction);

        let err = harness
            .invoke(&op, &mut mem, &mut |inv| inv.dma_load("nowhere", BufferId::Umem, &[0.0]))
            .unwrap_err();
        assert!(matches!(err, SmivError::UnmappedArray { .. }));

        harness.invoke(&op, &mut mem, &mut |_| Ok(())).unwrap();
        assert_eq!(harness.stats().reduction_invocations, 2);
    }
}
