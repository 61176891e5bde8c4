// SPDX-License-Identifier: AGPL-3.0-only

//! Resource arbitration
//!
//! Operations that share a physical resource must not overlap. The scheduler
//! tracks which kernel holds each [`ResourceTag`] and refuses a second
//! acquisition until the first is released.

use crate::error::{Result, SmivError};
use crate::harness::Operation;
use smiv_chip::accel::ResourceTag;
use std::collections::HashMap;
use tracing::trace;

/// In-flight invocations keyed by resource.
#[derive(Debug, Default)]
pub struct Scheduler {
    in_flight: HashMap<ResourceTag, Operation>,
}

impl Scheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `op`'s resource as busy.
    ///
    /// # Errors
    ///
    /// Returns error if another operation holds the same resource.
    pub fn acquire(&mut self, op: &Operation) -> Result<()> {
        if let Some(holder) = self.in_flight.get(&op.resource) {
            return Err(SmivError::ResourceBusy {
                tag: op.resource,
                holder: holder.to_string(),
            });
        }
        trace!("{} acquired by {op}", op.resource);
        self.in_flight.insert(op.resource, *op);
        Ok(())
    }

    /// Free `op`'s resource.
    pub fn release(&mut self, op: &Operation) {
        if self.in_flight.remove(&op.resource).is_some() {
            trace!("{} released by {op}", op.resource);
        }
    }

    /// Whether `tag` is currently held.
    pub fn is_busy(&self, tag: ResourceTag) -> bool {
        self.in_flight.contains_key(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smiv_chip::accel::{Datapath, SMIV_DATAPATH};

    #[test]
    fn kernels_sharing_the_datapath_serialise() {
        let mut sched = Scheduler::new();
        let conv = Operation::new(Datapath::Convolution);
        let reduce = Operation::new(Datapath::Reduction);

        sched.acquire(&conv).unwrap();
        assert!(sched.is_busy(SMIV_DATAPATH));
        let err = sched.acquire(&reduce).unwrap_err();
        assert!(matches!(err, SmivError::ResourceBusy { .. }));
        assert!(err.to_string().contains("convolution"));

        sched.release(&conv);
        assert!(!sched.is_busy(SMIV_DATAPATH));
        sched.acquire(&reduce).unwrap();
    }
}
