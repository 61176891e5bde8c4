// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration
//!
//! Defaults come from the silicon model in `smiv-chip`. Capacities can be
//! shrunk (or grown) per run, which is how tests exercise channel tiling
//! without building huge layers.

use crate::error::{Result, SmivError};
use smiv_chip::mem::{BufferId, SPAD_SIZE, UMEM_SIZE};
use smiv_chip::params::{ELEMENT_BYTES, MAX_BATCH, NUM_TEST_CASES};
use tracing::{debug, warn};

/// Environment variable overriding the number of images per run.
pub const ENV_NUM_TEST_CASES: &str = "SMIV_NUM_TEST_CASES";
/// Environment variable overriding the UMEM capacity in bytes.
pub const ENV_UMEM_BYTES: &str = "SMIV_UMEM_BYTES";
/// Environment variable overriding the scratchpad capacity in bytes.
pub const ENV_SPAD_BYTES: &str = "SMIV_SPAD_BYTES";

/// Capacities of the accelerator-local buffers, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCapacities {
    /// Unified buffer
    pub umem_bytes: usize,
    /// Each scratchpad
    pub spad_bytes: usize,
}

impl BufferCapacities {
    /// Capacity of one buffer in bytes
    pub const fn bytes(&self, id: BufferId) -> usize {
        match id {
            BufferId::Umem => self.umem_bytes,
            BufferId::Spad0 | BufferId::Spad1 => self.spad_bytes,
        }
    }

    /// Capacity of one buffer in elements
    pub const fn elements(&self, id: BufferId) -> usize {
        self.bytes(id) / ELEMENT_BYTES
    }
}

impl Default for BufferCapacities {
    fn default() -> Self {
        Self {
            umem_bytes: UMEM_SIZE,
            spad_bytes: SPAD_SIZE,
        }
    }
}

/// Configuration of one forward-pass run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Images processed per run
    pub num_test_cases: usize,

    /// Buffer capacities
    pub capacities: BufferCapacities,

    /// Keep a per-event log in the harness
    pub record_trace: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_test_cases: NUM_TEST_CASES,
            capacities: BufferCapacities::default(),
            record_trace: false,
        }
    }
}

impl RunConfig {
    /// Defaults with environment overrides applied.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = env_usize(ENV_NUM_TEST_CASES) {
            config.num_test_cases = n;
        }
        if let Some(bytes) = env_usize(ENV_UMEM_BYTES) {
            config.capacities.umem_bytes = bytes;
        }
        if let Some(bytes) = env_usize(ENV_SPAD_BYTES) {
            config.capacities.spad_bytes = bytes;
        }
        debug!("Run config: {config:?}");
        config
    }

    /// Set the number of images
    #[must_use]
    pub fn with_test_cases(mut self, n: usize) -> Self {
        self.num_test_cases = n;
        self
    }

    /// Set the scratchpad capacity in bytes
    #[must_use]
    pub fn with_spad_bytes(mut self, bytes: usize) -> Self {
        self.capacities.spad_bytes = bytes;
        self
    }

    /// Set the UMEM capacity in bytes
    #[must_use]
    pub fn with_umem_bytes(mut self, bytes: usize) -> Self {
        self.capacities.umem_bytes = bytes;
        self
    }

    /// Enable or disable the harness event log
    #[must_use]
    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns error on zero images, more images than the datapath batches,
    /// zero capacities, or capacities that are not a whole number of elements.
    pub fn validate(&self) -> Result<()> {
        if self.num_test_cases == 0 {
            return Err(SmivError::invalid_config("num_test_cases must be > 0"));
        }
        if self.num_test_cases > MAX_BATCH {
            return Err(SmivError::invalid_config(format!(
                "num_test_cases {} exceeds the datapath batch limit of {MAX_BATCH}",
                self.num_test_cases
            )));
        }
        for id in BufferId::ALL {
            let bytes = self.capacities.bytes(id);
            if bytes == 0 || bytes % ELEMENT_BYTES != 0 {
                return Err(SmivError::invalid_config(format!(
                    "{id} capacity {bytes} must be a non-zero multiple of {ELEMENT_BYTES}"
                )));
            }
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {key}={value:?}: not an unsigned integer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_silicon() {
        let config = RunConfig::default();
        assert_eq!(config.capacities.bytes(BufferId::Umem), UMEM_SIZE);
        assert_eq!(config.capacities.bytes(BufferId::Spad1), SPAD_SIZE);
        assert_eq!(config.num_test_cases, NUM_TEST_CASES);
        config.validate().unwrap();
    }

    #[test]
    fn builder_overrides() {
        let config = RunConfig::default().with_spad_bytes(512).with_test_cases(1);
        assert_eq!(config.capacities.elements(BufferId::Spad0), 128);
        assert_eq!(config.num_test_cases, 1);
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(RunConfig::default().with_test_cases(0).validate().is_err());
        assert!(RunConfig::default().with_spad_bytes(0).validate().is_err());
        assert!(RunConfig::default().with_umem_bytes(1023).validate().is_err());
    }

    #[test]
    fn batch_is_limited_by_the_datapath() {
        assert!(RunConfig::default().with_test_cases(MAX_BATCH).validate().is_ok());
        assert!(RunConfig::default()
            .with_test_cases(MAX_BATCH + 1)
            .validate()
            .is_err());
    }
}
