// SPDX-License-Identifier: AGPL-3.0-only

//! Orchestration layer for the SMIV accelerator.
//!
//! Maps each layer of a network onto the accelerator's three fixed-capacity
//! buffers, decides which layer boundaries need a host round trip, splits
//! layers that do not fit into channel-wise iterations, and drives the
//! simulation harness through a strict map, transfer, invoke sequence.
//!
//! # Buffers
//!
//! ```text
//! UMEM   (3 MiB)    activations (convolution), weights (inner product)
//! SPAD0  (128 KiB)  reduced result / weight slice / ping-pong
//! SPAD1  (128 KiB)  unreduced partials / ping-pong
//! ```
//!
//! # Quick start
//!
//! ```
//! use smiv_driver::{run_forward_pass, RunConfig, SoftwareHarness};
//! use smiv_models::{weights, ZooNetwork};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut net = ZooNetwork::TiledConv.build()?;
//! let config = RunConfig::default().with_spad_bytes(512).with_test_cases(1);
//! let inputs = weights::init_inputs(&net, 1, 7);
//! let params = weights::init_weights(&net, 7);
//!
//! let mut harness = SoftwareHarness::from_config(&config);
//! let result = run_forward_pass(&mut harness, &mut net, &inputs, &params, &config)?;
//! println!("{}", result.stats);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_arguments)]

pub mod backends;
mod config;
pub mod datapath;
pub mod dma;
mod error;
mod forward;
pub mod harness;
pub mod memory;
pub mod protocol;
pub mod scheduler;
pub mod tensor;
pub mod tiling;

pub use backends::SoftwareHarness;
pub use config::{BufferCapacities, RunConfig, ENV_NUM_TEST_CASES, ENV_SPAD_BYTES, ENV_UMEM_BYTES};
pub use dma::{dma_requirements, set_dma_requirements, DmaRequirement};
pub use error::{ConfigurationError, Result, SmivError};
pub use forward::{run_forward_pass, ForwardResult};
pub use harness::{Harness, HarnessEvent, HarnessStats, Invocation, Operation};
pub use memory::{AcceleratorMemoryContext, BufferSet, PingPong};
pub use protocol::{BufferLocation, HostBuffers, Orchestrator};
pub use tiling::{divide_work, IterationPlan};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        run_forward_pass, BufferCapacities, ConfigurationError, ForwardResult, Harness,
        HarnessStats, Result, RunConfig, SmivError, SoftwareHarness,
    };
}
