// SPDX-License-Identifier: AGPL-3.0-only

#![deny(unsafe_code)]

//! Network descriptors for the SMIV accelerator
//!
//! This crate describes *what* runs on the accelerator: the ordered layers of
//! a network, their tensor dims in the padded on-chip layout, and the weights
//! and inputs fed to them. It knows nothing about buffers or invocations.
//!
//! # Example
//!
//! ```
//! use smiv_models::{Activation, NetworkBuilder, PoolingKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let net = NetworkBuilder::new("demo", 28, 28, 1)
//!     .conv(8, 3, 1, 1, Activation::Relu)
//!     .pool(PoolingKind::Max, 2, 2)
//!     .fc(10, Activation::None)
//!     .build()?;
//!
//! println!("{}: {} layers, {} weights", net.name(), net.depth(), net.total_weights());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

mod error;
mod network;
pub mod parser;
mod shapes;
pub mod weights;
pub mod zoo;

pub use error::{ModelError, Result};
pub use network::{Activation, Layer, LayerType, Network, NetworkBuilder, PoolingKind, Preprocessing};
pub use shapes::Dims;
pub use zoo::ZooNetwork;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{Activation, Dims, Layer, LayerType, Network, NetworkBuilder, Result, ZooNetwork};
}
