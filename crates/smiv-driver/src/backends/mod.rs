// SPDX-License-Identifier: AGPL-3.0-only

//! Harness implementations
//!
//! - **Software**: runs the datapath kernels on the host CPU. Used by the CLI
//!   and every test; no simulator required.

pub mod software;

pub use software::SoftwareHarness;
