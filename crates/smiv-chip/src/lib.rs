// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model for the SMIV accelerator block.
//!
//! This crate has **no dependencies** and **no simulation logic**; it is a
//! pure model of the hardware: local memory sizes, accelerator identities,
//! and the datapath parameters the kernels are shaped around.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`mem`] | UMEM / scratchpad capacities and the [`mem::BufferId`] handle |
//! | [`accel`] | Accelerator ids, datapath kinds and shared-resource tags |
//! | [`params`] | Vector width, alignment, batch size, element size |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accel;
pub mod mem;
pub mod params;
