// SPDX-License-Identifier: AGPL-3.0-only

//! Numeric kernels of the SMIV datapath
//!
//! Pure functions over flat padded buffers. The orchestration layer never
//! computes anything itself; it moves data and calls these inside an
//! invocation (or on the host, for the software fallbacks).

pub mod activation;
pub mod convolution;
pub mod matmul;
pub mod pooling;
pub mod reduction;
pub mod softmax;

pub use activation::{activate, activate_rows};
pub use convolution::convolution3d_unreduced;
pub use matmul::matrix_multiply_with_bias;
pub use pooling::max_pooling;
pub use reduction::reduce_channels;
pub use softmax::softmax;
