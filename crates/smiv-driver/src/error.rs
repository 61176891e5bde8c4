// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for SMIV driver operations

use smiv_chip::accel::{AcceleratorId, ResourceTag};
use smiv_chip::mem::BufferId;
use smiv_models::{ModelError, PoolingKind};
use thiserror::Error;

/// Result type alias for SMIV operations
pub type Result<T> = std::result::Result<T, SmivError>;

/// A network/accelerator mismatch that cannot be executed.
///
/// These are detected synchronously while planning or dispatching a layer and
/// abort the whole run. There is no retry path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// One image's input does not fit the unified buffer
    #[error("layer {layer}: a single input image needs {bytes} bytes, UMEM holds {capacity}")]
    InputExceedsUmem {
        /// Layer name
        layer: String,
        /// Per-image input footprint
        bytes: usize,
        /// UMEM capacity
        capacity: usize,
    },

    /// Fewer than two unreduced channels fit a scratchpad, so channel-wise
    /// tiling cannot apply and spatial tiling is unsupported
    #[error(
        "layer {layer}: one unreduced channel needs {channel_bytes} bytes, \
         scratchpad of {capacity} bytes holds fewer than 2 (spatial tiling unsupported)"
    )]
    SpatialTilingRequired {
        /// Layer name
        layer: String,
        /// Bytes of one unreduced output channel
        channel_bytes: usize,
        /// Scratchpad capacity
        capacity: usize,
    },

    /// Partial results need more than one final reduction round
    #[error(
        "layer {layer}: {iterations} partial results need {rounds} final reduction rounds, \
         only 1 is supported"
    )]
    MultiRoundReduction {
        /// Layer name
        layer: String,
        /// Iterations in the plan
        iterations: usize,
        /// Rounds that would be required
        rounds: usize,
    },

    /// Pooling variant the fallback does not implement
    #[error("layer {layer}: unsupported pooling kind {kind:?}")]
    UnsupportedPooling {
        /// Layer name
        layer: String,
        /// Requested kind (`None` if the layer has no pooling kind at all)
        kind: Option<PoolingKind>,
    },
}

/// Errors that can occur during SMIV operations
#[derive(Debug, Error)]
pub enum SmivError {
    /// Unsupported configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Transfer referenced a host array that was never mapped
    #[error("Array `{name}` is not mapped for accelerator {accel}")]
    UnmappedArray {
        /// Accelerator id of the invocation
        accel: AcceleratorId,
        /// Logical array name
        name: &'static str,
    },

    /// Transfer larger than the mapped host array
    #[error("Transfer of {bytes} bytes overruns mapping `{name}` ({mapped} bytes)")]
    MappingOverrun {
        /// Logical array name
        name: &'static str,
        /// Bytes requested
        bytes: usize,
        /// Bytes mapped
        mapped: usize,
    },

    /// Data does not fit an accelerator buffer
    #[error("{bytes} bytes do not fit {buffer} ({capacity} bytes)")]
    BufferOverflow {
        /// Target buffer
        buffer: BufferId,
        /// Bytes requested
        bytes: usize,
        /// Buffer capacity
        capacity: usize,
    },

    /// The same buffer was bound to two roles in one invocation
    #[error("Buffer {buffer} bound twice in one invocation")]
    BufferAliased {
        /// Buffer requested twice
        buffer: BufferId,
    },

    /// Invocation issued while another on the same resource is in flight
    #[error("Resource {tag} is busy with {holder}")]
    ResourceBusy {
        /// Contended resource
        tag: ResourceTag,
        /// Kernel currently holding it
        holder: String,
    },

    /// Host data does not match what the network expects
    #[error("Size mismatch for {what}: got {got}, expected {expected}")]
    SizeMismatch {
        /// What was being checked
        what: &'static str,
        /// Elements provided
        got: usize,
        /// Elements expected
        expected: usize,
    },

    /// Tensor view indexed outside its shape
    #[error("Index {index:?} out of bounds for tensor of shape {shape:?}")]
    OutOfBounds {
        /// Requested index (unused trailing axes are zero)
        index: [usize; 4],
        /// Shape of the view
        shape: [usize; 4],
    },

    /// Network cannot be executed as given
    #[error("Invalid network: {reason}")]
    InvalidNetwork {
        /// Reason for failure
        reason: String,
    },

    /// Invalid run configuration
    #[error("Invalid configuration value: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    /// Network description error
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl SmivError {
    /// Create an invalid network error
    pub fn invalid_network(reason: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this is an unsupported-configuration error
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The configuration error, if this is one
    pub const fn as_configuration(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration(e) => Some(e),
            _ => None,
        }
    }
}
