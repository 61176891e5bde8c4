// SPDX-License-Identifier: AGPL-3.0-only

//! Accelerator invocation protocol
//!
//! Per layer, the [`Orchestrator`] maps the host arrays the layer touches,
//! then issues invocations whose bodies load operands, run a kernel and store
//! results. Host data lives in two alternating [`HostBuffers`]: a layer reads
//! one and writes the other, and [`Orchestrator::run_layer`] reports which
//! one holds its output.

mod convolution;
mod host;
mod inner_product;

use crate::config::RunConfig;
use crate::error::{Result, SmivError};
use crate::harness::Harness;
use crate::memory::{AcceleratorMemoryContext, PingPong};
use smiv_models::{LayerType, Network, Preprocessing};
use tracing::{debug, info};

pub use convolution::partial_layer;

/// Host array holding the current layer's weights.
pub const HOST_WEIGHTS: &str = "host_weights";
/// Host array holding the current layer's input.
pub const HOST_ACTIVATIONS: &str = "host_activations";
/// Host array receiving the current layer's output.
pub const HOST_RESULT: &str = "host_result";
/// Host array holding per-iteration partial results.
pub const HOST_PARTIALS: &str = "host_partials";

/// Which host buffer holds a layer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferLocation {
    /// The buffer the layer read from
    Activations,
    /// The other buffer
    Result,
}

/// The two alternating host buffers.
#[derive(Debug, Clone)]
pub struct HostBuffers {
    activations: Vec<f32>,
    result: Vec<f32>,
    swapped: bool,
}

impl HostBuffers {
    /// Two buffers of `capacity` elements, the first starting with `input`.
    ///
    /// # Errors
    ///
    /// Returns error if `input` is longer than `capacity`.
    pub fn new(input: &[f32], capacity: usize) -> Result<Self> {
        if input.len() > capacity {
            return Err(SmivError::SizeMismatch {
                what: "host buffer",
                got: input.len(),
                expected: capacity,
            });
        }
        let mut activations = vec![0.0; capacity];
        activations[..input.len()].copy_from_slice(input);
        Ok(Self {
            activations,
            result: vec![0.0; capacity],
            swapped: false,
        })
    }

    /// Current layer input.
    pub fn activations(&self) -> &[f32] {
        &self.activations
    }

    /// `(activations, result)` for one layer.
    pub fn split_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.activations, &mut self.result)
    }

    /// Make the result buffer the next layer's input.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.activations, &mut self.result);
        self.swapped = !self.swapped;
    }

    /// Whether the current input lives in the second buffer.
    pub const fn in_temp(&self) -> bool {
        self.swapped
    }
}

/// Drives one network through a harness.
#[derive(Debug)]
pub struct Orchestrator<'h> {
    harness: &'h mut dyn Harness,
    memory: AcceleratorMemoryContext,
    ping_pong: PingPong,
    config: RunConfig,
}

impl<'h> Orchestrator<'h> {
    /// Allocate accelerator memory for a run.
    ///
    /// # Errors
    ///
    /// Returns error if `config` is invalid.
    pub fn new(harness: &'h mut dyn Harness, config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            harness,
            memory: AcceleratorMemoryContext::allocate(config.capacities),
            ping_pong: PingPong::new(),
            config,
        })
    }

    /// Run configuration.
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The harness.
    pub fn harness(&self) -> &dyn Harness {
        &*self.harness
    }

    /// Scratchpad holding the most recent inner-product result.
    pub const fn ping_pong(&self) -> PingPong {
        self.ping_pong
    }

    /// Run layer `lnum` of `network`, reading `buffers.activations()`.
    ///
    /// `weights` is the whole network's flat weight array. DMA flags must
    /// already be set on the network.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the layer cannot be mapped onto the
    /// accelerator, or a harness error if the protocol is violated.
    pub fn run_layer(
        &mut self,
        network: &Network,
        lnum: usize,
        weights: &[f32],
        buffers: &mut HostBuffers,
    ) -> Result<BufferLocation> {
        let layer = network
            .layers()
            .get(lnum)
            .ok_or_else(|| SmivError::invalid_network(format!("no layer {lnum}")))?;
        let offset = network.weights_offset(lnum);
        let layer_weights = weights
            .get(offset..offset + layer.num_weights())
            .ok_or(SmivError::SizeMismatch {
                what: "weights",
                got: weights.len(),
                expected: offset + layer.num_weights(),
            })?;
        info!("Layer {lnum} `{}`: {} {} -> {}", layer.name, layer.layer_type, layer.inputs, layer.outputs);

        let location = match layer.layer_type {
            LayerType::Input => BufferLocation::Activations,
            LayerType::Convolution => {
                if layer.c_padding > 0 {
                    let (activations, result) = buffers.split_mut();
                    host::zeropad(layer, self.config.num_test_cases, activations, result)?;
                    self.convolution_layer(layer, layer_weights, result, activations)?;
                    BufferLocation::Activations
                } else {
                    let (activations, result) = buffers.split_mut();
                    self.convolution_layer(layer, layer_weights, activations, result)?;
                    BufferLocation::Result
                }
            }
            LayerType::InnerProduct => {
                let prev_layer = lnum
                    .checked_sub(1)
                    .map(|i| &network.layers()[i])
                    .ok_or_else(|| SmivError::invalid_network("inner product cannot be layer 0"))?;
                // Only inner-product results are left in a scratchpad.
                if !layer.needs_input_transfer
                    && prev_layer.layer_type != LayerType::InnerProduct
                {
                    return Err(SmivError::invalid_network(format!(
                        "{}: input from {} `{}` is never resident on the accelerator",
                        layer.name, prev_layer.layer_type, prev_layer.name
                    )));
                }
                let prev = prev_layer.outputs;
                let (activations, result) = buffers.split_mut();
                if layer.input_preprocessing == Preprocessing::Flatten {
                    host::flatten(layer, prev, self.config.num_test_cases, activations, result)?;
                    self.inner_product_layer(layer, layer_weights, result, activations)?;
                    BufferLocation::Activations
                } else {
                    self.inner_product_layer(layer, layer_weights, activations, result)?;
                    BufferLocation::Result
                }
            }
            LayerType::Pooling => {
                let (activations, result) = buffers.split_mut();
                host::pooling(layer, self.config.num_test_cases, activations, result)?;
                BufferLocation::Result
            }
            LayerType::Softmax => {
                let (activations, result) = buffers.split_mut();
                host::softmax(layer, self.config.num_test_cases, activations, result)?;
                BufferLocation::Result
            }
        };
        debug!("Layer {lnum} result in {location:?}");
        Ok(location)
    }

    /// Release accelerator memory.
    pub fn finish(self) {
        self.memory.release();
    }
}
