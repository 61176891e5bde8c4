// SPDX-License-Identifier: AGPL-3.0-only

//! Whole-network forward pass

use crate::config::RunConfig;
use crate::dma::set_dma_requirements;
use crate::error::{Result, SmivError};
use crate::harness::{Harness, HarnessStats};
use crate::protocol::{BufferLocation, HostBuffers, Orchestrator};
use smiv_models::{Dims, LayerType, Network};
use std::time::{Duration, Instant};
use tracing::info;

/// Output of a forward pass.
#[derive(Debug, Clone)]
pub struct ForwardResult {
    /// Final layer output for every image, in the padded layout of
    /// `output_dims`
    pub output: Vec<f32>,
    /// Per-image dims of `output`
    pub output_dims: Dims,
    /// Whether the result ended in the second host buffer
    pub result_in_temp: bool,
    /// Harness counters after the run
    pub stats: HarnessStats,
    /// Wall-clock time of the run
    pub elapsed: Duration,
}

impl ForwardResult {
    /// Output of one image without row padding.
    pub fn image(&self, index: usize) -> Vec<f32> {
        let dims = self.output_dims;
        let stride = dims.elements();
        self.output
            .get(index * stride..(index + 1) * stride)
            .map(|img| {
                img.chunks(dims.padded_cols().max(1))
                    .flat_map(|row| row.iter().take(dims.cols).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index of the largest output of one image.
    pub fn argmax(&self, index: usize) -> Option<usize> {
        self.image(index)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Run every layer of `network` on `config.num_test_cases` images.
///
/// Sets the network's DMA flags, allocates accelerator memory, runs the
/// layers in order and releases the memory. `activations` holds the input
/// images in the first layer's padded layout; `weights` every layer's
/// weights back to back.
///
/// # Errors
///
/// Returns error if the network does not start with an input layer, the host
/// data does not match the network, or any layer fails.
pub fn run_forward_pass(
    harness: &mut dyn Harness,
    network: &mut Network,
    activations: &[f32],
    weights: &[f32],
    config: &RunConfig,
) -> Result<ForwardResult> {
    let start = Instant::now();
    let images = config.num_test_cases;
    let first = &network.layers()[0];
    if first.layer_type != LayerType::Input {
        return Err(SmivError::invalid_network(format!(
            "layer 0 must be an input layer, found {}",
            first.layer_type
        )));
    }
    let expected = images * first.inputs.elements();
    if activations.len() != expected {
        return Err(SmivError::SizeMismatch {
            what: "input images",
            got: activations.len(),
            expected,
        });
    }
    if weights.len() != network.total_weights() {
        return Err(SmivError::SizeMismatch {
            what: "weights",
            got: weights.len(),
            expected: network.total_weights(),
        });
    }

    info!(
        "Forward pass `{}`: {} layers, {images} image(s)",
        network.name(),
        network.depth()
    );
    set_dma_requirements(network);

    let mut host = HostBuffers::new(activations, images * network.max_tensor_elements())?;
    let mut orchestrator = Orchestrator::new(harness, config.clone())?;
    for lnum in 0..network.depth() {
        if orchestrator.run_layer(network, lnum, weights, &mut host)? == BufferLocation::Result {
            host.swap();
        }
    }
    let stats = orchestrator.harness().stats().clone();
    orchestrator.finish();

    let last = network.depth() - 1;
    let output_dims = network.layers()[last].outputs;
    let result_in_temp = host.in_temp();
    network.layers_mut()[last].result_in_temp = result_in_temp;
    let output = host.activations()[..images * output_dims.elements()].to_vec();

    let elapsed = start.elapsed();
    info!("Forward pass done in {elapsed:?}: {stats}");
    Ok(ForwardResult {
        output,
        output_dims,
        result_in_temp,
        stats,
        elapsed,
    })
}
