// SPDX-License-Identifier: AGPL-3.0-only

//! Convolution runner
//!
//! Order is images, then kernels, then channel iterations. Every iteration
//! issues two invocations: the convolution kernel leaves one unreduced
//! channel per input channel in SPAD1, and the reduction kernel sums them
//! into SPAD0 and stores the result into the iteration's slot of a rolling
//! host buffer. When a kernel needed more than one iteration, a final
//! reduction over the slots produces the output channel.
//!
//! Only one final round is supported: all slots must fit SPAD1 at once. This
//! is checked before the layer's first invocation.

use super::{Orchestrator, HOST_ACTIVATIONS, HOST_PARTIALS, HOST_WEIGHTS};
use crate::datapath::{convolution3d_unreduced, reduce_channels};
use crate::error::{Result, SmivError};
use crate::harness::Operation;
use crate::memory::CONVOLUTION_ROLES;
use crate::protocol::host;
use crate::tensor::{TensorView, TensorViewMut};
use crate::tiling::{check_final_reduction, divide_work};
use smiv_chip::accel::Datapath;
use smiv_chip::params::ELEMENT_BYTES;
use smiv_models::{Activation, Dims, Layer};
use tracing::debug;

/// View of `layer` restricted to one channel chunk.
///
/// The activation is only kept when the chunk is the whole layer; partial
/// sums must not be activated before they are combined.
pub fn partial_layer(layer: &Layer, chunk: Dims, single_iteration: bool) -> Layer {
    let mut partial = layer.clone();
    partial.inputs = chunk;
    partial.weights = layer.weights.with_height(chunk.height);
    partial.activation = if single_iteration {
        fused_activation(layer)
    } else {
        Activation::None
    };
    partial
}

/// Activation the datapath applies; the rest is finished on the host.
pub(crate) fn fused_activation(layer: &Layer) -> Activation {
    if layer.activation.needs_host_postprocessing() {
        Activation::None
    } else {
        layer.activation
    }
}

impl Orchestrator<'_> {
    /// Convolve `activations` into `result` for every image.
    pub(super) fn convolution_layer(
        &mut self,
        layer: &Layer,
        weights: &[f32],
        activations: &[f32],
        result: &mut [f32],
    ) -> Result<()> {
        if !layer.needs_input_transfer {
            return Err(SmivError::invalid_network(format!(
                "{}: convolution input must come from host memory",
                layer.name
            )));
        }
        let caps = self.config.capacities;
        let plan = divide_work(layer, &caps)?;
        check_final_reduction(layer, &plan, &caps)?;

        let images = self.config.num_test_cases;
        let roles = CONVOLUTION_ROLES;
        let conv = Operation::new(Datapath::Convolution);
        let reduce = Operation::new(Datapath::Reduction);
        let slot = layer.outputs.channel_elements();
        let kernel_elements = layer.weights.elements();
        let weight_channel = layer.weights.channel_elements();
        let mut partials = vec![0.0f32; plan.len() * slot];

        self.harness
            .map_array(conv.accel, HOST_WEIGHTS, weights.len() * ELEMENT_BYTES);
        self.harness.map_array(
            conv.accel,
            HOST_ACTIVATIONS,
            images * layer.inputs.bytes(),
        );
        self.harness
            .map_array(reduce.accel, HOST_PARTIALS, partials.len() * ELEMENT_BYTES);

        let input = TensorView::from_dims(activations, images, layer.inputs)?;
        let mut output = TensorViewMut::from_dims(result, images, layer.outputs)?;

        for image in 0..images {
            for kernel in 0..layer.outputs.height {
                let kernel_weights = weights
                    .get(kernel * kernel_elements..(kernel + 1) * kernel_elements)
                    .ok_or(SmivError::SizeMismatch {
                        what: "convolution weights",
                        got: weights.len(),
                        expected: layer.num_weights(),
                    })?;

                for (iteration, (first, chunk)) in plan.with_offsets().enumerate() {
                    let partial = partial_layer(layer, chunk, plan.is_single());
                    let w_slice =
                        &kernel_weights[first * weight_channel..(first + chunk.height) * weight_channel];
                    let a_slice = input.channels(image, first, chunk.height)?;
                    let load_inputs = kernel == 0 || !plan.is_single();
                    debug!(
                        "{}: image {image} kernel {kernel} iteration {iteration} channels {first}..{}",
                        layer.name,
                        first + chunk.height
                    );

                    self.harness.invoke(&conv, &mut self.memory, &mut |inv| {
                        inv.dma_load(HOST_WEIGHTS, roles.weights, w_slice)?;
                        if load_inputs {
                            inv.dma_load(HOST_ACTIVATIONS, roles.activations, a_slice)?;
                        }
                        inv.compute(roles.unreduced, |bufs| {
                            convolution3d_unreduced(
                                bufs.read(roles.activations)?,
                                partial.inputs,
                                bufs.read(roles.weights)?,
                                partial.weights,
                                partial.stride,
                                partial.outputs,
                                bufs.take(roles.unreduced)?,
                            )
                        })
                    })?;

                    let slot_range = iteration * slot..(iteration + 1) * slot;
                    let store = &mut partials[slot_range];
                    self.harness.invoke(&reduce, &mut self.memory, &mut |inv| {
                        inv.compute(roles.reduced, |bufs| {
                            reduce_channels(
                                bufs.read(roles.unreduced)?,
                                partial.outputs.with_height(chunk.height),
                                partial.activation,
                                bufs.take(roles.reduced)?,
                            )
                        })?;
                        inv.dma_store(HOST_PARTIALS, store, roles.reduced)
                    })?;
                }

                if !plan.is_single() {
                    self.final_reduction(layer, plan.len(), &mut partials)?;
                }
                output
                    .channels_mut(image, kernel, 1)?
                    .copy_from_slice(&partials[..slot]);
            }
        }

        if layer.activation.needs_host_postprocessing() {
            host::postprocess(layer, images, result);
        }
        Ok(())
    }

    /// Combine the per-iteration slots into slot 0.
    fn final_reduction(&mut self, layer: &Layer, iterations: usize, partials: &mut [f32]) -> Result<()> {
        let roles = CONVOLUTION_ROLES;
        let reduce = Operation::new(Datapath::Reduction);
        let slot = layer.outputs.channel_elements();
        let dims = layer.outputs.with_height(iterations);
        let act = fused_activation(layer);
        debug!("{}: final reduction over {iterations} slots", layer.name);

        self.harness.invoke(&reduce, &mut self.memory, &mut |inv| {
            inv.dma_load(HOST_PARTIALS, roles.unreduced, partials)?;
            inv.compute(roles.reduced, |bufs| {
                reduce_channels(bufs.read(roles.unreduced)?, dims, act, bufs.take(roles.reduced)?)
            })?;
            inv.dma_store(HOST_PARTIALS, &mut partials[..slot], roles.reduced)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smiv_models::NetworkBuilder;

    #[test]
    fn partial_layer_replaces_channels_and_drops_activation() {
        let net = NetworkBuilder::new("t", 8, 8, 4)
            .conv(2, 3, 1, 1, Activation::Relu)
            .build()
            .unwrap();
        let layer = &net.layers()[1];
        let chunk = layer.inputs.with_height(2);

        let partial = partial_layer(layer, chunk, false);
        assert_eq!(partial.inputs.height, 2);
        assert_eq!(partial.weights.height, 2);
        assert_eq!(partial.activation, Activation::None);
        assert_eq!(partial.outputs, layer.outputs);

        let whole = partial_layer(layer, layer.inputs, true);
        assert_eq!(whole.activation, Activation::Relu);
        // The source layer is never touched.
        assert_eq!(layer.inputs.height, 4);
    }
}
