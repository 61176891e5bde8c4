// SPDX-License-Identifier: AGPL-3.0-only

//! Inner-product runner
//!
//! One invocation covers every image. Weights always go to UMEM; the result
//! goes to whichever scratchpad the ping-pong selects, and the input is read
//! from the other one. When the previous layer's result is still resident
//! there, no input transfer happens at all.

use super::convolution::fused_activation;
use super::{host, Orchestrator, HOST_ACTIVATIONS, HOST_RESULT, HOST_WEIGHTS};
use crate::datapath::matrix_multiply_with_bias;
use crate::error::{Result, SmivError};
use crate::harness::Operation;
use crate::memory::InnerProductRoles;
use smiv_chip::accel::Datapath;
use smiv_chip::params::ELEMENT_BYTES;
use smiv_models::Layer;
use tracing::debug;

impl Orchestrator<'_> {
    /// Multiply `activations` by the layer's weights into `result`.
    pub(super) fn inner_product_layer(
        &mut self,
        layer: &Layer,
        weights: &[f32],
        activations: &[f32],
        result: &mut [f32],
    ) -> Result<()> {
        let images = self.config.num_test_cases;
        let op = Operation::new(Datapath::InnerProduct);
        let roles = InnerProductRoles::for_result(self.ping_pong.advance());
        let act = fused_activation(layer);
        debug!(
            "{}: weights {}, input {}{}, result {}",
            layer.name,
            roles.weights,
            roles.activations,
            if layer.needs_input_transfer { "" } else { " (resident)" },
            roles.result
        );

        let in_len = images * layer.inputs.elements();
        let out_len = images * layer.outputs.elements();
        let inputs = activations.get(..in_len).ok_or(SmivError::SizeMismatch {
            what: "inner-product input",
            got: activations.len(),
            expected: in_len,
        })?;
        let result_len = result.len();
        let outputs = result.get_mut(..out_len).ok_or(SmivError::SizeMismatch {
            what: "inner-product result",
            got: result_len,
            expected: out_len,
        })?;

        self.harness
            .map_array(op.accel, HOST_WEIGHTS, weights.len() * ELEMENT_BYTES);
        if layer.needs_input_transfer {
            self.harness
                .map_array(op.accel, HOST_ACTIVATIONS, in_len * ELEMENT_BYTES);
        }
        if layer.needs_output_transfer {
            self.harness
                .map_array(op.accel, HOST_RESULT, out_len * ELEMENT_BYTES);
        }

        self.harness.invoke(&op, &mut self.memory, &mut |inv| {
            inv.dma_load(HOST_WEIGHTS, roles.weights, weights)?;
            if layer.needs_input_transfer {
                inv.dma_load(HOST_ACTIVATIONS, roles.activations, inputs)?;
            }
            inv.compute(roles.result, |bufs| {
                matrix_multiply_with_bias(
                    bufs.read(roles.activations)?,
                    layer.inputs,
                    images,
                    bufs.read(roles.weights)?,
                    layer.weights,
                    act,
                    bufs.take(roles.result)?,
                )
            })?;
            if layer.needs_output_transfer {
                inv.dma_store(HOST_RESULT, outputs, roles.result)?;
            }
            Ok(())
        })?;

        if layer.activation.needs_host_postprocessing() {
            host::postprocess(layer, images, outputs);
        }
        Ok(())
    }
}
