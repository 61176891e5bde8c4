// SPDX-License-Identifier: AGPL-3.0-only

//! DMA requirement analysis
//!
//! Decides once per network which layer boundaries need a host round trip.
//! A layer's output stays on the accelerator only when the next layer can
//! consume it straight from the scratchpad it landed in.

use smiv_models::{Layer, LayerType, Network, Preprocessing};
use tracing::debug;

/// Transfer flags of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaRequirement {
    /// Input must be loaded from host memory
    pub needs_input_transfer: bool,
    /// Output must be stored to host memory
    pub needs_output_transfer: bool,
}

/// Compute the transfer flags of every layer without touching the network.
pub fn dma_requirements(network: &Network) -> Vec<DmaRequirement> {
    let layers = network.layers();
    let mut flags: Vec<DmaRequirement> = Vec::with_capacity(layers.len());

    for (i, layer) in layers.iter().enumerate() {
        let req = match flags.last() {
            None => DmaRequirement {
                needs_input_transfer: false,
                needs_output_transfer: true,
            },
            Some(prev) => DmaRequirement {
                needs_input_transfer: prev.needs_output_transfer,
                needs_output_transfer: must_store_output(layer, layers.get(i + 1)),
            },
        };
        flags.push(req);
    }
    flags
}

/// Write the transfer flags into every layer of `network`.
pub fn set_dma_requirements(network: &mut Network) {
    let flags = dma_requirements(network);
    for (layer, req) in network.layers_mut().iter_mut().zip(flags) {
        layer.needs_input_transfer = req.needs_input_transfer;
        layer.needs_output_transfer = req.needs_output_transfer;
        debug!(
            "{}: input transfer {}, output transfer {}",
            layer.name, layer.needs_input_transfer, layer.needs_output_transfer
        );
    }
}

fn must_store_output(layer: &Layer, next: Option<&Layer>) -> bool {
    let Some(next) = next else {
        return true;
    };
    layer.activation.needs_host_postprocessing()
        || matches!(
            layer.layer_type,
            LayerType::Pooling | LayerType::Convolution
        )
        || layer.input_preprocessing == Preprocessing::Flatten
        || matches!(next.layer_type, LayerType::Pooling | LayerType::Softmax)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smiv_models::{Activation, NetworkBuilder, PoolingKind};

    fn flags(net: &Network) -> Vec<(bool, bool)> {
        dma_requirements(net)
            .into_iter()
            .map(|r| (r.needs_input_transfer, r.needs_output_transfer))
            .collect()
    }

    #[test]
    fn chained_inner_products_stay_resident() {
        let net = NetworkBuilder::new("mlp", 1, 16, 1)
            .fc(8, Activation::Relu)
            .fc(8, Activation::Relu)
            .fc(4, Activation::None)
            .build()
            .unwrap();
        assert_eq!(
            flags(&net),
            [(false, true), (true, false), (false, false), (false, true)]
        );
    }

    #[test]
    fn sigmoid_forces_a_store() {
        let net = NetworkBuilder::new("mlp", 1, 16, 1)
            .fc(8, Activation::Sigmoid)
            .fc(4, Activation::None)
            .build()
            .unwrap();
        assert_eq!(flags(&net), [(false, true), (true, true), (true, true)]);
    }

    #[test]
    fn layer_before_softmax_is_stored() {
        let net = NetworkBuilder::new("mlp", 1, 16, 1)
            .fc(8, Activation::Relu)
            .fc(4, Activation::None)
            .softmax()
            .build()
            .unwrap();
        assert_eq!(
            flags(&net),
            [(false, true), (true, false), (false, true), (true, true)]
        );
    }

    #[test]
    fn flattening_layer_stores_its_output() {
        let net = NetworkBuilder::new("cnn", 4, 4, 2)
            .pool(PoolingKind::Max, 2, 2)
            .fc(6, Activation::Relu)
            .fc(3, Activation::None)
            .build()
            .unwrap();
        let f = flags(&net);
        assert_eq!(f[2], (true, true));
        assert_eq!(f[3], (true, true));
    }

    #[test]
    fn set_writes_flags_into_layers() {
        let mut net = NetworkBuilder::new("mlp", 1, 16, 1)
            .fc(8, Activation::Relu)
            .fc(4, Activation::None)
            .build()
            .unwrap();
        set_dma_requirements(&mut net);
        let layers = net.layers();
        assert!(layers[0].needs_output_transfer);
        assert!(layers[1].needs_input_transfer);
        assert!(!layers[1].needs_output_transfer);
        assert!(!layers[2].needs_input_transfer);
        assert!(layers[2].needs_output_transfer);
    }
}
