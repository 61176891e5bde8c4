// SPDX-License-Identifier: AGPL-3.0-only

//! Built-in networks
//!
//! | Network | Input | Layers | Purpose |
//! |---------|-------|--------|---------|
//! | `minerva` | 28×28×1 | FC 256-256-256-10, softmax | MNIST MLP, inner-product ping-pong |
//! | `lenet` | 28×28×1 | 2× conv+pool, FC 64-10, softmax | small CNN, every layer type |
//! | `tiled-conv` | 8×8×4 | conv 3×3 ×2 | channel tiling demonstrator |

use crate::error::{ModelError, Result};
use crate::network::{Activation, Network, NetworkBuilder, PoolingKind};

/// Networks shipped with the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZooNetwork {
    /// Minerva MNIST multilayer perceptron
    Minerva,
    /// LeNet-style convolutional classifier
    LeNet,
    /// Single convolution that needs channel tiling under small scratchpads
    TiledConv,
}

impl ZooNetwork {
    /// Every zoo network
    pub const ALL: [Self; 3] = [Self::Minerva, Self::LeNet, Self::TiledConv];

    /// Short name used on the command line
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Minerva => "minerva",
            Self::LeNet => "lenet",
            Self::TiledConv => "tiled-conv",
        }
    }

    /// One-line description
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Minerva => "MNIST MLP (784-256-256-256-10)",
            Self::LeNet => "small CNN: conv/pool x2, fc 64, fc 10",
            Self::TiledConv => "8x8x4 input, 3x3 conv, 2 kernels",
        }
    }

    /// Look up a network by name
    ///
    /// # Errors
    ///
    /// Returns error if no zoo network has this name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|n| n.name() == name)
            .ok_or_else(|| ModelError::UnknownNetwork {
                name: name.to_string(),
            })
    }

    /// Build the network descriptor
    ///
    /// # Errors
    ///
    /// Only fails if the built-in geometry is inconsistent.
    pub fn build(&self) -> Result<Network> {
        match self {
            Self::Minerva => NetworkBuilder::new(self.name(), 28, 28, 1)
                .fc(256, Activation::Relu)
                .fc(256, Activation::Relu)
                .fc(256, Activation::Relu)
                .fc(10, Activation::None)
                .softmax()
                .build(),
            Self::LeNet => NetworkBuilder::new(self.name(), 28, 28, 1)
                .conv(8, 3, 1, 1, Activation::Relu)
                .pool(PoolingKind::Max, 2, 2)
                .conv(16, 3, 1, 1, Activation::Relu)
                .pool(PoolingKind::Max, 2, 2)
                .fc(64, Activation::Relu)
                .fc(10, Activation::None)
                .softmax()
                .build(),
            Self::TiledConv => NetworkBuilder::new(self.name(), 8, 8, 4)
                .conv(2, 3, 1, 1, Activation::None)
                .build(),
        }
    }
}

impl std::fmt::Display for ZooNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_zoo_network_builds() {
        for net in ZooNetwork::ALL {
            let built = net.build().unwrap();
            assert_eq!(built.name(), net.name());
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(ZooNetwork::from_name("lenet").unwrap(), ZooNetwork::LeNet);
        assert!(ZooNetwork::from_name("resnet").is_err());
    }

    #[test]
    fn minerva_flattens_the_image() {
        let net = ZooNetwork::Minerva.build().unwrap();
        assert_eq!(net.layers()[1].inputs.cols, 784);
        assert_eq!(net.depth(), 6);
    }
}
