// SPDX-License-Identifier: AGPL-3.0-only

//! Weight and input data
//!
//! Host-side tensors are flat `f32` arrays in the padded layouts described
//! by each layer's [`Dims`](crate::Dims). Padding positions are always zero.
//! Blobs on disk are little-endian `f32` with no header.

use crate::error::{ModelError, Result};
use crate::network::{LayerType, Network};
use crate::shapes::Dims;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smiv_chip::params::ELEMENT_BYTES;

/// Generate the flat weight array for every layer of `network`.
///
/// Convolution weights are laid out `[kernel][channel][row][col + pad]`,
/// inner-product weights `[input + 1][output + pad]` with the bias row last.
/// Values are uniform in `±1/sqrt(fan_in)`.
pub fn init_weights(network: &Network, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut weights = Vec::with_capacity(network.total_weights());

    for layer in network.layers() {
        match layer.layer_type {
            LayerType::Convolution => {
                let fan_in = layer.weights.unpadded_elements().max(1);
                let scale = 1.0 / (fan_in as f32).sqrt();
                for _ in 0..layer.outputs.height {
                    fill_padded(&mut weights, layer.weights, &mut rng, -scale, scale);
                }
            }
            LayerType::InnerProduct => {
                let fan_in = layer.inputs.cols.max(1);
                let scale = 1.0 / (fan_in as f32).sqrt();
                fill_padded(&mut weights, layer.weights, &mut rng, -scale, scale);
            }
            LayerType::Input | LayerType::Pooling | LayerType::Softmax => {}
        }
    }

    tracing::debug!(
        "Initialised {} weights for `{}` (seed {seed})",
        weights.len(),
        network.name()
    );
    weights
}

/// Generate `num_images` input images for `network`, uniform in `[0, 1)`.
pub fn init_inputs(network: &Network, num_images: usize, seed: u64) -> Vec<f32> {
    let dims = network.layers()[0].inputs;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut inputs = Vec::with_capacity(num_images * dims.elements());
    for _ in 0..num_images {
        fill_padded(&mut inputs, dims, &mut rng, 0.0, 1.0);
    }
    inputs
}

fn fill_padded(out: &mut Vec<f32>, dims: Dims, rng: &mut StdRng, lo: f32, hi: f32) {
    for _ in 0..dims.height * dims.rows {
        for _ in 0..dims.cols {
            out.push(rng.random_range(lo..hi));
        }
        out.extend(std::iter::repeat(0.0).take(dims.align_pad));
    }
}

/// Decode a little-endian `f32` blob.
///
/// # Errors
///
/// Returns error if the blob length is not a multiple of 4.
pub fn decode_f32_le(data: impl Into<Bytes>) -> Result<Vec<f32>> {
    let mut data = data.into();
    if data.len() % ELEMENT_BYTES != 0 {
        return Err(ModelError::invalid_blob(format!(
            "{} bytes is not a whole number of f32 values",
            data.len()
        )));
    }
    let mut values = Vec::with_capacity(data.len() / ELEMENT_BYTES);
    while data.has_remaining() {
        values.push(data.get_f32_le());
    }
    Ok(values)
}

/// Encode values as a little-endian `f32` blob.
#[must_use]
pub fn encode_f32_le(values: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(values.len() * ELEMENT_BYTES);
    for &v in values {
        buf.put_f32_le(v);
    }
    buf.freeze()
}

/// Load a weight blob and check it matches `network`.
///
/// # Errors
///
/// Returns error if the file cannot be read or has the wrong length.
pub fn load_weights<P: AsRef<std::path::Path>>(path: P, network: &Network) -> Result<Vec<f32>> {
    let weights = decode_f32_le(std::fs::read(path)?)?;
    if weights.len() != network.total_weights() {
        return Err(ModelError::invalid_blob(format!(
            "weight blob has {} values, `{}` needs {}",
            weights.len(),
            network.name(),
            network.total_weights()
        )));
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Activation, NetworkBuilder};

    fn net() -> Network {
        NetworkBuilder::new("t", 6, 6, 2)
            .conv(3, 3, 1, 0, Activation::Relu)
            .fc(5, Activation::None)
            .build()
            .unwrap()
    }

    #[test]
    fn weights_cover_every_layer() {
        let n = net();
        assert_eq!(init_weights(&n, 1).len(), n.total_weights());
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let n = net();
        assert_eq!(init_weights(&n, 7), init_weights(&n, 7));
        assert_ne!(init_weights(&n, 7), init_weights(&n, 8));
    }

    #[test]
    fn padding_positions_are_zero() {
        let n = net();
        let inputs = init_inputs(&n, 2, 3);
        let dims = n.layers()[0].inputs;
        assert_eq!(inputs.len(), 2 * dims.elements());
        for row in inputs.chunks(dims.padded_cols()) {
            assert!(row[dims.cols..].iter().all(|&v| v == 0.0));
            assert!(row[..dims.cols].iter().all(|&v| (0.0..1.0).contains(&v)));
        }
    }

    #[test]
    fn blob_decoding() {
        let values = [1.5f32, -2.0, 0.25];
        let blob = encode_f32_le(&values);
        assert_eq!(blob.len(), 12);
        assert_eq!(decode_f32_le(blob).unwrap(), values);
        assert!(decode_f32_le(vec![0u8; 7]).is_err());
    }
}
