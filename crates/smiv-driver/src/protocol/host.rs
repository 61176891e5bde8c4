// SPDX-License-Identifier: AGPL-3.0-only

//! Host-side layer work
//!
//! Data reshaping the datapath cannot do (zero padding, flattening), and the
//! layer kinds SMIV has no kernel for (pooling, softmax, sigmoid). All of it
//! runs on host buffers between invocations.

use crate::datapath::{activate_rows, max_pooling};
use crate::error::{ConfigurationError, Result, SmivError};
use crate::tensor::{TensorView, TensorViewMut};
use smiv_models::{Dims, Layer, PoolingKind};
use tracing::{debug, warn};

/// Copy `src` into `dst` with a `layer.c_padding` wide zero border.
pub(crate) fn zeropad(layer: &Layer, images: usize, src: &[f32], dst: &mut [f32]) -> Result<()> {
    let from = layer.unpadded_inputs();
    let to = layer.inputs;
    let pad = layer.c_padding;
    debug!("{}: zero padding {from} -> {to}", layer.name);

    let src = TensorView::from_dims(src, images, from)?;
    let mut dst = TensorViewMut::from_dims(dst, images, to)?;
    dst.fill(0.0);
    for n in 0..images {
        for c in 0..from.height {
            for r in 0..from.rows {
                for col in 0..from.cols {
                    dst[[n, c, r + pad, col + pad]] = src[[n, c, r, col]];
                }
            }
        }
    }
    Ok(())
}

/// Flatten `[C][R][W + pad]` images laid out per `prev` into padded rows
/// laid out per `layer.inputs`.
pub(crate) fn flatten(layer: &Layer, prev: Dims, images: usize, src: &[f32], dst: &mut [f32]) -> Result<()> {
    debug!("{}: flattening {prev} -> {}", layer.name, layer.inputs);
    let src = TensorView::from_dims(src, images, prev)?;
    let mut dst = TensorViewMut::from_dims(dst, images, layer.inputs)?;
    dst.fill(0.0);
    for n in 0..images {
        let mut i = 0;
        for c in 0..prev.height {
            for r in 0..prev.rows {
                for col in 0..prev.cols {
                    dst[[n, 0, 0, i]] = src[[n, c, r, col]];
                    i += 1;
                }
            }
        }
    }
    Ok(())
}

/// Pooling fallback. Only max pooling is implemented.
pub(crate) fn pooling(layer: &Layer, images: usize, src: &[f32], dst: &mut [f32]) -> Result<()> {
    match layer.pool {
        Some(PoolingKind::Max) => {
            warn!("{}: no pooling kernel on SMIV, running on the host", layer.name);
            max_pooling(
                src,
                layer.inputs,
                images,
                layer.field_size,
                layer.stride,
                layer.outputs,
                dst,
            )
        }
        kind => Err(ConfigurationError::UnsupportedPooling {
            layer: layer.name.clone(),
            kind,
        }
        .into()),
    }
}

/// Softmax fallback.
pub(crate) fn softmax(layer: &Layer, images: usize, src: &[f32], dst: &mut [f32]) -> Result<()> {
    warn!("{}: no softmax kernel on SMIV, running on the host", layer.name);
    let len = images * layer.outputs.elements();
    let available = src.len().min(dst.len());
    let (Some(src), Some(dst)) = (src.get(..len), dst.get_mut(..len)) else {
        return Err(SmivError::SizeMismatch {
            what: "softmax buffers",
            got: available,
            expected: len,
        });
    };
    dst.copy_from_slice(src);
    crate::datapath::softmax(dst, layer.outputs, images);
    Ok(())
}

/// Apply an activation the datapath cannot fuse to a stored result.
pub(crate) fn postprocess(layer: &Layer, images: usize, data: &mut [f32]) {
    warn!("{}: applying {} on the host", layer.name, layer.activation);
    let dims = layer.outputs;
    let len = (images * dims.elements()).min(data.len());
    activate_rows(&mut data[..len], dims.cols, dims.padded_cols(), layer.activation);
}
