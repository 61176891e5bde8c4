// SPDX-License-Identifier: AGPL-3.0-only

//! Channel-wise work division
//!
//! A layer whose unreduced output (one partial channel per input channel)
//! does not fit a scratchpad is split along the input channel axis. Each
//! iteration produces a partial sum that is reduced separately and recombined
//! in a final reduction round. Rows and columns are never split.

use crate::config::BufferCapacities;
use crate::error::ConfigurationError;
use smiv_chip::mem::BufferId;
use smiv_chip::params::{calc_padding, DATA_ALIGNMENT, ELEMENT_BYTES};
use smiv_models::{Dims, Layer};
use tracing::debug;

/// Ordered channel chunks of one layer.
///
/// Channel counts sum to the layer's input channels, every chunk but the last
/// has the same height, and all share the layer's rows and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationPlan {
    iterations: Vec<Dims>,
}

impl IterationPlan {
    /// The chunks in execution order.
    pub fn iterations(&self) -> &[Dims] {
        &self.iterations
    }

    /// Number of iterations.
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    /// Whether the plan has no iterations. A plan built by [`divide_work`]
    /// has at least one.
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Whether the whole layer runs in one pass.
    pub fn is_single(&self) -> bool {
        self.iterations.len() == 1
    }

    /// Channel counts of each iteration.
    pub fn heights(&self) -> Vec<usize> {
        self.iterations.iter().map(|d| d.height).collect()
    }

    /// `(first channel, chunk)` for each iteration.
    pub fn with_offsets(&self) -> impl Iterator<Item = (usize, Dims)> + '_ {
        self.iterations.iter().scan(0, |offset, dims| {
            let first = *offset;
            *offset += dims.height;
            Some((first, *dims))
        })
    }
}

/// Bytes of one unreduced output channel of `layer`.
pub fn unreduced_channel_bytes(layer: &Layer) -> usize {
    layer.outputs.channel_elements() * ELEMENT_BYTES
}

/// Split `layer` into channel chunks that fit the accelerator buffers.
///
/// # Errors
///
/// - [`ConfigurationError::InputExceedsUmem`] if one image's input does not
///   fit UMEM.
/// - [`ConfigurationError::SpatialTilingRequired`] if fewer than two
///   unreduced channels fit a scratchpad.
pub fn divide_work(
    layer: &Layer,
    capacities: &BufferCapacities,
) -> Result<IterationPlan, ConfigurationError> {
    let umem = capacities.bytes(BufferId::Umem);
    let spad = capacities.bytes(BufferId::Spad0);
    let inputs = layer.inputs;

    if inputs.bytes() > umem {
        return Err(ConfigurationError::InputExceedsUmem {
            layer: layer.name.clone(),
            bytes: inputs.bytes(),
            capacity: umem,
        });
    }

    let chunk = |height| Dims {
        rows: inputs.rows,
        cols: inputs.cols,
        height,
        align_pad: calc_padding(inputs.cols, DATA_ALIGNMENT),
    };

    let channel_bytes = unreduced_channel_bytes(layer);
    let iterations = if channel_bytes * inputs.height <= spad {
        vec![chunk(inputs.height)]
    } else {
        let max_channels = spad / channel_bytes;
        if max_channels < 2 {
            return Err(ConfigurationError::SpatialTilingRequired {
                layer: layer.name.clone(),
                channel_bytes,
                capacity: spad,
            });
        }
        let count = inputs.height.div_ceil(max_channels);
        (0..count)
            .map(|i| chunk(max_channels.min(inputs.height - i * max_channels)))
            .collect()
    };

    let plan = IterationPlan { iterations };
    debug!("{}: {} iteration(s) {:?}", layer.name, plan.len(), plan.heights());
    Ok(plan)
}

/// Final reduction rounds `plan` needs for `layer`: zero for a single
/// iteration, otherwise the number of scratchpad loads it takes to hold one
/// reduced channel per iteration.
pub fn final_reduction_rounds(
    layer: &Layer,
    plan: &IterationPlan,
    capacities: &BufferCapacities,
) -> usize {
    if plan.len() <= 1 {
        return 0;
    }
    let slot_bytes = unreduced_channel_bytes(layer);
    (plan.len() * slot_bytes).div_ceil(capacities.bytes(BufferId::Spad1))
}

/// Reject plans that would need more than one final reduction round.
///
/// # Errors
///
/// Returns [`ConfigurationError::MultiRoundReduction`].
pub fn check_final_reduction(
    layer: &Layer,
    plan: &IterationPlan,
    capacities: &BufferCapacities,
) -> Result<(), ConfigurationError> {
    let rounds = final_reduction_rounds(layer, plan, capacities);
    if rounds > 1 {
        return Err(ConfigurationError::MultiRoundReduction {
            layer: layer.name.clone(),
            iterations: plan.len(),
            rounds,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smiv_models::{Activation, NetworkBuilder};

    fn conv_layer(rows: usize, cols: usize, channels: usize, padding: usize) -> Layer {
        NetworkBuilder::new("t", rows, cols, channels)
            .conv(2, 3, 1, padding, Activation::None)
            .build()
            .unwrap()
            .layers()[1]
            .clone()
    }

    fn caps(spad_bytes: usize) -> BufferCapacities {
        BufferCapacities {
            spad_bytes,
            ..BufferCapacities::default()
        }
    }

    #[test]
    fn small_layer_runs_in_one_pass() {
        let layer = conv_layer(8, 8, 4, 1);
        let plan = divide_work(&layer, &BufferCapacities::default()).unwrap();
        assert!(plan.is_single());
        assert!(!plan.is_empty());
        assert_eq!(plan.iterations()[0].height, 4);
        assert_eq!(plan.iterations()[0].rows, 10);
        assert_eq!(plan.iterations()[0].align_pad, 6);
        assert_eq!(final_reduction_rounds(&layer, &plan, &BufferCapacities::default()), 0);
    }

    #[test]
    fn eight_by_eight_by_four_splits_in_two() {
        // 8x8 output channel is 256 bytes, 4 channels need 1024.
        let layer = conv_layer(8, 8, 4, 1);
        let plan = divide_work(&layer, &caps(512)).unwrap();
        assert_eq!(plan.heights(), [2, 2]);
        let offsets: Vec<_> = plan.with_offsets().map(|(o, _)| o).collect();
        assert_eq!(offsets, [0, 2]);
        assert_eq!(final_reduction_rounds(&layer, &plan, &caps(512)), 1);
    }

    #[test]
    fn last_chunk_takes_the_remainder() {
        let layer = conv_layer(8, 8, 7, 1);
        // floor(768 / 256) = 3 channels per pass
        let plan = divide_work(&layer, &caps(768)).unwrap();
        assert_eq!(plan.heights(), [3, 3, 1]);
        assert_eq!(plan.heights().iter().sum::<usize>(), 7);
    }

    #[test]
    fn iteration_count_is_ceil_of_channels_over_fit() {
        for channels in 3..=12 {
            let layer = conv_layer(8, 8, channels, 1);
            let plan = divide_work(&layer, &caps(512)).unwrap();
            assert_eq!(plan.len(), channels.div_ceil(2));
            assert!(plan.iterations().iter().all(|d| d.height <= 2));
        }
    }

    #[test]
    fn oversized_input_is_rejected() {
        let layer = conv_layer(8, 8, 4, 1);
        let tiny = BufferCapacities {
            umem_bytes: 1024,
            spad_bytes: 4096,
        };
        let err = divide_work(&layer, &tiny).unwrap_err();
        assert!(matches!(err, ConfigurationError::InputExceedsUmem { bytes: 2560, .. }));
    }

    #[test]
    fn single_channel_fit_needs_spatial_tiling() {
        let layer = conv_layer(8, 8, 4, 1);
        let err = divide_work(&layer, &caps(500)).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::SpatialTilingRequired {
                channel_bytes: 256,
                capacity: 500,
                ..
            }
        ));
    }

    #[test]
    fn too_many_slots_need_several_rounds() {
        let layer = conv_layer(8, 8, 6, 1);
        let plan = divide_work(&layer, &caps(512)).unwrap();
        assert_eq!(plan.len(), 3);
        let err = check_final_reduction(&layer, &plan, &caps(512)).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MultiRoundReduction {
                iterations: 3,
                rounds: 2,
                ..
            }
        ));
    }
}
