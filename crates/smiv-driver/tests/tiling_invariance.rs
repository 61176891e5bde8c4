//! Channel tiling must not change convolution results
//!
//! The reference scenario: an 8×8×4 input, two 3×3 kernels with a one-pixel
//! zero border, 8×8 outputs. Each unreduced output channel is 256 bytes, so a
//! 512-byte scratchpad holds two of the four and the layer runs as `[2, 2]`.

use smiv_chip::accel::Datapath;
use smiv_chip::mem::BufferId;
use smiv_driver::{
    divide_work, run_forward_pass, BufferCapacities, ConfigurationError, HarnessEvent, RunConfig,
    SmivError, SoftwareHarness,
};
use smiv_models::{weights, Activation, Network, NetworkBuilder, ZooNetwork};

const SEED: u64 = 0x5EED;

fn tiled_config(images: usize) -> RunConfig {
    RunConfig::default()
        .with_spad_bytes(512)
        .with_test_cases(images)
}

/// Direct 3×3, stride 1, padding 1 convolution over the unpadded 8×8×4 input.
fn reference_conv(input: &[f32], weights: &[f32], images: usize) -> Vec<f32> {
    let (rows, cols, channels, kernels) = (8usize, 8usize, 4usize, 2usize);
    let kernel_stride = channels * 3 * 8;
    let mut out = vec![0.0f32; images * kernels * rows * cols];
    for n in 0..images {
        for k in 0..kernels {
            for r in 0..rows {
                for c in 0..cols {
                    let mut acc = 0.0f32;
                    for ch in 0..channels {
                        for i in 0..3 {
                            for j in 0..3 {
                                let (y, x) = (r + i, c + j);
                                if y == 0 || x == 0 || y > rows || x > cols {
                                    continue;
                                }
                                let a = input[n * 256 + ch * 64 + (y - 1) * 8 + (x - 1)];
                                let w = weights[k * kernel_stride + ch * 24 + i * 8 + j];
                                acc += a * w;
                            }
                        }
                    }
                    out[n * 128 + k * 64 + r * 8 + c] = acc;
                }
            }
        }
    }
    out
}

fn run(net: &mut Network, config: &RunConfig) -> smiv_driver::Result<smiv_driver::ForwardResult> {
    let inputs = weights::init_inputs(net, config.num_test_cases, SEED);
    let params = weights::init_weights(net, SEED);
    let mut harness = SoftwareHarness::from_config(config);
    run_forward_pass(&mut harness, net, &inputs, &params, config)
}

#[test]
fn test_scenario_plans_two_iterations_of_two() {
    let net = ZooNetwork::TiledConv.build().expect("zoo network");
    let conv = &net.layers()[1];
    let caps = BufferCapacities {
        spad_bytes: 512,
        ..BufferCapacities::default()
    };
    let plan = divide_work(conv, &caps).expect("plan");
    assert_eq!(plan.heights(), [2, 2]);
}

#[test]
fn test_tiled_convolution_matches_direct_reference() {
    let mut net = ZooNetwork::TiledConv.build().expect("zoo network");
    let config = tiled_config(2);
    let inputs = weights::init_inputs(&net, 2, SEED);
    let params = weights::init_weights(&net, SEED);
    let expected = reference_conv(&inputs, &params, 2);

    let mut harness = SoftwareHarness::from_config(&config);
    let result = run_forward_pass(&mut harness, &mut net, &inputs, &params, &config)
        .expect("forward pass");

    assert_eq!(result.output.len(), expected.len());
    for (i, (got, want)) in result.output.iter().zip(&expected).enumerate() {
        let diff = (got - want).abs();
        assert!(diff < 1e-5, "mismatch at {i}: tiled={got}, direct={want}, diff={diff}");
    }
}

#[test]
fn test_tiling_does_not_change_results() {
    let mut single = ZooNetwork::TiledConv.build().expect("zoo network");
    let mut tiled = single.clone();
    let config = RunConfig::default().with_test_cases(2);

    let a = run(&mut single, &config).expect("single pass");
    let b = run(&mut tiled, &tiled_config(2)).expect("tiled pass");

    // 2 images × 2 kernels, one compute and one reduce each
    assert_eq!(a.stats.total_invocations(), 8);
    // plus two iterations and a final reduction each
    assert_eq!(b.stats.total_invocations(), 2 * 2 * 5);
    assert_eq!(b.stats.invocations(Datapath::Convolution), 8);

    for (x, y) in a.output.iter().zip(&b.output) {
        assert!((x - y).abs() < 1e-5, "single={x}, tiled={y}");
    }
}

#[test]
fn test_activation_waits_for_the_final_reduction() {
    let build = || {
        NetworkBuilder::new("relu", 8, 8, 4)
            .conv(2, 3, 1, 1, Activation::Relu)
            .build()
            .expect("network")
    };
    let a = run(&mut build(), &RunConfig::default().with_test_cases(1)).expect("single pass");
    let b = run(&mut build(), &tiled_config(1)).expect("tiled pass");
    assert!(a.output.iter().all(|&x| x >= 0.0));
    for (x, y) in a.output.iter().zip(&b.output) {
        assert!((x - y).abs() < 1e-5, "single={x}, tiled={y}");
    }
}

#[test]
fn test_tiled_event_order() {
    let mut net = ZooNetwork::TiledConv.build().expect("zoo network");
    let config = tiled_config(1).with_trace(true);
    let inputs = weights::init_inputs(&net, 1, SEED);
    let params = weights::init_weights(&net, SEED);
    let mut harness = SoftwareHarness::from_config(&config);
    run_forward_pass(&mut harness, &mut net, &inputs, &params, &config).expect("forward pass");

    let conv = Datapath::Convolution;
    let reduce = Datapath::Reduction;
    let iteration = [
        HarnessEvent::Invoke(conv),
        HarnessEvent::Load {
            name: "host_weights",
            buffer: BufferId::Spad0,
            bytes: 2 * 3 * 8 * 4,
        },
        HarnessEvent::Load {
            name: "host_activations",
            buffer: BufferId::Umem,
            bytes: 2 * 10 * 16 * 4,
        },
        HarnessEvent::Compute {
            datapath: conv,
            output: BufferId::Spad1,
        },
        HarnessEvent::Invoke(reduce),
        HarnessEvent::Compute {
            datapath: reduce,
            output: BufferId::Spad0,
        },
        HarnessEvent::Store {
            name: "host_partials",
            buffer: BufferId::Spad0,
            bytes: 256,
        },
    ];
    let final_round = [
        HarnessEvent::Invoke(reduce),
        HarnessEvent::Load {
            name: "host_partials",
            buffer: BufferId::Spad1,
            bytes: 512,
        },
        HarnessEvent::Compute {
            datapath: reduce,
            output: BufferId::Spad0,
        },
        HarnessEvent::Store {
            name: "host_partials",
            buffer: BufferId::Spad0,
            bytes: 256,
        },
    ];

    let events = harness_events(&harness);
    assert!(matches!(events[0], HarnessEvent::Map { name: "host_weights", .. }));
    assert!(matches!(events[1], HarnessEvent::Map { name: "host_activations", .. }));
    assert!(matches!(events[2], HarnessEvent::Map { name: "host_partials", bytes: 512, .. }));

    let mut per_kernel = Vec::new();
    per_kernel.extend_from_slice(&iteration);
    per_kernel.extend_from_slice(&iteration);
    per_kernel.extend_from_slice(&final_round);
    let rest = &events[3..];
    assert_eq!(rest.len(), 2 * per_kernel.len());
    assert_eq!(&rest[..per_kernel.len()], per_kernel.as_slice());
    assert_eq!(&rest[per_kernel.len()..], per_kernel.as_slice());
}

fn harness_events(harness: &SoftwareHarness) -> Vec<HarnessEvent> {
    use smiv_driver::Harness;
    harness.events().to_vec()
}

#[test]
fn test_multi_round_reduction_is_rejected_before_any_invocation() {
    // Six channels in chunks of two need three 256-byte slots: 768 > 512.
    let mut net = NetworkBuilder::new("deep", 8, 8, 6)
        .conv(2, 3, 1, 1, Activation::None)
        .build()
        .expect("network");
    let config = tiled_config(1);
    let inputs = weights::init_inputs(&net, 1, SEED);
    let params = weights::init_weights(&net, SEED);
    let mut harness = SoftwareHarness::new(true);

    let err = run_forward_pass(&mut harness, &mut net, &inputs, &params, &config).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(
        err.as_configuration(),
        Some(ConfigurationError::MultiRoundReduction {
            iterations: 3,
            rounds: 2,
            ..
        })
    ));
    assert!(harness_events(&harness).is_empty());
}

#[test]
fn test_single_channel_fit_requires_spatial_tiling() {
    let mut net = ZooNetwork::TiledConv.build().expect("zoo network");
    let err = run(&mut net, &RunConfig::default().with_spad_bytes(256).with_test_cases(1))
        .unwrap_err();
    assert!(matches!(
        err,
        SmivError::Configuration(ConfigurationError::SpatialTilingRequired { .. })
    ));
}
