//! DMA requirement analysis over whole networks

use smiv_driver::{dma_requirements, set_dma_requirements};
use smiv_models::{parser, Dims, Layer, LayerType, Network, PoolingKind, Preprocessing, ZooNetwork};

fn assert_chained(net: &Network) {
    let layers = net.layers();
    assert!(!layers[0].needs_input_transfer, "{}: layer 0 loads input", net.name());
    assert!(layers[0].needs_output_transfer, "{}: layer 0 keeps output", net.name());
    for i in 1..layers.len() {
        assert_eq!(
            layers[i].needs_input_transfer,
            layers[i - 1].needs_output_transfer,
            "{}: transfer flags broken at layer {i}",
            net.name()
        );
    }
    assert!(layers[layers.len() - 1].needs_output_transfer, "{}: last layer not stored", net.name());
}

#[test]
fn test_depth_three_conv_pool_fc() {
    let mut conv = Layer::new("conv", LayerType::Convolution);
    conv.inputs = Dims::aligned(8, 8, 1);
    conv.outputs = Dims::aligned(8, 8, 4);
    let mut pool = Layer::new("pool", LayerType::Pooling);
    pool.pool = Some(PoolingKind::Max);
    let mut fc = Layer::new("fc", LayerType::InnerProduct);
    fc.input_preprocessing = Preprocessing::Flatten;
    let mut net = Network::new("depth3", vec![conv, pool, fc]).expect("network");

    set_dma_requirements(&mut net);
    let out: Vec<_> = net.layers().iter().map(|l| l.needs_output_transfer).collect();
    let inp: Vec<_> = net.layers().iter().map(|l| l.needs_input_transfer).collect();
    assert_eq!(out, [true, true, true]);
    assert_eq!(inp, [false, true, true]);
}

#[test]
fn test_flags_chain_across_zoo_networks() {
    for zoo in ZooNetwork::ALL {
        let mut net = zoo.build().expect("zoo network");
        set_dma_requirements(&mut net);
        assert_chained(&net);
    }
}

#[test]
fn test_flags_chain_across_parsed_networks() {
    let text = "
        input 1 32 1
        fc 16 act=sigmoid
        fc 16 act=relu
        fc 16 act=tanh
        fc 8
        softmax
    ";
    let mut net = parser::parse_str(text, "parsed").expect("parse");
    set_dma_requirements(&mut net);
    assert_chained(&net);
    // sigmoid is finished on the host, tanh stays on the accelerator
    assert!(net.layers()[1].needs_output_transfer);
    assert!(!net.layers()[3].needs_output_transfer);
}

#[test]
fn test_analysis_is_repeatable() {
    let mut net = ZooNetwork::LeNet.build().expect("zoo network");
    let before = dma_requirements(&net);
    set_dma_requirements(&mut net);
    set_dma_requirements(&mut net);
    assert_eq!(dma_requirements(&net), before);
    for (layer, req) in net.layers().iter().zip(&before) {
        assert_eq!(layer.needs_input_transfer, req.needs_input_transfer);
        assert_eq!(layer.needs_output_transfer, req.needs_output_transfer);
    }
}
