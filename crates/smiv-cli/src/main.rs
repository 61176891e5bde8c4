// SPDX-License-Identifier: AGPL-3.0-only

//! `smiv`: command-line interface for the SMIV accelerator simulator.
//!
//! ```text
//! USAGE:
//!   smiv zoo                     List built-in networks
//!   smiv dma <network>           Show per-layer transfer flags
//!   smiv plan <network>          Show channel tiling per layer
//!   smiv run <network>           Run a forward pass on the software harness
//! ```
//!
//! `<network>` is a zoo name or a path to a network description file.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use smiv_chip::mem::BufferId;
use smiv_driver::tiling::{divide_work, final_reduction_rounds};
use smiv_driver::{dma_requirements, run_forward_pass, Harness, RunConfig, SoftwareHarness};
use smiv_models::{parser, weights, LayerType, Network, ZooNetwork};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smiv", about = "SMIV accelerator simulator", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List the built-in networks.
    Zoo,
    /// Show which layers transfer their input and output.
    Dma {
        /// Zoo name or network description file.
        network: String,
    },
    /// Show how each layer is split to fit the scratchpads.
    Plan {
        /// Zoo name or network description file.
        network: String,
        #[command(flatten)]
        capacities: CapacityArgs,
    },
    /// Run a forward pass.
    Run {
        /// Zoo name or network description file.
        network: String,
        #[command(flatten)]
        capacities: CapacityArgs,
        /// Number of input images (overrides SMIV_NUM_TEST_CASES).
        #[arg(short = 'n', long)]
        images: Option<usize>,
        /// Seed for generated weights and inputs.
        #[arg(long, default_value_t = 1)]
        seed: u64,
        /// Little-endian f32 weight blob (generated if absent).
        #[arg(long)]
        weights: Option<PathBuf>,
        /// Little-endian f32 input blob (generated if absent).
        #[arg(long)]
        inputs: Option<PathBuf>,
        /// Write the raw output as a little-endian f32 blob.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print every harness event.
        #[arg(long)]
        trace: bool,
    },
}

#[derive(Args)]
struct CapacityArgs {
    /// Scratchpad capacity in bytes (overrides SMIV_SPAD_BYTES).
    #[arg(long)]
    spad_bytes: Option<usize>,
    /// UMEM capacity in bytes (overrides SMIV_UMEM_BYTES).
    #[arg(long)]
    umem_bytes: Option<usize>,
}

impl CapacityArgs {
    fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(bytes) = self.spad_bytes {
            config = config.with_spad_bytes(bytes);
        }
        if let Some(bytes) = self.umem_bytes {
            config = config.with_umem_bytes(bytes);
        }
        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Zoo => cmd_zoo(),
        Cmd::Dma { network } => cmd_dma(&network)?,
        Cmd::Plan {
            network,
            capacities,
        } => cmd_plan(&network, &capacities)?,
        Cmd::Run {
            network,
            capacities,
            images,
            seed,
            weights,
            inputs,
            output,
            trace,
        } => {
            let mut config = capacities.apply(RunConfig::from_env()).with_trace(trace);
            if let Some(n) = images {
                config = config.with_test_cases(n);
            }
            cmd_run(&network, &config, seed, weights, inputs, output)?;
        }
    }

    Ok(())
}

fn load_network(source: &str) -> Result<Network> {
    if let Ok(zoo) = ZooNetwork::from_name(source) {
        return Ok(zoo.build()?);
    }
    parser::parse_file(source)
        .with_context(|| format!("`{source}` is neither a zoo network nor a readable description"))
}

fn cmd_zoo() {
    println!("Built-in networks:");
    for zoo in ZooNetwork::ALL {
        println!("  {:<12} {}", zoo.name(), zoo.description());
    }
}

fn cmd_dma(source: &str) -> Result<()> {
    let net = load_network(source)?;
    println!("{} ({} layers)", net.name(), net.depth());
    println!("  {:<4} {:<10} {:<14} {:>3} {:>4}", "#", "name", "type", "in", "out");
    for (i, (layer, req)) in net.layers().iter().zip(dma_requirements(&net)).enumerate() {
        println!(
            "  {:<4} {:<10} {:<14} {:>3} {:>4}",
            i,
            layer.name,
            layer.layer_type.to_string(),
            yes_no(req.needs_input_transfer),
            yes_no(req.needs_output_transfer)
        );
    }
    Ok(())
}

fn cmd_plan(source: &str, capacities: &CapacityArgs) -> Result<()> {
    let net = load_network(source)?;
    let config = capacities.apply(RunConfig::from_env());
    config.validate()?;
    let caps = config.capacities;
    let sizes: Vec<String> = BufferId::ALL
        .iter()
        .map(|&id| format!("{id} {} B", caps.bytes(id)))
        .collect();
    println!("{}: {}", net.name(), sizes.join(", "));
    for layer in net.layers() {
        if layer.layer_type != LayerType::Convolution {
            continue;
        }
        match divide_work(layer, &caps) {
            Ok(plan) => {
                let rounds = final_reduction_rounds(layer, &plan, &caps);
                let note = if rounds > 1 { "  (unsupported: multi-round reduction)" } else { "" };
                println!(
                    "  {:<10} {} -> {}  iterations {:?}, final rounds {rounds}{note}",
                    layer.name,
                    layer.inputs,
                    layer.outputs,
                    plan.heights()
                );
            }
            Err(e) => println!("  {:<10} {e}", layer.name),
        }
    }
    Ok(())
}

fn cmd_run(
    source: &str,
    config: &RunConfig,
    seed: u64,
    weights_path: Option<PathBuf>,
    inputs_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let mut net = load_network(source)?;
    let images = config.num_test_cases;

    let params = match weights_path {
        Some(path) => weights::load_weights(&path, &net)
            .with_context(|| format!("loading weights from {}", path.display()))?,
        None => weights::init_weights(&net, seed),
    };
    let inputs = match inputs_path {
        Some(path) => {
            let data = std::fs::read(&path)
                .with_context(|| format!("reading inputs from {}", path.display()))?;
            weights::decode_f32_le(data)?
        }
        None => weights::init_inputs(&net, images, seed),
    };
    info!("Running `{}` on {images} image(s)", net.name());

    let mut harness = SoftwareHarness::from_config(config);
    let result = run_forward_pass(&mut harness, &mut net, &inputs, &params, config)?;

    if config.record_trace {
        for event in harness.events() {
            println!("{event:?}");
        }
    }
    println!("{} in {:.2?}", net.name(), result.elapsed);
    println!("  {}", result.stats);
    println!(
        "  output {} per image, result in temp buffer: {}",
        result.output_dims, result.result_in_temp
    );
    for image in 0..images {
        match result.argmax(image) {
            Some(class) => println!("  image {image}: argmax {class}"),
            None => println!("  image {image}: empty output"),
        }
    }

    if let Some(path) = output_path {
        let blob: Bytes = weights::encode_f32_le(&result.output);
        std::fs::write(&path, &blob)
            .with_context(|| format!("writing output to {}", path.display()))?;
        println!("  wrote {} bytes to {}", blob.len(), path.display());
    }
    Ok(())
}

const fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
