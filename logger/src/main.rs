use anyhow::Context;
use clap::Parser;
use generator::world::SyntheticWorld;
use log::info;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::{LoggerConfig, Overrides, Profile};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Labeled radar detection logger")]
struct Args {
    /// Driving profile preset; ignored when --config is given
    #[arg(long, value_enum, default_value_t = Profile::Safe)]
    profile: Profile,
    /// Load the full logger config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Label written to every row and used in the output file name
    #[arg(long)]
    label: Option<String>,
    /// Total runtime in seconds
    #[arg(long)]
    runtime: Option<f64>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Seed for blueprint selection and the synthetic radar
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = if let Some(path) = &args.config {
        LoggerConfig::load(path)?
    } else {
        LoggerConfig::from_profile(args.profile)
    };
    config.apply(Overrides {
        label: args.label,
        runtime: args.runtime,
        output_dir: args.output_dir,
        seed: args.seed,
        host: args.host,
        port: args.port,
    });

    info!(
        "=== Starting radar logger ({}, {}s) ===",
        config.session.label, config.session.total_runtime_seconds
    );

    let runner = Runner::new(config.clone());
    let synthetic = config.synthetic.clone();
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for the session loop")?;
    let summary = runtime.block_on(
        runner.execute(|options| SyntheticWorld::connect_with(options, synthetic)),
    )?;

    println!(
        "Session {} -> {} detections, {} vehicles spawned, stopped: {}",
        summary.label, summary.detections, summary.spawned, summary.stop_reason
    );
    Ok(())
}
