use anyhow::Context;
use clap::Parser;
use generator::profile::{generate_recording, GeneratorConfig};
use log::info;
use std::path::PathBuf;
use std::time::Duration;
use workflow::config::WorkflowConfig;
use workflow::io::{load_recording, OutputLayout};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Temporal filtering of MEG/EEG recordings")]
struct Args {
    /// Pipeline configuration (JSON, or YAML by extension)
    #[arg(long)]
    config: PathBuf,
    /// Recording to filter; overrides the `fif` key of the configuration
    #[arg(long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,
    /// Filter a generated recording instead of reading one
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// YAML generator profile used with --synthetic
    #[arg(long, requires = "synthetic")]
    profile: Option<PathBuf>,
    /// Directory receiving the filtered recording, report and product log
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Abort the run when it takes longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let workflow_config = WorkflowConfig::load(&args.config)?;
    let recording = if args.synthetic {
        let profile = match &args.profile {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig {
                epoched: workflow_config.raw.epoched_data.unwrap_or(false),
                ..Default::default()
            },
        };
        generate_recording(&profile)?
    } else {
        let path = args
            .input
            .clone()
            .or_else(|| workflow_config.input_path())
            .context("no recording given: pass --input, set `fif` in the config, or use --synthetic")?;
        info!("loading recording {}", path.display());
        load_recording(&path)?
    };

    let runner = Runner::new(workflow_config).with_timeout(args.timeout_secs.map(Duration::from_secs));
    let result = runner.execute(recording)?;
    OutputLayout::new(&args.out_dir).write(&result)?;

    let summary = &result.report.summary;
    println!(
        "{} {} {} -> {} stage reports, {} warnings",
        summary.filter,
        summary.notch,
        summary.resample,
        result.stage_reports().len(),
        result.report.warnings.len()
    );
    Ok(())
}
