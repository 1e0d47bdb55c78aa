use clap::Parser;
use picmatch::{
    parse_dataset, Accelerator, AcceleratorMode, DistributeConfig, MatchConfig, MatchResult, WorkDistributor,
};
use serde::Deserialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Find template objects in pictures")]
struct Cli {
    /// Input dataset (threshold, pictures, objects).
    #[arg(value_name = "INPUT", required_unless_present = "print_example")]
    input: Option<PathBuf>,
    /// File receiving one result line per picture.
    #[arg(value_name = "OUTPUT", required_unless_present = "print_example")]
    output: Option<PathBuf>,
    /// Optional JSON file with run settings.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of workers (overrides the config file).
    #[arg(short, long)]
    workers: Option<usize>,
    /// Row-search threads per worker, 0 splits the cores (overrides the config file).
    #[arg(short, long)]
    threads: Option<usize>,
    /// Never offload to an accelerator.
    #[arg(long)]
    no_accelerator: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum AcceleratorConfig {
    Auto,
    Disabled,
}

impl From<AcceleratorConfig> for AcceleratorMode {
    fn from(value: AcceleratorConfig) -> Self {
        match value {
            AcceleratorConfig::Auto => AcceleratorMode::Auto,
            AcceleratorConfig::Disabled => AcceleratorMode::Disabled,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    workers: usize,
    threads: usize,
    accelerator: AcceleratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = DistributeConfig::default();
        Self {
            workers: cfg.workers,
            threads: cfg.matcher.threads,
            accelerator: AcceleratorConfig::Auto,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.trace { "picmatch=info" } else { "picmatch=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config: Config = match &cli.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    let accelerator = if cli.no_accelerator {
        AcceleratorMode::Disabled
    } else {
        config.accelerator.into()
    };
    let workers = cli.workers.unwrap_or(config.workers);
    if workers == 0 {
        return Err("workers must be at least 1".into());
    }
    let cfg = DistributeConfig {
        workers,
        matcher: MatchConfig {
            accelerator,
            threads: cli.threads.unwrap_or(config.threads),
        },
    };

    let (Some(input), Some(output)) = (cli.input, cli.output) else {
        return Err("INPUT and OUTPUT are required".into());
    };

    // Probe once up front so every worker sees the cached answer.
    if accelerator == AcceleratorMode::Auto {
        let device = picmatch::probe().map(|acc| acc.name().to_string());
        tracing::info!(device = device.as_deref().unwrap_or("none"), "accelerator probe");
    }

    let text = fs::read_to_string(&input)?;
    let dataset = parse_dataset(&text)?;
    tracing::info!(
        pictures = dataset.pictures().len(),
        objects = dataset.objects().len(),
        "finished reading {}",
        input.display()
    );

    let results = WorkDistributor::new(cfg).run(&dataset)?;

    tracing::info!("writing results to {}", output.display());
    write_results(&output, &results)?;
    Ok(())
}

fn write_results(path: &Path, results: &[MatchResult]) -> std::io::Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for result in results {
        writeln!(out, "{result}")?;
    }
    out.flush()
}
