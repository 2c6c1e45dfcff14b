//! Command line front end for the forecasting pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ts_forecast::output::write_csv;
use ts_forecast::{
    resolve, BaselineEngine, CommandEngine, DataLoader, ForecastEngine, ForecastPipeline,
    RunConfig, RunLog, RunResult,
};

#[derive(Parser)]
#[command(name = "ts_forecast")]
#[command(author, version)]
#[command(about = "Forecast multiple time series from a CSV or Parquet table")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineKind {
    /// In-process baseline models
    Baseline,
    /// External program speaking the fit/predict file protocol
    Command,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write its outputs
    Run {
        /// Input table (.csv, .parquet)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// JSON run configuration; missing fields take defaults
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Forecasting engine
        #[arg(long, value_enum, default_value = "baseline")]
        engine: EngineKind,

        /// Program invoked by the command engine
        #[arg(long, value_name = "PROGRAM")]
        command: Option<PathBuf>,

        /// Output directory
        #[arg(long, default_value = "./forecast_out", value_name = "DIR")]
        out: PathBuf,
    },
    /// Print the column roles the pipeline would use
    Columns {
        /// Input table (.csv, .parquet)
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// JSON run configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

/// Log filter used when `RUST_LOG` is unset
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over -v
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(cli.verbose).into()),
        )
        .init();

    match cli.command {
        Commands::Run {
            input,
            config,
            engine,
            command,
            out,
        } => {
            let config = load_config(config.as_deref())?;
            let result = match engine {
                EngineKind::Baseline => run_with(config, BaselineEngine::new(), &input)?,
                EngineKind::Command => {
                    let Some(program) = command else {
                        bail!("--command is required with --engine command");
                    };
                    run_with(config, CommandEngine::new(program), &input)?
                }
            };
            write_outputs(result, &out)
        }
        Commands::Columns { input, config } => {
            let config = load_config(config.as_deref())?;
            let table = DataLoader::from_path(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let mut log = RunLog::new();
            let columns = resolve(&table, &config.column_priors(), &mut log)?;
            println!("target:    {}", columns.target);
            println!("id:        {}", columns.id);
            println!("timestamp: {}", columns.timestamp);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn run_with<E: ForecastEngine>(config: RunConfig, engine: E, input: &Path) -> Result<RunResult> {
    let table = DataLoader::from_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut pipeline = ForecastPipeline::new(config, engine);
    Ok(pipeline.run(&table))
}

fn write_outputs(result: RunResult, out: &Path) -> Result<()> {
    fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
    fs::write(out.join("run.log"), &result.log)?;

    let tables = [
        ("predictions.csv", result.predictions),
        ("leaderboard.csv", result.leaderboard),
        ("model_info.csv", result.model_info),
    ];
    for (name, table) in tables {
        if let Some(mut df) = table {
            write_csv(&mut df, &out.join(name))?;
            println!("Wrote {}", out.join(name).display());
        }
    }

    for warning in &result.warnings {
        eprintln!("warning: {}", warning);
    }
    if let Some(error) = result.error {
        bail!(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_filter() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "trace");
        assert!(tracing_subscriber::EnvFilter::try_new(default_directive(1)).is_ok());
    }

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::parse_from(["ts_forecast", "-vv", "run", "--input", "sales.csv"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Run { .. }));
    }
}
