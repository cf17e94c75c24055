use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pincode_anomaly::config::{Config, ConfigOverrides};
use pincode_anomaly::output::csv::{
    cleaning_summary_to_csv, events_to_csv, imbalance_to_csv, misuse_to_csv, summary_to_csv,
};
use pincode_anomaly::output::files::{write_run_outputs, write_sync_outputs};
use pincode_anomaly::output::json::render_json;
use pincode_anomaly::output::table::{
    render_cleaning_table, render_imbalance_table, render_misuse_table, render_spikes_table,
    render_warnings_table,
};
use pincode_anomaly::pipeline::{self, PipelineRun, SyncRun};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "pincode-anomaly",
    about = "Pincode/date reconciliation and anomaly detection across enrolment and update datasets"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(long = "data-dir")]
    data_dir: Option<String>,
    #[arg(long = "out")]
    output_dir: Option<String>,
    #[arg(long = "high-percentile")]
    high_percentile: Option<f64>,
    #[arg(long = "low-percentile")]
    low_percentile: Option<f64>,
    #[arg(long = "spike-threshold")]
    spike_threshold: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Full pipeline; writes every table to the output directory.
    Run,
    /// Load and synchronize only; writes the cleaned tables.
    Sync,
    Misuse {
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    Imbalance {
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    Spikes,
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        data_dir: cli.data_dir.clone(),
        output_dir: cli.output_dir.clone(),
        high_percentile: cli.high_percentile,
        low_percentile: cli.low_percentile,
        spike_z_score: cli.spike_threshold,
    });

    if let Commands::Config { init, show } = &cli.command {
        return handle_config_command(*init, *show, &config, &config_path);
    }
    config.validate()?;
    let pipeline_config = config.to_pipeline_config();
    let output_dir = config.output_dir();

    match &cli.command {
        Commands::Run => {
            let run = pipeline::run(&pipeline_config).await?;
            let written = write_run_outputs(&run, &output_dir)?;
            info!("{} file(s) written to {}", written.len(), output_dir.display());
            print_run(&run, cli.output)?;
        }
        Commands::Sync => {
            let cleaned = pipeline::run_sync(&pipeline_config).await?;
            let written = write_sync_outputs(&cleaned, &output_dir)?;
            info!("{} file(s) written to {}", written.len(), output_dir.display());
            print_sync(&cleaned, cli.output)?;
        }
        Commands::Misuse { top } => {
            let run = pipeline::run(&pipeline_config).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_misuse_table(&run.misuse, *top)),
                OutputFormat::Json => println!("{}", render_json(&run.misuse)?),
                OutputFormat::Csv => println!("{}", misuse_to_csv(&run.misuse.flagged)?),
            }
        }
        Commands::Imbalance { top } => {
            let run = pipeline::run(&pipeline_config).await?;
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_imbalance_table(&run.imbalance, *top))
                }
                OutputFormat::Json => println!("{}", render_json(&run.imbalance)?),
                OutputFormat::Csv => println!("{}", imbalance_to_csv(&run.imbalance.flagged)?),
            }
        }
        Commands::Spikes => {
            let run = pipeline::run(&pipeline_config).await?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_spikes_table(&run.spikes)),
                OutputFormat::Json => println!("{}", render_json(&run.spikes)?),
                OutputFormat::Csv => println!("{}", events_to_csv(&run.spikes.events)?),
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_run(run: &PipelineRun, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_cleaning_table(&run.cleaned.sync));
            if !run.warnings.is_empty() {
                println!("{}", render_warnings_table(&run.warnings));
            }
            println!("{}", run.summary);
        }
        OutputFormat::Json => println!("{}", render_json(&run.report())?),
        OutputFormat::Csv => println!("{}", summary_to_csv(&run.summary)?),
    }
    Ok(())
}

fn print_sync(cleaned: &SyncRun, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_cleaning_table(&cleaned.sync));
            let warnings = cleaned.warnings();
            if !warnings.is_empty() {
                println!("{}", render_warnings_table(&warnings));
            }
        }
        OutputFormat::Json => println!("{}", render_json(&cleaned.sync)?),
        OutputFormat::Csv => println!("{}", cleaning_summary_to_csv(&cleaned.sync.per_source)?),
    }
    Ok(())
}
