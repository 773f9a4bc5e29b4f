//! himena-relion - External job runner
//!
//! RELION starts an external job as `himena-relion <import_path> --o <dir> ...`.
//! This binary looks the job up in the registry, runs it and leaves the exit
//! marker RELION polls for.

use clap::Parser;
use himena_relion::{config::AppConfig, external, registry};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,himena_relion=debug";

#[derive(Debug, Parser)]
#[command(name = "himena-relion", version, about = "Run himena-relion external jobs")]
struct Cli {
    /// List the registered external jobs
    #[arg(long)]
    list: bool,

    /// Print the declaration of a job as JSON
    #[arg(long, value_name = "IMPORT_PATH")]
    describe: Option<String>,

    /// Import path of the job to run
    import_path: Option<String>,

    /// Job parameters, `--o <dir>` first
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

/// Filter used when `RUST_LOG` is unset
fn default_filter(config: &himena_relion::Result<AppConfig>) -> &str {
    config
        .as_ref()
        .ok()
        .and_then(|c| c.log_filter.as_deref())
        .unwrap_or(DEFAULT_LOG_FILTER)
}

fn main() -> ExitCode {
    let config = AppConfig::load();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(&config))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = &config {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("himena-relion: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let registry = registry::read();

    if cli.list {
        for job in registry.external_jobs() {
            println!("{}\t{}", job.import_path(), job.job_title());
        }
        return Ok(());
    }

    if let Some(import_path) = cli.describe {
        let job = registry
            .pick_job_class(&import_path)
            .ok_or(himena_relion::RelionError::UnknownExternalJob(import_path))?;
        println!("{}", serde_json::to_string_pretty(&external::describe(job.as_ref()))?);
        return Ok(());
    }

    let Some(import_path) = cli.import_path else {
        anyhow::bail!("no job given; use --list to see the available jobs");
    };
    tracing::debug!("Invoked as {} {}", import_path, cli.args.join(" "));
    external::cli::run_registered(&registry, &import_path, &cli.args)
}
