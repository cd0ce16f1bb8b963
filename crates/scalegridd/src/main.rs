use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use scalegrid_core::ScalegridConfig;
use scalegridd::{RunOptions, controller_settings, process_env, resolve_env_refs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scalegridd", about = "scalegrid scaling decision daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller and the API server.
    Run {
        /// Path to scalegrid.toml.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/scalegrid")]
        data_dir: PathBuf,

        /// Log output format.
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },
    /// Validate a config file and build every trigger it declares.
    Check {
        /// Path to scalegrid.toml.
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scalegridd=debug,scalegrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
            log_format,
        } => {
            init_tracing(log_format);
            scalegridd::run(RunOptions {
                config,
                port,
                data_dir,
            })
            .await
        }
        Command::Check { config } => {
            init_tracing(LogFormat::Text);
            check(&config)
        }
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = ScalegridConfig::from_file(path)?;
    controller_settings(&config)?;
    config.controller.sync_interval()?;

    let registry = scalegrid_triggers::builtin_registry();
    let mut failures = 0;
    for mut spec in config.workload_specs()? {
        resolve_env_refs(&mut spec, process_env);
        let set = registry.build_all(&spec);
        for trigger in &set.triggers {
            println!(
                "{}  {}  {}  target={}",
                spec.id(),
                trigger.config.label(),
                trigger.metric_spec().name,
                trigger.metric_spec().target.amount()
            );
        }
        for failure in &set.failures {
            println!("{}  {}  FAILED: {}", spec.id(), failure.label, failure.error);
        }
        failures += set.failures.len();
    }

    if failures > 0 {
        bail!("{failures} trigger(s) failed to build");
    }
    println!("config OK");
    Ok(())
}
