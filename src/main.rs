//! cronctl command line tool
//!
//! Thin front end over the library: parse arguments, load configuration,
//! run one operation and map the outcome to stdout/stderr and an exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cronctl::config::AppConfig;
use cronctl::core::logging::init_logging_with_config;
use cronctl::infrastructure::connector_from_config;
use cronctl::{
    AppError, ExecutionLogRetriever, OperationContext, ResourceRef, ScheduledJobManager,
    ScheduledJobSpec,
};

/// Manage Kubernetes CronJobs
#[derive(Parser)]
#[command(name = "cronctl")]
#[command(about = "Create, update, delete and inspect Kubernetes CronJobs")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "CRONCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Namespace of the scheduled job
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Kubeconfig file to read credentials from
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Per-call timeout in seconds (0 disables it)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a scheduled job
    Create {
        name: String,
        /// Container image run on every trigger
        #[arg(short, long)]
        image: String,
        /// Cron recurrence expression, e.g. "*/5 * * * *"
        #[arg(short, long)]
        schedule: String,
    },

    /// Replace the image and schedule of an existing scheduled job
    Update {
        name: String,
        #[arg(short, long)]
        image: String,
        #[arg(short, long)]
        schedule: String,
    },

    /// Delete a scheduled job
    Delete {
        name: String,
        /// Succeed when the job does not exist
        #[arg(long)]
        ignore_missing: bool,
    },

    /// Print the output of the scheduled job's latest execution
    Logs { name: String },

    /// Show the stored state of a scheduled job
    Describe {
        name: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Yaml)]
        output: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling operation");
            ctrl_c.cancel();
        }
    });

    let ctx = OperationContext::new()
        .with_timeout(config.request_timeout())
        .with_cancellation(cancellation);

    match run(cli.command, &config, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(kubeconfig) = &cli.kubeconfig {
        config.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(context) = &cli.context {
        config.context = Some(context.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.request_timeout_seconds = timeout;
    }
    if cli.verbose {
        config.logging.level = Some("debug".to_string());
    }

    config.validate().context("validating configuration")?;
    Ok(config)
}

async fn run(command: Commands, config: &AppConfig, ctx: &OperationContext) -> Result<(), AppError> {
    let connector = connector_from_config(config)?;
    let namespace = config.namespace.clone();
    debug!(%namespace, "Running command");

    match command {
        Commands::Create {
            name,
            image,
            schedule,
        } => {
            let spec = ScheduledJobSpec::new(namespace, name, image, schedule);
            ScheduledJobManager::new(connector).create(ctx, &spec).await?;
            println!("CronJob {} created successfully", spec.name);
        }
        Commands::Update {
            name,
            image,
            schedule,
        } => {
            let spec = ScheduledJobSpec::new(namespace, name, image, schedule);
            ScheduledJobManager::new(connector).update(ctx, &spec).await?;
            println!("CronJob {} updated successfully", spec.name);
        }
        Commands::Delete {
            name,
            ignore_missing,
        } => {
            let target = ResourceRef::new(namespace, name);
            match ScheduledJobManager::new(connector).delete(ctx, &target).await {
                Ok(()) => println!("CronJob {} deleted successfully", target.name),
                Err(e) if ignore_missing && e.is_not_found() => {
                    println!("CronJob {} does not exist", target.name)
                }
                Err(e) => return Err(e),
            }
        }
        Commands::Logs { name } => {
            let target = ResourceRef::new(namespace, name);
            let output = ExecutionLogRetriever::new(connector)
                .with_selection(config.execution_selection)
                .fetch_latest_output(ctx, &target)
                .await?;
            print!("{}", output);
        }
        Commands::Describe { name, output } => {
            let target = ResourceRef::new(namespace, name);
            let summary = ScheduledJobManager::new(connector).get(ctx, &target).await?;
            let rendered = match output {
                OutputFormat::Yaml => serde_yaml::to_string(&summary).map_err(|e| e.to_string()),
                OutputFormat::Json => serde_json::to_string_pretty(&summary)
                    .map(|json| json + "\n")
                    .map_err(|e| e.to_string()),
            }
            .map_err(|e| AppError::ConfigError(format!("cannot render summary: {}", e)))?;
            print!("{}", rendered);
        }
    }

    Ok(())
}
