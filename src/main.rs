use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use psql_runner::config::RuntimeConfig;
use psql_runner::{catalog, storage::Layout, Frequency, InvocationEvent};
use std::path::PathBuf;

/// Run scheduled SQL scripts from object storage and publish CSV results
#[derive(Parser)]
#[command(name = "psql-runner")]
#[command(version)]
#[command(about = "Run scheduled SQL scripts from object storage and publish CSV results", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every script scheduled for a slot; exits with the run status
    Run(TriggerArgs),
    /// List the scripts scheduled for a slot without running them
    List {
        /// Schedule slot: daily, weekly, monthly
        #[arg(short, long)]
        frequency: Frequency,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct TriggerArgs {
    /// Schedule slot: daily, weekly, monthly
    #[arg(short, long)]
    frequency: Option<Frequency>,

    /// Raw trigger event as JSON, or @path to read it from a file
    #[arg(short, long, value_name = "JSON|@FILE")]
    event: Option<String>,
}

impl TriggerArgs {
    fn into_event(self) -> Result<InvocationEvent> {
        if let Some(frequency) = self.frequency {
            return Ok(InvocationEvent::for_frequency(frequency));
        }

        let raw = match self.event.as_deref() {
            Some(arg) => match arg.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read event file {}", path))?,
                None => arg.to_string(),
            },
            None => anyhow::bail!("either --frequency or --event is required"),
        };

        let value: serde_json::Value =
            serde_json::from_str(&raw).context("Event is not valid JSON")?;
        Ok(InvocationEvent::from_value(value))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let status = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))?;

    std::process::exit(status);
}

async fn async_main(cli: Cli) -> Result<i32> {
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    psql_runner::init_tracing(&config);

    match cli.command {
        Commands::Run(trigger) => {
            let event = trigger.into_event()?;
            let runner = psql_runner::build_runner(&config).await?;
            let report = runner.run(&event).await;
            Ok(report.status_code())
        }
        Commands::List { frequency } => list_scripts(&config, frequency).await,
    }
}

async fn list_scripts(config: &RuntimeConfig, frequency: Frequency) -> Result<i32> {
    let Some(store) = psql_runner::init::init_store(config)? else {
        anyhow::bail!("No S3_BUCKET configured");
    };

    let layout = Layout::from_config(&config.storage);
    let scripts = catalog::list_scripts(store.as_ref(), &layout, frequency).await?;

    for script in &scripts {
        println!("{}", script);
    }
    Ok(0)
}
