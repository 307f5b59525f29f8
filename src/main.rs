use anyhow::Context;
use cdc_launcher::compose::{ComposeFile, DockerCompose};
use cdc_launcher::connect::{ConnectClient, ConnectorDefinition, Registration, StatusReport};
use cdc_launcher::kafka::TopicManager;
use cdc_launcher::{Config, Pipeline, SetupSummary};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "cdc-launcher")]
#[command(about = "Brings up a Debezium CDC stack and registers a PostgreSQL source connector", long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable JSON output for logs")]
    json_logs: bool,

    #[arg(short, long, global = true, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, value_name = "URL", env = "CONNECT_URL", global = true, help = "Kafka Connect REST endpoint")]
    connect_url: Option<String>,

    #[arg(long, value_name = "NAME", global = true, help = "Connector name")]
    connector_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create data directories, start the containers, enable logical
    /// replication and register the connector
    Up,
    /// Register the connector against an already running stack
    Register {
        #[arg(long, help = "Replace the config of an existing connector")]
        update: bool,
    },
    /// Print the connector status
    Status,
    /// Delete the connector
    Delete,
    /// Restart the connector
    Restart {
        #[arg(long, help = "Restart its tasks as well")]
        include_tasks: bool,
    },
    /// Stop the containers
    Down {
        #[arg(long, help = "Also remove volumes")]
        volumes: bool,
    },
    /// Write the default compose file
    Compose {
        #[arg(short, long, value_name = "FILE", help = "Output file, stdout when omitted")]
        output: Option<PathBuf>,
    },
    /// Report which change topics exist on the broker
    Topics,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.json_logs, args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.connect_url {
        config.connect.url = url;
    }
    if let Some(name) = args.connector_name.clone() {
        config.connector.name = name;
    }
    config.validate()?;

    info!(
        connect_url = %config.connect.url,
        connector = %config.connector.name,
        database = %config.database.name,
        compose_file = %config.compose.file.display(),
        "Configuration summary"
    );

    let client = ConnectClient::from_config(&config)?;

    match args.command {
        Command::Up => {
            let runtime = DockerCompose::new(&config.compose)?;
            let pipeline = Pipeline::new(config, runtime, client);
            let summary = pipeline.up().await?;
            print_summary(&summary);
        }
        Command::Register { update } => {
            config.connector.update_existing |= update;
            let runtime = DockerCompose::new(&config.compose)?;
            let pipeline = Pipeline::new(config, runtime, client);
            let summary = pipeline.register().await?;
            print_summary(&summary);
        }
        Command::Status => {
            let name = connector_name(&config, args.connector_name).await?;
            let report = client.connector_status(&name).await?;
            print_status(&report);
            if !report.is_success() {
                anyhow::bail!("status request for '{}' returned HTTP {}", name, report.http_status);
            }
        }
        Command::Delete => {
            let name = connector_name(&config, args.connector_name).await?;
            if !client.delete_connector(&name).await? {
                println!("Connector '{}' was not registered", name);
            }
        }
        Command::Restart { include_tasks } => {
            let name = connector_name(&config, args.connector_name).await?;
            client.restart_connector(&name, include_tasks).await?;
        }
        Command::Down { volumes } => {
            let runtime = DockerCompose::new(&config.compose)?;
            Pipeline::new(config, runtime, client).down(volumes).await?;
        }
        Command::Compose { output } => {
            let compose = ComposeFile::cdc_stack(&config.compose);
            match output {
                Some(path) => compose.write_to(&path).await?,
                None => print!("{}", compose.render()?),
            }
        }
        Command::Topics => {
            let definition = ConnectorDefinition::resolve(&config).await?;
            let expected = definition.change_topics(&config.connector.topic_prefix);

            let manager = TopicManager::new(
                &config.kafka.bootstrap_servers,
                Duration::from_secs(config.kafka.metadata_timeout_secs),
            )?;
            let report = manager.check_topics(&expected).await?;
            for topic in &report.present {
                println!("present  {}", topic);
            }
            for topic in &report.missing {
                println!("missing  {}", topic);
            }
            if report.is_complete() {
                info!(topics = report.present.len(), "All change topics exist");
            } else {
                warn!(
                    missing = report.missing.len(),
                    "Some change topics do not exist yet; Debezium creates them on the first change"
                );
            }
        }
    }

    Ok(())
}

/// Explicit flag first, then the name from the connector definition.
async fn connector_name(config: &Config, flag: Option<String>) -> anyhow::Result<String> {
    match flag {
        Some(name) => Ok(name),
        None => Ok(ConnectorDefinition::resolve(config).await?.name),
    }
}

fn print_summary(summary: &SetupSummary) {
    match &summary.registration {
        Registration::Created(_) => info!(connector = %summary.connector, "Connector registered"),
        Registration::Updated(_) => info!(connector = %summary.connector, "Connector config updated"),
        Registration::AlreadyExists => {
            warn!(connector = %summary.connector, "Connector was already registered")
        }
    }
    if let Some(report) = &summary.status {
        print_status(report);
    }
}

fn print_status(report: &StatusReport) {
    if let Some(status) = &report.status {
        info!(
            connector = %status.name,
            state = %status.connector.state,
            tasks = status.tasks.len(),
            "Connector status"
        );
        for task in status.failed_tasks() {
            let reason = task.trace.as_deref().and_then(|t| t.lines().next()).unwrap_or("unknown");
            warn!(task = task.id, "Task failed: {}", reason);
        }
    }
    println!("{}", report.pretty_body());
}

fn init_logging(json: bool, verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("cdc_launcher=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cdc_launcher=info,warn"))
    };

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
