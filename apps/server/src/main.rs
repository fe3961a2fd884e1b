use anyhow::Context;
use chatline_api::{build_router, AppState};
use chatline_config::{load as load_config, AppConfig, CONFIG_PATH_ENV};
use chatline_runtime::{shutdown_signal, telemetry, BackendServices};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chatline")]
#[command(about = "Chatline realtime chat server")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct Overrides {
    /// Configuration file to load instead of the default search path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to
    #[arg(long, global = true)]
    address: Option<String>,

    /// Port to bind the HTTP listener to
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Print the most recent messages from the database
    DumpMessages {
        /// Number of messages to print
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = resolve_config(&cli.overrides)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::DumpMessages { limit } => dump_messages(config, limit).await,
    }
}

fn resolve_config(overrides: &Overrides) -> anyhow::Result<AppConfig> {
    if let Some(path) = &overrides.config {
        std::env::set_var(CONFIG_PATH_ENV, path);
    }

    let mut config = load_config().context("failed to load configuration")?;

    if let Some(address) = &overrides.address {
        config.http.address = address.clone();
    }
    if let Some(port) = overrides.port {
        config.http.port = port;
    }

    Ok(config)
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting Chatline server");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = AppState::new(services.authenticator.clone(), services.hub.clone());
    let app = build_router(state, &config.http);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    let hub = services.hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Closing every outbound queue ends the socket writers so open
            // connections do not hold the server up.
            if let Err(err) = hub.shutdown() {
                error!(error = %err, "failed to clear connection registry");
            }
        })
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

async fn dump_messages(config: AppConfig, limit: i64) -> anyhow::Result<()> {
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let total = services
        .messages
        .count()
        .await
        .context("failed to count messages")?;
    let messages = services
        .messages
        .list_recent(limit.max(1))
        .await
        .context("failed to fetch messages")?;

    println!("=== MESSAGES ({} of {}) ===", messages.len(), total);
    if messages.is_empty() {
        println!("No messages found in database");
        return Ok(());
    }

    println!(
        "{:<6} {:<25} {:<30} {:<50}",
        "ID", "Created At", "Author", "Content (truncated)"
    );
    println!("{}", "-".repeat(114));

    for message in messages.into_iter().rev() {
        let content = if message.content.chars().count() > 47 {
            let head: String = message.content.chars().take(44).collect();
            format!("{head}...")
        } else {
            message.content
        };

        println!(
            "{:<6} {:<25} {:<30} {:<50}",
            message.id,
            message.created_at.to_rfc3339(),
            message.author_name,
            content
        );
    }

    Ok(())
}
