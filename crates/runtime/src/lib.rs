use std::sync::Arc;

use anyhow::{Context, Result};
use chatline_auth::Authenticator;
use chatline_config::AppConfig;
use chatline_database::{initialize_database, MessageRepository};
use chatline_realtime::ChatHub;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub messages: MessageRepository,
    pub hub: Arc<ChatHub>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        if config.auth.uses_default_secret() {
            warn!(
                "auth.jwt_secret is the built-in default; set CHATLINE__AUTH__JWT_SECRET before exposing this server"
            );
        }

        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to prepare database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        let messages = MessageRepository::new(db_pool.clone());
        let hub = Arc::new(ChatHub::new(Arc::new(messages.clone()), &config.realtime));

        info!(
            outbound_buffer = config.realtime.outbound_buffer,
            max_message_length = config.realtime.max_message_length,
            "realtime hub ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            messages,
            hub,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
