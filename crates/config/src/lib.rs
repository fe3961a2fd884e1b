use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "chatline.toml",
    "config/chatline.toml",
    "crates/config/chatline.toml",
    "../chatline.toml",
    "../config/chatline.toml",
];

pub const CONFIG_PATH_ENV: &str = "CHATLINE_CONFIG";
/// Publicly known fallback signing secret. Tokens signed with it can be forged.
pub const DEFAULT_JWT_SECRET: &str = "default_secret_change_in_production";
const ENV_PREFIX: &str = "CHATLINE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    #[serde(default = "HttpConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl HttpConfig {
    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:3000".to_string()]
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3001,
            allowed_origins: Self::default_allowed_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://chatline.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Signing parameters for the bearer tokens handed out at login.
///
/// ```
/// use chatline_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.issuer, "chatline");
/// assert_eq!(auth.token_ttl_seconds, 86_400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }

    fn default_issuer() -> String {
        "chatline".to_string()
    }

    const fn default_token_ttl() -> u64 {
        86_400
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            issuer: Self::default_issuer(),
            token_ttl_seconds: Self::default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound queue. A full queue drops events
    /// for that connection only.
    #[serde(default = "RealtimeConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
    #[serde(default = "RealtimeConfig::default_history_limit")]
    pub history_limit: i64,
    #[serde(default = "RealtimeConfig::default_max_message_length")]
    pub max_message_length: usize,
}

impl RealtimeConfig {
    const fn default_outbound_buffer() -> usize {
        100
    }

    const fn default_history_limit() -> i64 {
        50
    }

    const fn default_max_message_length() -> usize {
        2_000
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: Self::default_outbound_buffer(),
            history_limit: Self::default_history_limit(),
            max_message_length: Self::default_max_message_length(),
        }
    }
}

impl AppConfig {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.http.port == 0 {
            bail!("http.port must be greater than zero");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be greater than zero");
        }
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.token_ttl_seconds == 0 {
            bail!("auth.token_ttl_seconds must be greater than zero");
        }
        if self.realtime.outbound_buffer == 0 {
            bail!("realtime.outbound_buffer must be greater than zero");
        }
        if self.realtime.history_limit <= 0 {
            bail!("realtime.history_limit must be greater than zero");
        }
        if self.realtime.max_message_length == 0 {
            bail!("realtime.max_message_length must be greater than zero");
        }
        Ok(())
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use chatline_config::load;
///
/// std::env::remove_var("CHATLINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let token_ttl = i64::try_from(defaults.auth.token_ttl_seconds).unwrap_or(i64::MAX);
    let outbound_buffer = i64::try_from(defaults.realtime.outbound_buffer).unwrap_or(i64::MAX);
    let max_message_length =
        i64::try_from(defaults.realtime.max_message_length).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("http.allowed_origins", defaults.http.allowed_origins.clone())?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.token_ttl_seconds", token_ttl)?
        .set_default("realtime.outbound_buffer", outbound_buffer)?
        .set_default("realtime.history_limit", defaults.realtime.history_limit)?
        .set_default("realtime.max_message_length", max_message_length)?;

    let environment_overrides = config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("http.allowed_origins")
        .try_parsing(true);

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CHATLINE_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.token_ttl_seconds > i64::MAX as u64 {
        config.auth.token_ttl_seconds = i64::MAX as u64;
    }

    config.validate().context("invalid configuration")?;

    debug!(
        address = %config.http.address,
        port = config.http.port,
        database = %config.database.url,
        "loaded backend configuration"
    );
    Ok(config)
}
