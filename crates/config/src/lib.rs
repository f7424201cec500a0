use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "careline.toml",
    "config/careline.toml",
    "crates/config/careline.toml",
    "../careline.toml",
    "../config/careline.toml",
    "../crates/config/careline.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub bot: BotConfig,
    pub bridge: BridgeConfig,
}

/// Settings for the REST collaborator transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    const fn default_request_timeout() -> u64 {
        30
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.careline.example".to_string(),
            token: None,
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// Settings for the questionnaire bot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub nick_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub typing_delay_ms: u64,
    #[serde(default = "BotConfig::default_visit_type_id")]
    pub visit_type_id: i64,
}

impl BotConfig {
    const fn default_visit_type_id() -> i64 {
        1
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick_name: "Careline Assistant".to_string(),
            avatar: String::new(),
            typing_delay_ms: 0,
            visit_type_id: Self::default_visit_type_id(),
        }
    }
}

/// Settings for the live network bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub endpoint: String,
    pub session_id: i64,
    #[serde(default)]
    pub session_key: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://chat.careline.example/session".to_string(),
            session_id: 0,
            session_key: String::new(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use careline_config::load;
///
/// std::env::remove_var("CARELINE_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.api.base_url.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("api.base_url", defaults.api.base_url.clone())
        .unwrap()
        .set_default(
            "api.request_timeout_seconds",
            i64::try_from(defaults.api.request_timeout_seconds).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default("bot.nick_name", defaults.bot.nick_name.clone())
        .unwrap()
        .set_default("bot.avatar", defaults.bot.avatar.clone())
        .unwrap()
        .set_default(
            "bot.typing_delay_ms",
            i64::try_from(defaults.bot.typing_delay_ms).unwrap_or(i64::MAX),
        )
        .unwrap()
        .set_default("bot.visit_type_id", defaults.bot.visit_type_id)
        .unwrap()
        .set_default("bridge.endpoint", defaults.bridge.endpoint.clone())
        .unwrap()
        .set_default("bridge.session_id", defaults.bridge.session_id)
        .unwrap()
        .set_default("bridge.session_key", defaults.bridge.session_key.clone())
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("CARELINE").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("CARELINE_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via CARELINE_CONFIG");
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

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded careline configuration");
    Ok(config)
}
