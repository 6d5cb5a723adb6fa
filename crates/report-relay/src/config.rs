use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "MY_API_REPORTFY";
pub const ENV_CHANNEL_ID: &str = "DISCORD_CHANNEL_ID";
pub const ENV_GEMINI_KEY: &str = "GEMINI_API_KEY";

const DEFAULT_REPORTS_DIR: &str = "./Reports";
const DEFAULT_GENERATOR_BIN: &str = "reportify";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

/// Errors raised while loading configuration. All of them stop the process
/// before it connects anywhere.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required variable {0} is not set")]
    Missing(&'static str),

    #[error("DISCORD_CHANNEL_ID must be a numeric channel id, got {0:?}")]
    InvalidChannelId(String),

    #[error("RELAY_HTTP_TIMEOUT_SECS must be a number of seconds, got {0:?}")]
    InvalidTimeout(String),
}

/// Discord bot credentials and target channel.
#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub token: String,
    pub channel_id: u64,
    pub api_base: String,
}

/// Gemini `generateContent` endpoint settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

/// How to launch the external report generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub bin: String,
    pub args: Vec<String>,
    /// Working directory for the generator (None = inherit).
    pub working_dir: Option<PathBuf>,
}

/// Top-level relay configuration, built once at startup and passed by
/// reference to every component.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub discord: DiscordConfig,
    pub gemini: GeminiConfig,
    pub generator: GeneratorConfig,
    /// Root holding one sub-directory per report run.
    pub reports_dir: PathBuf,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

impl RelayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let token = require(ENV_BOT_TOKEN)?;
        let raw_channel = require(ENV_CHANNEL_ID)?;
        let channel_id = raw_channel
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidChannelId(raw_channel.clone()))?;
        let api_key = require(ENV_GEMINI_KEY)?;

        let http_timeout = match get("RELAY_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?,
            ),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            discord: DiscordConfig {
                token,
                channel_id,
                api_base: get("DISCORD_API_BASE")
                    .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.into()),
            },
            gemini: GeminiConfig {
                api_key,
                model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
                api_base: get("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.into()),
            },
            generator: GeneratorConfig {
                bin: get("REPORTFY_BIN").unwrap_or_else(|| DEFAULT_GENERATOR_BIN.into()),
                args: get("REPORTFY_ARGS")
                    .map(|raw| raw.split_whitespace().map(String::from).collect())
                    .unwrap_or_default(),
                working_dir: get("REPORTFY_WORKDIR").map(PathBuf::from),
            },
            reports_dir: get("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR)),
            http_timeout,
        })
    }
}
