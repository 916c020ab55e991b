//! Configuration management
//!
//! Everything comes from environment variables (optionally via `.env`).
//! A missing API key for a configured provider is a startup error, so a
//! misconfigured service never starts serving.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ChatError;
use crate::llm::Provider;

/// One model stage (routing or answering)
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub router: StageConfig,
    pub answer: StageConfig,

    /// Directory of skill files
    pub skills_dir: PathBuf,

    /// Rule-based trigger short-circuit before the routing call
    pub trigger_shortcut: bool,

    /// Enable routing-decision caching
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: u64,

    /// Idle limit for outbound model calls: connect, response head, and each gap between chunks
    pub llm_timeout: Duration,

    /// Input limit of the answering model (estimated tokens)
    pub max_context_tokens: usize,
    pub max_answer_tokens: u32,

    pub host: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChatError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = |key: &str| -> Result<Provider, ChatError> {
            get(key)
                .map(|v| v.parse::<Provider>().map_err(ChatError::Configuration))
                .unwrap_or(Ok(Provider::Claude))
        };

        let stage = |provider: Provider, model_key: &str, default_model: &str| -> Result<StageConfig, ChatError> {
            let api_key = get(provider.api_key_var()).ok_or_else(|| {
                ChatError::Configuration(format!(
                    "{} is not set (required by the {} provider)",
                    provider.api_key_var(),
                    provider.as_str()
                ))
            })?;
            Ok(StageConfig {
                provider,
                model: get(model_key).unwrap_or_else(|| default_model.to_string()),
                api_key,
            })
        };

        let router_provider = provider("SKILLCHAT_ROUTER_PROVIDER")?;
        let answer_provider = provider("SKILLCHAT_ANSWER_PROVIDER")?;

        let router = stage(
            router_provider,
            "SKILLCHAT_ROUTER_MODEL",
            router_provider.default_router_model(),
        )?;
        let answer = stage(
            answer_provider,
            "SKILLCHAT_ANSWER_MODEL",
            answer_provider.default_answer_model(),
        )?;

        let flag = |key: &str, default: bool| -> bool {
            get(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
                .unwrap_or(default)
        };

        fn number<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, ChatError> {
            match value {
                Some(v) => v
                    .parse()
                    .map_err(|_| ChatError::Configuration(format!("{} must be a number, got '{}'", key, v))),
                None => Ok(default),
            }
        }

        let host = get("SKILLCHAT_HOST")
            .map(|v| {
                v.parse::<IpAddr>()
                    .map_err(|_| ChatError::Configuration(format!("SKILLCHAT_HOST is not an IP address: '{}'", v)))
            })
            .transpose()?
            .unwrap_or(IpAddr::from([127, 0, 0, 1]));

        let cors_origins = get("SKILLCHAT_CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        Ok(Self {
            router,
            answer,
            skills_dir: get("SKILLCHAT_SKILLS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("skills")),
            trigger_shortcut: flag("SKILLCHAT_TRIGGER_SHORTCUT", true),
            cache_enabled: flag("SKILLCHAT_CACHE_ENABLED", true),
            cache_ttl_secs: number(get("SKILLCHAT_CACHE_TTL"), "SKILLCHAT_CACHE_TTL", 3600)?,
            cache_max_entries: number(get("SKILLCHAT_CACHE_MAX_ENTRIES"), "SKILLCHAT_CACHE_MAX_ENTRIES", 1000)?,
            llm_timeout: Duration::from_secs(number(get("SKILLCHAT_LLM_TIMEOUT"), "SKILLCHAT_LLM_TIMEOUT", 60)?),
            max_context_tokens: number(
                get("SKILLCHAT_MAX_CONTEXT_TOKENS"),
                "SKILLCHAT_MAX_CONTEXT_TOKENS",
                180_000,
            )?,
            max_answer_tokens: number(get("SKILLCHAT_MAX_ANSWER_TOKENS"), "SKILLCHAT_MAX_ANSWER_TOKENS", 4096)?,
            host,
            port: number(get("SKILLCHAT_PORT"), "SKILLCHAT_PORT", 8787)?,
            cors_origins,
        })
    }

    /// Skills directory alone, for commands that never call a model
    pub fn skills_dir_from_env() -> PathBuf {
        std::env::var("SKILLCHAT_SKILLS_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("skills"))
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
