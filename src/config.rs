//! TOML configuration.
//!
//! Loaded from `fluente.toml` in the workspace directory (or a path given on
//! the command line). Every section has defaults so an empty file is a valid
//! configuration; secrets fall back to environment variables.

use crate::ledger::{ConsumePolicy, DEFAULT_BATCH_SIZE, DEFAULT_FREE_CREDITS};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub credits: CreditsConfig,
    pub auth: AuthConfig,
    pub completion: CompletionConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreditsConfig {
    /// Credits granted to every new account.
    pub free_credits: u32,
    /// Messages covered by one credit under the batch policy.
    pub batch_size: u32,
    /// How chat turns are charged.
    pub policy: ConsumePolicy,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            free_credits: DEFAULT_FREE_CREDITS,
            batch_size: DEFAULT_BATCH_SIZE,
            policy: ConsumePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Allow new account registration.
    pub allow_registration: bool,
    /// Maximum number of accounts (0 = unlimited).
    pub max_users: u64,
    /// Session lifetime in seconds (None = 30 days).
    pub session_ttl_secs: Option<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_registration: true,
            max_users: 0,
            session_ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompletionConfig {
    /// OpenAI-compatible endpoint base URL.
    pub api_url: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

impl CompletionConfig {
    /// Resolve the API key from the config file or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaymentConfig {
    /// Payment provider API base URL.
    pub api_url: String,
    /// Secret key; falls back to `STRIPE_SECRET_KEY`.
    pub api_key: Option<String>,
    /// ISO currency code for package prices.
    pub currency: String,
    /// Where the provider redirects after a successful payment.
    pub success_url: String,
    /// Where the provider redirects when the user cancels.
    pub cancel_url: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.stripe.com".into(),
            api_key: None,
            currency: "brl".into(),
            success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}"
                .into(),
            cancel_url: "http://localhost:3000/buy-credits".into(),
        }
    }
}

impl PaymentConfig {
    /// Resolve the secret key from the config file or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("STRIPE_SECRET_KEY").ok())
    }
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Workspace directory holding the config file and SQLite databases.
///
/// `FLUENTE_WORKSPACE` overrides; otherwise the platform data dir.
pub fn workspace_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FLUENTE_WORKSPACE") {
        return Ok(PathBuf::from(dir));
    }
    let dirs = directories::ProjectDirs::from("", "", "fluente")
        .context("could not determine a data directory for this platform")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.credits.free_credits, 3);
        assert_eq!(config.credits.batch_size, 20);
        assert_eq!(config.credits.policy, ConsumePolicy::PerMessageBatch);
        assert!(config.auth.allow_registration);
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.payment.currency, "brl");
    }

    #[test]
    fn sections_override_independently() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            host = "0.0.0.0"
            port = 9000

            [credits]
            policy = "per_conversation"
            free_credits = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.credits.policy, ConsumePolicy::PerConversation);
        assert_eq!(config.credits.free_credits, 5);
        // Untouched sections keep defaults
        assert_eq!(config.credits.batch_size, 20);
        assert_eq!(config.completion.max_tokens, 500);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<Config, _> = toml::from_str("[gateway]\nhots = \"oops\"");
        assert!(result.is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/fluente.toml")).unwrap();
        assert_eq!(config.credits.free_credits, 3);
    }
}
