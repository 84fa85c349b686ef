//! Configuration loading for the `huginn` CLI and embedders.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.huginn/config.toml` (user)
//! 3. `/etc/huginn/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.huginn/secrets.toml` (user, must be 0600)
//! 2. `/etc/huginn/secrets.toml` (system, must be 0600)
//! 3. `OPENROUTER_API_KEY`, then `OPENAI_ROUTER_API_KEY`

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::gateway::HuginnBuilder;
use crate::gateway::executor::DEFAULT_USD_PER_TOKEN;
use crate::ledger::LedgerConfig;
use crate::prompt::DEFAULT_PROMPT;
use crate::providers::openrouter::DEFAULT_BASE_URL;
use crate::resilience::{BreakerConfig, RetryConfig, UPSTREAM_BREAKER};
use crate::types::{CompletionOptions, DEFAULT_MODEL};
use crate::{HuginnError, Result};

/// Environment variables consulted for the OpenRouter key, in order.
const API_KEY_ENV_VARS: &[&str] = &["OPENROUTER_API_KEY", "OPENAI_ROUTER_API_KEY"];

/// Top-level configuration. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub breaker: BreakerSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Upstream model and prompt settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// HTTP transport timeout in seconds (default: 60).
    pub timeout_secs: u64,
    pub prompt_dir: PathBuf,
    pub prompt: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let options = CompletionOptions::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            timeout_secs: 60,
            prompt_dir: PathBuf::from("prompts"),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// `[retry]`, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter_factor: defaults.jitter_factor,
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_retries(section.max_retries)
            .base_delay(Duration::from_millis(section.base_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
            .jitter_factor(section.jitter_factor)
    }
}

/// `[breaker]`, durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub name: String,
    pub timeout_ms: u64,
    /// Error percentage that opens the breaker.
    pub error_threshold: f64,
    pub reset_timeout_ms: u64,
    pub volume_threshold: u32,
    pub rolling_window_ms: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        let defaults = BreakerConfig::default();
        Self {
            name: UPSTREAM_BREAKER.to_string(),
            timeout_ms: defaults.timeout.as_millis() as u64,
            error_threshold: defaults.error_threshold,
            reset_timeout_ms: defaults.reset_timeout.as_millis() as u64,
            volume_threshold: defaults.volume_threshold,
            rolling_window_ms: defaults.rolling_window.as_millis() as u64,
        }
    }
}

impl From<&BreakerSection> for BreakerConfig {
    fn from(section: &BreakerSection) -> Self {
        BreakerConfig::new()
            .timeout(Duration::from_millis(section.timeout_ms))
            .error_threshold(section.error_threshold)
            .reset_timeout(Duration::from_millis(section.reset_timeout_ms))
            .volume_threshold(section.volume_threshold)
            .rolling_window(Duration::from_millis(section.rolling_window_ms))
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Snapshot file; omit for a memory-only cache.
    pub path: Option<PathBuf>,
    pub max_entries: u64,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("cache/cache.json")),
            max_entries: CacheConfig::default().max_entries,
            ttl_secs: None,
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        let mut config = CacheConfig::new().max_entries(section.max_entries);
        if let Some(path) = &section.path {
            config = config.path(path);
        }
        if let Some(secs) = section.ttl_secs {
            config = config.ttl(Duration::from_secs(secs));
        }
        config
    }
}

/// `[ledger]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Ledger file; omit for an in-memory ledger.
    pub path: Option<PathBuf>,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("metrics/metrics.json")),
        }
    }
}

impl From<&LedgerSection> for LedgerConfig {
    fn from(section: &LedgerSection) -> Self {
        LedgerConfig {
            path: section.path.clone(),
        }
    }
}

/// `[pricing]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub usd_per_token: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            usd_per_token: DEFAULT_USD_PER_TOKEN,
        }
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first of
    /// `~/.huginn/config.toml` and `/etc/huginn/config.toml` that exists is
    /// used, else the built-in defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Apply every section to `builder`. The API key is set separately.
    pub fn configure(&self, builder: HuginnBuilder) -> HuginnBuilder {
        builder
            .base_url(&self.upstream.base_url)
            .timeout(self.upstream.timeout_secs)
            .options(self.upstream.options())
            .prompt_dir(&self.upstream.prompt_dir)
            .prompt_name(&self.upstream.prompt)
            .retry(RetryConfig::from(&self.retry))
            .breaker(BreakerConfig::from(&self.breaker))
            .breaker_name(&self.breaker.name)
            .cache(CacheConfig::from(&self.cache))
            .ledger(LedgerConfig::from(&self.ledger))
            .usd_per_token(self.pricing.usd_per_token)
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openrouter: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".huginn").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/huginn/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load a secrets file after checking its permissions.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        // Reject if group or other bits are set
        if mode & 0o077 != 0 {
            return Err(HuginnError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// OpenRouter API key, falling back to the environment.
    pub fn openrouter_key(&self) -> Option<String> {
        self.openrouter
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let config = Config::default();
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upstream.model, DEFAULT_MODEL);
        assert_eq!(config.upstream.max_tokens, Some(250));
        assert_eq!(RetryConfig::from(&config.retry), RetryConfig::default());
        assert_eq!(config.breaker.name, "llm-service");
        assert_eq!(config.breaker.volume_threshold, 10);
        assert_eq!(
            config.cache.path.as_deref(),
            Some(Path::new("cache/cache.json"))
        );
        assert_eq!(
            config.ledger.path.as_deref(),
            Some(Path::new("metrics/metrics.json"))
        );
        assert_eq!(config.pricing.usd_per_token, 0.000001);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
            [upstream]
            model = "anthropic/claude-sonnet-4"

            [retry]
            max_retries = 5
            base_delay_ms = 200
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.upstream.model, "anthropic/claude-sonnet-4");
        // Defaults preserved
        assert_eq!(config.upstream.temperature, Some(0.7));
        let retry = RetryConfig::from(&config.retry);
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay, Duration::from_millis(200));
        assert_eq!(retry.max_delay, Duration::from_millis(10_000));
    }

    #[test]
    fn parse_breaker_and_cache_sections() {
        let toml = r#"
            [breaker]
            timeout_ms = 2000
            error_threshold = 25.0
            volume_threshold = 4

            [cache]
            max_entries = 100
            ttl_secs = 60

            [pricing]
            usd_per_token = 0.000002
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let breaker = BreakerConfig::from(&config.breaker);
        assert_eq!(breaker.timeout, Duration::from_secs(2));
        assert_eq!(breaker.error_threshold, 25.0);
        assert_eq!(breaker.volume_threshold, 4);
        assert_eq!(breaker.reset_timeout, Duration::from_secs(30));

        let cache = CacheConfig::from(&config.cache);
        assert_eq!(cache.max_entries, 100);
        assert_eq!(cache.ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.pricing.usd_per_token, 0.000002);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[ledger]\npath = \"/tmp/ledger.json\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(
            config.ledger.path.as_deref(),
            Some(Path::new("/tmp/ledger.json"))
        );
    }

    #[test]
    fn parse_secrets() {
        let secrets: Secrets = toml::from_str("[openrouter]\napi_key = \"sk-or-test\"\n").unwrap();
        assert_eq!(secrets.openrouter_key().as_deref(), Some("sk-or-test"));
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_are_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[openrouter]\napi_key = \"k\"\n").unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let err = Secrets::load_from_file(&path).unwrap_err().to_string();
        assert!(err.contains("insecure permissions"));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        assert!(Secrets::load_from_file(&path).is_ok());
    }
}
