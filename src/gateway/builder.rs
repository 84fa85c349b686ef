//! Builder for configuring executor instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::RequestExecutor;
use super::executor::DEFAULT_USD_PER_TOKEN;
use crate::cache::{CacheConfig, ResponseCache};
use crate::ledger::{LedgerConfig, MetricsLedger};
use crate::prompt::{DEFAULT_PROMPT, DirPromptSource, PromptSource};
use crate::providers::{CompletionProvider, OpenRouterClient};
use crate::resilience::{
    BackoffRetrier, BreakerConfig, BreakerRegistry, RetryConfig, UPSTREAM_BREAKER,
};
use crate::types::CompletionOptions;
use crate::{HuginnError, Result};

/// Main entry point for creating executor instances.
pub struct Huginn;

impl Huginn {
    /// Create a new builder for configuring the executor.
    pub fn builder() -> HuginnBuilder {
        HuginnBuilder::new()
    }
}

/// Builder for configuring executor instances.
///
/// ```rust,no_run
/// # async fn demo() -> huginn::Result<()> {
/// use huginn::{CacheConfig, Huginn, LedgerConfig, RetryConfig};
///
/// let executor = Huginn::builder()
///     .openrouter(std::env::var("OPENROUTER_API_KEY").unwrap_or_default())
///     .retry(RetryConfig::new().max_retries(2))
///     .cache(CacheConfig::new().path("cache/cache.json"))
///     .ledger(LedgerConfig::new().path("metrics/metrics.json"))
///     .build()
///     .await?;
///
/// let response = executor.ask("How do I transfer USDT?").await?;
/// println!("{}", response.answer);
/// # Ok(())
/// # }
/// ```
pub struct HuginnBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    openrouter_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    prompts: Option<Arc<dyn PromptSource>>,
    prompt_name: String,
    options: CompletionOptions,
    retry: RetryConfig,
    breaker: BreakerConfig,
    breaker_name: String,
    breakers: Option<Arc<BreakerRegistry>>,
    cache: CacheConfig,
    ledger: LedgerConfig,
    usd_per_token: f64,
}

impl HuginnBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            openrouter_key: None,
            base_url: None,
            timeout_secs: None,
            prompts: None,
            prompt_name: DEFAULT_PROMPT.to_string(),
            options: CompletionOptions::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            breaker_name: UPSTREAM_BREAKER.to_string(),
            breakers: None,
            cache: CacheConfig::default(),
            ledger: LedgerConfig::default(),
            usd_per_token: DEFAULT_USD_PER_TOKEN,
        }
    }

    /// Use OpenRouter as the upstream.
    pub fn openrouter(mut self, api_key: impl Into<String>) -> Self {
        self.openrouter_key = Some(api_key.into());
        self
    }

    /// Override the OpenRouter base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// HTTP transport timeout for the OpenRouter client.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Use a custom upstream provider. Takes precedence over
    /// [`openrouter()`](Self::openrouter).
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Source of system prompts. Default: `./prompts`.
    pub fn prompts(mut self, prompts: Arc<dyn PromptSource>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Read prompts from `dir`.
    pub fn prompt_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.prompts(Arc::new(DirPromptSource::new(dir)))
    }

    /// Name of the system prompt. Default: `customer-support`.
    pub fn prompt_name(mut self, name: impl Into<String>) -> Self {
        self.prompt_name = name.into();
        self
    }

    /// Default completion options.
    pub fn options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Default model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options = self.options.model(model);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Config for the upstream breaker, applied when the registry creates it.
    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Name of the upstream breaker. Default: `llm-service`.
    pub fn breaker_name(mut self, name: impl Into<String>) -> Self {
        self.breaker_name = name.into();
        self
    }

    /// Share a breaker registry with other executors.
    pub fn breaker_registry(mut self, registry: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(registry);
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn ledger(mut self, config: LedgerConfig) -> Self {
        self.ledger = config;
        self
    }

    /// Price per token for cost estimates. Default: 0.000001.
    pub fn usd_per_token(mut self, usd: f64) -> Self {
        self.usd_per_token = usd;
        self
    }

    /// Build the executor.
    ///
    /// Clears any cache snapshot and loads the ledger file, when configured.
    pub async fn build(self) -> Result<RequestExecutor> {
        let provider: Arc<dyn CompletionProvider> = match (self.provider, self.openrouter_key) {
            (Some(provider), _) => provider,
            (None, Some(key)) => {
                let base_url = self
                    .base_url
                    .unwrap_or_else(|| crate::providers::openrouter::DEFAULT_BASE_URL.to_string());
                let client = match self.timeout_secs {
                    Some(secs) => {
                        OpenRouterClient::with_timeout(key, base_url, Duration::from_secs(secs))?
                    }
                    None => OpenRouterClient::with_base_url(key, base_url)?,
                };
                Arc::new(client)
            }
            (None, None) => {
                return Err(HuginnError::Configuration(
                    "no upstream provider configured".into(),
                ));
            }
        };

        let breakers = self
            .breakers
            .unwrap_or_else(|| Arc::new(BreakerRegistry::new(self.breaker.clone())));
        // Creates the breaker with this config unless the registry already has one.
        breakers.get_with(&self.breaker_name, self.breaker);

        let prompts = self
            .prompts
            .unwrap_or_else(|| Arc::new(DirPromptSource::default()));

        Ok(RequestExecutor {
            provider,
            prompts,
            prompt_name: self.prompt_name,
            options: self.options,
            retrier: BackoffRetrier::new(self.retry, "upstream_completion"),
            breakers,
            breaker_name: self.breaker_name,
            cache: Arc::new(ResponseCache::open(&self.cache).await),
            ledger: Arc::new(MetricsLedger::open(&self.ledger).await),
            usd_per_token: self.usd_per_token,
            started: Instant::now(),
        })
    }
}

impl Default for HuginnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
