use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use engine::api::subgraph::DEFAULT_SUBGRAPH_URL;
use engine::api::telegram::DEFAULT_TELEGRAM_API_URL;
use engine::pipeline::{DEFAULT_LOOKBACK_DAYS, DEFAULT_MIN_VOLUME_USD};
use engine::report::DEFAULT_REPORT_SIZE;
use engine::{RankingWeights, RunOptions};
use serde::Deserialize;

/// Environment overrides, e.g. `BEST_POOLS_BOT_TOKEN`
const ENV_PREFIX: &str = "BEST_POOLS";

/// Job settings read from `config.yml`.
///
/// `top_pools`, `bot_token` and `chatID` are the required keys; the rest have
/// defaults matching the public Uniswap V3 subgraph and Telegram Bot API.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Number of pools requested from the subgraph
    pub top_pools: u32,
    #[serde(default)]
    pub bot_token: String,
    /// Chat target; YAML integers are accepted
    #[serde(default, alias = "chatID", alias = "chatid")]
    pub chat_id: String,
    #[serde(default = "default_report_size")]
    pub report_size: usize,
    #[serde(default = "default_min_volume_usd")]
    pub min_volume_usd: f64,
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_subgraph_url")]
    pub subgraph_url: String,
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
}

fn default_report_size() -> usize {
    DEFAULT_REPORT_SIZE
}

fn default_min_volume_usd() -> f64 {
    DEFAULT_MIN_VOLUME_USD
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_fetch_concurrency() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_subgraph_url() -> String {
    DEFAULT_SUBGRAPH_URL.to_string()
}

fn default_telegram_api_url() -> String {
    DEFAULT_TELEGRAM_API_URL.to_string()
}

impl Settings {
    /// Load `path` (format from its extension) with `BEST_POOLS_*` overrides on top
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// Reject settings the job cannot run with. Credentials are only needed
    /// when the report is actually sent.
    pub fn validate(&self, require_credentials: bool) -> Result<(), ConfigError> {
        if self.top_pools == 0 {
            return Err(ConfigError::Message("top_pools must be at least 1".into()));
        }
        if self.report_size == 0 {
            return Err(ConfigError::Message("report_size must be at least 1".into()));
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::Message("fetch_concurrency must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Message("request_timeout_secs must be at least 1".into()));
        }
        if require_credentials {
            if self.bot_token.trim().is_empty() {
                return Err(ConfigError::Message("bot_token is required".into()));
            }
            if self.chat_id.trim().is_empty() {
                return Err(ConfigError::Message("chatID is required".into()));
            }
        }
        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            pool_limit: self.top_pools,
            min_volume_usd: self.min_volume_usd,
            lookback_days: self.lookback_days,
            report_size: self.report_size,
            fetch_concurrency: self.fetch_concurrency,
            weights: RankingWeights::default(),
        }
    }
}
