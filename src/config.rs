use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::indicator::macd::MacdParams;
use crate::pipeline::PipelineConfig;
use crate::strategy::predicate::PredicateKind;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub market: MarketConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub symbol: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default = "default_bar_interval")]
    pub bar_interval: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub fast_span: usize,
    pub slow_span: usize,
    pub signal_span: usize,
    /// Defaults to `slow_span` when omitted.
    pub warmup_bars: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub history_capacity: usize,
    pub macd_log_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub buy: PredicateKind,
    pub sell: PredicateKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub initial_balance: f64,
    pub order_qty: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
    pub journal_dir: Option<PathBuf>,
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443/ws".to_string()
}

fn default_bar_interval() -> String {
    "1m".to_string()
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        let params = MacdParams::default();
        Self {
            fast_span: params.fast_span,
            slow_span: params.slow_span,
            signal_span: params.signal_span,
            warmup_bars: None,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        let cfg = PipelineConfig::default();
        Self {
            history_capacity: cfg.history_capacity,
            macd_log_capacity: cfg.macd_log_capacity,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            buy: PredicateKind::default_buy(),
            sell: PredicateKind::default_sell(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            order_qty: 1.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            journal_dir: None,
        }
    }
}

/// Parse a bar interval string (e.g. "1s", "5m", "1h", "1d", "1w") into seconds.
pub fn parse_interval_secs(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '5m'", s);
    }

    let (num_str, suffix) = s.split_at(s.len() - 1);
    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let unit_secs = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "w" => 7 * 86_400,
        _ => bail!(
            "invalid interval '{}': unsupported suffix '{}', expected one of s/m/h/d/w",
            s,
            suffix
        ),
    };

    n.checked_mul(unit_secs)
        .with_context(|| format!("invalid interval '{}': value is too large", s))
}

impl MarketConfig {
    pub fn interval_secs(&self) -> Result<u64> {
        parse_interval_secs(&self.bar_interval)
    }

    pub fn normalized_symbol(&self) -> String {
        self.symbol.trim().to_ascii_uppercase()
    }

    /// Binance trade stream URL for the configured symbol.
    pub fn trade_stream_url(&self) -> Result<url::Url> {
        let base = url::Url::parse(self.ws_base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid ws_base_url '{}'", self.ws_base_url))?;
        let stream = format!("{}@trade", self.symbol.trim().to_ascii_lowercase());
        let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), stream);
        url::Url::parse(&joined).with_context(|| format!("invalid trade stream url '{}'", joined))
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        std::env::var("MACD_PULSE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from_path(&Self::config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).context("failed to parse config toml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.market.normalized_symbol().is_empty() {
            bail!("market.symbol must not be empty");
        }
        self.market
            .trade_stream_url()
            .context("market.ws_base_url is invalid")?;
        if !(self.ledger.order_qty.is_finite() && self.ledger.order_qty > 0.0) {
            bail!("ledger.order_qty must be > 0");
        }
        if !(self.ledger.initial_balance.is_finite() && self.ledger.initial_balance >= 0.0) {
            bail!("ledger.initial_balance must be >= 0");
        }
        self.pipeline_config()?;
        Ok(())
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let interval_secs = self
            .market
            .interval_secs()
            .context("market.bar_interval is invalid")?;
        let cfg = PipelineConfig {
            interval_secs,
            macd: MacdParams {
                fast_span: self.indicator.fast_span,
                slow_span: self.indicator.slow_span,
                signal_span: self.indicator.signal_span,
                warmup_bars: self
                    .indicator
                    .warmup_bars
                    .unwrap_or(self.indicator.slow_span),
            },
            history_capacity: self.aggregator.history_capacity,
            macd_log_capacity: self.aggregator.macd_log_capacity,
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
