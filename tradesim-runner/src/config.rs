//! Serializable backtest configuration, loaded from TOML.

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradesim_core::data::{parse_timestamp, BarStreamConfig};
use tradesim_core::domain::Price;
use tradesim_core::engine::{CommissionModel, SessionConfig, SessionMode};
use tradesim_core::risk::{
    LongOnlyRiskManager, MaxOrderSizeRiskManager, PassThroughRiskManager, RiskError, RiskManager,
};
use tradesim_core::sizers::{FixedSizer, PositionSizer, SizingError, SuggestedSizer};
use tradesim_core::strategy::{BuyAndHoldStrategy, Strategy};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("universe has no instruments")]
    EmptyUniverse,

    #[error("initial cash must be positive (got {0})")]
    NonPositiveCash(Price),

    #[error("start {start} is after end {end}")]
    StartAfterEnd {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("live sessions need session.end_session_time")]
    MissingEndTime,

    #[error("period_secs must be positive")]
    ZeroPeriod,

    #[error("sizer quantity must be positive")]
    ZeroSizerQuantity,

    #[error("risk max_quantity must be positive")]
    ZeroRiskLimit,

    #[error("strategy instrument '{0}' is not in the universe")]
    UnknownStrategyInstrument(String),
}

/// Full configuration for one backtest or live session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BacktestConfig {
    pub session: SessionSection,
    pub universe: UniverseSection,
    pub strategy: StrategyConfig,
    pub sizer: SizerConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub commission: CommissionModel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSection {
    #[serde(default)]
    pub mode: SessionMode,
    pub initial_cash: Price,
    /// Inclusive lower bound on bar timestamps.
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub start: Option<NaiveDateTime>,
    /// Exclusive upper bound on bar timestamps.
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub end: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    pub end_session_time: Option<NaiveDateTime>,
    #[serde(default = "default_period_secs")]
    pub period_secs: u32,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UniverseSection {
    pub instruments: Vec<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyConfig {
    /// Buy once on the first bar of `instrument`, then hold.
    BuyAndHold {
        instrument: String,
        #[serde(default)]
        base_quantity: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizerConfig {
    Fixed { quantity: u64 },
    Suggested { default_quantity: u64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskConfig {
    #[default]
    PassThrough,
    MaxOrderSize { max_quantity: u64 },
    LongOnly,
}

fn default_period_secs() -> u32 {
    86_400
}

fn default_idle_poll_ms() -> u64 {
    250
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Accept any timestamp layout the CSV loader accepts, including bare dates.
fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        parse_timestamp(&s).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{s}'")))
    })
    .transpose()
}

impl BacktestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject configurations that cannot produce a meaningful session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.instruments.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        if !self.session.initial_cash.is_positive() {
            return Err(ConfigError::NonPositiveCash(self.session.initial_cash));
        }
        if let (Some(start), Some(end)) = (self.session.start, self.session.end) {
            if start > end {
                return Err(ConfigError::StartAfterEnd { start, end });
            }
        }
        if self.session.mode == SessionMode::Live && self.session.end_session_time.is_none() {
            return Err(ConfigError::MissingEndTime);
        }
        if self.session.period_secs == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        match self.sizer {
            SizerConfig::Fixed { quantity: 0 } | SizerConfig::Suggested { default_quantity: 0 } => {
                return Err(ConfigError::ZeroSizerQuantity)
            }
            _ => {}
        }
        if self.risk == (RiskConfig::MaxOrderSize { max_quantity: 0 }) {
            return Err(ConfigError::ZeroRiskLimit);
        }
        let StrategyConfig::BuyAndHold { instrument, .. } = &self.strategy;
        if !self.universe.instruments.contains(instrument) {
            return Err(ConfigError::UnknownStrategyInstrument(instrument.clone()));
        }
        Ok(())
    }

    /// Deterministic hash of the canonical JSON form.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn stream_config(&self) -> BarStreamConfig {
        BarStreamConfig {
            start: self.session.start,
            end: self.session.end,
            period_secs: self.session.period_secs,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.session.mode,
            end_session_time: self.session.end_session_time,
            idle_poll_ms: self.session.idle_poll_ms,
        }
    }

    pub fn build_sizer(&self) -> Result<Box<dyn PositionSizer>, SizingError> {
        Ok(match self.sizer {
            SizerConfig::Fixed { quantity } => Box::new(FixedSizer::new(quantity)?),
            SizerConfig::Suggested { default_quantity } => {
                Box::new(SuggestedSizer::new(default_quantity)?)
            }
        })
    }

    pub fn build_risk_manager(&self) -> Result<Box<dyn RiskManager>, RiskError> {
        Ok(match self.risk {
            RiskConfig::PassThrough => Box::new(PassThroughRiskManager),
            RiskConfig::MaxOrderSize { max_quantity } => {
                Box::new(MaxOrderSizeRiskManager::new(max_quantity)?)
            }
            RiskConfig::LongOnly => Box::new(LongOnlyRiskManager),
        })
    }

    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        match &self.strategy {
            StrategyConfig::BuyAndHold {
                instrument,
                base_quantity,
            } => Box::new(BuyAndHoldStrategy::new(instrument.clone(), *base_quantity)),
        }
    }
}
