//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is built once at process start, either from defaults
//! or a TOML file, and passed by reference to every stage. Every section is
//! optional in the file; missing sections and fields take their defaults.

use chrono::NaiveDate;
use mfpanel_data::DateRange;
use mfpanel_factors::MonthRange;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::{PipelineError, Result};

/// Default cache directory under the platform cache dir.
///
/// - Linux: `~/.cache/mfpanel/`
/// - macOS: `~/Library/Caches/mfpanel/`
/// - Windows: `%LOCALAPPDATA%\mfpanel\`
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mfpanel")
}

/// Default extract cache database path.
pub fn default_cache_path() -> PathBuf {
    default_cache_dir().join("extracts.db")
}

/// Complete configuration of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Extract date range.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Factor series inputs.
    #[serde(default)]
    pub factors: FactorsConfig,

    /// Eligibility thresholds.
    #[serde(default)]
    pub universe: UniverseConfig,

    /// Identifier resolution.
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            reason: source.to_string(),
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Check ranges and bands.
    pub fn validate(&self) -> Result<()> {
        self.extract.date_range()?;
        self.factors.month_range()?;
        self.universe.validate()
    }
}

/// File locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Extract cache database.
    #[serde(default = "default_cache_path")]
    pub cache_db: PathBuf,

    /// Directory receiving the main sample, panels and run reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_db: default_cache_path(),
            output_dir: default_output_dir(),
        }
    }
}

/// Date range of the returns and holdings extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// First date pulled.
    #[serde(default = "default_extract_start")]
    pub start: NaiveDate,

    /// Last date pulled.
    #[serde(default = "default_extract_end")]
    pub end: NaiveDate,
}

fn default_extract_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default()
}

fn default_extract_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 12, 31).unwrap_or_default()
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            start: default_extract_start(),
            end: default_extract_end(),
        }
    }
}

impl ExtractConfig {
    /// Validated date range.
    pub fn date_range(&self) -> Result<DateRange> {
        Ok(DateRange::new(self.start, self.end)?)
    }
}

/// Factor series inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorsConfig {
    /// Five-factor CSV.
    #[serde(default = "default_five_factor_path")]
    pub five_factor_path: PathBuf,

    /// Momentum CSV.
    #[serde(default = "default_momentum_path")]
    pub momentum_path: PathBuf,

    /// First month used, `YYYYMM`.
    #[serde(default = "default_start_month")]
    pub start_month: i32,

    /// Last month used, `YYYYMM`.
    #[serde(default = "default_end_month")]
    pub end_month: i32,
}

fn default_five_factor_path() -> PathBuf {
    PathBuf::from("data").join(mfpanel_factors::series::FIVE_FACTOR_FILE)
}

fn default_momentum_path() -> PathBuf {
    PathBuf::from("data").join(mfpanel_factors::series::MOMENTUM_FILE)
}

fn default_start_month() -> i32 {
    MonthRange::default().start
}

fn default_end_month() -> i32 {
    MonthRange::default().end
}

impl Default for FactorsConfig {
    fn default() -> Self {
        Self {
            five_factor_path: default_five_factor_path(),
            momentum_path: default_momentum_path(),
            start_month: default_start_month(),
            end_month: default_end_month(),
        }
    }
}

impl FactorsConfig {
    /// Validated month range.
    pub fn month_range(&self) -> Result<MonthRange> {
        Ok(MonthRange::new(self.start_month, self.end_month)?)
    }
}

/// Eligibility thresholds of the fund-year universe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Year-end net assets must be strictly above this, in millions.
    #[serde(default = "default_net_assets_floor")]
    pub net_assets_floor: f64,

    /// Consistency ratio band, both ends exclusive.
    #[serde(default = "default_consistency_band")]
    pub consistency_band: (f64, f64),

    /// Equity-concentration band, both ends inclusive.
    #[serde(default = "default_equity_band")]
    pub equity_band: (f64, f64),
}

const fn default_net_assets_floor() -> f64 {
    1.0
}

const fn default_consistency_band() -> (f64, f64) {
    (0.5, 2.0)
}

const fn default_equity_band() -> (f64, f64) {
    (0.8, 1.05)
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            net_assets_floor: default_net_assets_floor(),
            consistency_band: default_consistency_band(),
            equity_band: default_equity_band(),
        }
    }
}

impl UniverseConfig {
    fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in [
            ("consistency_band", self.consistency_band),
            ("equity_band", self.equity_band),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(PipelineError::InvalidConfig(format!(
                    "universe.{} must be a finite (low, high) pair, got ({}, {})",
                    name, lo, hi
                )));
            }
        }
        if !self.net_assets_floor.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "universe.net_assets_floor must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// How holdings links are chosen for a holdings fund within a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingsLinkPolicy {
    /// Use the last valid link of the calendar year for every report of
    /// that year, including reports filed before the link was recorded.
    #[default]
    YearEndLookAhead,
}

/// Identifier resolution settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Holdings link policy.
    #[serde(default)]
    pub holdings_link_policy: HoldingsLinkPolicy,
}
