//! Run configuration

use crate::columns::ColumnPriors;
use crate::error::{ForecastError, Result};
use calendar_math::FrequencyCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

/// Accepted forecast horizon lengths
pub const HORIZON_RANGE: RangeInclusive<usize> = 1..=365;

/// Accepted training time budgets in seconds
pub const TIME_LIMIT_RANGE: RangeInclusive<u64> = 10..=86_400;

/// Evaluation metric used to rank candidate models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Metric {
    #[default]
    Mae,
    Mape,
    Mse,
    Rmse,
    Wql,
}

impl Metric {
    pub const ALL: [Metric; 5] = [Metric::Mae, Metric::Mape, Metric::Mse, Metric::Rmse, Metric::Wql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Mae => "MAE",
            Metric::Mape => "MAPE",
            Metric::Mse => "MSE",
            Metric::Rmse => "RMSE",
            Metric::Wql => "WQL",
        }
    }
}

/// Quality preset controlling how many candidates are trained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    BestQuality,
    HighQuality,
    MediumQuality,
    FastTraining,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::BestQuality,
        Preset::HighQuality,
        Preset::MediumQuality,
        Preset::FastTraining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::BestQuality => "best_quality",
            Preset::HighQuality => "high_quality",
            Preset::MediumQuality => "medium_quality",
            Preset::FastTraining => "fast_training",
        }
    }
}

/// Model family requested by the user; `Auto` lets the engine choose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "DirectTabular")]
    DirectTabular,
    #[serde(rename = "ETS")]
    Ets,
    #[serde(rename = "DeepAR")]
    DeepAr,
    #[serde(rename = "MLP")]
    Mlp,
    #[serde(rename = "TemporalFusionTransformer")]
    TemporalFusionTransformer,
    #[serde(rename = "TiDE")]
    Tide,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 7] = [
        ModelChoice::Auto,
        ModelChoice::DirectTabular,
        ModelChoice::Ets,
        ModelChoice::DeepAr,
        ModelChoice::Mlp,
        ModelChoice::TemporalFusionTransformer,
        ModelChoice::Tide,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Auto => "auto",
            ModelChoice::DirectTabular => "DirectTabular",
            ModelChoice::Ets => "ETS",
            ModelChoice::DeepAr => "DeepAR",
            ModelChoice::Mlp => "MLP",
            ModelChoice::TemporalFusionTransformer => "TemporalFusionTransformer",
            ModelChoice::Tide => "TiDE",
        }
    }
}

/// Either detect the frequency from the data or use a fixed code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FrequencySetting {
    #[default]
    Auto,
    Fixed(FrequencyCode),
}

macro_rules! string_enum {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ForecastError;

            fn from_str(s: &str) -> Result<Self> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        ForecastError::Configuration(format!(
                            "unknown {} '{}'",
                            stringify!($ty),
                            s
                        ))
                    })
            }
        }
    };
}

string_enum!(Metric);
string_enum!(Preset);
string_enum!(ModelChoice);

impl fmt::Display for FrequencySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencySetting::Auto => f.write_str("auto"),
            FrequencySetting::Fixed(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for FrequencySetting {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(FrequencySetting::Auto);
        }
        Ok(FrequencySetting::Fixed(s.parse::<FrequencyCode>()?))
    }
}

impl TryFrom<String> for FrequencySetting {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FrequencySetting> for String {
    fn from(value: FrequencySetting) -> Self {
        value.to_string()
    }
}

/// Thresholds used when reshaping series for training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingPolicy {
    /// A single series longer than this is split
    pub split_threshold: usize,
    /// Target length of each split slice
    pub min_points_per_series: usize,
    /// Upper bound on split slices
    pub max_synthetic_series: usize,
    /// Series shorter than this are dropped after de-duplication
    pub training_min: usize,
}

impl Default for ShapingPolicy {
    fn default() -> Self {
        Self {
            split_threshold: 50,
            min_points_per_series: 35,
            max_synthetic_series: 3,
            training_min: 10,
        }
    }
}

/// Year range and minimum span for timestamps to be trusted as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityWindow {
    pub min_year: i32,
    pub max_year: i32,
    pub min_span_days: i64,
}

impl Default for PlausibilityWindow {
    fn default() -> Self {
        Self {
            min_year: 2020,
            max_year: 2030,
            min_span_days: 30,
        }
    }
}

/// User-adjustable settings read once at the start of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of future steps to forecast
    pub horizon: usize,
    /// Wall-clock training budget in seconds
    pub time_limit_secs: u64,
    /// Evaluation metric
    pub metric: Metric,
    /// Quality preset
    pub preset: Preset,
    /// Model family
    pub model: ModelChoice,
    /// Preferred target column
    pub target_column: Option<String>,
    /// Preferred series id column
    pub id_column: Option<String>,
    /// Preferred timestamp column
    pub timestamp_column: Option<String>,
    /// Add the holiday covariate
    pub include_holidays: bool,
    /// Country whose holidays are used
    pub holiday_country: String,
    /// Replace timestamps with a sequence ending today
    pub use_current_date: bool,
    /// Frequency selection
    pub frequency: FrequencySetting,
    /// Series shaping thresholds
    pub shaping: ShapingPolicy,
    /// Timestamp plausibility bounds
    pub plausibility: PlausibilityWindow,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            time_limit_secs: 60,
            metric: Metric::default(),
            preset: Preset::default(),
            model: ModelChoice::default(),
            target_column: Some("sales".to_string()),
            id_column: Some("item_id".to_string()),
            timestamp_column: Some("timestamp".to_string()),
            include_holidays: false,
            holiday_country: "RU".to_string(),
            use_current_date: true,
            frequency: FrequencySetting::default(),
            shaping: ShapingPolicy::default(),
            plausibility: PlausibilityWindow::default(),
        }
    }
}

impl RunConfig {
    /// Range-check the numeric settings
    pub fn validate(&self) -> Result<()> {
        if !HORIZON_RANGE.contains(&self.horizon) {
            return Err(ForecastError::Configuration(format!(
                "horizon {} outside {}..={}",
                self.horizon,
                HORIZON_RANGE.start(),
                HORIZON_RANGE.end()
            )));
        }
        if !TIME_LIMIT_RANGE.contains(&self.time_limit_secs) {
            return Err(ForecastError::Configuration(format!(
                "time limit {}s outside {}..={}",
                self.time_limit_secs,
                TIME_LIMIT_RANGE.start(),
                TIME_LIMIT_RANGE.end()
            )));
        }
        if self.shaping.min_points_per_series == 0 || self.shaping.max_synthetic_series == 0 {
            return Err(ForecastError::Configuration(
                "shaping policy needs non-zero slice length and slice count".to_string(),
            ));
        }
        if self.plausibility.min_year > self.plausibility.max_year {
            return Err(ForecastError::Configuration(format!(
                "plausibility window {}..{} is empty",
                self.plausibility.min_year, self.plausibility.max_year
            )));
        }
        if self.include_holidays && self.holiday_country.trim().is_empty() {
            return Err(ForecastError::Configuration(
                "holiday country must be set when holidays are enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Column choices handed to the role resolver
    pub fn column_priors(&self) -> ColumnPriors {
        ColumnPriors {
            target: self.target_column.clone(),
            id: self.id_column.clone(),
            timestamp: self.timestamp_column.clone(),
        }
    }

    /// Frequency label for the model-info table
    pub fn frequency_label(&self, resolved: FrequencyCode) -> String {
        match self.frequency {
            FrequencySetting::Auto => format!("{} (auto)", resolved.display_name()),
            FrequencySetting::Fixed(code) => code.display_name(),
        }
    }
}

/// Longest horizon the data supports for `n` observations
pub fn max_allowed_horizon(n: usize) -> usize {
    let limit = if n <= 10 {
        n / 3
    } else if n <= 30 {
        (n - 1) / 2
    } else {
        (n - 3) / 2
    };
    limit.max(1)
}

/// Requested horizon compared against [`max_allowed_horizon`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonCheck {
    pub max_allowed: usize,
    pub requested: usize,
    pub within_limit: bool,
}

impl HorizonCheck {
    pub fn evaluate(requested: usize, n_observations: usize) -> Self {
        let max_allowed = max_allowed_horizon(n_observations);
        Self {
            max_allowed,
            requested,
            within_limit: requested <= max_allowed,
        }
    }
}
