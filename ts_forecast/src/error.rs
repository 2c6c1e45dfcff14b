//! Error types for the ts_forecast crate

use calendar_math::CalendarError;
use thiserror::Error;

/// Custom error types for the ts_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The input table has no columns or no rows
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A required role could not be bound to a column
    #[error("Missing {role} column '{name}'")]
    MissingColumn { role: String, name: String },

    /// Target or timestamp values could not be converted
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine refused to train on too-short series
    #[error("Insufficient observations: {message}")]
    InsufficientObservations {
        /// Minimum observation count when the engine reported one
        required: Option<usize>,
        message: String,
    },

    /// Any other training or prediction failure
    #[error("Training error: {0}")]
    Training(String),

    /// The selected model is not offered by the engine
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Holiday feature could not be built
    #[error("Holiday error: {0}")]
    Holiday(String),

    /// Engine output had an unexpected shape
    #[error("Reconstruction error: {0}")]
    Reconstruction(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from calendar arithmetic
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<polars::prelude::PolarsError> for ForecastError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

impl ForecastError {
    /// Build an insufficient-observations error, extracting the minimum count
    /// from messages of the form `must have >= N observations`
    pub fn insufficient(message: impl Into<String>) -> Self {
        let message = message.into();
        ForecastError::InsufficientObservations {
            required: required_observations(&message),
            message,
        }
    }

    /// Errors caused by the input table itself
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ForecastError::EmptyInput(_)
                | ForecastError::MissingColumn { .. }
                | ForecastError::Conversion(_)
        )
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ForecastError::Configuration(_) | ForecastError::UnsupportedModel(_)
        )
    }

    /// Errors raised while fitting or predicting
    pub fn is_training_error(&self) -> bool {
        matches!(
            self,
            ForecastError::InsufficientObservations { .. } | ForecastError::Training(_)
        )
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ForecastError::InsufficientObservations {
                required: Some(required),
                ..
            } => format!(
                "Not enough data to train: every series needs at least {} observations. \
                 Add more history or reduce the forecast horizon.",
                required
            ),
            ForecastError::InsufficientObservations { required: None, .. } => {
                "Not enough data to train: some series are too short. \
                 Add more history or reduce the forecast horizon."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Parse `N` out of `... must have >= N observations ...`
pub fn required_observations(message: &str) -> Option<usize> {
    const MARKER: &str = "must have >= ";
    let start = message.find(MARKER)? + MARKER.len();
    let rest = &message[start..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !rest[digits.len()..].trim_start().starts_with("observations") {
        return None;
    }
    digits.parse().ok()
}
