//! # TS Forecast
//!
//! Preparation and reconstruction pipeline around a multi-series forecasting
//! engine.
//!
//! ## Features
//!
//! - Column role resolution (target, series id, timestamp) from priors, names and types
//! - Timestamp normalization through an auditable ladder of conversion strategies
//! - Series shaping so every series meets the engine's minimum length
//! - Optional public-holiday covariate for history and horizon
//! - Engines behind one trait: an in-process baseline ranker and an external command
//! - Forecast tables with calendar-correct future dates and decoded labels
//!
//! ## Quick Start
//!
//! ```no_run
//! use ts_forecast::data::DataLoader;
//! use ts_forecast::engine::BaselineEngine;
//! use ts_forecast::pipeline::ForecastPipeline;
//! use ts_forecast::config::RunConfig;
//!
//! let table = DataLoader::from_csv("sales.csv")?;
//! let config = RunConfig {
//!     horizon: 7,
//!     use_current_date: false,
//!     ..RunConfig::default()
//! };
//!
//! let mut pipeline = ForecastPipeline::new(config, BaselineEngine::new());
//! let result = pipeline.run(&table);
//! if let Some(predictions) = &result.predictions {
//!     println!("{}", predictions);
//! }
//! println!("{}", result.log);
//! # Ok::<(), ts_forecast::error::ForecastError>(())
//! ```

pub mod columns;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod frame;
pub mod holidays;
pub mod log;
pub mod mapping;
pub mod metrics;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod reconstruct;
pub mod shaping;
pub mod table;
pub mod temporal;

pub use crate::columns::{resolve, ColumnPriors, ResolvedColumns};
pub use crate::config::{HorizonCheck, Metric, ModelChoice, Preset, RunConfig};
pub use crate::data::DataLoader;
pub use crate::engine::{BaselineEngine, CommandEngine, ForecastAdapter, ForecastEngine};
pub use crate::error::{ForecastError, Result};
pub use crate::frame::{LongFrame, Observation};
pub use crate::log::RunLog;
pub use crate::pipeline::{ForecastPipeline, RunResult};
pub use crate::table::{ColumnKind, RawColumn, RawTable, Value};
