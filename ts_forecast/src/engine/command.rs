//! Engine backed by an external program speaking a file-based protocol.
//!
//! Per run the engine writes `train.csv` and `request.json` into the scratch
//! directory and calls `<program> fit <dir>`. Prediction optionally writes
//! `known_covariates.csv`, calls `<program> predict <dir>` and reads back
//! `predictions.csv`. A `leaderboard.csv` is picked up when the program
//! leaves one behind.
//!
//! `predictions.csv` with `item_id` and `timestamp` columns is read as an
//! indexed result; anything else is kept as a flat table.

use crate::engine::{
    BestModel, EngineFrame, EnginePredictions, FlatColumn, FlatPredictions, ForecastEngine,
    ForecastRequest, KnownCovariates, SeriesForecast,
};
use crate::error::{ForecastError, Result};
use crate::temporal::parse_timestamp_text;
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

pub const TRAIN_FILE: &str = "train.csv";
pub const REQUEST_FILE: &str = "request.json";
pub const KNOWN_COVARIATES_FILE: &str = "known_covariates.csv";
pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const LEADERBOARD_FILE: &str = "leaderboard.csv";

/// Index column names of an indexed `predictions.csv`
pub const ITEM_ID: &str = "item_id";
pub const TIMESTAMP: &str = "timestamp";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// External-process forecasting engine
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    leaderboard: Option<DataFrame>,
    best: Option<BestModel>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            leaderboard: None,
            best: None,
        }
    }

    /// Arguments placed before the stage name
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    fn invoke(&self, stage: &str, dir: &Path) -> Result<()> {
        info!(program = %self.program.display(), stage, "invoking engine");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(stage)
            .arg(dir)
            .output()?;
        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "engine output");
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("observations") {
            return Err(ForecastError::insufficient(stderr));
        }
        Err(ForecastError::Training(format!(
            "{} {} exited with {}: {}",
            self.program.display(),
            stage,
            output.status,
            stderr
        )))
    }

    fn refresh_leaderboard(&mut self, dir: &Path) -> Result<()> {
        let path = dir.join(LEADERBOARD_FILE);
        if !path.exists() {
            return Ok(());
        }
        let board = CsvReader::new(File::open(&path)?)
            .infer_schema(Some(100))
            .has_header(true)
            .finish()?;
        self.best = best_from_leaderboard(&board)?;
        self.leaderboard = Some(board);
        Ok(())
    }
}

/// Write the training frame in long format
pub fn write_train_csv(frame: &EngineFrame, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![
        frame.id_column().to_string(),
        frame.timestamp_column().to_string(),
        frame.target_column().to_string(),
    ];
    header.extend(frame.covariate_names().iter().cloned());
    writer.write_record(&header)?;

    for series in frame.series() {
        for (i, ts) in series.timestamps.iter().enumerate() {
            let mut record = vec![
                series.key.clone(),
                ts.format(TIMESTAMP_FORMAT).to_string(),
                series.target[i].to_string(),
            ];
            record.extend(
                series
                    .covariates
                    .iter()
                    .map(|c| c.get(i).copied().unwrap_or(f64::NAN).to_string()),
            );
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Write future covariates, one row per (series, timestamp)
pub fn write_known_covariates(
    known: &KnownCovariates,
    id_column: &str,
    timestamp_column: &str,
    path: &Path,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec![id_column.to_string(), timestamp_column.to_string()];
    header.extend(known.names.iter().cloned());
    writer.write_record(&header)?;

    for series in &known.series {
        for (i, ts) in series.timestamps.iter().enumerate() {
            let mut record = vec![series.key.clone(), ts.format(TIMESTAMP_FORMAT).to_string()];
            record.extend(
                series
                    .values
                    .iter()
                    .map(|v| v.get(i).copied().unwrap_or(0.0).to_string()),
            );
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Parse `predictions.csv` into indexed or flat predictions
pub fn read_predictions(path: &Path) -> Result<EnginePredictions> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        records.push(record?.iter().map(str::to_string).collect());
    }

    let id_pos = headers.iter().position(|h| h == ITEM_ID);
    let ts_pos = headers.iter().position(|h| h == TIMESTAMP);
    if let (Some(id_pos), Some(ts_pos)) = (id_pos, ts_pos) {
        if let Some(indexed) = indexed_predictions(&headers, &records, id_pos, ts_pos) {
            return Ok(EnginePredictions::Indexed(indexed));
        }
        debug!("prediction timestamps did not parse, keeping flat layout");
    }
    Ok(EnginePredictions::Flat(flat_predictions(&headers, &records)))
}

fn parse_number(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

fn indexed_predictions(
    headers: &[String],
    records: &[Vec<String>],
    id_pos: usize,
    ts_pos: usize,
) -> Option<Vec<SeriesForecast>> {
    let value_cols: Vec<usize> = (0..headers.len())
        .filter(|i| *i != id_pos && *i != ts_pos)
        .collect();
    let mut out: Vec<SeriesForecast> = Vec::new();
    for record in records {
        let key = record.get(id_pos)?.clone();
        let ts: NaiveDateTime = parse_timestamp_text(record.get(ts_pos)?)?;
        let position = match out.iter().position(|s| s.key == key) {
            Some(p) => p,
            None => {
                out.push(SeriesForecast {
                    key,
                    timestamps: Vec::new(),
                    columns: value_cols
                        .iter()
                        .map(|i| (headers[*i].clone(), Vec::new()))
                        .collect(),
                });
                out.len() - 1
            }
        };
        let series = &mut out[position];
        series.timestamps.push(ts);
        for (slot, col) in value_cols.iter().enumerate() {
            let cell = record.get(*col).map(String::as_str).unwrap_or("");
            series.columns[slot].1.push(parse_number(cell));
        }
    }
    Some(out)
}

fn flat_predictions(headers: &[String], records: &[Vec<String>]) -> FlatPredictions {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<&str> = records
                .iter()
                .map(|r| r.get(i).map(String::as_str).unwrap_or(""))
                .collect();
            let numeric = cells
                .iter()
                .all(|c| c.trim().is_empty() || c.trim().parse::<f64>().is_ok());
            let column = if numeric {
                FlatColumn::Number(cells.iter().map(|c| parse_number(c)).collect())
            } else {
                FlatColumn::Text(cells.iter().map(|c| c.to_string()).collect())
            };
            (name.clone(), column)
        })
        .collect();
    FlatPredictions { columns }
}

/// Row with the highest `score_val`, if the table has `model` and `score_val`
pub fn best_from_leaderboard(board: &DataFrame) -> Result<Option<BestModel>> {
    let (Ok(models), Ok(scores)) = (board.column("model"), board.column("score_val")) else {
        return Ok(None);
    };
    let models = models.cast(&DataType::Utf8)?;
    let scores = scores.cast(&DataType::Float64)?;
    let scores = scores.f64()?;

    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        if let Some(score) = score {
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
    }
    Ok(best.and_then(|(i, score)| {
        models.utf8().ok()?.get(i).map(|name| BestModel {
            name: name.to_string(),
            score,
        })
    }))
}

impl ForecastEngine for CommandEngine {
    fn name(&self) -> &str {
        "command"
    }

    fn fit(&mut self, frame: &EngineFrame, request: &ForecastRequest, scratch: &Path) -> Result<()> {
        self.leaderboard = None;
        self.best = None;
        write_train_csv(frame, &scratch.join(TRAIN_FILE))?;
        serde_json::to_writer_pretty(File::create(scratch.join(REQUEST_FILE))?, request)?;

        self.invoke("fit", scratch)?;
        self.workdir = Some(scratch.to_path_buf());
        self.refresh_leaderboard(scratch)
    }

    fn predict(
        &mut self,
        frame: &EngineFrame,
        known: Option<&KnownCovariates>,
    ) -> Result<EnginePredictions> {
        let dir = self
            .workdir
            .clone()
            .ok_or_else(|| ForecastError::Training("predict called before fit".to_string()))?;

        let known_path = dir.join(KNOWN_COVARIATES_FILE);
        match known {
            Some(known) => write_known_covariates(
                known,
                frame.id_column(),
                frame.timestamp_column(),
                &known_path,
            )?,
            None if known_path.exists() => std::fs::remove_file(&known_path)?,
            None => {}
        }

        self.invoke("predict", &dir)?;
        let predictions = read_predictions(&dir.join(PREDICTIONS_FILE))?;
        if self.leaderboard.is_none() {
            self.refresh_leaderboard(&dir)?;
        }
        Ok(predictions)
    }

    fn leaderboard(&self) -> Result<DataFrame> {
        Ok(self.leaderboard.clone().unwrap_or_default())
    }

    fn best_model(&self) -> Option<BestModel> {
        self.best.clone()
    }
}
