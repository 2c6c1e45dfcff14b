use chrono::{Duration, NaiveDate};
use ts_forecast::engine::BaselineEngine;
use ts_forecast::pipeline::ForecastPipeline;
use ts_forecast::table::{RawColumn, RawTable};
use ts_forecast::RunConfig;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("TS Forecast: Basic Forecasting Example");
    println!("======================================\n");

    println!("Creating sample data...");
    let table = create_sample_table()?;
    println!(
        "Sample data created: {} rows, {} columns\n",
        table.n_rows(),
        table.n_cols()
    );

    let config = RunConfig {
        horizon: 7,
        include_holidays: true,
        holiday_country: "US".to_string(),
        use_current_date: false,
        ..RunConfig::default()
    };

    println!("Running pipeline...");
    let mut pipeline = ForecastPipeline::new(config, BaselineEngine::new()).with_seed(42);
    let result = pipeline.run(&table);

    if let Some(error) = &result.error {
        println!("Run failed: {}", error);
    }
    if let Some(board) = &result.leaderboard {
        println!("Leaderboard:\n{}\n", board);
    }
    if let Some(predictions) = &result.predictions {
        println!("Predictions:\n{}\n", predictions);
    }
    if let Some(info) = &result.model_info {
        println!("Model info:\n{}\n", info);
    }
    println!("Log:\n{}", result.log);

    Ok(())
}

// Three stores with a weekly sales cycle
fn create_sample_table() -> Result<RawTable, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2023, 11, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("invalid start date")?;

    let mut stores = Vec::new();
    let mut dates = Vec::new();
    let mut sales = Vec::new();
    for (s, store) in ["north", "south", "east"].iter().enumerate() {
        for day in 0..60 {
            stores.push(Some(store.to_string()));
            dates.push(Some(start + Duration::days(day)));
            let weekly = [12.0, 10.0, 11.0, 13.0, 18.0, 25.0, 22.0][day as usize % 7];
            sales.push(Some(weekly * (1.0 + s as f64 * 0.5) + day as f64 * 0.1));
        }
    }

    Ok(RawTable::new(vec![
        RawColumn::text("item_id", stores),
        RawColumn::temporal("timestamp", dates),
        RawColumn::numeric("sales", sales),
    ])?)
}
