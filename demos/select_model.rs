//! End-to-end selection of an emissions forecasting model.
//!
//! Run with: cargo run --example select_model -- [feed.json] [config.toml]
//!
//! Without arguments a synthetic 10-minute generation feed is used. Set
//! `RUST_LOG=emissions_forecast=debug` to follow every grid-search combination.

use chrono::{Duration, TimeZone, Utc};
use emissions_forecast::config::ForecastConfig;
use emissions_forecast::ingest::{emissions_frame, parse_generation_feed, RawObservation};
use emissions_forecast::models::Forecaster;
use emissions_forecast::pipeline::prepare;
use emissions_forecast::selection::ModelSelector;
use emissions_forecast::utils::ModelEvaluation;
use tracing_subscriber::EnvFilter;

/// Ten days of 10-minute observations with a daily coal and gas cycle.
fn synthetic_feed() -> Vec<RawObservation> {
    let base = Utc.with_ymd_and_hms(2020, 10, 15, 0, 0, 0).unwrap();
    (0..10 * 24 * 6)
        .map(|i| {
            let ts = base + Duration::minutes(10 * i as i64);
            let phase = 2.0 * std::f64::consts::PI * i as f64 / 144.0;
            RawObservation::new(ts.format("%Y-%m-%d %H:%M").to_string())
                .with_source("aut", 110.0)
                .with_source("car", 450.0 + 80.0 * phase.sin())
                .with_source("cc", 4200.0 + 900.0 * (phase - 0.6).sin())
                .with_source("cogenResto", 1800.0)
                .with_source("gf", 0.0)
                .with_source("termRenov", 300.0 + 20.0 * (i as f64 * 0.13).cos())
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.get(1) {
        Some(path) => ForecastConfig::load(path)?,
        None => ForecastConfig::default(),
    };
    let observations = match args.first() {
        Some(path) => parse_generation_feed(&std::fs::read_to_string(path)?)?,
        None => synthetic_feed(),
    };
    println!("=== Emissions model selection ===\n");
    println!("Observations: {}", observations.len());

    // 1. Emissions from the generation mix, then cleaning and regularization
    let frame = emissions_frame(
        &observations,
        &config.emissions,
        &config.preparation.time_column,
        &config.preparation.value_column,
    )?;
    let prepared = prepare(frame, &config.preparation)?;
    println!(
        "Prepared series: {} points, lambda = {:?}",
        prepared.series.len(),
        prepared.lambda
    );

    // 2. Grid search per family and selection
    let selection = ModelSelector::from_config(prepared.series.clone(), &config).select()?;
    println!("\n--- Hold-out MAE per family ---");
    for (name, mae) in &selection.summary.families {
        println!("  {name:<8} {mae:.6}");
    }
    println!("Winner: {}", selection.summary.winner);
    for (key, value) in &selection.summary.winner_info.parameters {
        println!("  {key} = {value}");
    }

    // 3. Backtest the winner
    let mut model = selection.model;
    let report = ModelEvaluation::new(&prepared.series).evaluate(&mut model, &config.evaluation);
    match report {
        Ok(report) => {
            println!("\n--- Cross-validation ({} folds) ---", report.n_folds());
            println!("  mean MAE:  {:.6}", report.mean_mae());
            println!("  mean RMSE: {:.6}", report.mean_rmse());
            match report.mean_mape() {
                Some(mape) => println!("  mean MAPE: {mape:.4}%"),
                None => println!("  mean MAPE: undefined"),
            }
        }
        Err(e) => println!("\nCross-validation skipped: {e}"),
    }

    // 4. Forecast the next two days in emissions units
    model.fit(&prepared.series)?;
    let forecast = model.predict_default()?;
    let point = prepared.to_original_scale(forecast.point());
    println!("\n--- Forecast ---");
    if let Some(timestamps) = forecast.timestamps() {
        for (ts, value) in timestamps.iter().zip(&point).take(6) {
            println!("  {}  {:.1}", ts.format("%Y-%m-%d %H:%M"), value);
        }
    }
    println!("  ... {} steps in total", point.len());

    Ok(())
}
