use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use football_probability_engine::api::Engine;
use football_probability_engine::ingestion;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();

    match command.as_str() {
        "ingest" => cmd_ingest(args.collect()),
        "train" => cmd_train(args.collect()),
        "update-stats" => cmd_update_stats(args.collect()),
        _ => {
            println!("usage: fpe <ingest|train|update-stats> [flags]");
            println!("  ingest --db=PATH --league=ID --file=CSV [--batch=ID]");
            println!("  train --db=PATH --league=ID [--window-years=N]");
            println!("  update-stats --db=PATH --league=ID");
            Ok(())
        }
    }
}

fn flag(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .find_map(|a| a.strip_prefix(&format!("--{name}=")))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fpe.sqlite3")
}

fn cmd_ingest(args: Vec<String>) -> Result<()> {
    let db_path = flag(&args, "db")
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    let league_id: i64 = flag(&args, "league")
        .context("--league=ID is required")?
        .parse()
        .context("--league must be an integer")?;
    let file = flag(&args, "file").context("--file=CSV is required")?;
    let batch_id =
        flag(&args, "batch").unwrap_or_else(|| format!("cli-{}", chrono::Utc::now().timestamp()));

    let mut conn = football_probability_engine::db::open_db(&db_path)?;
    let bytes = std::fs::read(&file).with_context(|| format!("read {file}"))?;
    let summary = ingestion::ingest_csv(
        &mut conn,
        league_id,
        &bytes,
        None,
        Some(&file),
        &batch_id,
        true,
    )?;

    println!(
        "processed={} inserted={} updated={} skipped={}",
        summary.processed, summary.inserted, summary.updated, summary.skipped
    );
    for warning in &summary.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}

fn cmd_train(args: Vec<String>) -> Result<()> {
    let db_path = flag(&args, "db")
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    let league_id: i64 = flag(&args, "league")
        .context("--league=ID is required")?
        .parse()
        .context("--league must be an integer")?;
    let window_years: Option<u32> = flag(&args, "window-years").and_then(|s| s.parse().ok());

    let engine = Engine::open(&db_path)?;
    let model_id = engine
        .train_poisson_model(league_id, window_years)
        .map_err(|e| anyhow!(e))?;
    println!("trained poisson model id={model_id}");
    Ok(())
}

fn cmd_update_stats(args: Vec<String>) -> Result<()> {
    let db_path = flag(&args, "db")
        .map(PathBuf::from)
        .unwrap_or_else(default_db_path);
    let league_id: i64 = flag(&args, "league")
        .context("--league=ID is required")?
        .parse()
        .context("--league must be an integer")?;

    let engine = Engine::open(&db_path)?;
    let rate = engine
        .update_league_statistics(league_id)
        .map_err(|e| anyhow!(e))?;
    println!("league {league_id} avg_draw_rate={rate:.4}");
    Ok(())
}
