use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use lotledger_core::{Config, InMemoryRepository, LedgerError, Repository, Snapshot};

mod commands;
use commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON snapshot used as the in-memory repository's persistence file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let repo = load_repository(&cli.database)?;

    match &cli.command {
        Commands::Import { files } => {
            let named = files
                .first()
                .map(|f| f.display().to_string())
                .unwrap_or_else(|| "no files given".into());
            Err(LedgerError::OfxImportUnsupported(named).into())
        }
        Commands::Load { files } => {
            for file in files {
                let content = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
                let lots = lotledger_csv::import_lots(content.as_bytes())?;
                for lot in lots {
                    repo.insert_lot(lot);
                }
            }
            save_repository(&cli.database, &repo)
        }
        Commands::Calc { dtstart, dtend } => {
            let dtstart = parse_bound(dtstart.as_deref(), "dtstart", NaiveDateTime::MIN)?;
            let dtend = parse_bound(dtend.as_deref(), "dtend", NaiveDateTime::MAX)?;
            let config = Config::load_with_overrides();
            lotledger_core::driver::run(&repo, &config, dtstart, dtend)?;
            save_repository(&cli.database, &repo)
        }
        Commands::Lots { csv, dtasof, consolidate } => {
            let dtasof = parse_bound(dtasof.as_deref(), "dtasof", NaiveDateTime::MAX)?;
            let lots = repo.lots_asof(dtasof, None, None);
            let file = fs::File::create(csv).with_context(|| format!("creating {}", csv.display()))?;
            lotledger_csv::export_lots(file, &lots, *consolidate)?;
            Ok(())
        }
        Commands::Gains { csv, dtstart, dtend } => {
            let dtstart = parse_bound(dtstart.as_deref(), "dtstart", NaiveDateTime::MIN)?;
            let dtend = parse_bound(dtend.as_deref(), "dtend", NaiveDateTime::MAX)?;
            let file = fs::File::create(csv).with_context(|| format!("creating {}", csv.display()))?;
            lotledger_csv::export_gains(file, &repo, dtstart, dtend, None, None)?;
            Ok(())
        }
    }
}

fn parse_bound(raw: Option<&str>, field: &str, default: NaiveDateTime) -> Result<NaiveDateTime> {
    match raw {
        Some(raw) => Ok(lotledger_csv::parse_flexible_date(raw, 0, field)?),
        None => Ok(default),
    }
}

fn load_repository(database: &Option<PathBuf>) -> Result<InMemoryRepository> {
    let Some(path) = database else {
        return Ok(InMemoryRepository::new());
    };
    if !path.exists() {
        return Ok(InMemoryRepository::new());
    }
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;
    Ok(InMemoryRepository::from_snapshot(snapshot))
}

fn save_repository(database: &Option<PathBuf>, repo: &InMemoryRepository) -> Result<()> {
    let Some(path) = database else {
        return Ok(());
    };
    let snapshot = repo.to_snapshot();
    let json = serde_json::to_string_pretty(&snapshot)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
        )
        .init();
}
