// crates/shopmetrics-cli/src/main.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use comfy_table::Table;
use shopmetrics_core::dialect::SqlDialect;
use shopmetrics_core::loader::BatchLoader;
use shopmetrics_core::record::CsvDirectory;
use shopmetrics_core::{db, schema};

/// A CLI for the shop analytics data pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Loads the CSV datasets into the database and builds indexes.
    Load {
        /// Directory holding the per-entity CSV files.
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
        /// Directory holding the SQL templates and index definitions.
        #[arg(short, long, default_value = "queries")]
        query_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://analytics.db?mode=rwc".to_string());

    match cli.command {
        Commands::Load { data_dir, query_dir } => {
            let dialect = SqlDialect::from_url(&database_url);
            let pool = db::connect(&database_url).await?;
            schema::ensure_schema(&pool, dialect).await?;

            let loader = BatchLoader::new(pool, CsvDirectory::new(data_dir), &query_dir, dialect);
            let report = loader.load_all().await?;

            let mut table = Table::new();
            table.set_header(vec!["entity", "mode", "records", "batches"]);
            for step in &report.steps {
                table.add_row(vec![
                    step.entity.to_string(),
                    step.mode.to_string(),
                    step.records.to_string(),
                    step.batches.to_string(),
                ]);
            }
            println!("{table}");

            for entity in &report.skipped {
                println!("  ⚠️  Skipped {entity}: no record source found");
            }
            if let Some(indexes) = report.indexes {
                println!(
                    "  Indexes: {} attempted, {} failed",
                    indexes.attempted, indexes.failed
                );
            }
            println!("\n✅ Loaded {} records.", report.total_records());
        }
    }

    Ok(())
}
