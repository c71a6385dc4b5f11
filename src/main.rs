use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

mod chart;
mod coordinator;
mod db;
mod error;
mod models;
mod report;
mod stats;

use coordinator::StatsCoordinator;
use db::{PgStore, RecordStore};
use models::{ClassName, FilterSpec, GradeStatistics, Subject};
use report::{ReportContext, ReportFormat};

#[derive(Parser)]
#[command(name = "gradebook-stats")]
#[command(about = "Statistics aggregation engine for student grade records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Batch-import grade rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the classes and subjects available for filtering
    Dimensions,
    /// Aggregate statistics for a filter and print the summary line
    Stats {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        subject: Option<String>,
    },
    /// Render a statistics report to an HTML or CSV file
    Report {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value = "html")]
        format: String,
        #[arg(long, default_value = "report.html")]
        out: PathBuf,
    },
    /// Emit chart-ready series for the filter as JSON
    Chart {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        subject: Option<String>,
    },
}

fn build_filter(
    name: Option<String>,
    class: Option<String>,
    subject: Option<String>,
) -> anyhow::Result<FilterSpec> {
    let class_name = class
        .map(|value| {
            ClassName::parse(&value)
                .with_context(|| format!("unknown class: {value} (expected \"Class A\" or \"Class B\")"))
        })
        .transpose()?;
    let subject = subject
        .map(|value| {
            Subject::parse(&value)
                .with_context(|| format!("unknown subject: {value} (expected Math, Chinese, or English)"))
        })
        .transpose()?;
    let name_contains = name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    Ok(FilterSpec {
        name_contains,
        class_name,
        subject,
    })
}

fn parse_format(value: &str) -> anyhow::Result<ReportFormat> {
    match value {
        "html" => Ok(ReportFormat::Html),
        "csv" => Ok(ReportFormat::Csv),
        other => anyhow::bail!("unsupported format: {other} (use html or csv)"),
    }
}

/// Submits one request through the background worker and waits for its
/// delivery. The filter comparison is where a caller juggling multiple
/// submissions would discard stale results; with a single submission it
/// always matches.
async fn aggregate_via_worker(pool: &PgPool, filter: &FilterSpec) -> anyhow::Result<GradeStatistics> {
    let store = Arc::new(PgStore::new(pool.clone()));
    let (coordinator, mut deliveries) = StatsCoordinator::spawn(store);

    let submitted = coordinator.request(filter.clone());
    let delivery = deliveries
        .recv()
        .await
        .context("stats worker exited without delivering")?;
    coordinator.shutdown().await;

    anyhow::ensure!(
        delivery.request_id == submitted && delivery.filter == *filter,
        "received a delivery for a different request"
    );
    Ok(delivery.outcome?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to the grade store Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let outcome = db::import_csv(&pool, &csv).await?;
            println!(
                "Import finished: {} inserted, {} failed.",
                outcome.inserted, outcome.failed
            );
            for error in &outcome.errors {
                eprintln!("  {error}");
            }
        }
        Commands::Dimensions => {
            let store = PgStore::new(pool);
            let classes = store.distinct_classes().await?;
            let subjects = store.distinct_subjects().await?;
            println!("Classes: {}", classes.join(", "));
            println!("Subjects: {}", subjects.join(", "));
        }
        Commands::Stats { name, class, subject } => {
            let filter = build_filter(name, class, subject)?;
            let stats = aggregate_via_worker(&pool, &filter).await?;
            println!(
                "Statistics: {} records | average {:.1} | pass rate {:.1}% | excellence rate {:.1}%",
                stats.total_count, stats.average, stats.pass_rate, stats.excellent_rate
            );
        }
        Commands::Report {
            name,
            class,
            subject,
            format,
            out,
        } => {
            let format = parse_format(&format)?;
            let filter = build_filter(name, class, subject)?;
            let stats = aggregate_via_worker(&pool, &filter).await?;

            let ctx = ReportContext {
                generated_at: chrono::Local::now().naive_local(),
                class_label: filter.class_label().to_string(),
                subject_label: filter.subject_label().to_string(),
            };
            let text = report::render(&stats, &ctx, format);
            report::export_report(&text, &out)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Chart { name, class, subject } => {
            let filter = build_filter(name, class, subject)?;
            let records = db::fetch_records(&pool, &filter).await?;

            // Chart mode mirrors the filter the way the table view does:
            // a name filter means an individual trend, a class filter a
            // class-average trend, otherwise the overall distribution.
            let output = if filter.name_contains.is_some() {
                serde_json::json!({
                    "kind": "student_trend",
                    "series": chart::student_trend_series(&records),
                })
            } else if filter.class_name.is_some() {
                serde_json::json!({
                    "kind": "class_trend",
                    "series": chart::class_trend_series(&records),
                })
            } else {
                let stats = stats::compute(&records, filter.subject_is_pinned());
                serde_json::json!({
                    "kind": "distribution",
                    "slices": chart::distribution_slices(&stats),
                })
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
