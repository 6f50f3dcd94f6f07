use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use survey_analytics::analytics::{compute_metrics, AggregateMetrics, TrendGranularity};
use survey_analytics::charts::NullRenderer;
use survey_analytics::export;
use survey_analytics::report;
use survey_analytics::service::DataService;
use survey_analytics::store::models::FilterCriteria;
use survey_analytics::store::ResultStore;
use survey_analytics::Dashboard;

#[derive(Parser)]
#[command(name = "survey-analytics")]
#[command(about = "Analytics and reporting over stored survey responses", long_about = None)]
struct Cli {
    /// Directory of per-response JSON result files
    #[arg(long, default_value = "data/results", env = "SURVEY_RESULTS_DIR")]
    data_dir: PathBuf,

    /// Restrict to one survey version ("all" disables the constraint)
    #[arg(long)]
    survey: Option<String>,

    /// Inclusive start date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Inclusive end date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Minimum percentage (inclusive)
    #[arg(long)]
    min_score: Option<f64>,

    /// Maximum percentage (inclusive)
    #[arg(long)]
    max_score: Option<f64>,

    /// Only responses with a recorded score
    #[arg(long)]
    completed_only: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print aggregate metrics for the filtered view
    Stats {
        #[arg(long, value_enum, default_value_t = GranularityArg::Day)]
        granularity: GranularityArg,
        /// Emit metrics as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List distinct survey versions
    Versions,
    /// Write an export of the filtered view
    Export {
        #[arg(long, value_enum)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write the deduplicated mailing list
    MailingList {
        /// Partition by survey version
        #[arg(long)]
        survey: Option<String>,
        #[arg(long, value_enum, default_value_t = ListFormat::Json)]
        format: ListFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write the delivery-ready address list
    EmailList {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    Day,
    Week,
    Month,
}

impl From<GranularityArg> for TrendGranularity {
    fn from(value: GranularityArg) -> Self {
        match value {
            GranularityArg::Day => TrendGranularity::Day,
            GranularityArg::Week => TrendGranularity::Week,
            GranularityArg::Month => TrendGranularity::Month,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
    Xlsx,
    Pdf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .try_init();

    let cli = Cli::parse();
    let criteria = build_criteria(&cli);

    let mut service = DataService::new(ResultStore::new(&cli.data_dir));
    service
        .load_data()
        .await
        .with_context(|| format!("failed to load result stores under {}", cli.data_dir.display()))?;
    service.set_filters(criteria);

    match cli.command {
        Commands::Stats { granularity, json } => {
            let mut dashboard =
                Dashboard::new(service, NullRenderer).with_granularity(granularity.into());
            dashboard
                .initialize()
                .await
                .context("chart initialization failed")?;
            let metrics = dashboard.update_dashboard().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                print_metrics(&metrics);
            }
        }
        Commands::Versions => {
            for version in service.survey_versions() {
                println!("{version}");
            }
        }
        Commands::Export { format, out } => {
            // Snapshot: a later filter change cannot affect this export.
            let records = service.filtered_data().to_vec();
            match format {
                ExportFormat::Csv => std::fs::write(&out, export::export_csv(&records)?)?,
                ExportFormat::Json => std::fs::write(&out, export::export_json(&records)?)?,
                ExportFormat::Xlsx => export::export_xlsx(&records, &out)?,
                ExportFormat::Pdf => {
                    let metrics = compute_metrics(&records);
                    report::export_pdf(&metrics, &records, &out)?;
                }
            }
            println!("Export written to {}.", out.display());
        }
        Commands::MailingList {
            survey,
            format,
            out,
        } => {
            let entries = export::generate_mailing_list(service.email_data(), survey.as_deref())?;
            let rendered = match format {
                ListFormat::Json => export::mailing_list_json(&entries)?,
                ListFormat::Csv => export::mailing_list_csv(&entries)?,
            };
            write_or_print(out, &rendered)?;
        }
        Commands::EmailList { out } => {
            let rendered = export::export_email_list(service.email_data())?;
            write_or_print(out, &rendered)?;
        }
    }

    Ok(())
}

fn build_criteria(cli: &Cli) -> FilterCriteria {
    FilterCriteria {
        survey_version: cli.survey.clone(),
        date_from: cli
            .from
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|instant| instant.and_utc()),
        date_to: cli
            .to
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .map(|instant| instant.and_utc()),
        score_min: cli.min_score,
        score_max: cli.max_score,
        completed_only: cli.completed_only,
    }
}

fn print_metrics(metrics: &AggregateMetrics) {
    println!("Responses: {}", metrics.total_responses);
    println!("Average score: {}", format_average(metrics.average_score));
    println!(
        "Average percentage: {}",
        format_average(metrics.average_percentage)
    );

    if !metrics.version_counts.is_empty() {
        println!("Survey versions:");
        for version in &metrics.version_counts {
            println!("- {}: {} responses", version.survey_title, version.count);
        }
    }

    if !metrics.category_averages.is_empty() {
        println!("Category averages:");
        for category in &metrics.category_averages {
            println!(
                "- {}: {:.2} across {} responses",
                category.category, category.average, category.respondent_count
            );
        }
    }

    if !metrics.score_distribution.is_empty() {
        println!("Score distribution:");
        for band in &metrics.score_distribution {
            println!("- {}: {} responses", band.range, band.count);
        }
    }

    if !metrics.completion_trend.is_empty() {
        println!("Completion trend:");
        for bucket in &metrics.completion_trend {
            println!("- {}: {} responses", bucket.bucket, bucket.count);
        }
    }

    if !metrics.geo_counts.is_empty() {
        println!("Geography:");
        for bucket in &metrics.geo_counts {
            println!("- {}: {} responses", bucket.location, bucket.count);
        }
    }
}

fn format_average(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{:.2}", value),
        None => "n/a".to_string(),
    }
}

fn write_or_print(out: Option<PathBuf>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(&path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Written to {}.", path.display());
        }
        None => println!("{contents}"),
    }
    Ok(())
}
