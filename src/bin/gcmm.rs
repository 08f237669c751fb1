//! GCMM command-line tool
//!
//! Loads a maturity-assessment spreadsheet into a store and runs one
//! operation on it: summarize, evaluate an objective, export, or render the
//! narrative report.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcmm_toolkit::bulk::BulkPayload;
use gcmm_toolkit::report::REPORT_FILENAME;
use gcmm_toolkit::xlsx_export::{EXPORT_FILENAME, TEMPLATE_FILENAME};
use gcmm_toolkit::{EvaluationUpdate, SchemaVariant, Store, ToolkitConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gcmm")]
#[command(about = "Load, score and export GCMM maturity assessments")]
struct Cli {
    /// Spreadsheet layout: evaluation, profile or french
    #[arg(long, global = true, env = "GCMM_SCHEMA", default_value = "profile")]
    schema: SchemaVariant,

    /// Title used by the DOCX report
    #[arg(long, global = true, env = "GCMM_REPORT_TITLE")]
    title: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Xlsx,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a spreadsheet and print its hierarchy and scores
    Inspect {
        /// Input .xlsx or .csv file
        input: PathBuf,

        /// Dump the whole dataset as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// Update one objective, then write the spreadsheet export.
    ///
    /// Use --evaluation for the evaluation layouts, --profile/--target for
    /// the profile layout.
    Evaluate {
        /// Input .xlsx or .csv file
        input: PathBuf,

        /// Objective id (first match is updated)
        #[arg(long)]
        objective: String,

        #[arg(long, conflicts_with_all = ["profile", "target"])]
        evaluation: Option<f64>,

        #[arg(long)]
        profile: Option<i64>,

        /// Target profile (defaults to the profile)
        #[arg(long)]
        target: Option<i64>,

        #[arg(long)]
        comment: Option<String>,

        /// Output .xlsx file
        #[arg(short, long, default_value = EXPORT_FILENAME)]
        output: PathBuf,
    },

    /// Export the loaded dataset as a spreadsheet
    Export {
        /// Input .xlsx or .csv file
        input: PathBuf,

        #[arg(long, value_enum, default_value = "xlsx")]
        format: ExportFormat,

        /// Only export this axis
        #[arg(long)]
        axis: Option<i64>,

        /// Output file (default: GCMM_Export.xlsx or GCMM_Export.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render the narrative DOCX report
    Report {
        /// Input .xlsx or .csv file
        input: PathBuf,

        #[arg(short, long, default_value = REPORT_FILENAME)]
        output: PathBuf,
    },

    /// Write a blank upload template for the selected layout
    Template {
        #[arg(short, long, default_value = TEMPLATE_FILENAME)]
        output: PathBuf,
    },

    /// Build the dataset from a JSON hierarchy and write the spreadsheet export
    BulkSave {
        /// JSON payload: {"axes": [{"id", "name", "domains": [...]}]}
        payload: PathBuf,

        #[arg(short, long, default_value = EXPORT_FILENAME)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ToolkitConfig::default().with_variant(cli.schema);
    if let Some(title) = cli.title {
        config = config.with_report_title(title);
    }
    let store = Store::new(config);

    match cli.command {
        Commands::Inspect { input, json } => {
            load(&store, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&store.read()?)?);
            } else {
                print_summary(&store)?;
            }
        }
        Commands::Evaluate {
            input,
            objective,
            evaluation,
            profile,
            target,
            comment,
            output,
        } => {
            load(&store, &input)?;
            let update = match (evaluation, profile) {
                (Some(evaluation), _) => EvaluationUpdate::Score {
                    evaluation,
                    comment,
                },
                (None, Some(profile)) => EvaluationUpdate::Profile {
                    profile,
                    target_profile: target.unwrap_or(profile),
                    comment,
                },
                (None, None) => bail!("Pass --evaluation or --profile"),
            };
            let outcome = store
                .evaluate(&objective, &update)
                .with_context(|| format!("Failed to evaluate objective {}", objective))?;
            println!(
                "Updated {} ({}); global score {:.1}",
                outcome.objective.id, outcome.objective.name, outcome.global_score
            );
            write(&output, &store.export_xlsx(None)?)?;
        }
        Commands::Export {
            input,
            format,
            axis,
            output,
        } => {
            load(&store, &input)?;
            let (bytes, default_name) = match format {
                ExportFormat::Xlsx => (store.export_xlsx(axis)?, EXPORT_FILENAME),
                ExportFormat::Csv => (store.export_csv(axis)?, "GCMM_Export.csv"),
            };
            write(&output.unwrap_or_else(|| PathBuf::from(default_name)), &bytes)?;
        }
        Commands::Report { input, output } => {
            load(&store, &input)?;
            write(&output, &store.export_report()?)?;
        }
        Commands::Template { output } => {
            write(&output, &store.template()?)?;
        }
        Commands::BulkSave { payload, output } => {
            let text = std::fs::read_to_string(&payload)
                .with_context(|| format!("Failed to read {}", payload.display()))?;
            let summary = store.bulk_save(&BulkPayload::from_json(&text)?)?;
            println!(
                "Saved {} axes, {} domains, {} objectives",
                summary.axes, summary.domains, summary.objectives
            );
            write(&output, &store.export_xlsx(None)?)?;
        }
    }

    Ok(())
}

fn load(store: &Store, input: &Path) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary = store
        .upload(&filename, &bytes)
        .with_context(|| format!("Failed to load {}", input.display()))?;
    eprintln!(
        "Loaded {}: {} rows, {} axes, {} domains, {} objectives",
        input.display(),
        summary.processed_rows,
        summary.axes,
        summary.domains,
        summary.objectives
    );
    Ok(())
}

fn write(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn print_summary(store: &Store) -> Result<()> {
    let dataset = store.snapshot()?;
    println!("Schema: {}", store.config().variant);
    println!("Global score: {:.1} / 5", dataset.global_score);
    println!();
    for axis in &dataset.axes {
        println!("Axe {}: {}  [{:.2}]  {}", axis.id, axis.name, axis.score, axis.color);
        for domain in dataset.domains_of(axis.id) {
            let count = dataset.objectives_of(domain).count();
            println!(
                "  {:<8} {:<40} {:>5.2}  ({} objectives)",
                domain.id, domain.name, domain.score, count
            );
        }
    }
    Ok(())
}
