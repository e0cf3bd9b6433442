//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use sync_lib::sync::{RecordAction, SyncReport, VerificationSummary};
use sync_lib::ResourceRecord;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for the per-record outcome table
#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "#")]
    position: String,
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "Result")]
    action: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "GPUs")]
    gpus: String,
}

/// Row for the normalized record table
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Container")]
    name: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Image")]
    image: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
}

/// Row for verification count tables
#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Count")]
    count: u64,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the outcome of a sync run
pub fn print_report(report: &SyncReport, format: OutputFormat) -> Result<()> {
    if let OutputFormat::Json = format {
        return print_json(report);
    }

    println!("{}", "Sync Results".bold());
    println!("{}", "=".repeat(60));

    if report.outcomes.is_empty() {
        print_warning("No container records in input");
    } else {
        let rows: Vec<OutcomeRow> = report
            .outcomes
            .iter()
            .map(|o| OutcomeRow {
                position: format!("{}/{}", o.index + 1, report.total),
                name: o.name.clone(),
                action: color_action(o.action),
                resource_type: o
                    .resource_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                image: o.image.clone().unwrap_or_else(|| "-".to_string()),
                ports: join_or_none(&o.ports),
                gpus: join_or_none(&o.gpus),
            })
            .collect();

        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    println!();
    println!("Total:   {}", report.total);
    println!(
        "Success: {} ({} inserted, {} updated)",
        report.success.to_string().green(),
        report.inserted,
        report.updated
    );
    let errors = if report.errors > 0 {
        report.errors.to_string().red()
    } else {
        report.errors.to_string().normal()
    };
    println!("Errors:  {}", errors);
    if report.skipped > 0 {
        println!("Skipped: {}", report.skipped.to_string().yellow());
    }

    for failure in &report.failures {
        print_error(&format!(
            "[{}/{}] {}: {}",
            failure.index + 1,
            report.total,
            failure.name,
            failure.message
        ));
    }

    if report.cancelled {
        print_warning("Sync interrupted; re-run to process the skipped records");
    }

    println!();
    match (&report.verification, &report.verification_error) {
        (Some(summary), _) => print_verification_table(summary),
        (None, Some(error)) => print_warning(&format!("Verification unavailable: {}", error)),
        (None, None) => {}
    }

    Ok(())
}

/// Print store verification counts
pub fn print_verification(summary: &VerificationSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            print_verification_table(summary);
            Ok(())
        }
    }
}

fn print_verification_table(summary: &VerificationSummary) {
    println!("{}", "Verification".bold());
    println!("{}", "=".repeat(60));
    println!("Total resources: {}", summary.total_resources.to_string().cyan());

    let by_type: Vec<CountRow> = summary
        .by_type
        .iter()
        .map(|(key, count)| CountRow {
            key: key.clone(),
            count: *count,
        })
        .collect();
    if !by_type.is_empty() {
        println!("\nBy type:");
        println!("{}", Table::new(by_type).with(Style::rounded()));
    }

    let by_label: Vec<CountRow> = summary
        .by_label
        .iter()
        .map(|(key, count)| CountRow {
            key: key.clone(),
            count: *count,
        })
        .collect();
    println!("\nBy label:");
    println!("{}", Table::new(by_label).with(Style::rounded()));
}

/// Print normalized resource records
pub fn print_records(records: &[ResourceRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(records),
        OutputFormat::Table => {
            if records.is_empty() {
                println!("{}", "No items found".yellow());
                return Ok(());
            }
            let rows: Vec<RecordRow> = records
                .iter()
                .map(|r| RecordRow {
                    name: r.name.clone(),
                    resource_type: r.resource_type.to_string(),
                    image: format!("{}:{}", r.config.image_name, r.config.image_tag),
                    ports: join_or_none(
                        &r.config
                            .container_ports
                            .iter()
                            .map(|p| format!("{}:{}", p.container_port, p.host_port))
                            .collect::<Vec<_>>(),
                    ),
                    endpoint: r.runtime.endpoint.clone(),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            Ok(())
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Color a record outcome
pub fn color_action(action: RecordAction) -> String {
    let label = action.as_str();
    match action {
        RecordAction::Inserted => label.green().to_string(),
        RecordAction::Updated => label.blue().to_string(),
        RecordAction::Skipped => label.yellow().to_string(),
        RecordAction::Failed | RecordAction::Rejected => label.red().to_string(),
    }
}
