pub mod types;

pub use types::{ResultTable, ScoreRow};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::score::ScoreFormula;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Row order of the rendered table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    /// Order the API returned the merge requests in
    #[default]
    Api,
    /// Highest score first
    Score,
}

/// What gets rendered: the rows plus a heading describing them.
#[derive(Debug)]
pub struct Report<'a> {
    pub heading: String,
    pub produced_at: DateTime<Utc>,
    pub formula: ScoreFormula,
    pub rows: Vec<&'a ScoreRow>,
}

/// Build a Report over `table`, ordered by `sort`.
pub fn build<'a>(
    table: &'a ResultTable,
    heading: String,
    produced_at: DateTime<Utc>,
    formula: ScoreFormula,
    sort: SortOrder,
) -> Report<'a> {
    let mut rows: Vec<&ScoreRow> = table.rows.iter().collect();
    if sort == SortOrder::Score {
        // stable, so equal scores keep API order
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    }
    Report {
        heading,
        produced_at,
        formula,
        rows,
    }
}

/// Output the report to the terminal (default) or to a markdown file.
#[instrument(skip(report), fields(rows = report.rows.len()))]
pub fn output(report: &Report<'_>, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

const HEADERS: [&str; 6] = ["ID", "Title", "URL", "State", "Assignee", "Score"];

fn format_score(score: f64, formula: ScoreFormula) -> String {
    match formula {
        ScoreFormula::Ratio => format!("{score:.4}"),
        ScoreFormula::Legacy => format!("{score:.0}"),
    }
}

fn cells(row: &ScoreRow, formula: ScoreFormula) -> [String; 6] {
    [
        row.id.to_string(),
        row.title.clone(),
        row.url.clone(),
        row.assignment_state.to_string(),
        row.assignee_names.clone(),
        format_score(row.score, formula),
    ]
}

/// Width of each column in characters, headers included.
fn column_widths(report: &Report<'_>) -> [usize; 6] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &report.rows {
        for (width, cell) in widths.iter_mut().zip(cells(row, report.formula)) {
            *width = (*width).max(cell.chars().count());
        }
    }
    widths
}

fn pad(cell: &str, width: usize) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    format!("{cell}{}", " ".repeat(fill))
}

/// Print the table with a colored header and score column.
fn print_terminal_report(report: &Report<'_>) {
    let widths = column_widths(report);

    println!();
    println!("═══ {} ═══", report.heading.bold());
    println!(
        "Generated: {} | Merge requests: {}",
        report.produced_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.rows.len()
    );
    println!();

    if report.rows.is_empty() {
        println!("  No merge requests.");
        println!();
        return;
    }

    let header: Vec<String> = HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| pad(h, w))
        .collect();
    println!("{}", header.join("  ").bold());
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", rule.join("  "));

    for row in &report.rows {
        let mut line: Vec<String> = cells(row, report.formula)
            .iter()
            .zip(widths)
            .map(|(cell, w)| pad(cell, w))
            .collect();
        if let Some(score) = line.last_mut() {
            let colored = colorize_score(row.score, report.formula, score.as_str()).to_string();
            *score = colored;
        }
        println!("{}", line.join("  "));
    }
    println!();
}

/// Write the report as a markdown table.
fn write_markdown_report(report: &Report<'_>, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!("# {}\n\n", report.heading));
    md.push_str(&format!(
        "**Generated:** {} | **Merge requests:** {}\n\n",
        report.produced_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.rows.len()
    ));

    if report.rows.is_empty() {
        md.push_str("No merge requests.\n");
    } else {
        md.push_str(&format!("| {} |\n", HEADERS.join(" | ")));
        md.push_str(&format!("|{}\n", "---|".repeat(HEADERS.len())));
        for row in &report.rows {
            let [id, title, url, state, assignees, score] = cells(row, report.formula);
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} | {} |\n",
                id,
                escape_cell(&title),
                url,
                state,
                escape_cell(&assignees),
                score
            ));
        }
    }

    std::fs::write(path, md)?;
    Ok(())
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

/// Green for the bottom of the scale, yellow in the middle, red on top.
fn colorize_score(score: f64, formula: ScoreFormula, text: &str) -> colored::ColoredString {
    let (medium, high) = match formula {
        ScoreFormula::Ratio => (0.9, 0.98),
        ScoreFormula::Legacy => (100.0, 1000.0),
    };
    if score >= high {
        text.red().bold()
    } else if score >= medium {
        text.yellow().bold()
    } else {
        text.green()
    }
}
