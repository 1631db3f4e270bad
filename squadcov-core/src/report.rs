//! Report formatting utilities for squadcov outputs.

use std::fmt::Write;

use serde::Serialize;

use crate::domain::{AggregationResult, CoverageRecord, format_percent};

const SEPARATOR_WIDTH: usize = 70;
const NOT_AVAILABLE: &str = "N/A";

const SQUAD_HEADERS: [&str; 7] = [
    "Squad",
    "Squad Coverage",
    "File name",
    "Line Coverage",
    "Lines Covered",
    "Executable Lines",
    "File path",
];

const UNDETERMINED_HEADERS: [&str; 5] = [
    "File name",
    "Line Coverage",
    "Lines Covered",
    "Executable Lines",
    "File path",
];

/// Render an aggregation result as console text.
pub fn render_text(result: &AggregationResult) -> String {
    let mut output = String::new();
    let separator = "=".repeat(SEPARATOR_WIDTH);

    for summary in &result.summaries {
        let _ = writeln!(output, "{separator}");
        if summary.skipped {
            let _ = writeln!(
                output,
                "Filenames for squad {} must be provided for coverage report.",
                summary.name
            );
            continue;
        }
        let _ = writeln!(
            output,
            "Coverage report generated from {} out of {} files for {}.",
            summary.claimed, summary.declared, summary.name
        );
        if !summary.missing_patterns.is_empty() {
            let _ = writeln!(
                output,
                "{} File(s) not found:",
                summary.missing_patterns.len()
            );
            for pattern in &summary.missing_patterns {
                let _ = writeln!(output, " - {pattern}");
            }
        }
        let _ = writeln!(
            output,
            "TOTAL COVERAGE FOR {}: {}",
            summary.name,
            format_percent(summary.coverage)
        );
    }

    let _ = writeln!(output, "{separator}");
    let _ = writeln!(
        output,
        "TOTAL COVERAGE FOR PROJECT: {}",
        format_percent(result.project_coverage)
    );
    let _ = writeln!(output, "{separator}\n");

    let (squad_rows, undetermined_rows) = numbered_rows(result);
    let _ = writeln!(output, "Squad files");
    output.push_str(&text_table(&SQUAD_HEADERS, &squad_rows));
    let _ = writeln!(output, "\nUndetermined files");
    if undetermined_rows.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        output.push_str(&text_table(&UNDETERMINED_HEADERS, &undetermined_rows));
    }
    output
}

/// Render an aggregation result as Markdown.
pub fn render_markdown(result: &AggregationResult) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Squad Coverage Report\n");
    let _ = writeln!(
        output,
        "- Project coverage: {}\n",
        format_percent(result.project_coverage)
    );

    let _ = writeln!(output, "## Squads\n");
    for summary in &result.summaries {
        let _ = writeln!(output, "- {summary}");
    }
    let _ = writeln!(output);

    let (squad_rows, undetermined_rows) = numbered_rows(result);
    let _ = writeln!(output, "## Squad files\n");
    output.push_str(&markdown_table(&SQUAD_HEADERS, &squad_rows));
    let _ = writeln!(output, "\n## Undetermined files\n");
    if undetermined_rows.is_empty() {
        let _ = writeln!(output, "No undetermined files.");
    } else {
        output.push_str(&markdown_table(&UNDETERMINED_HEADERS, &undetermined_rows));
    }
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Render squad and undetermined files as a single CSV table.
///
/// Undetermined rows carry `N/A` in the squad columns; rows are numbered from 1.
pub fn render_csv(result: &AggregationResult) -> String {
    let mut output = String::new();
    let header: Vec<String> = std::iter::once(String::new())
        .chain(SQUAD_HEADERS.iter().map(|h| h.to_string()))
        .collect();
    push_csv_row(&mut output, &header);

    let (squad_rows, undetermined_rows) = numbered_rows(result);
    for row in squad_rows {
        push_csv_row(&mut output, &row);
    }
    for row in undetermined_rows {
        let mut padded = Vec::with_capacity(row.len() + 2);
        padded.push(row[0].clone());
        padded.push(NOT_AVAILABLE.to_string());
        padded.push(NOT_AVAILABLE.to_string());
        padded.extend(row.into_iter().skip(1));
        push_csv_row(&mut output, &padded);
    }
    output
}

/// Render a self-contained HTML page with squad and undetermined tables.
pub fn render_html(result: &AggregationResult) -> String {
    let (squad_rows, undetermined_rows) = numbered_rows(result);
    let mut summaries = String::new();
    for summary in &result.summaries {
        let _ = writeln!(
            summaries,
            "      <li>{}</li>",
            html_escape::encode_text(&summary.to_string())
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Squad Coverage Report</title>
  <style>
    body {{ font-family: -apple-system, Helvetica, sans-serif; margin: 2rem; }}
    table {{ border-collapse: collapse; margin-bottom: 2rem; }}
    th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
    th {{ background: #f3f3f3; }}
  </style>
</head>
<body>
  <h1>Squad Coverage Report</h1>
  <p>Total coverage for project: <strong>{project}</strong></p>
  <h2>Squads</h2>
  <ul>
{summaries}  </ul>
  <h2>Squad files</h2>
{squad_table}  <h2>Undetermined files</h2>
{undetermined_table}</body>
</html>
"#,
        project = format_percent(result.project_coverage),
        summaries = summaries,
        squad_table = html_table(&SQUAD_HEADERS, &squad_rows),
        undetermined_table = html_table(&UNDETERMINED_HEADERS, &undetermined_rows),
    )
}

/// Rows for both tables, numbered continuously from 1. The first cell is the
/// row number.
fn numbered_rows(result: &AggregationResult) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    let mut index = 0usize;
    let mut next_index = || {
        index += 1;
        index.to_string()
    };

    let squad_rows = result
        .assigned
        .iter()
        .map(|record| {
            let mut row = vec![
                next_index(),
                record
                    .squad
                    .clone()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                record
                    .squad_coverage
                    .map(format_percent)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ];
            row.extend(file_cells(record));
            row
        })
        .collect();

    let undetermined_rows = result
        .unassigned
        .iter()
        .map(|record| {
            let mut row = vec![next_index()];
            row.extend(file_cells(record));
            row
        })
        .collect();

    (squad_rows, undetermined_rows)
}

fn file_cells(record: &CoverageRecord) -> [String; 5] {
    [
        record.name.clone(),
        format_percent(record.line_coverage),
        record.covered_lines.to_string(),
        record.executable_lines.to_string(),
        record.path.clone(),
    ]
}

fn text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = std::iter::once(1)
        .chain(headers.iter().map(|h| h.chars().count()))
        .collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let header: Vec<&str> = std::iter::once("#").chain(headers.iter().copied()).collect();
    push_text_row(&mut output, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_text_row(&mut output, &rule, &widths);
    for row in rows {
        push_text_row(&mut output, row, &widths);
    }
    output
}

fn push_text_row<S: AsRef<str>>(output: &mut String, cells: &[S], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell.as_ref(), width = *width))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(output, "{}", line.trim_end());
}

fn markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "| # | {} |", headers.join(" | "));
    let _ = writeln!(output, "|---|{}", "---|".repeat(headers.len()));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|cell| cell.replace('|', "\\|")).collect();
        let _ = writeln!(output, "| {} |", cells.join(" | "));
    }
    output
}

fn html_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "  <table>");
    let _ = write!(output, "    <thead><tr><th></th>");
    for header in headers {
        let _ = write!(output, "<th>{}</th>", html_escape::encode_text(header));
    }
    let _ = writeln!(output, "</tr></thead>");
    let _ = writeln!(output, "    <tbody>");
    for row in rows {
        let _ = write!(output, "      <tr>");
        for (position, cell) in row.iter().enumerate() {
            let tag = if position == 0 { "th" } else { "td" };
            let _ = write!(output, "<{tag}>{}</{tag}>", html_escape::encode_text(cell));
        }
        let _ = writeln!(output, "</tr>");
    }
    let _ = writeln!(output, "    </tbody>");
    let _ = writeln!(output, "  </table>");
    output
}

fn push_csv_row(output: &mut String, cells: &[String]) {
    let line = cells
        .iter()
        .map(|cell| csv_cell(cell))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(output, "{line}");
}

fn csv_cell(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
