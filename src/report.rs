//! Report generation from comparison records.
//!
//! A report is a set of four CSV files shaped from the records of one
//! ranking run:
//!
//! | File | Contents |
//! |------|----------|
//! | `comparisons.csv` | One row per pairwise comparison with overall scores |
//! | `criterion_details.csv` | One row per criterion evaluation with analyses |
//! | `document_wins.csv` | Win count per document, best first |
//! | `criterion_scores.csv` | Average score per document per criterion |
//!
//! The CSVs are plain strings (assembled with RFC 4180 quoting) so they can
//! be persisted inline in the reports table and bundled into a zip for
//! download without touching the filesystem.

use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::models::{ComparisonRecord, CriterionWinner};

pub const COMPARISONS_CSV: &str = "comparisons.csv";
pub const CRITERION_DETAILS_CSV: &str = "criterion_details.csv";
pub const DOCUMENT_WINS_CSV: &str = "document_wins.csv";
pub const CRITERION_SCORES_CSV: &str = "criterion_scores.csv";

/// Count how many comparisons each document won outright.
pub fn win_counts(documents: &[String], records: &[ComparisonRecord]) -> BTreeMap<String, usize> {
    documents
        .iter()
        .map(|doc| {
            let wins = records.iter().filter(|r| &r.winner == doc).count();
            (doc.clone(), wins)
        })
        .collect()
}

/// Rows for the main comparisons sheet.
fn comparison_rows(records: &[ComparisonRecord]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Comparison".to_string(),
        "Document A Score".to_string(),
        "Document B Score".to_string(),
        "Winner".to_string(),
        "Overall Explanation".to_string(),
    ]];
    for record in records {
        rows.push(vec![
            format!("{} vs {}", record.document_a, record.document_b),
            format!("{:.2}", record.document_a_weighted_score),
            format!("{:.2}", record.document_b_weighted_score),
            record.winner.clone(),
            record.explanation.clone(),
        ]);
    }
    rows
}

/// Rows for the per-criterion detail sheet.
fn criterion_rows(records: &[ComparisonRecord]) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Comparison".to_string(),
        "Criterion ID".to_string(),
        "Criterion Name".to_string(),
        "Document A Score".to_string(),
        "Document A Analysis".to_string(),
        "Document B Score".to_string(),
        "Document B Analysis".to_string(),
        "Comparative Analysis".to_string(),
        "Detailed Reasoning".to_string(),
        "Winner".to_string(),
    ]];
    for record in records {
        for eval in &record.evaluations {
            let winner = match eval.winner {
                CriterionWinner::A => record.document_a.clone(),
                CriterionWinner::B => record.document_b.clone(),
                _ => "Tie".to_string(),
            };
            rows.push(vec![
                format!("{} vs {}", record.document_a, record.document_b),
                eval.criterion_id.clone(),
                eval.criterion_name.clone(),
                format!("{}", eval.document_a_score),
                eval.document_a_analysis.clone(),
                format!("{}", eval.document_b_score),
                eval.document_b_analysis.clone(),
                eval.comparative_analysis.clone(),
                eval.reasoning.clone(),
                winner,
            ]);
        }
    }
    rows
}

/// Rows for the win summary sheet, sorted by win count descending, then
/// by name for a stable order.
fn win_rows(documents: &[String], records: &[ComparisonRecord]) -> Vec<Vec<String>> {
    let counts = win_counts(documents, records);
    let mut sorted: Vec<(&String, &usize)> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let mut rows = vec![vec!["Document".to_string(), "Win Count".to_string()]];
    for (doc, count) in sorted {
        rows.push(vec![doc.clone(), count.to_string()]);
    }
    rows
}

/// Average score a document received for one criterion across all its
/// comparisons. Zero scores (failed evaluations) are excluded, matching
/// how the win summary ignores errored pairs.
fn average_criterion_score(records: &[ComparisonRecord], doc: &str, criterion: &str) -> f64 {
    let mut scores = Vec::new();
    for record in records {
        for eval in &record.evaluations {
            if eval.criterion_name != criterion {
                continue;
            }
            if record.document_a == doc && eval.document_a_score > 0.0 {
                scores.push(eval.document_a_score);
            } else if record.document_b == doc && eval.document_b_score > 0.0 {
                scores.push(eval.document_b_score);
            }
        }
    }
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Rows for the criterion score summary: one row per document with its win
/// count and its average score on every criterion seen in the run.
fn criterion_summary_rows(documents: &[String], records: &[ComparisonRecord]) -> Vec<Vec<String>> {
    let criteria: BTreeSet<String> = records
        .iter()
        .flat_map(|r| r.evaluations.iter())
        .filter(|e| !e.criterion_name.is_empty())
        .map(|e| e.criterion_name.clone())
        .collect();

    let mut header = vec!["Document".to_string(), "Win Count".to_string()];
    header.extend(criteria.iter().map(|c| format!("{} Score", c)));

    let counts = win_counts(documents, records);
    let mut docs_sorted: Vec<&String> = documents.iter().collect();
    docs_sorted.sort_by(|a, b| {
        counts
            .get(*b)
            .cmp(&counts.get(*a))
            .then_with(|| a.cmp(b))
    });

    let mut rows = vec![header];
    for doc in docs_sorted {
        let mut row = vec![doc.clone(), counts.get(doc).copied().unwrap_or(0).to_string()];
        for criterion in &criteria {
            row.push(format!(
                "{:.2}",
                average_criterion_score(records, doc, criterion)
            ));
        }
        rows.push(row);
    }
    rows
}

/// Quote a CSV field per RFC 4180: fields containing commas, quotes, or
/// newlines are wrapped in double quotes with embedded quotes doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Generate the full CSV set for a report as (filename, content) pairs.
pub fn report_files(
    documents: &[String],
    records: &[ComparisonRecord],
) -> Vec<(String, String)> {
    vec![
        (
            COMPARISONS_CSV.to_string(),
            render_csv(&comparison_rows(records)),
        ),
        (
            CRITERION_DETAILS_CSV.to_string(),
            render_csv(&criterion_rows(records)),
        ),
        (
            DOCUMENT_WINS_CSV.to_string(),
            render_csv(&win_rows(documents, records)),
        ),
        (
            CRITERION_SCORES_CSV.to_string(),
            render_csv(&criterion_summary_rows(documents, records)),
        ),
    ]
}

/// Bundle report CSVs into an in-memory zip archive for download.
pub fn zip_report(files: &[(String, String)]) -> Result<Vec<u8>> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in files {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content.as_bytes())?;
        }
        writer.finish()?;
    }
    Ok(buffer.into_inner())
}

/// Timestamped fallback name for reports created without an explicit name,
/// e.g. `Report 20250822-154500`.
pub fn default_report_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("Report {}", now.format("%Y%m%d-%H%M%S"))
}
