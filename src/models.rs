//! Core data models used throughout rankCentral.
//!
//! These types represent the criteria, evaluations, and comparison records
//! that flow through the ranking pipeline and into persisted reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named, weighted dimension along which documents are scored.
///
/// Weights are percentages; across an active criteria set they must sum
/// to 100 (enforced by [`crate::criteria::normalize_weights`]). After
/// normalization every weight is a whole number, but the field stays `f64`
/// because callers may submit fractional weights prior to normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    pub description: String,
    pub weight: f64,
    /// Rubric descriptions for scores 1 through 5.
    #[serde(default)]
    pub scoring_levels: BTreeMap<u8, String>,
    /// True when this criterion carries a free-form evaluation prompt in
    /// its description instead of a rubric-based definition.
    #[serde(default)]
    pub is_custom_prompt: bool,
}

/// Which side won a single criterion evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CriterionWinner {
    A,
    B,
    Tie,
    /// Evaluation failed; no winner could be determined.
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl CriterionWinner {
    pub fn parse(s: &str) -> Self {
        match s {
            "A" => CriterionWinner::A,
            "B" => CriterionWinner::B,
            "Tie" => CriterionWinner::Tie,
            _ => CriterionWinner::NotAvailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CriterionWinner::A => "A",
            CriterionWinner::B => "B",
            CriterionWinner::Tie => "Tie",
            CriterionWinner::NotAvailable => "N/A",
        }
    }
}

/// The parsed result of evaluating one criterion across two documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionEvaluation {
    pub criterion_id: String,
    pub criterion_name: String,
    pub document_a_score: f64,
    pub document_b_score: f64,
    pub document_a_analysis: String,
    pub document_b_analysis: String,
    pub comparative_analysis: String,
    pub reasoning: String,
    pub winner: CriterionWinner,
}

/// The full outcome of one pairwise document comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub document_a: String,
    pub document_b: String,
    /// Name of the winning document, or `"Tie"`.
    pub winner: String,
    pub document_a_weighted_score: f64,
    pub document_b_weighted_score: f64,
    pub explanation: String,
    pub evaluations: Vec<CriterionEvaluation>,
}

/// Metadata for a persisted report, as listed by the history endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub id: String,
    /// ISO8601 creation timestamp.
    pub created_at: String,
    pub report_name: String,
    pub documents: Vec<String>,
    pub top_ranked: Option<String>,
    pub criteria_count: i64,
    pub evaluation_method: String,
    pub custom_prompt: Option<String>,
}

/// A registered user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: i64,
    pub last_login: Option<i64>,
}
