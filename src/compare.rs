//! Pairwise document comparison across weighted criteria.
//!
//! [`DocumentComparator`] evaluates each criterion separately, accumulates
//! weighted scores, and determines an overall winner. [`ComparisonEngine`]
//! owns the documents and criteria for a run and records every comparison
//! so reports can be generated afterwards.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::config::ComparisonConfig;
use crate::evaluator;
use crate::models::{ComparisonRecord, Criterion, CriterionEvaluation, CriterionWinner};
use crate::prompt;
use crate::ranking::PairwiseComparator;

/// Maximum rubric score; weighted contribution is `score / MAX_SCORE * weight`.
const MAX_SCORE: f64 = 5.0;

/// Compares two documents by evaluating every criterion with the LLM.
pub struct DocumentComparator {
    config: ComparisonConfig,
    criteria: Vec<Criterion>,
}

impl DocumentComparator {
    pub fn new(config: ComparisonConfig, criteria: Vec<Criterion>) -> Self {
        Self { config, criteria }
    }

    /// Run all criterion evaluations for one document pair.
    ///
    /// Individual evaluation failures degrade to placeholder evaluations
    /// (scores 0, winner N/A) rather than failing the pair.
    pub async fn compare(
        &self,
        doc_a_name: &str,
        doc_b_name: &str,
        doc_a_text: &str,
        doc_b_text: &str,
    ) -> Result<ComparisonRecord> {
        let mut evaluations = Vec::with_capacity(self.criteria.len());
        let mut weighted_a = 0.0;
        let mut weighted_b = 0.0;

        for criterion in &self.criteria {
            println!("  evaluating criterion: {}", criterion.name);

            let prompt_text = if criterion.is_custom_prompt {
                prompt::custom_prompt(
                    doc_a_name,
                    doc_b_name,
                    doc_a_text,
                    doc_b_text,
                    &criterion.description,
                )
            } else {
                prompt::criterion_prompt(doc_a_name, doc_b_name, doc_a_text, doc_b_text, criterion)
            };

            let mut evaluation = match evaluator::evaluate(&self.config, &prompt_text).await {
                Ok(eval) => eval,
                Err(e) => {
                    eprintln!("  evaluation failed for {}: {}", criterion.name, e);
                    evaluator::placeholder_evaluation(&criterion.id, &criterion.name, &e.to_string())
                }
            };

            if evaluation.criterion_id.is_empty() {
                evaluation.criterion_id = criterion.id.clone();
            }
            if evaluation.criterion_name.is_empty() {
                evaluation.criterion_name = criterion.name.clone();
            }

            weighted_a += evaluation.document_a_score / MAX_SCORE * criterion.weight;
            weighted_b += evaluation.document_b_score / MAX_SCORE * criterion.weight;

            println!(
                "    scores - A: {}, B: {}, winner: {}",
                evaluation.document_a_score,
                evaluation.document_b_score,
                evaluation.winner.as_str()
            );

            evaluations.push(evaluation);
        }

        Ok(build_record(
            doc_a_name, doc_b_name, weighted_a, weighted_b, evaluations,
        ))
    }
}

/// Assemble a [`ComparisonRecord`] from accumulated weighted scores.
///
/// The overall winner is decided purely on the weighted totals; exact
/// equality is a tie. The explanation lists the criteria the winning side
/// took.
pub fn build_record(
    doc_a_name: &str,
    doc_b_name: &str,
    weighted_a: f64,
    weighted_b: f64,
    evaluations: Vec<CriterionEvaluation>,
) -> ComparisonRecord {
    let overall = if weighted_a > weighted_b {
        CriterionWinner::A
    } else if weighted_b > weighted_a {
        CriterionWinner::B
    } else {
        CriterionWinner::Tie
    };

    let winner_name = match overall {
        CriterionWinner::A => doc_a_name.to_string(),
        CriterionWinner::B => doc_b_name.to_string(),
        _ => "Tie".to_string(),
    };

    let mut explanation = match overall {
        CriterionWinner::Tie => format!(
            "Documents are tied with equal weighted scores of {:.2}. ",
            weighted_a
        ),
        _ => format!(
            "Document {} ({}) is the overall winner with a weighted score of {:.2} vs {:.2}. ",
            overall.as_str(),
            winner_name,
            weighted_a,
            weighted_b
        ),
    };

    let winning_criteria: Vec<&str> = evaluations
        .iter()
        .filter(|e| e.winner == overall && e.winner != CriterionWinner::Tie)
        .map(|e| e.criterion_name.as_str())
        .collect();
    if !winning_criteria.is_empty() {
        explanation.push_str(&format!(
            "Document {} performed better in: {}. ",
            overall.as_str(),
            winning_criteria.join(", ")
        ));
    }
    explanation.push_str(
        "This assessment is based on both independent scoring against the rubrics \
         and direct comparison between the documents.",
    );

    ComparisonRecord {
        document_a: doc_a_name.to_string(),
        document_b: doc_b_name.to_string(),
        winner: winner_name,
        document_a_weighted_score: weighted_a,
        document_b_weighted_score: weighted_b,
        explanation,
        evaluations,
    }
}

/// Owns one comparison run: the document texts, the criteria, and every
/// comparison record produced while ranking.
pub struct ComparisonEngine {
    documents: BTreeMap<String, String>,
    comparator: DocumentComparator,
    records: Vec<ComparisonRecord>,
    /// Weighted score history per document, one entry per comparison the
    /// document participated in.
    scores: BTreeMap<String, Vec<f64>>,
}

impl ComparisonEngine {
    pub fn new(
        documents: BTreeMap<String, String>,
        criteria: Vec<Criterion>,
        config: ComparisonConfig,
    ) -> Self {
        Self {
            documents,
            comparator: DocumentComparator::new(config, criteria),
            records: Vec::new(),
            scores: BTreeMap::new(),
        }
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn records(&self) -> &[ComparisonRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ComparisonRecord> {
        self.records
    }

    pub fn score_history(&self, name: &str) -> Option<&[f64]> {
        self.scores.get(name).map(|v| v.as_slice())
    }
}

#[async_trait]
impl PairwiseComparator for ComparisonEngine {
    async fn compare(&mut self, doc_a_name: &str, doc_b_name: &str) -> Result<String> {
        println!("comparing: {} vs {}", doc_a_name, doc_b_name);

        let Some(doc_a_text) = self.documents.get(doc_a_name).cloned() else {
            bail!("unknown document: {}", doc_a_name);
        };
        let Some(doc_b_text) = self.documents.get(doc_b_name).cloned() else {
            bail!("unknown document: {}", doc_b_name);
        };

        let record = self
            .comparator
            .compare(doc_a_name, doc_b_name, &doc_a_text, &doc_b_text)
            .await?;

        self.scores
            .entry(doc_a_name.to_string())
            .or_default()
            .push(record.document_a_weighted_score);
        self.scores
            .entry(doc_b_name.to_string())
            .or_default()
            .push(record.document_b_weighted_score);

        let winner = record.winner.clone();
        self.records.push(record);

        println!("comparison complete: winner is {}", winner);
        Ok(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(name: &str, a: f64, b: f64, winner: CriterionWinner) -> CriterionEvaluation {
        CriterionEvaluation {
            criterion_id: "1".to_string(),
            criterion_name: name.to_string(),
            document_a_score: a,
            document_b_score: b,
            document_a_analysis: String::new(),
            document_b_analysis: String::new(),
            comparative_analysis: String::new(),
            reasoning: String::new(),
            winner,
        }
    }

    #[test]
    fn higher_weighted_score_wins() {
        let record = build_record(
            "alpha.pdf",
            "beta.pdf",
            72.0,
            55.5,
            vec![eval("Clarity", 4.0, 3.0, CriterionWinner::A)],
        );
        assert_eq!(record.winner, "alpha.pdf");
        assert!(record.explanation.contains("72.00 vs 55.50"));
        assert!(record.explanation.contains("performed better in: Clarity"));
    }

    #[test]
    fn equal_scores_are_a_tie() {
        let record = build_record("a", "b", 50.0, 50.0, vec![]);
        assert_eq!(record.winner, "Tie");
        assert!(record.explanation.contains("tied"));
    }

    #[tokio::test]
    async fn engine_rejects_unknown_documents() {
        let mut documents = BTreeMap::new();
        documents.insert("a.pdf".to_string(), "alpha".to_string());
        documents.insert("b.pdf".to_string(), "beta".to_string());
        let mut engine = ComparisonEngine::new(
            documents,
            crate::criteria::default_criteria(),
            ComparisonConfig::default(),
        );

        assert_eq!(engine.document_names(), vec!["a.pdf", "b.pdf"]);
        let err = engine.compare("a.pdf", "missing.pdf").await.unwrap_err();
        assert!(err.to_string().contains("unknown document"));
        assert!(engine.records().is_empty());
        assert!(engine.score_history("a.pdf").is_none());
    }

    #[test]
    fn explanation_lists_only_criteria_won_by_overall_winner() {
        let record = build_record(
            "a",
            "b",
            40.0,
            60.0,
            vec![
                eval("Clarity", 2.0, 4.0, CriterionWinner::B),
                eval("Structure", 4.0, 3.0, CriterionWinner::A),
                eval("Relevance", 3.0, 3.0, CriterionWinner::Tie),
            ],
        );
        assert_eq!(record.winner, "b");
        assert!(record.explanation.contains("performed better in: Clarity"));
        assert!(!record.explanation.contains("Structure"));
    }
}
