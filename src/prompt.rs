//! Prompt assembly for LLM document comparison.
//!
//! Two prompt shapes exist: a rubric-driven prompt for a single named
//! criterion, and a free-form prompt built from caller-supplied evaluation
//! instructions. Both demand the same JSON response schema so the
//! evaluator can parse either uniformly.

use crate::criteria::default_scoring_levels;
use crate::models::Criterion;

/// The JSON fields every evaluation response must contain.
fn response_schema(criterion_name: &str) -> String {
    format!(
        r#"Respond with a JSON object containing these fields:
{{
    "criterion_name": "{}",
    "document_a_score": [score between 1-5],
    "document_a_analysis": [detailed analysis with specific examples],
    "document_b_score": [score between 1-5],
    "document_b_analysis": [detailed analysis with specific examples],
    "comparative_analysis": [direct side-by-side comparison],
    "reasoning": [detailed justification for your decision],
    "winner": [either "A" or "B" or "Tie" if truly equal]
}}"#,
        criterion_name
    )
}

/// Build the prompt for evaluating one criterion across two documents.
pub fn criterion_prompt(
    doc_a_name: &str,
    doc_b_name: &str,
    doc_a_text: &str,
    doc_b_text: &str,
    criterion: &Criterion,
) -> String {
    let mut prompt = format!(
        "Evaluate the following two documents specifically on this criterion: {}.\n\n\
         # Documents:\n\
         - Document A: {}\n\
         - Document B: {}\n\n\
         # Criterion Information:\n\
         Name: {}\n\
         Weight: {}%\n\
         Description: {}\n\n\
         # Scoring Rubric:\n",
        criterion.name, doc_a_name, doc_b_name, criterion.name, criterion.weight, criterion.description
    );

    let levels;
    let rubric = if criterion.scoring_levels.is_empty() {
        levels = default_scoring_levels();
        &levels
    } else {
        &criterion.scoring_levels
    };
    for (level, description) in rubric {
        prompt.push_str(&format!("  {}: {}\n", level, description));
    }

    prompt.push_str(&format!(
        "\n# Document A Relevant Content for {}:\n{}\n\n\
         # Document B Relevant Content for {}:\n{}\n\n",
        criterion.name, doc_a_text, criterion.name, doc_b_text
    ));

    prompt.push_str(
        "Perform a thorough evaluation following these steps:\n\n\
         1. Analyse Document A and Document B\n\
            - Carefully assess Document A and Document B against the rubric criteria\n\
            - Provide detailed reasoning with specific examples from the text\n\
            - Assign a score from 1-5 based strictly on the rubric\n\n\
         2. Comparative Analysis:\n\
            - Directly compare how each document addresses this criterion\n\
            - Highlight key differences in approach and effectiveness\n\
            - Determine which document better satisfies the criterion\n\n\
         3. Decision Reasoning:\n\
            - Explain your decision process in detail\n\
            - Justify why one document scores higher than the other\n\
            - Reference specific content from both documents\n\n",
    );
    prompt.push_str(&response_schema(&criterion.name));

    prompt
}

/// Build the prompt for a free-form evaluation driven by caller instructions.
pub fn custom_prompt(
    doc_a_name: &str,
    doc_b_name: &str,
    doc_a_text: &str,
    doc_b_text: &str,
    instructions: &str,
) -> String {
    let mut prompt = format!(
        "Compare and evaluate the following two documents based on the provided instructions.\n\n\
         # Documents:\n\
         - Document A: {}\n\
         - Document B: {}\n\n\
         # Document A Content:\n{}\n\n\
         # Document B Content:\n{}\n\n\
         # Evaluation Instructions:\n{}\n\n",
        doc_a_name, doc_b_name, doc_a_text, doc_b_text, instructions
    );

    prompt.push_str(
        "# Evaluation Guidelines:\n\
         - Thoroughly analyze both documents based on the given instructions\n\
         - Be objective and fair in your assessment\n\
         - Use specific examples from the text to support your evaluation\n\
         - Score each document on a scale of 1-5 (where 1 is poor and 5 is excellent)\n\
         - Determine a clear winner or declare a tie if truly equal\n\n",
    );
    prompt.push_str(&response_schema("Custom Evaluation"));

    prompt
}
