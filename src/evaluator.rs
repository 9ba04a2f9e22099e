//! LLM-backed criterion evaluation.
//!
//! Sends a prepared prompt to the OpenAI chat completions API and parses
//! the JSON verdict. Retry policy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! A failed evaluation never aborts a whole comparison run; callers fall
//! back to [`placeholder_evaluation`] so the pair can still be recorded.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::ComparisonConfig;
use crate::models::{CriterionEvaluation, CriterionWinner};

/// Approximate chars-per-token ratio used for response budgeting.
const CHARS_PER_TOKEN: usize = 4;

/// Floor for the response token allowance.
const MIN_RESPONSE_TOKENS: usize = 1000;
/// Ceiling for the response token allowance.
const MAX_RESPONSE_TOKENS: usize = 1500;
/// Slack reserved for message framing overhead.
const FRAMING_TOKENS: usize = 50;

/// Compute the response token allowance for a prompt:
/// `max(1000, min(budget - prompt - 50, 1500))`, with the prompt length
/// estimated at four characters per token.
pub fn response_token_budget(prompt: &str, context_tokens: usize) -> usize {
    let prompt_tokens = prompt.len() / CHARS_PER_TOKEN;
    let available = context_tokens
        .saturating_sub(prompt_tokens)
        .saturating_sub(FRAMING_TOKENS);
    available.min(MAX_RESPONSE_TOKENS).max(MIN_RESPONSE_TOKENS)
}

/// Evaluate one prepared prompt against the configured model.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub async fn evaluate(config: &ComparisonConfig, prompt: &str) -> Result<CriterionEvaluation> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "temperature": config.temperature,
        "max_tokens": response_token_budget(prompt, config.context_tokens),
        "messages": [
            { "role": "user", "content": prompt }
        ],
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    let content = completion_text(&json)?;
                    return parse_evaluation(&content);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Evaluation failed after retries")))
}

/// Extract the assistant message text from a chat completions response.
fn completion_text(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
}

/// Strip markdown code fences and slice the text down to the outermost
/// JSON object. Models frequently wrap verdicts in ```json fences or add
/// commentary around the object.
pub fn clean_response(raw: &str) -> String {
    let mut text = raw.trim().to_string();

    if let Some(rest) = text.split("```json").nth(1) {
        text = rest.split("```").next().unwrap_or(rest).trim().to_string();
    } else if text.contains("```") {
        if let Some(inner) = text.split("```").nth(1) {
            text = inner.trim().to_string();
        }
    }

    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(s), Some(e)) = (start, end) {
        if e > s {
            text = text[s..=e].to_string();
        }
    }

    text
}

/// Parse a cleaned LLM response into a [`CriterionEvaluation`], filling
/// any missing fields: scores default to 0, the winner to Tie, and text
/// fields to a placeholder.
pub fn parse_evaluation(raw: &str) -> Result<CriterionEvaluation> {
    let cleaned = clean_response(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned)
        .map_err(|e| anyhow::anyhow!("evaluation response is not valid JSON: {}", e))?;

    let score = |field: &str| value.get(field).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let text = |field: &str| {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("No {} provided", field.replace('_', " ")))
    };

    let winner = value
        .get("winner")
        .and_then(|v| v.as_str())
        .map(CriterionWinner::parse)
        .unwrap_or(CriterionWinner::Tie);

    Ok(CriterionEvaluation {
        criterion_id: value
            .get("criterion_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        criterion_name: value
            .get("criterion_name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        document_a_score: score("document_a_score"),
        document_b_score: score("document_b_score"),
        document_a_analysis: text("document_a_analysis"),
        document_b_analysis: text("document_b_analysis"),
        comparative_analysis: text("comparative_analysis"),
        reasoning: text("reasoning"),
        winner,
    })
}

/// Build the evaluation recorded when an LLM call fails outright.
pub fn placeholder_evaluation(criterion_id: &str, criterion_name: &str, error: &str) -> CriterionEvaluation {
    CriterionEvaluation {
        criterion_id: criterion_id.to_string(),
        criterion_name: criterion_name.to_string(),
        document_a_score: 0.0,
        document_b_score: 0.0,
        document_a_analysis: format!("Error during evaluation: {}", error),
        document_b_analysis: format!("Error during evaluation: {}", error),
        comparative_analysis: "Unable to compare due to error".to_string(),
        reasoning: format!("Error occurred: {}", error),
        winner: CriterionWinner::NotAvailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_clamps_to_floor_for_long_prompts() {
        let long_prompt = "x".repeat(100_000);
        assert_eq!(response_token_budget(&long_prompt, 4096), 1000);
    }

    #[test]
    fn budget_clamps_to_ceiling_for_short_prompts() {
        assert_eq!(response_token_budget("short", 4096), 1500);
    }

    #[test]
    fn budget_uses_remaining_context_between_bounds() {
        // 11600 chars ≈ 2900 tokens; 4096 - 2900 - 50 = 1146.
        let prompt = "y".repeat(11_600);
        assert_eq!(response_token_budget(&prompt, 4096), 1146);
    }

    #[test]
    fn clean_strips_json_fences() {
        let raw = "Here is my verdict:\n```json\n{\"winner\": \"A\"}\n```\nDone.";
        assert_eq!(clean_response(raw), "{\"winner\": \"A\"}");
    }

    #[test]
    fn clean_strips_bare_fences() {
        let raw = "```\n{\"winner\": \"B\"}\n```";
        assert_eq!(clean_response(raw), "{\"winner\": \"B\"}");
    }

    #[test]
    fn clean_slices_to_outer_braces() {
        let raw = "The result is {\"winner\": \"Tie\", \"detail\": {\"x\": 1}} as shown.";
        assert_eq!(
            clean_response(raw),
            "{\"winner\": \"Tie\", \"detail\": {\"x\": 1}}"
        );
    }

    #[test]
    fn parse_fills_missing_fields() {
        let eval = parse_evaluation("{\"document_a_score\": 4}").unwrap();
        assert_eq!(eval.document_a_score, 4.0);
        assert_eq!(eval.document_b_score, 0.0);
        assert_eq!(eval.winner, CriterionWinner::Tie);
        assert_eq!(eval.document_b_analysis, "No document b analysis provided");
    }

    #[test]
    fn parse_full_response() {
        let raw = r#"```json
        {
            "criterion_name": "Clarity",
            "document_a_score": 4,
            "document_a_analysis": "Clear throughout.",
            "document_b_score": 2.5,
            "document_b_analysis": "Dense prose.",
            "comparative_analysis": "A reads better.",
            "reasoning": "A uses shorter sentences.",
            "winner": "A"
        }
        ```"#;
        let eval = parse_evaluation(raw).unwrap();
        assert_eq!(eval.criterion_name, "Clarity");
        assert_eq!(eval.document_a_score, 4.0);
        assert_eq!(eval.document_b_score, 2.5);
        assert_eq!(eval.winner, CriterionWinner::A);
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_evaluation("I cannot evaluate these documents.").is_err());
    }

    #[test]
    fn unknown_winner_becomes_not_available() {
        let eval = parse_evaluation("{\"winner\": \"C\"}").unwrap();
        assert_eq!(eval.winner, CriterionWinner::NotAvailable);
    }

    #[test]
    fn placeholder_carries_the_error() {
        let eval = placeholder_evaluation("1", "Clarity", "timed out");
        assert_eq!(eval.winner, CriterionWinner::NotAvailable);
        assert!(eval.reasoning.contains("timed out"));
        assert_eq!(eval.document_a_score, 0.0);
    }
}
