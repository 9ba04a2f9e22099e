//! Criteria management and weight normalization.
//!
//! A criteria set is an ordered list of [`Criterion`]s whose weights must
//! sum to exactly 100 whenever the set is non-empty. [`normalize_weights`]
//! restores that invariant after any add, remove, or weight edit while
//! staying proportionally faithful to the input weights.

use std::collections::BTreeMap;

use crate::models::Criterion;

/// Default weight given to a newly added criterion, before renormalization.
pub const DEFAULT_NEW_WEIGHT: f64 = 20.0;

/// Rescale a criteria list so its weights sum to exactly 100.
///
/// Each weight becomes `round(weight / total * 100)` using
/// round-half-away-from-zero (`f64::round`), and any rounding drift is
/// absorbed by the last criterion so the final sum is exactly 100.
///
/// Two guards skip normalization entirely:
/// - `total == 0` — left unchanged to avoid dividing by zero; an all-zero
///   set stays invalid until the caller assigns a nonzero weight.
/// - `total == 100` — already normalized, so the pass is a no-op (this also
///   makes the function idempotent).
///
/// Order, ids, names, descriptions, and rubrics are preserved; only the
/// `weight` fields change. Negative weights are not handled here and must
/// be rejected before calling (see [`validate_weights`]).
pub fn normalize_weights(criteria: &[Criterion]) -> Vec<Criterion> {
    let total: f64 = criteria.iter().map(|c| c.weight).sum();

    if total == 0.0 || total == 100.0 {
        return criteria.to_vec();
    }

    let mut normalized: Vec<Criterion> = criteria
        .iter()
        .map(|c| {
            let mut next = c.clone();
            next.weight = (c.weight / total * 100.0).round();
            next
        })
        .collect();

    let rounded_sum: f64 = normalized.iter().map(|c| c.weight).sum();
    let diff = 100.0 - rounded_sum;

    if let Some(last) = normalized.last_mut() {
        last.weight += diff;
    }

    normalized
}

/// Reject negative weights at the input boundary, before normalization.
pub fn validate_weights(criteria: &[Criterion]) -> anyhow::Result<()> {
    for c in criteria {
        if c.weight < 0.0 {
            anyhow::bail!(
                "criterion '{}' has a negative weight ({}); weights must be >= 0",
                c.name,
                c.weight
            );
        }
        if !c.weight.is_finite() {
            anyhow::bail!("criterion '{}' has a non-finite weight", c.name);
        }
    }
    Ok(())
}

/// Rubric level descriptions used when a criterion defines none of its own.
pub fn default_scoring_levels() -> BTreeMap<u8, String> {
    let mut levels = BTreeMap::new();
    levels.insert(1, "Poor - Does not meet the criterion requirements".to_string());
    levels.insert(
        2,
        "Fair - Partially meets some requirements with significant gaps".to_string(),
    );
    levels.insert(3, "Good - Meets most requirements with minor gaps".to_string());
    levels.insert(4, "Very Good - Fully meets all requirements".to_string());
    levels.insert(
        5,
        "Excellent - Exceeds requirements in meaningful ways".to_string(),
    );
    levels
}

fn levels(descriptions: [&str; 5]) -> BTreeMap<u8, String> {
    descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| (i as u8 + 1, d.to_string()))
        .collect()
}

/// The default 4-criterion evaluation set: Clarity 30, Relevance 30,
/// Thoroughness 20, Structure 20.
pub fn default_criteria() -> Vec<Criterion> {
    vec![
        Criterion {
            id: "1".to_string(),
            name: "Clarity".to_string(),
            description: "How clear and understandable is the document?".to_string(),
            weight: 30.0,
            scoring_levels: levels([
                "Poor - Document is unclear and difficult to understand",
                "Fair - Document has significant clarity issues",
                "Good - Document is mostly clear with minor clarity issues",
                "Very Good - Document is clear and easy to understand",
                "Excellent - Document is exceptionally clear and easy to understand",
            ]),
            is_custom_prompt: false,
        },
        Criterion {
            id: "2".to_string(),
            name: "Relevance".to_string(),
            description: "How relevant is the content to the subject matter?".to_string(),
            weight: 30.0,
            scoring_levels: levels([
                "Poor - Content is mostly irrelevant to the subject matter",
                "Fair - Content has limited relevance to the subject matter",
                "Good - Content is mostly relevant with some gaps",
                "Very Good - Content is highly relevant to the subject matter",
                "Excellent - Content is exceptionally relevant and focused",
            ]),
            is_custom_prompt: false,
        },
        Criterion {
            id: "3".to_string(),
            name: "Thoroughness".to_string(),
            description: "How comprehensive and complete is the document?".to_string(),
            weight: 20.0,
            scoring_levels: levels([
                "Poor - Document lacks comprehensiveness and is incomplete",
                "Fair - Document covers basic aspects but has significant gaps",
                "Good - Document is mostly comprehensive with minor gaps",
                "Very Good - Document is comprehensive and covers all key areas",
                "Excellent - Document is exceptionally thorough and comprehensive",
            ]),
            is_custom_prompt: false,
        },
        Criterion {
            id: "4".to_string(),
            name: "Structure".to_string(),
            description: "How well-organized is the document?".to_string(),
            weight: 20.0,
            scoring_levels: levels([
                "Poor - Document is poorly organized and structured",
                "Fair - Document has basic structure but with significant issues",
                "Good - Document is reasonably well-organized with minor issues",
                "Very Good - Document is well-organized and structured",
                "Excellent - Document has exceptional organization and structure",
            ]),
            is_custom_prompt: false,
        },
    ]
}

/// Build the single synthetic criterion used for prompt-based evaluation.
/// The caller's free-form instructions travel in the description field.
pub fn custom_prompt_criterion(prompt: &str) -> Criterion {
    Criterion {
        id: "custom".to_string(),
        name: "Custom Evaluation".to_string(),
        description: prompt.to_string(),
        weight: 100.0,
        scoring_levels: BTreeMap::new(),
        is_custom_prompt: true,
    }
}

/// An ordered criteria set that renormalizes after every mutation.
///
/// The set itself is the only mutable state holder; [`normalize_weights`]
/// stays a pure function invoked on the post-mutation list.
#[derive(Debug, Clone, Default)]
pub struct CriteriaSet {
    criteria: Vec<Criterion>,
}

impl CriteriaSet {
    pub fn new(criteria: Vec<Criterion>) -> Self {
        Self {
            criteria: normalize_weights(&criteria),
        }
    }

    pub fn with_defaults() -> Self {
        Self {
            criteria: default_criteria(),
        }
    }

    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Append a criterion with the default weight and renormalize.
    pub fn add(&mut self, id: &str, name: &str, description: &str) {
        self.add_weighted(id, name, description, DEFAULT_NEW_WEIGHT);
    }

    /// Append a criterion with an explicit weight and renormalize.
    pub fn add_weighted(&mut self, id: &str, name: &str, description: &str, weight: f64) {
        self.criteria.push(Criterion {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            weight,
            scoring_levels: default_scoring_levels(),
            is_custom_prompt: false,
        });
        self.criteria = normalize_weights(&self.criteria);
    }

    /// Remove a criterion by id and renormalize the remainder.
    /// Returns false when the id is not present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.criteria.len();
        self.criteria.retain(|c| c.id != id);
        if self.criteria.len() == before {
            return false;
        }
        self.criteria = normalize_weights(&self.criteria);
        true
    }

    /// Set a criterion's weight and renormalize. Returns false when the id
    /// is not present.
    pub fn set_weight(&mut self, id: &str, weight: f64) -> bool {
        let Some(criterion) = self.criteria.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        criterion.weight = weight;
        self.criteria = normalize_weights(&self.criteria);
        true
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Criterion> {
        self.criteria
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(id: &str, weight: f64) -> Criterion {
        Criterion {
            id: id.to_string(),
            name: format!("Criterion {}", id),
            description: String::new(),
            weight,
            scoring_levels: BTreeMap::new(),
            is_custom_prompt: false,
        }
    }

    fn weights(criteria: &[Criterion]) -> Vec<f64> {
        criteria.iter().map(|c| c.weight).collect()
    }

    #[test]
    fn equal_thirds_round_up_on_last() {
        let input = vec![criterion("1", 10.0), criterion("2", 10.0), criterion("3", 10.0)];
        let out = normalize_weights(&input);
        assert_eq!(weights(&out), vec![33.0, 33.0, 34.0]);
        assert_eq!(out.iter().map(|c| c.weight).sum::<f64>(), 100.0);
    }

    #[test]
    fn removal_from_default_set_absorbs_negative_drift() {
        // Default set minus Structure: [30, 30, 20] -> shares 37.5/37.5/25
        // -> rounded 38/38/25 = 101 -> last becomes 24.
        let input = vec![criterion("1", 30.0), criterion("2", 30.0), criterion("3", 20.0)];
        let out = normalize_weights(&input);
        assert_eq!(weights(&out), vec![38.0, 38.0, 24.0]);
    }

    #[test]
    fn zero_total_left_unchanged() {
        let input = vec![criterion("1", 0.0), criterion("2", 0.0)];
        let out = normalize_weights(&input);
        assert_eq!(weights(&out), vec![0.0, 0.0]);
    }

    #[test]
    fn sum_already_100_short_circuits() {
        let input = vec![criterion("1", 62.5), criterion("2", 37.5)];
        let out = normalize_weights(&input);
        // Fractional weights survive untouched because the guard fires.
        assert_eq!(weights(&out), vec![62.5, 37.5]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(normalize_weights(&[]).is_empty());
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = vec![criterion("1", 7.0), criterion("2", 3.0), criterion("3", 11.0)];
        let once = normalize_weights(&input);
        let twice = normalize_weights(&once);
        assert_eq!(weights(&once), weights(&twice));
    }

    #[test]
    fn identity_and_order_preserved() {
        let mut input = vec![criterion("a", 5.0), criterion("b", 9.0)];
        input[0].description = "first".to_string();
        input[1].description = "second".to_string();
        let out = normalize_weights(&input);
        assert_eq!(out[0].id, "a");
        assert_eq!(out[1].id, "b");
        assert_eq!(out[0].description, "first");
        assert_eq!(out[1].description, "second");
        // Input untouched.
        assert_eq!(input[0].weight, 5.0);
        assert_eq!(input[1].weight, 9.0);
    }

    #[test]
    fn arbitrary_totals_always_sum_to_100() {
        let cases = vec![
            vec![1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            vec![99.0, 1.0, 1.0],
            vec![0.5, 0.25, 0.25, 7.0],
            vec![250.0, 250.0, 500.0],
        ];
        for ws in cases {
            let input: Vec<Criterion> = ws
                .iter()
                .enumerate()
                .map(|(i, w)| criterion(&i.to_string(), *w))
                .collect();
            let out = normalize_weights(&input);
            let sum: f64 = out.iter().map(|c| c.weight).sum();
            assert_eq!(sum, 100.0, "weights {:?} normalized to {:?}", ws, weights(&out));
        }
    }

    #[test]
    fn validate_rejects_negative_weight() {
        let input = vec![criterion("1", -5.0)];
        assert!(validate_weights(&input).is_err());
        assert!(validate_weights(&[criterion("1", 5.0)]).is_ok());
    }

    #[test]
    fn default_set_sums_to_100() {
        let defaults = default_criteria();
        assert_eq!(defaults.len(), 4);
        let sum: f64 = defaults.iter().map(|c| c.weight).sum();
        assert_eq!(sum, 100.0);
        assert_eq!(defaults[0].name, "Clarity");
        assert_eq!(defaults[0].scoring_levels.len(), 5);
    }

    #[test]
    fn set_add_renormalizes() {
        let mut set = CriteriaSet::with_defaults();
        set.add("5", "Innovation", "How novel is the document?");
        let sum: f64 = set.criteria().iter().map(|c| c.weight).sum();
        assert_eq!(sum, 100.0);
        assert_eq!(set.len(), 5);
        // New entry keeps default rubric levels.
        assert_eq!(set.get_by_id("5").unwrap().scoring_levels.len(), 5);
    }

    #[test]
    fn set_remove_renormalizes() {
        let mut set = CriteriaSet::with_defaults();
        assert!(set.remove("4"));
        assert_eq!(
            weights(set.criteria()),
            vec![38.0, 38.0, 24.0],
            "removing Structure must rescale the remaining three"
        );
        assert!(!set.remove("4"));
    }

    #[test]
    fn set_weight_edit_renormalizes() {
        let mut set = CriteriaSet::with_defaults();
        assert!(set.set_weight("1", 70.0));
        let sum: f64 = set.criteria().iter().map(|c| c.weight).sum();
        assert_eq!(sum, 100.0);
        assert!(!set.set_weight("missing", 10.0));
    }

    #[test]
    fn set_zeroed_weights_stay_invalid_until_edit() {
        let mut set = CriteriaSet::new(vec![criterion("1", 0.0), criterion("2", 0.0)]);
        let sum: f64 = set.criteria().iter().map(|c| c.weight).sum();
        assert_eq!(sum, 0.0);
        set.set_weight("1", 10.0);
        let sum: f64 = set.criteria().iter().map(|c| c.weight).sum();
        assert_eq!(sum, 100.0);
    }

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        let set = CriteriaSet::with_defaults();
        assert!(set.get_by_name("clarity").is_some());
        assert!(set.get_by_name("CLARITY").is_some());
        assert!(set.get_by_name("nope").is_none());
    }
}
