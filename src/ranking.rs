//! Merge-sort document ranking over pairwise comparisons.
//!
//! Documents are ordered best-first by running a merge sort whose
//! comparisons are answered by a [`PairwiseComparator`] — in production an
//! LLM-backed [`crate::compare::ComparisonEngine`], in tests a scripted
//! stand-in. Merge sort keeps the number of expensive comparisons at
//! O(n log n) instead of the O(n²) of all-pairs.
//!
//! The comparator is consulted in a fixed order: the list splits at the
//! midpoint, each half is ranked recursively, and the halves merge by
//! comparing their heads. Because LLM verdicts need not be transitive,
//! that comparison order is part of the observable behavior, not just an
//! implementation detail.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Answers "which of these two documents is better?".
///
/// `compare` returns the winning document's name, or `"Tie"`. Implementors
/// may record state per call (the engine logs every comparison record),
/// hence `&mut self`.
#[async_trait]
pub trait PairwiseComparator {
    async fn compare(&mut self, doc_a: &str, doc_b: &str) -> Result<String>;
}

/// Rank documents best-first using merge sort with pairwise comparisons.
///
/// Ties keep the left-hand element, so tie-breaking is arbitrary but
/// consistent for a given input order. Lists of zero or one documents are
/// returned unchanged without consulting the comparator.
pub async fn rank_documents<C: PairwiseComparator + Send>(
    comparator: &mut C,
    docs: Vec<String>,
) -> Result<Vec<String>> {
    sort(comparator, docs).await
}

/// Recursive midpoint split. Async recursion needs a boxed future.
fn sort<'a, C: PairwiseComparator + Send>(
    comparator: &'a mut C,
    mut docs: Vec<String>,
) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
    Box::pin(async move {
        if docs.len() <= 1 {
            return Ok(docs);
        }

        let right = docs.split_off(docs.len() / 2);
        let left = sort(comparator, docs).await?;
        let right = sort(comparator, right).await?;
        merge(comparator, left, right).await
    })
}

/// Merge two ranked runs by asking the comparator which head is better.
async fn merge<C: PairwiseComparator + Send>(
    comparator: &mut C,
    left: Vec<String>,
    right: Vec<String>,
) -> Result<Vec<String>> {
    let mut result = Vec::with_capacity(left.len() + right.len());
    let mut i = 0;
    let mut j = 0;

    while i < left.len() && j < right.len() {
        let winner = comparator.compare(&left[i], &right[j]).await?;

        if winner == left[i] || winner == "Tie" {
            result.push(left[i].clone());
            i += 1;
        } else {
            result.push(right[j].clone());
            j += 1;
        }
    }

    result.extend_from_slice(&left[i..]);
    result.extend_from_slice(&right[j..]);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Scripted comparator: ranks documents by a fixed quality score and
    /// records every pair it is asked about.
    struct ScriptedComparator {
        quality: BTreeMap<String, i64>,
        asked: Vec<(String, String)>,
    }

    impl ScriptedComparator {
        fn new(quality: &[(&str, i64)]) -> Self {
            Self {
                quality: quality
                    .iter()
                    .map(|(name, q)| (name.to_string(), *q))
                    .collect(),
                asked: Vec::new(),
            }
        }

        fn calls(&self) -> usize {
            self.asked.len()
        }
    }

    #[async_trait]
    impl PairwiseComparator for ScriptedComparator {
        async fn compare(&mut self, doc_a: &str, doc_b: &str) -> Result<String> {
            self.asked.push((doc_a.to_string(), doc_b.to_string()));
            let a = self.quality[doc_a];
            let b = self.quality[doc_b];
            Ok(if a > b {
                doc_a.to_string()
            } else if b > a {
                doc_b.to_string()
            } else {
                "Tie".to_string()
            })
        }
    }

    /// Intransitive comparator: x beats y, y beats z, z beats x. With no
    /// consistent total order the result depends entirely on which pairs
    /// get asked, in which order.
    struct CyclicComparator {
        asked: Vec<(String, String)>,
    }

    #[async_trait]
    impl PairwiseComparator for CyclicComparator {
        async fn compare(&mut self, doc_a: &str, doc_b: &str) -> Result<String> {
            self.asked.push((doc_a.to_string(), doc_b.to_string()));
            let winner = match (doc_a, doc_b) {
                ("x", "y") | ("y", "x") => "x",
                ("y", "z") | ("z", "y") => "y",
                ("z", "x") | ("x", "z") => "z",
                _ => "Tie",
            };
            Ok(winner.to_string())
        }
    }

    fn names(docs: &[&str]) -> Vec<String> {
        docs.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(asked: &[(String, String)]) -> Vec<(&str, &str)> {
        asked
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn empty_and_single_lists_need_no_comparisons() {
        let mut cmp = ScriptedComparator::new(&[("a", 1)]);
        assert!(rank_documents(&mut cmp, vec![]).await.unwrap().is_empty());
        let one = rank_documents(&mut cmp, names(&["a"])).await.unwrap();
        assert_eq!(one, names(&["a"]));
        assert_eq!(cmp.calls(), 0);
    }

    #[tokio::test]
    async fn ranks_best_first() {
        let mut cmp =
            ScriptedComparator::new(&[("weak", 1), ("strong", 9), ("middle", 5), ("low", 2)]);
        let ranked = rank_documents(&mut cmp, names(&["weak", "strong", "middle", "low"]))
            .await
            .unwrap();
        assert_eq!(ranked, names(&["strong", "middle", "low", "weak"]));
    }

    #[tokio::test]
    async fn three_docs_split_at_midpoint_and_merge_heads() {
        // [x, y, z] splits into [x] and [y, z]: the right half is ranked
        // first (one comparison), then the singleton merges against it.
        let mut cmp = ScriptedComparator::new(&[("x", 3), ("y", 1), ("z", 2)]);
        let ranked = rank_documents(&mut cmp, names(&["x", "y", "z"]))
            .await
            .unwrap();
        assert_eq!(ranked, names(&["x", "z", "y"]));
        assert_eq!(pairs(&cmp.asked), vec![("y", "z"), ("x", "z")]);
    }

    #[tokio::test]
    async fn intransitive_verdicts_follow_the_split_order() {
        // x beats y beats z beats x: no ranking is "correct", so the
        // output is pinned by the comparison sequence alone. The split
        // ranks [y, z] first (y wins), then merges x against it (x wins),
        // and z is never compared with x.
        let mut cmp = CyclicComparator { asked: Vec::new() };
        let ranked = rank_documents(&mut cmp, names(&["x", "y", "z"]))
            .await
            .unwrap();
        assert_eq!(pairs(&cmp.asked), vec![("y", "z"), ("x", "y")]);
        assert_eq!(ranked, names(&["x", "y", "z"]));
    }

    #[tokio::test]
    async fn ties_keep_input_order() {
        let mut cmp = ScriptedComparator::new(&[("first", 5), ("second", 5), ("third", 5)]);
        let ranked = rank_documents(&mut cmp, names(&["first", "second", "third"]))
            .await
            .unwrap();
        assert_eq!(ranked, names(&["first", "second", "third"]));
    }

    #[tokio::test]
    async fn deterministic_for_same_answers() {
        let docs = ["d1", "d2", "d3", "d4", "d5"];
        let quality = [("d1", 3), ("d2", 8), ("d3", 1), ("d4", 9), ("d5", 4)];
        let mut cmp1 = ScriptedComparator::new(&quality);
        let mut cmp2 = ScriptedComparator::new(&quality);
        let r1 = rank_documents(&mut cmp1, names(&docs)).await.unwrap();
        let r2 = rank_documents(&mut cmp2, names(&docs)).await.unwrap();
        assert_eq!(r1, r2);
        assert_eq!(r1, names(&["d4", "d2", "d5", "d1", "d3"]));
    }

    #[tokio::test]
    async fn comparison_count_stays_subquadratic() {
        let quality: Vec<(String, i64)> = (0..16).map(|i| (format!("doc{}", i), i)).collect();
        let refs: Vec<(&str, i64)> = quality.iter().map(|(n, q)| (n.as_str(), *q)).collect();
        let mut cmp = ScriptedComparator::new(&refs);
        let docs: Vec<String> = quality.iter().map(|(n, _)| n.clone()).collect();
        rank_documents(&mut cmp, docs).await.unwrap();
        // n log n bound: 16 documents need at most 49 merge comparisons,
        // far below the 120 an all-pairs pass would take.
        assert!(cmp.calls() <= 49, "made {} comparisons", cmp.calls());
    }
}
