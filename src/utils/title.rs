//! Title normalization and Jaccard similarity for cross-source matching.
//!
//! Every source that resolves papers by title scores candidates with
//! [`similarity`] and accepts the best one only when it reaches
//! [`MATCH_THRESHOLD`].

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::{Match, Paper};

/// Minimum similarity for two titles to denote the same paper
pub const MATCH_THRESHOLD: f64 = 0.7;

fn non_word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid regex"))
}

/// Lowercase, drop punctuation, collapse whitespace.
pub fn normalize(title: &str) -> String {
    let lowered = title.to_lowercase();
    collapse_whitespace(&non_word_regex().replace_all(&lowered, ""))
}

/// Strip punctuation and collapse whitespace without changing case.
///
/// Used to build provider query strings from a cited title.
pub fn clean_for_query(title: &str) -> String {
    collapse_whitespace(&non_word_regex().replace_all(title, ""))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Jaccard index of the normalized word sets of `a` and `b`.
///
/// Returns `0.0` when either title has no words after normalization.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    intersection as f64 / union as f64
}

/// Whether a score is good enough to accept a candidate
pub fn is_match(score: f64) -> bool {
    score >= MATCH_THRESHOLD
}

/// Pick the candidate whose title best matches `title`.
///
/// Ties keep the earlier candidate. Returns `None` when no candidate reaches
/// [`MATCH_THRESHOLD`].
pub fn best_match<I>(title: &str, candidates: I) -> Option<Match>
where
    I: IntoIterator<Item = Paper>,
{
    let mut best: Option<Match> = None;

    for paper in candidates {
        let score = similarity(title, paper.title());
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(Match { paper, score });
        }
    }

    best.filter(|m| is_match(m.score))
}
