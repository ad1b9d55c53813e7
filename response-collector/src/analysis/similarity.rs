//! TF-IDF cosine similarity between an answer and the expected output

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Tokens are runs of two or more word characters, lowercased
static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN.find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}

/// Score `answer` against `expected` as a 0-100 percentage (two decimals).
///
/// Returns `None` when there is no ground truth, i.e. `expected` is empty
/// or whitespace only. A fresh two-document vocabulary is fit per call:
/// term weights are raw counts times the smoothed inverse document
/// frequency `ln((1 + n) / (1 + df)) + 1`, and the score is the cosine of
/// the two weight vectors.
pub fn similarity(answer: &str, expected: &str) -> Option<f64> {
    if expected.trim().is_empty() {
        return None;
    }
    if answer == expected {
        return Some(100.0);
    }
    Some(round2(cosine_tfidf(answer, expected) * 100.0))
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn term_counts(tokens: &[String]) -> BTreeMap<&str, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

fn cosine_tfidf(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    let tf_a = term_counts(&tokens_a);
    let tf_b = term_counts(&tokens_b);

    // With two documents a term occurs in one or both of them
    let n_docs = 2.0_f64;
    let idf = |term: &str| {
        let df = f64::from(u8::from(tf_a.contains_key(term)) + u8::from(tf_b.contains_key(term)));
        ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
    };
    let weights = |tf: &BTreeMap<&str, f64>| -> BTreeMap<String, f64> {
        tf.iter().map(|(term, count)| (term.to_string(), count * idf(*term))).collect()
    };
    let w_a = weights(&tf_a);
    let w_b = weights(&tf_b);

    let dot: f64 = w_a
        .iter()
        .filter_map(|(term, x)| w_b.get(term).map(|y| x * y))
        .sum();
    let norm_a = w_a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = w_b.values().map(|y| y * y).sum::<f64>().sqrt();

    // An empty f64 sum is -0.0; disjoint texts must score a positive zero
    if dot <= 0.0 || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}
