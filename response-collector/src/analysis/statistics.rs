//! Per-task summary statistics and most-similar selection

use serde::{Deserialize, Serialize};

use super::similarity::round2;

/// Summary of the numeric similarity scores of one task.
///
/// Each field is rounded to two decimals on its own; all zero when no
/// backend produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stddev: f64,
}

impl SimilarityStats {
    /// Summarize the defined scores, ignoring `None` (not applicable)
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let mut valid: Vec<f64> = scores.into_iter().flatten().collect();
        if valid.is_empty() {
            return Self::default();
        }
        valid.sort_by(f64::total_cmp);

        let n = valid.len() as f64;
        // Summation error must not push the mean outside [min, max]
        let mean = (valid.iter().sum::<f64>() / n).clamp(valid[0], valid[valid.len() - 1]);
        let variance = valid.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        let mid = valid.len() / 2;
        let median = if valid.len() % 2 == 0 {
            (valid[mid - 1] + valid[mid]) / 2.0
        } else {
            valid[mid]
        };

        Self {
            min: round2(valid[0]),
            max: round2(valid[valid.len() - 1]),
            mean: round2(mean),
            median: round2(median),
            stddev: round2(variance.sqrt()),
        }
    }
}

/// The backend whose answer came closest to the expected output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MostSimilar {
    pub backend: String,
    pub score: Option<f64>,
}

/// Pick the highest-scoring backend.
///
/// A defined score beats `None`; among equals the earliest entry wins, so
/// with no scores at all the first backend is returned.
pub fn most_similar<S: AsRef<str>>(scores: &[(S, Option<f64>)]) -> Option<MostSimilar> {
    let mut best: Option<(&S, Option<f64>)> = None;
    for (name, score) in scores {
        let better = match (best, score) {
            (None, _) => true,
            (Some((_, None)), Some(_)) => true,
            (Some((_, Some(current))), Some(candidate)) => *candidate > current,
            _ => false,
        };
        if better {
            best = Some((name, *score));
        }
    }
    best.map(|(name, score)| MostSimilar {
        backend: name.as_ref().to_string(),
        score,
    })
}
