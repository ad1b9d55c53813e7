//! Answer normalization, similarity scoring and aggregation

pub mod comparator;
pub mod normalize;
pub mod similarity;
pub mod statistics;

pub use comparator::{BackendStanding, Leaderboard};
pub use normalize::{normalize, LINE_SEPARATOR};
pub use similarity::{round2, similarity};
pub use statistics::{most_similar, MostSimilar, SimilarityStats};
