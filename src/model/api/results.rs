use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_string_map, Id};

/// Aggregated results for a single post.
///
/// Always produced by a full recount of non-invalidated votes; any cached
/// copy is write-through and may be dropped at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostResults {
    /// Vote count per candidate. Every active candidate of the post appears,
    /// zero counts included.
    #[serde(with = "serde_string_map")]
    pub tallies: HashMap<Id, u64>,
    pub total_votes: u64,
    /// Percentage of eligible voters who have cast a counted vote for this post.
    pub turnout_percentage: f64,
}

impl PostResults {
    /// Turnout as a percentage, 0 when there are no eligible voters.
    pub fn turnout(total_votes: u64, eligible_voters: u64) -> f64 {
        if eligible_voters == 0 {
            0.0
        } else {
            (total_votes as f64 / eligible_voters as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turnout_percentage() {
        assert_eq!(PostResults::turnout(0, 0), 0.0);
        assert_eq!(PostResults::turnout(0, 10), 0.0);
        assert_eq!(PostResults::turnout(5, 10), 50.0);
        assert_eq!(PostResults::turnout(10, 10), 100.0);
        assert!((PostResults::turnout(1, 3) - 33.333333).abs() < 0.001);
    }
}
