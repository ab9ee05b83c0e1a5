//! Topic distribution over an enriched collection.

use std::collections::BTreeMap;

use serde::Serialize;

use reviewtopics_shared::{NOISE_TOPIC, TopicId, TopicRow};

/// Per-topic document counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopicSummary {
    /// Rows inspected.
    pub rows: usize,
    /// Rows with no topic (modelling failed or never ran).
    pub unassigned: usize,
    /// Rows the clustering left as outliers.
    pub noise: usize,
    /// Document count per non-noise topic, ordered by topic id.
    pub topics: BTreeMap<TopicId, usize>,
}

impl TopicSummary {
    pub fn from_topics(topics: impl IntoIterator<Item = Option<TopicId>>) -> Self {
        let mut summary = Self::default();
        for topic in topics {
            summary.rows += 1;
            match topic {
                None => summary.unassigned += 1,
                Some(NOISE_TOPIC) => summary.noise += 1,
                Some(t) => *summary.topics.entry(t).or_default() += 1,
            }
        }
        summary
    }

    pub fn from_rows(rows: &[TopicRow]) -> Self {
        Self::from_topics(rows.iter().map(|r| r.topic))
    }

    /// Number of distinct non-noise topics.
    pub fn distinct_topics(&self) -> usize {
        self.topics.len()
    }

    /// Topics ordered by descending size, ties by id.
    pub fn largest(&self) -> Vec<(TopicId, usize)> {
        let mut ranked: Vec<_> = self.topics.iter().map(|(&t, &n)| (t, n)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_noise_and_unassigned_separately() {
        let summary =
            TopicSummary::from_topics([Some(0), Some(-1), Some(0), None, Some(3), Some(-1)]);
        assert_eq!(summary.rows, 6);
        assert_eq!(summary.noise, 2);
        assert_eq!(summary.unassigned, 1);
        assert_eq!(summary.distinct_topics(), 2);
        assert_eq!(summary.topics[&0], 2);
    }

    #[test]
    fn largest_orders_by_size_then_id() {
        let summary = TopicSummary::from_topics([Some(2), Some(1), Some(1), Some(0)]);
        assert_eq!(summary.largest(), vec![(1, 2), (0, 1), (2, 1)]);
    }

    #[test]
    fn empty_collection() {
        let summary = TopicSummary::from_topics(Vec::new());
        assert_eq!(summary, TopicSummary::default());
    }
}
