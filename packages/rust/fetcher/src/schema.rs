//! Wire schema for the review-list endpoint.
//!
//! Fields the projection needs are required; nullable attributes are `Option`.
//! A page or review that fails to deserialize is a contract violation, not a
//! transient error. Reviews are kept as raw JSON at page level and projected
//! one at a time, so the reviews ahead of a bad one survive.

use chrono::DateTime;
use serde::{Deserialize, Deserializer};

use reviewtopics_shared::{Result, Review, ReviewTopicsError};

/// One page of `appreviews` output.
#[derive(Debug, Deserialize)]
pub(crate) struct ReviewsPage {
    /// Absent when the app has no (more) reviews.
    #[serde(default)]
    pub reviews: Option<Vec<serde_json::Value>>,
    /// Token for the next page; empty or absent at the end.
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReview {
    pub recommendationid: Option<String>,
    pub author: RawAuthor,
    pub language: String,
    pub review: String,
    pub timestamp_created: i64,
    pub voted_up: bool,
    pub votes_up: u64,
    pub votes_funny: u64,
    #[serde(default, deserialize_with = "lenient_score")]
    pub weighted_vote_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAuthor {
    pub steamid: String,
    pub num_reviews: u64,
    pub playtime_forever: u64,
    #[serde(default)]
    pub playtime_at_review: Option<u64>,
}

impl TryFrom<RawReview> for Review {
    type Error = ReviewTopicsError;

    fn try_from(raw: RawReview) -> Result<Self> {
        let timestamp_created = DateTime::from_timestamp(raw.timestamp_created, 0)
            .ok_or_else(|| {
                ReviewTopicsError::parse(format!(
                    "timestamp_created out of range: {}",
                    raw.timestamp_created
                ))
            })?;

        Ok(Review {
            recommendation_id: raw.recommendationid,
            steamid: raw.author.steamid,
            num_reviews: raw.author.num_reviews,
            playtime_forever: raw.author.playtime_forever,
            playtime_at_review: raw.author.playtime_at_review,
            language: raw.language,
            review_text: raw.review,
            timestamp_created,
            voted_up: raw.voted_up,
            votes_up: raw.votes_up,
            votes_funny: raw.votes_funny,
            weighted_vote_score: raw.weighted_vote_score,
        })
    }
}

/// Decode and project one review entry of a page.
pub(crate) fn project(value: serde_json::Value) -> Result<Review> {
    let raw: RawReview = serde_json::from_value(value)
        .map_err(|e| ReviewTopicsError::parse(format!("review entry: {e}")))?;
    Review::try_from(raw)
}

/// The API sends the score as a decimal string, but as a bare `0` for unscored reviews.
fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Score {
        Number(f64),
        Text(String),
    }

    match Option::<Score>::deserialize(d)? {
        None => Ok(None),
        Some(Score::Number(n)) => Ok(Some(n)),
        Some(Score::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
