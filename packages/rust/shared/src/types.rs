//! Core domain types for reviewtopics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Topic label assigned by the topic model.
pub type TopicId = i32;

/// Topic label reserved for documents the clustering left unassigned.
pub const NOISE_TOPIC: TopicId = -1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one stage invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Opaque pagination token exchanged with the review-list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl Cursor {
    /// Sentinel value requesting the first page.
    pub const INITIAL: &'static str = "*";

    /// The cursor for the first page.
    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    /// Wrap a token returned by the API.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty token means the listing has no further pages.
    pub fn is_exhausted(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A store entity (game) found by discovery, with its review summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Display name from the search result.
    pub name: String,
    /// Numeric store identifier.
    pub app_id: u64,
    /// Release date as the store formats it.
    pub release_date: Option<String>,
    /// Summary label, e.g. "Mostly Positive".
    pub review_summary: Option<String>,
    /// Total number of reviews.
    pub review_count: u64,
    pub positive_review_count: Option<u64>,
    pub negative_review_count: Option<u64>,
    /// Store review score bucket.
    pub review_score: Option<u32>,
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

/// A single review as projected from the review-list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub recommendation_id: Option<String>,
    /// Author's account identifier.
    pub steamid: String,
    /// Author's total number of reviews.
    pub num_reviews: u64,
    /// Lifetime playtime in minutes.
    pub playtime_forever: u64,
    /// Playtime in minutes when the review was written.
    pub playtime_at_review: Option<u64>,
    pub language: String,
    pub review_text: String,
    #[serde(with = "timestamp_format")]
    pub timestamp_created: DateTime<Utc>,
    /// Whether the author recommends the game.
    pub voted_up: bool,
    pub votes_up: u64,
    pub votes_funny: u64,
    pub weighted_vote_score: Option<f64>,
}

/// One row of the intermediate reviews file: a review tagged with its game.
///
/// `review_text` is optional because rows read back from disk may have lost
/// their body; those rows are dropped before cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub recommendation_id: Option<String>,
    pub steamid: String,
    pub num_reviews: u64,
    pub playtime_forever: u64,
    pub playtime_at_review: Option<u64>,
    pub language: String,
    pub review_text: Option<String>,
    #[serde(with = "timestamp_format")]
    pub timestamp_created: DateTime<Utc>,
    pub voted_up: bool,
    pub votes_up: u64,
    pub votes_funny: u64,
    pub weighted_vote_score: Option<f64>,
    pub game_name: String,
    pub app_id: u64,
}

impl ReviewRow {
    /// Tag a fetched review with the game it belongs to.
    pub fn tagged(review: Review, game: &Game) -> Self {
        Self {
            recommendation_id: review.recommendation_id,
            steamid: review.steamid,
            num_reviews: review.num_reviews,
            playtime_forever: review.playtime_forever,
            playtime_at_review: review.playtime_at_review,
            language: review.language,
            review_text: Some(review.review_text),
            timestamp_created: review.timestamp_created,
            voted_up: review.voted_up,
            votes_up: review.votes_up,
            votes_funny: review.votes_funny,
            weighted_vote_score: review.weighted_vote_score,
            game_name: game.name.clone(),
            app_id: game.app_id,
        }
    }
}

/// One row of the enriched output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRow {
    pub recommendation_id: Option<String>,
    pub steamid: String,
    pub num_reviews: u64,
    pub playtime_forever: u64,
    pub playtime_at_review: Option<u64>,
    pub language: String,
    pub review_text: String,
    #[serde(with = "timestamp_format")]
    pub timestamp_created: DateTime<Utc>,
    pub voted_up: bool,
    pub votes_up: u64,
    pub votes_funny: u64,
    pub weighted_vote_score: Option<f64>,
    pub game_name: String,
    pub app_id: u64,
    /// Normalized text fed to the topic model; empty when cleaning failed.
    pub cleaned_text: String,
    /// Assigned topic; `None` when topic modelling did not run to completion.
    pub topic: Option<TopicId>,
}

impl TopicRow {
    /// Build an enriched row from a review row with a body. Returns `None` when
    /// the body is missing.
    pub fn from_row(row: ReviewRow, cleaned_text: String) -> Option<Self> {
        let review_text = row.review_text?;
        Some(Self {
            recommendation_id: row.recommendation_id,
            steamid: row.steamid,
            num_reviews: row.num_reviews,
            playtime_forever: row.playtime_forever,
            playtime_at_review: row.playtime_at_review,
            language: row.language,
            review_text,
            timestamp_created: row.timestamp_created,
            voted_up: row.voted_up,
            votes_up: row.votes_up,
            votes_funny: row.votes_funny,
            weighted_vote_score: row.weighted_vote_score,
            game_name: row.game_name,
            app_id: row.app_id,
            cleaned_text,
            topic: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Timestamp format
// ---------------------------------------------------------------------------

/// Second-precision UTC timestamps persisted as `YYYY-MM-DD HH:MM:SS`.
pub mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
