//! Wire schema for the search and hover-details endpoints.

use serde::Deserialize;

use reviewtopics_shared::Game;

/// `api/storesearch` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    /// Absent when nothing matched.
    #[serde(default)]
    pub items: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    pub name: String,
    pub id: u64,
}

/// `apphoverpublic` response. `ReviewSummary` is required: a candidate
/// without it cannot be described.
#[derive(Debug, Deserialize)]
pub(crate) struct HoverResponse {
    #[serde(rename = "strReleaseDate", default)]
    pub release_date: Option<String>,
    #[serde(rename = "ReviewSummary")]
    pub review_summary: RawReviewSummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawReviewSummary {
    #[serde(rename = "strReviewSummary", default)]
    pub summary: Option<String>,
    #[serde(rename = "cReviews", default)]
    pub reviews: u64,
    #[serde(rename = "cRecommendationsPositive", default)]
    pub positive: Option<u64>,
    #[serde(rename = "cRecommendationsNegative", default)]
    pub negative: Option<u64>,
    #[serde(rename = "nReviewScore", default)]
    pub score: Option<u32>,
}

impl HoverResponse {
    /// Combine with the search hit into a [`Game`].
    pub fn into_game(self, item: SearchItem) -> Game {
        let summary = self.review_summary;
        Game {
            name: item.name,
            app_id: item.id,
            release_date: self.release_date,
            review_summary: summary.summary,
            review_count: summary.reviews,
            positive_review_count: summary.positive,
            negative_review_count: summary.negative,
            review_score: summary.score,
        }
    }
}
