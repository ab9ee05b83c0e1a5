//! Cursor-paginated review fetcher.
//!
//! Pulls one page at a time from `appreviews/<app_id>`, advancing the cursor on
//! success. Transport failures draw from a retry budget shared by the whole run
//! and re-request the same cursor; a response with the wrong shape ends the run.
//! Whatever was collected before the run ended is returned.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use reviewtopics_shared::{
    ApiConfig, Cursor, FetchConfig, Result, RetryPolicy, Review, ReviewTopicsError,
};

use crate::schema::{ReviewsPage, project};

/// User-Agent string for review requests.
const USER_AGENT: &str = concat!("reviewtopics/", env!("CARGO_PKG_VERSION"));

/// Reviews requested per page (the endpoint's maximum).
pub const PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// FetchReport
// ---------------------------------------------------------------------------

/// Why a fetch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page came back with no reviews.
    NoMoreReviews,
    /// The API returned an empty cursor.
    CursorExhausted,
    /// `max_reviews` were collected.
    LimitReached,
    /// Every allowed attempt failed at the transport level.
    RetriesExhausted,
    /// A response did not match the expected schema.
    MalformedResponse,
}

/// Outcome of one fetch run.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Collected reviews, at most `max_reviews`.
    pub reviews: Vec<Review>,
    pub stop: StopReason,
    /// Successful pages.
    pub pages: usize,
    /// Failed requests charged to the retry budget.
    pub failures: u32,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Runtime fetch settings, merged from config and CLI flags.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Review language filter.
    pub language: String,
    /// Ordering filter (`recent`).
    pub filter: String,
    /// Pause between successful pages.
    pub polite_delay: Duration,
    /// Attempts and backoff for failed requests.
    pub retry: RetryPolicy,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl FetchOptions {
    pub fn from_config(api: &ApiConfig, fetch: &FetchConfig) -> Self {
        Self {
            language: api.language.clone(),
            filter: fetch.filter.clone(),
            polite_delay: fetch.polite_delay(),
            retry: fetch.retry_policy(),
            timeout: Duration::from_secs(api.timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// ReviewFetcher
// ---------------------------------------------------------------------------

/// Sequential, rate-limited review fetcher for a single store.
pub struct ReviewFetcher {
    base_url: Url,
    options: FetchOptions,
}

impl ReviewFetcher {
    /// Create a fetcher against `base_url` (normally the store root).
    pub fn new(base_url: Url, options: FetchOptions) -> Self {
        Self { base_url, options }
    }

    /// Fetch up to `max_reviews` reviews for `app_id`, newest first.
    ///
    /// Never fails because of the remote side: retries, exhaustion, and
    /// malformed pages all end the run with the reviews gathered so far. `Err`
    /// means the run could not start (bad URL, client construction).
    #[instrument(skip(self), fields(app_id))]
    pub async fn fetch(&self, app_id: u64, max_reviews: usize) -> Result<FetchReport> {
        let url = self
            .base_url
            .join(&format!("appreviews/{app_id}"))
            .map_err(|e| ReviewTopicsError::validation(format!("review URL for {app_id}: {e}")))?;

        // One client per run; its connection pool is dropped on every exit path.
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.options.timeout)
            .build()
            .map_err(|e| ReviewTopicsError::Network(format!("failed to build HTTP client: {e}")))?;

        let mut cursor = Cursor::initial();
        let mut reviews: Vec<Review> = Vec::new();
        let mut budget = self.options.retry.budget();
        let mut pages = 0usize;
        let mut failures = 0u32;

        let stop = loop {
            if reviews.len() >= max_reviews {
                break StopReason::LimitReached;
            }
            if !budget.has_remaining() {
                break StopReason::RetriesExhausted;
            }

            let page = match self.fetch_page(&client, &url, &cursor).await {
                Ok(page) => page,
                Err(e) if e.is_transient() => {
                    failures += 1;
                    match budget.record_failure() {
                        Some(delay) => {
                            warn!(
                                error = %e,
                                %cursor,
                                retries_left = budget.remaining(),
                                "review request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            error!(error = %e, %cursor, "review request failed, no retries left");
                        }
                    }
                    continue;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        %cursor,
                        "unexpected review page format, stopping"
                    );
                    break StopReason::MalformedResponse;
                }
            };

            if page.reviews.is_empty() && page.malformed.is_none() {
                debug!(%cursor, "empty review page");
                break StopReason::NoMoreReviews;
            }

            if !page.reviews.is_empty() {
                pages += 1;
                reviews.extend(page.reviews);
                debug!(page = pages, collected = reviews.len(), "review page fetched");
            }

            if let Some(e) = page.malformed {
                error!(
                    error = %e,
                    %cursor,
                    collected = reviews.len(),
                    "malformed review in page, stopping"
                );
                break StopReason::MalformedResponse;
            }

            if page.cursor.is_exhausted() {
                break StopReason::CursorExhausted;
            }
            cursor = page.cursor;

            if reviews.len() >= max_reviews {
                break StopReason::LimitReached;
            }

            tokio::time::sleep(self.options.polite_delay).await;
        };

        reviews.truncate(max_reviews);

        info!(
            collected = reviews.len(),
            pages,
            failures,
            ?stop,
            "review fetch finished"
        );

        Ok(FetchReport {
            reviews,
            stop,
            pages,
            failures,
        })
    }

    /// Request and decode one page.
    ///
    /// Transport problems and undecodable bodies come back as
    /// [`ReviewTopicsError::Network`]; a JSON body with the wrong shape as
    /// [`ReviewTopicsError::Parse`]. A bad review entry does not fail the
    /// page: the entries before it are returned with the error in
    /// [`Page::malformed`].
    async fn fetch_page(&self, client: &Client, url: &Url, cursor: &Cursor) -> Result<Page> {
        let page_size = PAGE_SIZE.to_string();
        let response = client
            .get(url.as_str())
            .query(&[
                ("cursor", cursor.as_str()),
                ("json", "1"),
                ("filter", self.options.filter.as_str()),
                ("num_per_page", page_size.as_str()),
                ("language", self.options.language.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReviewTopicsError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReviewTopicsError::Network(format!("{url}: HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ReviewTopicsError::Network(format!("{url}: unreadable body: {e}")))?;

        let raw: ReviewsPage = serde_json::from_value(body)
            .map_err(|e| ReviewTopicsError::parse(format!("{url}: {e}")))?;

        let entries = raw.reviews.unwrap_or_default();
        let mut reviews = Vec::with_capacity(entries.len());
        let mut malformed = None;
        for entry in entries {
            match project(entry) {
                Ok(review) => reviews.push(review),
                Err(e) => {
                    malformed = Some(e);
                    break;
                }
            }
        }

        Ok(Page {
            reviews,
            cursor: Cursor::new(raw.cursor.unwrap_or_default()),
            malformed,
        })
    }
}

/// A decoded page.
struct Page {
    reviews: Vec<Review>,
    cursor: Cursor,
    /// First entry that failed to project; `reviews` holds the ones before it.
    malformed: Option<ReviewTopicsError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const APP_ID: u64 = 553850;
    const REVIEWS_PATH: &str = "/appreviews/553850";

    fn fixture(name: &str) -> String {
        let path = format!("../../../fixtures/steam/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn json_page(name: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .set_body_string(fixture(name))
            .insert_header("content-type", "application/json")
    }

    fn fetcher(server: &MockServer, max_retries: u32) -> ReviewFetcher {
        let base = Url::parse(&format!("{}/", server.uri())).unwrap();
        ReviewFetcher::new(
            base,
            FetchOptions {
                language: "english".into(),
                filter: "recent".into(),
                polite_delay: Duration::ZERO,
                retry: RetryPolicy::new(max_retries, Duration::ZERO),
                timeout: Duration::from_secs(5),
            },
        )
    }

    async fn mount_page(server: &MockServer, cursor: &str, fixture_name: &str) {
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", cursor))
            .respond_with(json_page(fixture_name))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn empty_first_page_returns_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .respond_with(json_page("reviews_empty.json"))
            .expect(1)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();

        assert!(report.reviews.is_empty());
        assert_eq!(report.stop, StopReason::NoMoreReviews);
        assert_eq!(report.failures, 0);
        assert_eq!(report.pages, 0);
    }

    #[tokio::test]
    async fn sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "*"))
            .and(query_param("json", "1"))
            .and(query_param("filter", "recent"))
            .and(query_param("num_per_page", "100"))
            .and(query_param("language", "english"))
            .respond_with(json_page("reviews_last.json"))
            .expect(1)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();
        assert_eq!(report.reviews.len(), 1);
        assert_eq!(report.stop, StopReason::CursorExhausted);
    }

    #[tokio::test]
    async fn follows_cursor_across_pages() {
        let server = MockServer::start().await;
        mount_page(&server, "*", "reviews_page1.json").await;
        mount_page(&server, "AoJ4page2", "reviews_page2.json").await;
        mount_page(&server, "AoJ4page3", "reviews_last.json").await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();

        let ids: Vec<_> = report
            .reviews
            .iter()
            .map(|r| r.recommendation_id.as_deref().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec!["160010001", "160010002", "160010003", "160010004", "160010005"]
        );
        assert_eq!(report.pages, 3);
        assert_eq!(report.stop, StopReason::CursorExhausted);
    }

    #[tokio::test]
    async fn truncates_to_max_reviews() {
        let server = MockServer::start().await;
        mount_page(&server, "*", "reviews_page1.json").await;
        mount_page(&server, "AoJ4page2", "reviews_page2.json").await;

        let report = fetcher(&server, 5).fetch(APP_ID, 3).await.unwrap();

        assert_eq!(report.reviews.len(), 3);
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(
            report.reviews[2].recommendation_id.as_deref(),
            Some("160010003")
        );
    }

    #[tokio::test]
    async fn limit_on_page_boundary_stops_without_next_request() {
        let server = MockServer::start().await;
        mount_page(&server, "*", "reviews_page1.json").await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "AoJ4page2"))
            .respond_with(json_page("reviews_page2.json"))
            .expect(0)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 2).await.unwrap();
        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.stop, StopReason::LimitReached);
    }

    #[tokio::test]
    async fn every_request_failing_uses_exact_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let report = fetcher(&server, 3).fetch(APP_ID, 1000).await.unwrap();

        assert!(report.reviews.is_empty());
        assert_eq!(report.stop, StopReason::RetriesExhausted);
        assert_eq!(report.failures, 3);
    }

    #[tokio::test]
    async fn failure_retries_same_cursor_and_keeps_partial_results() {
        let server = MockServer::start().await;
        mount_page(&server, "*", "reviews_page1.json").await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "AoJ4page2"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let report = fetcher(&server, 2).fetch(APP_ID, 1000).await.unwrap();

        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.pages, 1);
        assert_eq!(report.stop, StopReason::RetriesExhausted);
    }

    #[tokio::test]
    async fn wrong_shape_aborts_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"success":1,"reviews":"not-a-list","cursor":"x"}"#)
                    .insert_header("content-type", "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();

        assert!(report.reviews.is_empty());
        assert_eq!(report.stop, StopReason::MalformedResponse);
        assert_eq!(report.failures, 0);
    }

    #[tokio::test]
    async fn malformed_page_after_success_keeps_earlier_reviews() {
        let server = MockServer::start().await;
        mount_page(&server, "*", "reviews_page1.json").await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "AoJ4page2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"reviews":[{"review":"no author"}],"cursor":"x"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();
        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.stop, StopReason::MalformedResponse);
    }

    #[tokio::test]
    async fn bad_review_mid_page_keeps_reviews_before_it() {
        let server = MockServer::start().await;
        let page1: serde_json::Value = serde_json::from_str(&fixture("reviews_page1.json")).unwrap();
        let mut entries = page1["reviews"].as_array().cloned().unwrap();
        entries.push(serde_json::json!({"review": "no author"}));
        entries.push(page1["reviews"][0].clone());

        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "*"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"reviews": entries, "cursor": "next"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .and(query_param("cursor", "next"))
            .respond_with(json_page("reviews_last.json"))
            .expect(0)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 1000).await.unwrap();

        let ids: Vec<_> = report
            .reviews
            .iter()
            .map(|r| r.recommendation_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["160010001", "160010002"]);
        assert_eq!(report.pages, 1);
        assert_eq!(report.stop, StopReason::MalformedResponse);
    }

    #[tokio::test]
    async fn non_json_body_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REVIEWS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .expect(2)
            .mount(&server)
            .await;

        let report = fetcher(&server, 2).fetch(APP_ID, 1000).await.unwrap();
        assert_eq!(report.stop, StopReason::RetriesExhausted);
        assert_eq!(report.failures, 2);
    }

    #[tokio::test]
    async fn zero_max_reviews_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(json_page("reviews_page1.json"))
            .expect(0)
            .mount(&server)
            .await;

        let report = fetcher(&server, 5).fetch(APP_ID, 0).await.unwrap();
        assert!(report.reviews.is_empty());
        assert_eq!(report.stop, StopReason::LimitReached);
    }
}
