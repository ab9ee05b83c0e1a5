//! The two pipeline stages.
//!
//! - [`run_extract`]: search → fetch reviews per game → tag → reviews CSV
//! - [`run_model`]: reviews CSV → normalize → topic model → topics CSV + model
//!
//! The stages share nothing in memory; the reviews CSV is the handoff.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use url::Url;

use reviewtopics_discovery::DiscoveryOptions;
use reviewtopics_fetcher::{FetchOptions, ReviewFetcher};
use reviewtopics_shared::{Result, ReviewRow, RunId, TopicRow};

use crate::manifest::ModelManifest;
use crate::summary::TopicSummary;
use crate::topics::{TopicModel, TopicParams};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each game's reviews have been fetched.
    fn game_fetched(&self, name: &str, reviews: usize, current: usize, total: usize);
    /// Called periodically while review texts are normalized.
    fn texts_cleaned(&self, current: usize, total: usize);
    /// Called when the stage completes.
    fn done(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn game_fetched(&self, _name: &str, _reviews: usize, _current: usize, _total: usize) {}
    fn texts_cleaned(&self, _current: usize, _total: usize) {}
    fn done(&self, _message: &str) {}
}

/// How often `texts_cleaned` fires during normalization.
const CLEAN_PROGRESS_EVERY: usize = 500;

// ---------------------------------------------------------------------------
// Stage 1: extract
// ---------------------------------------------------------------------------

/// Configuration for [`run_extract`].
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Free-text search query.
    pub query: String,
    pub discovery: DiscoveryOptions,
    /// Store root for the review endpoint.
    pub base_url: Url,
    pub fetch: FetchOptions,
    /// Upper bound on reviews per game.
    pub max_reviews: usize,
    /// Reviews CSV to write.
    pub output: PathBuf,
}

/// Result of [`run_extract`].
#[derive(Debug)]
pub struct ExtractResult {
    pub run_id: RunId,
    /// Games that passed discovery.
    pub games: usize,
    /// Games whose fetch could not start.
    pub failed_games: usize,
    /// Rows written.
    pub reviews: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Run stage 1.
///
/// A failed search or an unwritable output is an error. A game whose fetch
/// fails is logged and skipped; the remaining games still run.
#[instrument(skip_all, fields(query = %config.query))]
pub async fn run_extract(
    config: &ExtractConfig,
    progress: &dyn ProgressReporter,
) -> Result<ExtractResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, "starting extract stage");

    progress.phase("Searching store");
    let games = reviewtopics_discovery::discover(&config.query, &config.discovery).await?;
    if games.is_empty() {
        warn!("no games found for query");
    } else {
        info!(games = games.len(), "processing reviews");
    }

    progress.phase("Fetching reviews");
    let fetcher = ReviewFetcher::new(config.base_url.clone(), config.fetch.clone());
    let mut rows: Vec<ReviewRow> = Vec::new();
    let mut failed_games = 0;

    for (i, game) in games.iter().enumerate() {
        match fetcher.fetch(game.app_id, config.max_reviews).await {
            Ok(report) => {
                let fetched = report.reviews.len();
                rows.extend(
                    report
                        .reviews
                        .into_iter()
                        .map(|review| ReviewRow::tagged(review, game)),
                );
                progress.game_fetched(&game.name, fetched, i + 1, games.len());
            }
            Err(e) => {
                failed_games += 1;
                warn!(
                    app_id = game.app_id,
                    name = %game.name,
                    error = %e,
                    "failed to fetch reviews, skipping game"
                );
            }
        }
    }

    progress.phase("Writing reviews");
    reviewtopics_storage::write_reviews(&config.output, &rows)?;

    let result = ExtractResult {
        run_id,
        games: games.len(),
        failed_games,
        reviews: rows.len(),
        output: config.output.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        games = result.games,
        failed_games,
        reviews = result.reviews,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "extract stage complete"
    );
    progress.done(&format!(
        "{} reviews from {} games",
        result.reviews, result.games
    ));

    Ok(result)
}

// ---------------------------------------------------------------------------
// Stage 2: model
// ---------------------------------------------------------------------------

/// Configuration for [`run_model`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Reviews CSV written by stage 1.
    pub input: PathBuf,
    /// Enriched CSV to write.
    pub output: PathBuf,
    /// Where the model process saves the fitted model.
    pub model_path: PathBuf,
    pub serialization: String,
    pub params: TopicParams,
    /// Tool version recorded in the model manifest.
    pub tool_version: String,
}

/// Result of [`run_model`].
#[derive(Debug)]
pub struct ModelResult {
    pub run_id: RunId,
    /// Rows loaded from the input.
    pub loaded: usize,
    /// Rows dropped for a missing review body.
    pub dropped: usize,
    /// Topic distribution of the written rows.
    pub summary: TopicSummary,
    /// Whether topics were assigned (and the model saved).
    pub modelled: bool,
    /// Manifest of the saved model, when one was saved.
    pub manifest: Option<PathBuf>,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Run stage 2.
///
/// A fit failure is logged and leaves the `topic` column empty; the enriched
/// file is still written and the model is not saved. Unreadable input,
/// unwritable output, and a failed model save are errors.
#[instrument(skip_all, fields(input = %config.input.display()))]
pub fn run_model(
    config: &ModelConfig,
    model: &mut dyn TopicModel,
    progress: &dyn ProgressReporter,
) -> Result<ModelResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, "starting model stage");

    progress.phase("Loading reviews");
    let reviews = reviewtopics_storage::read_reviews(&config.input)?;
    let loaded = reviews.len();

    progress.phase("Cleaning review text");
    let mut rows = clean_rows(reviews, progress);
    let dropped = loaded - rows.len();
    if dropped > 0 {
        info!(dropped, "dropped reviews without text");
    }

    progress.phase("Fitting topic model");
    let modelled = assign_topics(&mut rows, model, &config.params);

    progress.phase("Writing topics");
    reviewtopics_storage::write_topic_rows(&config.output, &rows)?;
    let summary = TopicSummary::from_rows(&rows);

    let manifest = if modelled {
        progress.phase("Saving topic model");
        let saved = model.save(&config.model_path, &config.serialization)?;
        info!(path = %saved.display(), "topic model saved");
        let manifest = ModelManifest::build(
            run_id.clone(),
            &config.tool_version,
            &saved,
            &config.serialization,
            &config.params,
            &summary,
        )?;
        Some(manifest.write()?)
    } else {
        None
    };

    let result = ModelResult {
        run_id,
        loaded,
        dropped,
        summary,
        modelled,
        manifest,
        output: config.output.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        rows = result.summary.rows,
        topics = result.summary.distinct_topics(),
        noise = result.summary.noise,
        modelled,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "model stage complete"
    );
    progress.done(&format!(
        "{} reviews, {} topics",
        result.summary.rows,
        result.summary.distinct_topics()
    ));

    Ok(result)
}

/// Drop rows without a body and normalize the rest.
fn clean_rows(reviews: Vec<ReviewRow>, progress: &dyn ProgressReporter) -> Vec<TopicRow> {
    let total = reviews.len();
    let mut rows = Vec::with_capacity(total);
    for (i, review) in reviews.into_iter().enumerate() {
        let cleaned = review
            .review_text
            .as_deref()
            .map(reviewtopics_text::normalize);
        if let Some(row) = cleaned.and_then(|c| TopicRow::from_row(review, c)) {
            rows.push(row);
        }
        if (i + 1) % CLEAN_PROGRESS_EVERY == 0 || i + 1 == total {
            progress.texts_cleaned(i + 1, total);
        }
    }
    rows
}

/// Fit the model over the cleaned texts and store the labels on `rows`.
/// Returns whether topics were assigned.
fn assign_topics(rows: &mut [TopicRow], model: &mut dyn TopicModel, params: &TopicParams) -> bool {
    if rows.is_empty() {
        warn!("no documents to model, skipping topic model");
        return false;
    }

    let documents: Vec<String> = rows.iter().map(|r| r.cleaned_text.clone()).collect();
    match model.fit_transform(&documents, params) {
        Ok(topics) if topics.len() == rows.len() => {
            for (row, topic) in rows.iter_mut().zip(topics) {
                row.topic = Some(topic);
            }
            true
        }
        Ok(topics) => {
            error!(
                documents = rows.len(),
                topics = topics.len(),
                "topic model returned wrong number of labels"
            );
            false
        }
        Err(e) => {
            error!(error = %e, "topic modelling failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::DateTime;
    use uuid::Uuid;

    use super::*;
    use reviewtopics_shared::{ReviewTopicsError, TopicId, TopicsConfig};

    /// In-process model: labels documents by length, or fails on demand.
    #[derive(Default)]
    struct FakeModel {
        fail_fit: bool,
        short_by_one: bool,
        fitted: Vec<String>,
        saved: Option<PathBuf>,
    }

    impl TopicModel for FakeModel {
        fn fit_transform(
            &mut self,
            documents: &[String],
            _params: &TopicParams,
        ) -> Result<Vec<TopicId>> {
            if self.fail_fit {
                return Err(ReviewTopicsError::TopicModel("fit exploded".into()));
            }
            self.fitted = documents.to_vec();
            let mut topics: Vec<TopicId> = documents
                .iter()
                .map(|d| if d.is_empty() { -1 } else { (d.len() % 2) as TopicId })
                .collect();
            if self.short_by_one {
                topics.pop();
            }
            Ok(topics)
        }

        fn save(&mut self, path: &Path, _serialization: &str) -> Result<PathBuf> {
            std::fs::write(path, b"model").map_err(|e| ReviewTopicsError::io(path, e))?;
            self.saved = Some(path.to_path_buf());
            Ok(path.to_path_buf())
        }
    }

    fn row(id: &str, text: Option<&str>) -> ReviewRow {
        ReviewRow {
            recommendation_id: Some(id.into()),
            steamid: format!("7656119800000000{id}"),
            num_reviews: 1,
            playtime_forever: 60,
            playtime_at_review: Some(60),
            language: "english".into(),
            review_text: text.map(str::to_string),
            timestamp_created: DateTime::from_timestamp(1_707_000_000, 0).unwrap(),
            voted_up: true,
            votes_up: 0,
            votes_funny: 0,
            weighted_vote_score: None,
            game_name: "HELLDIVERS™ 2".into(),
            app_id: 553850,
        }
    }

    fn setup(rows: &[ReviewRow]) -> (PathBuf, ModelConfig) {
        let dir = std::env::temp_dir().join(format!("rt_pipeline_{}", Uuid::now_v7()));
        let input = dir.join("reviews.csv");
        reviewtopics_storage::write_reviews(&input, rows).unwrap();
        let config = ModelConfig {
            input,
            output: dir.join("review_topics.csv"),
            model_path: dir.join("topic_model"),
            serialization: "pickle".into(),
            params: TopicParams::from_config(&TopicsConfig::default(), "english"),
            tool_version: "0.1.0".into(),
        };
        (dir, config)
    }

    #[test]
    fn model_stage_cleans_labels_and_saves() {
        let (dir, config) = setup(&[
            row("1", Some("Great game!! http://example.com <b>really</b> fun")),
            row("2", None),
            row("3", Some("not good, not bad")),
        ]);
        let mut model = FakeModel::default();

        let result = run_model(&config, &mut model, &SilentProgress).unwrap();

        assert_eq!(result.loaded, 3);
        assert_eq!(result.dropped, 1);
        assert!(result.modelled);
        assert_eq!(model.fitted, vec!["great game really fun", "not good not bad"]);
        assert_eq!(model.saved.as_deref(), Some(config.model_path.as_path()));

        let written = reviewtopics_storage::read_topic_rows(&config.output).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].recommendation_id.as_deref(), Some("1"));
        assert_eq!(written[0].cleaned_text, "great game really fun");
        assert!(written.iter().all(|r| r.topic.is_some()));

        let manifest = result.manifest.unwrap();
        assert!(manifest.exists());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn fit_failure_still_writes_rows_without_topics() {
        let (dir, config) = setup(&[row("1", Some("fun")), row("2", Some("buggy"))]);
        let mut model = FakeModel {
            fail_fit: true,
            ..FakeModel::default()
        };

        let result = run_model(&config, &mut model, &SilentProgress).unwrap();

        assert!(!result.modelled);
        assert!(result.manifest.is_none());
        assert!(model.saved.is_none());
        assert_eq!(result.summary.unassigned, 2);

        let written = reviewtopics_storage::read_topic_rows(&config.output).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|r| r.topic.is_none()));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn label_count_mismatch_is_treated_as_failure() {
        let (dir, config) = setup(&[row("1", Some("fun")), row("2", Some("buggy"))]);
        let mut model = FakeModel {
            short_by_one: true,
            ..FakeModel::default()
        };

        let result = run_model(&config, &mut model, &SilentProgress).unwrap();
        assert!(!result.modelled);
        assert!(model.saved.is_none());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn stopword_only_review_keeps_empty_cleaned_text() {
        let (dir, config) = setup(&[row("1", Some("and the of")), row("2", Some("fun"))]);
        let mut model = FakeModel::default();

        let result = run_model(&config, &mut model, &SilentProgress).unwrap();
        assert_eq!(result.summary.rows, 2);
        assert_eq!(result.summary.noise, 1);

        let written = reviewtopics_storage::read_topic_rows(&config.output).unwrap();
        assert_eq!(written[0].cleaned_text, "");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = std::env::temp_dir().join(format!("rt_pipeline_{}", Uuid::now_v7()));
        let config = ModelConfig {
            input: dir.join("absent.csv"),
            output: dir.join("out.csv"),
            model_path: dir.join("model"),
            serialization: "pickle".into(),
            params: TopicParams::from_config(&TopicsConfig::default(), "english"),
            tool_version: "0.1.0".into(),
        };
        let result = run_model(&config, &mut FakeModel::default(), &SilentProgress);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn extract_stage_tags_and_writes_reviews() {
        use reviewtopics_shared::{ApiConfig, DiscoveryConfig, RetryPolicy};
        use wiremock::matchers::{method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn fixture(name: &str) -> String {
            let path = format!("../../../fixtures/steam/{name}");
            std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
        }

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/storesearch/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("search.json")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/apphoverpublic/553850"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("hover.json")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appreviews/553850"))
            .and(query_param("cursor", "*"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("reviews_page1.json")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appreviews/553850"))
            .and(query_param("cursor", "AoJ4page2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture("reviews_empty.json")))
            .mount(&server)
            .await;

        let api = ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        };
        let dir = std::env::temp_dir().join(format!("rt_pipeline_{}", Uuid::now_v7()));
        let config = ExtractConfig {
            query: "helldivers 2".into(),
            discovery: DiscoveryOptions::from_config(&api, &DiscoveryConfig::default()).unwrap(),
            base_url: api.base_url().unwrap(),
            fetch: FetchOptions {
                language: "english".into(),
                filter: "recent".into(),
                polite_delay: Duration::ZERO,
                retry: RetryPolicy::new(2, Duration::ZERO),
                timeout: Duration::from_secs(5),
            },
            max_reviews: 100,
            output: dir.join("reviews.csv"),
        };

        let result = run_extract(&config, &SilentProgress).await.unwrap();
        assert_eq!(result.games, 1);
        assert_eq!(result.reviews, 2);

        let rows = reviewtopics_storage::read_reviews(&config.output).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.app_id == 553850));
        assert!(rows.iter().all(|r| r.game_name == "HELLDIVERS™ 2"));
        std::fs::remove_dir_all(dir).ok();
    }
}
