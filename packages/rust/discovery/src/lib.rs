//! Game discovery on the store search API.
//!
//! A free-text search returns candidate products. Names are filtered down to
//! the base game (keyword present, add-on markers absent), and each survivor
//! is enriched with its review summary from the hover-details endpoint.

mod filter;
mod schema;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use reviewtopics_shared::{ApiConfig, DiscoveryConfig, Game, Result, ReviewTopicsError};

pub use filter::matches_filter;

use schema::{HoverResponse, SearchItem, SearchResponse};

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("reviewtopics/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for the discovery process.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Store root; endpoint paths are joined onto it.
    pub base_url: Url,
    /// Region code (`cc`).
    pub country: String,
    /// Language code (`l`).
    pub language: String,
    /// Phrase a candidate name must contain.
    pub keyword: String,
    /// Substrings that disqualify a candidate.
    pub exclusions: Vec<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl DiscoveryOptions {
    pub fn from_config(api: &ApiConfig, discovery: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            base_url: api.base_url()?,
            country: api.country.clone(),
            language: api.language.clone(),
            keyword: discovery.effective_keyword().to_string(),
            exclusions: discovery.exclusions.clone(),
            timeout: Duration::from_secs(api.timeout_secs),
        })
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Search the store for `query` and return the matching base games.
///
/// No results, or no result passing the name filter, yields an empty list. A
/// failed or unparseable search request is an error. A candidate whose detail
/// request fails is logged and skipped.
#[instrument(skip(opts), fields(keyword = %opts.keyword))]
pub async fn discover(query: &str, opts: &DiscoveryOptions) -> Result<Vec<Game>> {
    let client = build_client(opts)?;

    let search_url = endpoint(&opts.base_url, "api/storesearch/")?;
    let search: SearchResponse = get_json(
        &client,
        &search_url,
        &[
            ("term", query),
            ("cc", opts.country.as_str()),
            ("l", opts.language.as_str()),
        ],
    )
    .await?;

    let items = search.items.unwrap_or_default();
    let total = items.len();

    let candidates: Vec<SearchItem> = items
        .into_iter()
        .filter(|item| {
            let keep = matches_filter(&item.name, &opts.keyword, &opts.exclusions);
            if !keep {
                debug!(name = %item.name, app_id = item.id, "search result filtered out");
            }
            keep
        })
        .collect();

    info!(total, candidates = candidates.len(), "search results filtered");

    let mut games = Vec::with_capacity(candidates.len());
    for item in candidates {
        match fetch_details(&client, opts, &item).await {
            Ok(hover) => games.push(hover.into_game(item)),
            Err(e) => {
                warn!(
                    app_id = item.id,
                    name = %item.name,
                    error = %e,
                    "could not load review summary, skipping game"
                );
            }
        }
    }

    info!(games = games.len(), "discovery complete");
    Ok(games)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(opts.timeout)
        .build()
        .map_err(|e| ReviewTopicsError::Network(format!("failed to build HTTP client: {e}")))
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| ReviewTopicsError::validation(format!("invalid endpoint {path}: {e}")))
}

async fn fetch_details(
    client: &Client,
    opts: &DiscoveryOptions,
    item: &SearchItem,
) -> Result<HoverResponse> {
    let url = endpoint(&opts.base_url, &format!("apphoverpublic/{}", item.id))?;
    get_json(client, &url, &[("l", opts.language.as_str()), ("json", "1")]).await
}

/// GET `url` and decode the body into `T`.
async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &Url,
    query: &[(&str, &str)],
) -> Result<T> {
    let response = client
        .get(url.as_str())
        .query(query)
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

    serde_json::from_value(body).map_err(|e| ReviewTopicsError::parse(format!("{url}: {e}")))
}
