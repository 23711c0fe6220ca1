//! Pop-culture title lookups (MusicBrainz, Open Library, TMDB).
//!
//! Catalogs are best effort: a failing catalog contributes an empty list and
//! a warning, never an error.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::model::Titles;

pub const DEFAULT_TITLE_LIMIT: usize = 10;
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(15);
pub const USER_AGENT: &str = concat!("wordroots/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected catalog payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait TitleLookup: Send + Sync {
    async fn collect(&self, base: &str) -> Titles;

    /// Which upstream sources are in use, keyed by source name.
    fn availability(&self) -> BTreeMap<String, bool>;
}

#[derive(Debug, Clone)]
pub struct CatalogEndpoints {
    pub musicbrainz: String,
    pub openlibrary: String,
    pub tmdb: String,
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            musicbrainz: "https://musicbrainz.org".to_string(),
            openlibrary: "https://openlibrary.org".to_string(),
            tmdb: "https://api.themoviedb.org".to_string(),
        }
    }
}

impl CatalogEndpoints {
    /// Every catalog served from the same origin.
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            musicbrainz: base.to_string(),
            openlibrary: base.to_string(),
            tmdb: base.to_string(),
        }
    }
}

/// HTTP client for catalog requests: identifying user agent and a 15 s
/// timeout.
pub fn catalog_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(CATALOG_TIMEOUT)
        .build()
}

pub struct TitleCatalogs {
    client: reqwest::Client,
    endpoints: CatalogEndpoints,
    tmdb_api_key: Option<String>,
    limit: usize,
}

#[derive(Deserialize)]
struct Titled {
    title: Option<String>,
}

#[derive(Deserialize)]
struct MusicBrainzPage {
    #[serde(default)]
    recordings: Vec<Titled>,
}

#[derive(Deserialize)]
struct OpenLibraryPage {
    #[serde(default)]
    docs: Vec<Titled>,
}

#[derive(Deserialize)]
struct TmdbPage {
    #[serde(default)]
    results: Vec<TmdbResult>,
}

#[derive(Deserialize)]
struct TmdbResult {
    title: Option<String>,
    name: Option<String>,
}

impl TitleCatalogs {
    pub fn new(
        client: reqwest::Client,
        endpoints: CatalogEndpoints,
        tmdb_api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoints,
            tmdb_api_key: tmdb_api_key.filter(|key| !key.trim().is_empty()),
            limit: DEFAULT_TITLE_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let body = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn music(&self, base: &str) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/ws/2/recording", self.endpoints.musicbrainz);
        let query = format!("recording:{base}");
        let limit = self.limit.to_string();
        let page: MusicBrainzPage = self
            .fetch(
                &url,
                &[("query", query.as_str()), ("fmt", "json"), ("limit", limit.as_str())],
            )
            .await?;
        let titles = page.recordings.into_iter().take(self.limit);
        Ok(dedupe_titles(titles.filter_map(|r| r.title), self.limit))
    }

    async fn books(&self, base: &str) -> Result<Vec<String>, CatalogError> {
        let url = format!("{}/search.json", self.endpoints.openlibrary);
        let limit = self.limit.to_string();
        let page: OpenLibraryPage = self
            .fetch(&url, &[("title", base), ("limit", limit.as_str())])
            .await?;
        let titles = page.docs.into_iter().take(2 * self.limit);
        Ok(dedupe_titles(titles.filter_map(|d| d.title), self.limit))
    }

    async fn films(&self, base: &str) -> Result<Vec<String>, CatalogError> {
        let Some(key) = self.tmdb_api_key.as_deref() else {
            return Ok(Vec::new());
        };
        let query = [
            ("query", base),
            ("include_adult", "false"),
            ("page", "1"),
            ("api_key", key),
        ];
        let movies: TmdbPage = self
            .fetch(&format!("{}/3/search/movie", self.endpoints.tmdb), &query)
            .await?;
        let shows: TmdbPage = self
            .fetch(&format!("{}/3/search/tv", self.endpoints.tmdb), &query)
            .await?;

        let movie_titles = movies.results.into_iter().take(self.limit).filter_map(|m| m.title);
        let show_names = shows.results.into_iter().take(self.limit).filter_map(|s| s.name);
        Ok(dedupe_titles(movie_titles.chain(show_names), self.limit))
    }
}

#[async_trait]
impl TitleLookup for TitleCatalogs {
    async fn collect(&self, base: &str) -> Titles {
        let (music, books, films) =
            tokio::join!(self.music(base), self.books(base), self.films(base));
        Titles {
            films: or_empty("tmdb", films),
            music: or_empty("musicbrainz", music),
            books: or_empty("openlibrary", books),
        }
    }

    fn availability(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("musicbrainz".to_string(), true),
            ("openlibrary".to_string(), true),
            ("tmdb".to_string(), self.tmdb_api_key.is_some()),
        ])
    }
}

fn or_empty(catalog: &str, result: Result<Vec<String>, CatalogError>) -> Vec<String> {
    result.unwrap_or_else(|err| {
        warn!("{catalog} lookup failed: {err}");
        Vec::new()
    })
}

/// Drop blank and repeated titles, keeping first-seen order, and cap at `limit`.
pub fn dedupe_titles(titles: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    titles
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .filter(|t| seen.insert(t.clone()))
        .take(limit)
        .collect()
}
