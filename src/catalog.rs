//! Catalog-lookup client: an adapter to a remote movie/TV metadata catalog over HTTP.
//! See SPEC_FULL.md §4.3. Client shape and `reqwest::Client` built-once-in-`new` style grounded
//! on the teacher's `tmdb_client.rs`/`external/tmdb/client.rs`; the retry/backoff resilience here
//! is new, no teacher client retries.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

const BASE_URL: &str = "https://api.themoviedb.org/3";
const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "of", "in", "on", "at", "to", "for"];

#[derive(Debug, Clone, PartialEq)]
pub struct MovieMatch {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TvMatch {
    pub id: i64,
    pub name: String,
    pub year: Option<i32>,
    pub poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieResult {
    id: i64,
    title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvResult {
    id: i64,
    name: String,
    first_air_date: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EpisodeResult {
    name: Option<String>,
}

/// HTTP adapter to the remote catalog. Build once (`new`) and share; the inner `reqwest::Client`
/// owns its own connection pool.
#[derive(Clone, Debug)]
pub struct CatalogClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl CatalogClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build catalog HTTP client");
        CatalogClient {
            http,
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub async fn search_movie(&self, name: &str, year: Option<i32>) -> Option<MovieMatch> {
        let api_key = self.api_key.as_deref()?;
        let query = preprocess_query(name);
        if query.is_empty() {
            return None;
        }

        let mut params = vec![
            ("api_key".to_string(), api_key.to_string()),
            ("query".to_string(), query),
            ("include_adult".to_string(), "false".to_string()),
        ];
        if let Some(y) = year {
            params.push(("year".to_string(), y.to_string()));
        }

        let url = format!("{}/search/movie", self.base_url);
        let body: SearchResponse<MovieResult> = self.get_with_retry(&url, &params).await?;

        let chosen = if let Some(y) = year {
            body.results
                .iter()
                .find(|r| release_year(&r.release_date) == Some(y))
                .or_else(|| body.results.first())
        } else {
            body.results.first()
        }?;

        Some(MovieMatch {
            id: chosen.id,
            title: chosen.title.clone(),
            year: release_year(&chosen.release_date),
            poster_path: chosen.poster_path.clone(),
        })
    }

    pub async fn search_tv(&self, name: &str) -> Option<TvMatch> {
        let api_key = self.api_key.as_deref()?;
        let query = preprocess_query(name);
        if query.is_empty() {
            return None;
        }

        let params = vec![
            ("api_key".to_string(), api_key.to_string()),
            ("query".to_string(), query),
        ];
        let url = format!("{}/search/tv", self.base_url);
        let body: SearchResponse<TvResult> = self.get_with_retry(&url, &params).await?;
        let chosen = body.results.first()?;

        Some(TvMatch {
            id: chosen.id,
            name: chosen.name.clone(),
            year: release_year(&chosen.first_air_date),
            poster_path: chosen.poster_path.clone(),
        })
    }

    pub async fn get_episode_title(&self, series_id: i64, season: i32, episode: i32) -> Option<String> {
        let api_key = self.api_key.as_deref()?;
        let url = format!(
            "{}/tv/{series_id}/season/{season}/episode/{episode}",
            self.base_url
        );
        let params = vec![("api_key".to_string(), api_key.to_string())];
        let body: EpisodeResult = self.get_with_retry(&url, &params).await?;
        body.name
    }

    /// Up to 3 attempts; linear 1s/2s/3s backoff on 429, 0.5s backoff on I/O failure, `None`
    /// (no exception) on any other non-success.
    async fn get_with_retry<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Option<T> {
        for attempt in 1..=3 {
            match self.http.get(url).query(params).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.ok();
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    if attempt < 3 {
                        tokio::time::sleep(Duration::from_secs(attempt)).await;
                        continue;
                    }
                    return None;
                }
                Ok(response) => {
                    warn!(status = %response.status(), url, "catalog request returned non-success");
                    return None;
                }
                Err(err) => {
                    warn!(error = %err, url, "catalog request I/O failure");
                    if attempt < 3 {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                    return None;
                }
            }
        }
        None
    }
}

fn release_year(date: &Option<String>) -> Option<i32> {
    date.as_ref().and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

/// Strip non-alphanumeric characters, drop stop words, collapse whitespace, truncate to 100 chars.
fn preprocess_query(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = stripped
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    let joined = words.join(" ");
    joined.chars().take(100).collect()
}
