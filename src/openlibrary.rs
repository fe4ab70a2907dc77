use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::filters::SearchQuery;
use crate::formats::{SearchPage, SearchResponse};

pub const DEFAULT_SEARCH_URL: &str = "https://openlibrary.org/search.json";
pub const DEFAULT_COVER_HOST: &str = "covers.openlibrary.org";
pub const DEFAULT_LIMIT: usize = 100;

const RESPONSE_FIELDS: &str = "key,title,author_name,first_publish_year,language,cover_i";

/// Ways a search request can fail. The controller treats them all as one
/// failed fetch; the variant only matters for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("search request failed: {0}")]
    Transport(String),
    #[error("search API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse search response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    client: reqwest::Client,
    endpoint: Url,
    limit: usize,
}

impl OpenLibraryClient {
    pub fn new(endpoint: Url, limit: usize, timeout: Duration) -> anyhow::Result<Self> {
        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            anyhow::bail!("search endpoint must be http/https: {endpoint}");
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build search http client")?;
        Ok(Self {
            client,
            endpoint,
            limit: limit.max(1),
        })
    }

    pub fn request_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query.params() {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("fields", RESPONSE_FIELDS);
            pairs.append_pair("limit", &self.limit.to_string());
        }
        url
    }
}

#[async_trait]
impl SearchApi for OpenLibraryClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, FetchError> {
        let url = self.request_url(query);
        tracing::debug!(url = %url, "GET search");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, concat!("bookfinder/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| FetchError::Transport(format!("GET {url}: {err}")))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| FetchError::Transport(format!("read response body: {err}")))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: truncate(&raw, 200),
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&raw).map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(SearchPage::from(parsed))
    }
}

/// Large cover image for `cover_id`, or `None` when the book has no cover.
pub fn cover_url(host: &str, cover_id: Option<i64>) -> Option<String> {
    let cover_id = cover_id?;
    let host = host.trim_end_matches('/');
    Some(format!("https://{host}/b/id/{cover_id}-L.jpg"))
}

fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterState;

    fn client() -> OpenLibraryClient {
        OpenLibraryClient::new(
            Url::parse(DEFAULT_SEARCH_URL).unwrap(),
            DEFAULT_LIMIT,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn request_url_encodes_filters_in_order() {
        let query = FilterState::new("the hobbit", "1937", "eng")
            .effective()
            .to_query_or_default();
        let url = client().request_url(&query);
        let pairs = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(pairs[0], ("title".to_owned(), "the hobbit".to_owned()));
        assert_eq!(
            pairs[1],
            ("first_publish_year".to_owned(), "1937".to_owned())
        );
        assert_eq!(pairs[2], ("language".to_owned(), "eng".to_owned()));
        assert!(url.as_str().contains("title=the+hobbit"));
        assert!(pairs.iter().any(|(k, v)| k == "limit" && v == "100"));
    }

    #[test]
    fn request_url_for_empty_filter_uses_default_query() {
        let query = FilterState::default().effective().to_query_or_default();
        let url = client().request_url(&query);
        assert!(url.query_pairs().any(|(k, _)| k == "q"));
        assert!(!url.query_pairs().any(|(k, _)| k == "title"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = OpenLibraryClient::new(
            Url::parse("ftp://example.com/search.json").unwrap(),
            10,
            Duration::from_secs(1),
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("http/https"));
    }

    #[test]
    fn cover_url_uses_large_image_template() {
        assert_eq!(
            cover_url(DEFAULT_COVER_HOST, Some(8231856)).as_deref(),
            Some("https://covers.openlibrary.org/b/id/8231856-L.jpg")
        );
        assert_eq!(cover_url(DEFAULT_COVER_HOST, None), None);
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate(" oops ", 200), "oops");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
