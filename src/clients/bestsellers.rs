//! Bestseller overview client (NYT Books API).
//!
//! One GET per sync run; the response is normalized into [`BestsellerList`]s.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const OVERVIEW_PATH: &str = "svc/books/v3/lists/overview.json";

#[derive(Debug, Error)]
pub enum BestsellerError {
    #[error("bestseller request failed")]
    Request(#[source] reqwest::Error),
    #[error("bestseller API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid response format from bestseller API")]
    Decode(#[source] serde_json::Error),
}

/// One upstream list with its books in upstream order.
#[derive(Debug, Clone, PartialEq)]
pub struct BestsellerList {
    pub name: String,
    pub name_encoded: String,
    pub books: Vec<BestsellerEntry>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BestsellerEntry {
    pub title: Option<String>,
    pub author: Option<String>,
    pub rank: Option<i32>,
    pub isbn_13: Option<String>,
    pub isbn_10: Option<String>,
    pub book_image: Option<String>,
}

/// Source of the current bestseller overview.
#[async_trait]
pub trait BestsellerSource: Send + Sync {
    async fn fetch_overview(&self, api_key: &str) -> Result<Vec<BestsellerList>, BestsellerError>;
}

#[derive(Debug, Deserialize)]
struct OverviewResponse {
    results: OverviewResults,
}

#[derive(Debug, Deserialize)]
struct OverviewResults {
    lists: Vec<WireList>,
}

#[derive(Debug, Deserialize)]
struct WireList {
    #[serde(default)]
    list_name: Option<String>,
    #[serde(default)]
    list_name_encoded: Option<String>,
    #[serde(default)]
    books: Vec<WireBook>,
}

#[derive(Debug, Deserialize)]
struct WireBook {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    rank: Option<i32>,
    #[serde(default)]
    primary_isbn13: Option<String>,
    #[serde(default)]
    primary_isbn10: Option<String>,
    #[serde(default)]
    book_image: Option<String>,
}

impl WireList {
    /// A list without both names cannot be stored; its books are dropped.
    fn normalize(self) -> Option<BestsellerList> {
        let (Some(name), Some(name_encoded)) =
            (non_empty(self.list_name), non_empty(self.list_name_encoded))
        else {
            warn!(books = self.books.len(), "skipping bestseller list without a name");
            return None;
        };
        Some(BestsellerList {
            name,
            name_encoded,
            books: self.books.into_iter().map(BestsellerEntry::from).collect(),
        })
    }
}

impl From<WireBook> for BestsellerEntry {
    fn from(book: WireBook) -> Self {
        Self {
            title: non_empty(book.title),
            author: non_empty(book.author),
            rank: book.rank,
            isbn_13: non_empty(book.primary_isbn13),
            isbn_10: non_empty(book.primary_isbn10),
            book_image: non_empty(book.book_image),
        }
    }
}

/// Upstream uses empty strings for absent values.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct BestsellerConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BestsellerClient {
    client: Client,
    overview_url: Url,
}

impl BestsellerClient {
    /// # Errors
    /// Returns an error when the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: BestsellerConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build bestseller HTTP client")?;
        let overview_url = Url::parse(&config.base_url)
            .and_then(|base| base.join(OVERVIEW_PATH))
            .context("invalid bestseller base URL")?;

        Ok(Self {
            client,
            overview_url,
        })
    }
}

#[async_trait]
impl BestsellerSource for BestsellerClient {
    async fn fetch_overview(&self, api_key: &str) -> Result<Vec<BestsellerList>, BestsellerError> {
        let mut url = self.overview_url.clone();
        url.query_pairs_mut().append_pair("api-key", api_key);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(BestsellerError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BestsellerError::Status { status, body });
        }

        let bytes = response.bytes().await.map_err(BestsellerError::Request)?;
        let overview: OverviewResponse =
            serde_json::from_slice(&bytes).map_err(BestsellerError::Decode)?;

        let lists: Vec<BestsellerList> = overview
            .results
            .lists
            .into_iter()
            .filter_map(WireList::normalize)
            .collect();

        debug!(lists = lists.len(), "fetched bestseller overview");
        Ok(lists)
    }
}
