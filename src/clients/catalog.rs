/// Book catalog client (Google Books volumes API).
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const VOLUMES_PATH: &str = "books/v1/volumes";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed")]
    Request(#[source] reqwest::Error),
    #[error("catalog API returned {status}")]
    Status { status: StatusCode },
    #[error("invalid response format from catalog API")]
    Decode(#[source] serde_json::Error),
}

impl CatalogError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status { status } if *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

/// One catalog query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatalogQuery {
    /// Exact ISBN match (`q=isbn:<isbn>`).
    Isbn(String),
    /// Free-text search capped at `max_results` volumes.
    Text { query: String, max_results: u32 },
}

impl CatalogQuery {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Isbn(isbn) => vec![("q", format!("isbn:{isbn}"))],
            Self::Text { query, max_results } => vec![
                ("q", query.clone()),
                ("maxResults", max_results.to_string()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub small_thumbnail: Option<String>,
    pub thumbnail: Option<String>,
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
    pub extra_large: Option<String>,
}

impl ImageLinks {
    /// The largest available size.
    #[must_use]
    pub fn largest(&self) -> Option<&str> {
        [
            &self.extra_large,
            &self.large,
            &self.medium,
            &self.small,
            &self.thumbnail,
            &self.small_thumbnail,
        ]
        .into_iter()
        .find_map(|link| link.as_deref().filter(|url| !url.is_empty()))
    }
}

/// A catalog volume reduced to the fields matching needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CatalogVolume {
    pub id: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub published_date: Option<String>,
    pub image_links: ImageLinks,
}

#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogVolume>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<WireVolume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVolume {
    id: String,
    #[serde(default)]
    volume_info: WireVolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireVolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    published_date: Option<String>,
    #[serde(default)]
    image_links: ImageLinks,
}

impl From<WireVolume> for CatalogVolume {
    fn from(volume: WireVolume) -> Self {
        let info = volume.volume_info;
        Self {
            id: volume.id,
            title: info.title,
            authors: info.authors,
            published_date: info.published_date.filter(|date| !date.is_empty()),
            image_links: info.image_links,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    volumes_url: Url,
    api_key: Option<String>,
}

impl CatalogClient {
    /// # Errors
    /// Returns an error when the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: CatalogConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build catalog HTTP client")?;
        let volumes_url = Url::parse(&config.base_url)
            .and_then(|base| base.join(VOLUMES_PATH))
            .context("invalid catalog base URL")?;

        Ok(Self {
            client,
            volumes_url,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl CatalogSearch for CatalogClient {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogVolume>, CatalogError> {
        let mut url = self.volumes_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.query_pairs() {
                pairs.append_pair(key, &value);
            }
            if let Some(api_key) = &self.api_key {
                pairs.append_pair("key", api_key);
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(CatalogError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { status });
        }

        let bytes = response.bytes().await.map_err(CatalogError::Request)?;
        let volumes: VolumesResponse =
            serde_json::from_slice(&bytes).map_err(CatalogError::Decode)?;

        debug!(results = volumes.items.len(), "catalog search completed");
        Ok(volumes.items.into_iter().map(CatalogVolume::from).collect())
    }
}
