//! Identity resolution: bestseller entry -> catalog id.
//!
//! ISBN lookups run first (ISBN-13, then ISBN-10). When neither yields a
//! volume and both title and author are known, up to four text searches run
//! in decreasing specificity and the best-scoring candidate is taken.
//! Lookup failures never escape this module.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::clients::bestsellers::BestsellerEntry;
use crate::clients::catalog::{CatalogError, CatalogQuery, CatalogSearch, CatalogVolume};
use crate::pipeline::scoring::{MatchWeights, best_candidate, clean_for_search};

/// Fixed delays between catalog calls plus the fallback result cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPacing {
    /// Minimum gap between consecutive catalog calls, hits included.
    pub call_delay: Duration,
    /// Extra pause once the fallback phase ends.
    pub settle_delay: Duration,
    pub max_results: u32,
}

impl Default for ResolverPacing {
    fn default() -> Self {
        Self {
            call_delay: Duration::from_millis(100),
            settle_delay: Duration::from_millis(150),
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// `intitle:"T"+inauthor:"A"`
    FieldQualified,
    /// `"T" "A"`
    QuotedPhrases,
    /// `T A`
    Keywords,
    /// `T`
    TitleOnly,
}

impl FallbackStrategy {
    pub const ORDER: [Self; 4] = [
        Self::FieldQualified,
        Self::QuotedPhrases,
        Self::Keywords,
        Self::TitleOnly,
    ];

    /// Builds the search text from an already-cleaned title and author.
    #[must_use]
    pub fn query(self, title: &str, author: &str) -> String {
        match self {
            Self::FieldQualified => format!("intitle:\"{title}\"+inauthor:\"{author}\""),
            Self::QuotedPhrases => format!("\"{title}\" \"{author}\""),
            Self::Keywords => format!("{title} {author}"),
            Self::TitleOnly => title.to_string(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FieldQualified => "field_qualified",
            Self::QuotedPhrases => "quoted_phrases",
            Self::Keywords => "keywords",
            Self::TitleOnly => "title_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchSource {
    Isbn,
    Fallback { strategy: FallbackStrategy, score: f64 },
}

/// Outcome of resolving one entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    pub catalog_id: Option<String>,
    /// Upstream cover, or the matched volume's largest image when upstream had none.
    pub cover_image: Option<String>,
    /// One per ISBN query plus one for the fallback phase as a whole.
    pub lookups: u32,
    pub source: Option<MatchSource>,
}

impl Resolution {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.catalog_id.is_some()
    }

    fn accept(&mut self, volume: &CatalogVolume, source: MatchSource) {
        self.catalog_id = Some(volume.id.clone());
        if self.cover_image.is_none() {
            self.cover_image = volume.image_links.largest().map(str::to_string);
        }
        self.source = Some(source);
    }
}

pub struct IdentityResolver {
    catalog: Arc<dyn CatalogSearch>,
    weights: MatchWeights,
    pacing: ResolverPacing,
    last_call: Mutex<Option<Instant>>,
}

impl IdentityResolver {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogSearch>,
        weights: MatchWeights,
        pacing: ResolverPacing,
    ) -> Self {
        Self {
            catalog,
            weights,
            pacing,
            last_call: Mutex::new(None),
        }
    }

    /// Issues one catalog call no sooner than `call_delay` after the previous one.
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogVolume>, CatalogError> {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            tokio::time::sleep_until(previous + self.pacing.call_delay).await;
        }
        let result = self.catalog.search(query).await;
        *last_call = Some(Instant::now());
        result
    }

    /// Resolves one entry. Never fails: an unresolved entry has no catalog id.
    pub async fn resolve(&self, entry: &BestsellerEntry) -> Resolution {
        let mut resolution = Resolution {
            cover_image: entry.book_image.clone(),
            ..Resolution::default()
        };

        if self.resolve_by_isbn(entry, &mut resolution).await {
            return resolution;
        }

        if let (Some(title), Some(author)) = (entry.title.as_deref(), entry.author.as_deref()) {
            resolution.lookups += 1;
            self.resolve_by_search(title, author, &mut resolution).await;
            tokio::time::sleep(self.pacing.settle_delay).await;
        }

        if !resolution.is_resolved() {
            debug!(title = ?entry.title, author = ?entry.author, "no confident catalog match");
        }
        resolution
    }

    async fn resolve_by_isbn(&self, entry: &BestsellerEntry, resolution: &mut Resolution) -> bool {
        let isbns = [entry.isbn_13.as_deref(), entry.isbn_10.as_deref()];
        for isbn in isbns.into_iter().flatten() {
            resolution.lookups += 1;
            match self.search(&CatalogQuery::Isbn(isbn.to_string())).await {
                Ok(volumes) => {
                    if let Some(volume) = volumes.first() {
                        resolution.accept(volume, MatchSource::Isbn);
                        info!(isbn, catalog_id = %volume.id, "resolved catalog id via ISBN");
                        return true;
                    }
                    debug!(isbn, "no catalog volume for ISBN");
                }
                Err(error) => log_lookup_error(&error, "isbn", isbn),
            }
        }
        false
    }

    async fn resolve_by_search(&self, title: &str, author: &str, resolution: &mut Resolution) {
        let clean_title = clean_for_search(title);
        let clean_author = clean_for_search(author);

        for strategy in FallbackStrategy::ORDER {
            let query = CatalogQuery::Text {
                query: strategy.query(&clean_title, &clean_author),
                max_results: self.pacing.max_results,
            };
            match self.search(&query).await {
                Ok(volumes) => {
                    if let Some(best) = best_candidate(title, author, &volumes, &self.weights) {
                        resolution.accept(
                            best.volume,
                            MatchSource::Fallback {
                                strategy,
                                score: best.score,
                            },
                        );
                        info!(
                            title,
                            strategy = strategy.as_str(),
                            score = best.score,
                            catalog_id = %best.volume.id,
                            "resolved catalog id via text search"
                        );
                        return;
                    }
                }
                Err(error) => log_lookup_error(&error, strategy.as_str(), title),
            }
        }
    }
}

fn log_lookup_error(error: &CatalogError, lookup: &str, subject: &str) {
    if error.is_rate_limited() {
        warn!(lookup, subject, "catalog rate limited the lookup");
    } else {
        warn!(lookup, subject, error = %error, "catalog lookup failed");
    }
}
