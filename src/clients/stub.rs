//! Scripted upstreams for pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::bestsellers::{BestsellerError, BestsellerList, BestsellerSource};
use super::catalog::{CatalogError, CatalogQuery, CatalogSearch, CatalogVolume};

/// Answers catalog queries from a fixed table; unknown queries return no volumes.
#[derive(Default)]
pub(crate) struct StubCatalog {
    responses: HashMap<CatalogQuery, Vec<CatalogVolume>>,
    rate_limited: HashSet<CatalogQuery>,
    calls: Mutex<Vec<CatalogQuery>>,
}

impl StubCatalog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, query: CatalogQuery, volumes: Vec<CatalogVolume>) -> Self {
        self.responses.insert(query, volumes);
        self
    }

    pub(crate) fn rate_limit(mut self, query: CatalogQuery) -> Self {
        self.rate_limited.insert(query);
        self
    }

    pub(crate) fn calls(&self) -> Vec<CatalogQuery> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CatalogSearch for StubCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogVolume>, CatalogError> {
        self.calls.lock().expect("calls lock").push(query.clone());
        if self.rate_limited.contains(query) {
            return Err(CatalogError::Status {
                status: StatusCode::TOO_MANY_REQUESTS,
            });
        }
        Ok(self.responses.get(query).cloned().unwrap_or_default())
    }
}

/// Serves the same overview on every call, or fails with `status`.
pub(crate) struct StubBestsellers {
    lists: Vec<BestsellerList>,
    status: Option<StatusCode>,
    calls: Mutex<usize>,
}

impl StubBestsellers {
    pub(crate) fn new(lists: Vec<BestsellerList>) -> Self {
        Self {
            lists,
            status: None,
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn failing(status: StatusCode) -> Self {
        Self {
            lists: Vec::new(),
            status: Some(status),
            calls: Mutex::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

#[async_trait]
impl BestsellerSource for StubBestsellers {
    async fn fetch_overview(&self, _api_key: &str) -> Result<Vec<BestsellerList>, BestsellerError> {
        *self.calls.lock().expect("calls lock") += 1;
        match self.status {
            Some(status) => Err(BestsellerError::Status {
                status,
                body: "upstream unavailable".to_string(),
            }),
            None => Ok(self.lists.clone()),
        }
    }
}
