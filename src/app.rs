use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use crate::{
    api,
    config::Config,
    observability::Telemetry,
    pipeline::BestsellerSync,
    store::{ExploreStore, PgExploreStore},
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    store: Arc<dyn ExploreStore>,
    sync: Arc<BestsellerSync>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn config(&self) -> &Config {
        &self.registry.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn ExploreStore> {
        &self.registry.store
    }

    pub(crate) fn sync(&self) -> &BestsellerSync {
        &self.registry.sync
    }
}

impl ComponentRegistry {
    /// Builds telemetry, the lazy Postgres pool and the sync pipeline.
    ///
    /// # Errors
    /// Returns an error when telemetry, the pool or an upstream client cannot be set up.
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections())
            .min_connections(config.db_min_connections())
            .acquire_timeout(config.db_acquire_timeout())
            .test_before_acquire(true)
            .connect_lazy(config.database_url())
            .context("failed to configure database connection pool")?;
        let store: Arc<dyn ExploreStore> =
            Arc::new(PgExploreStore::new(pool, config.tables().clone()));
        let sync = Arc::new(
            BestsellerSync::from_config(&config, Arc::clone(&store), telemetry.metrics_handle())
                .context("failed to build sync pipeline")?,
        );

        Ok(Self {
            config,
            telemetry,
            store,
            sync,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        config: Config,
        telemetry: Telemetry,
        store: Arc<dyn ExploreStore>,
        sync: BestsellerSync,
    ) -> Self {
        Self {
            config: Arc::new(config),
            telemetry,
            store,
            sync: Arc::new(sync),
        }
    }

    #[must_use]
    pub fn sync(&self) -> Arc<BestsellerSync> {
        Arc::clone(&self.sync)
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state).layer(TraceLayer::new_for_http())
}
