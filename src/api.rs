pub(crate) mod admin;
pub(crate) mod explore;
pub(crate) mod health;
pub(crate) mod metrics;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/admin/sync", post(admin::trigger_sync))
        .route("/api/explore/lists", get(explore::lists))
        .route("/api/explore/all", get(explore::all))
        .route("/api/explore/list/{list_name}", get(explore::by_list))
        .route("/api/explore/popular", get(explore::popular))
        .with_state(state)
}
