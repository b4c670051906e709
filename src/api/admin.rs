use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::{app::AppState, pipeline::SyncReport};

pub(crate) const SYNC_SECRET_HEADER: &str = "x-sync-secret";

#[derive(Debug, Serialize)]
pub(crate) struct SyncResponse {
    success: bool,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<SyncReport>,
}

impl SyncResponse {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
            report: None,
        }
    }
}

/// Secret must match byte for byte; an unset secret rejects everyone.
fn authorized(expected: Option<&str>, headers: &HeaderMap) -> bool {
    match (expected, headers.get(SYNC_SECRET_HEADER)) {
        (Some(expected), Some(provided)) => provided.as_bytes() == expected.as_bytes(),
        _ => false,
    }
}

/// Runs a full sync inside the request and reports the outcome.
pub(crate) async fn trigger_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(state.config().sync_admin_secret(), &headers) {
        warn!("rejected admin sync call with missing or wrong secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(SyncResponse::failure("unauthorized")),
        );
    }

    state.telemetry().record_admin_sync_invocation();
    match state.sync().run().await {
        Ok(report) => (
            StatusCode::OK,
            Json(SyncResponse {
                success: true,
                message: format!(
                    "sync completed: {} books from {} lists",
                    report.books_inserted, report.lists
                ),
                timestamp: Utc::now(),
                report: Some(report),
            }),
        ),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SyncResponse::failure(format!("sync failed: {error}"))),
        ),
    }
}
