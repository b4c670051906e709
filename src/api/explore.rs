//! Read side over the live explore table.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

use crate::app::AppState;
use crate::store::models::{ExploreBookRecord, ListGroup, ListSummary, group_by_list};

const POPULAR_MAX_RANK: i32 = 7;
const POPULAR_LIMIT: i64 = 40;

#[derive(Debug, Serialize)]
struct ListsResponse<T> {
    success: bool,
    lists: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListBooksResponse {
    success: bool,
    list_name: String,
    books: Vec<ExploreBookRecord>,
}

#[derive(Debug, Serialize)]
struct BooksResponse {
    success: bool,
    books: Vec<ExploreBookRecord>,
}

fn query_failed(what: &str, error: &anyhow::Error) -> Response {
    error!(error = %error, "failed to load {what}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": format!("failed to load {what}") })),
    )
        .into_response()
}

pub(crate) async fn lists(State(state): State<AppState>) -> Response {
    match state.store().list_summaries().await {
        Ok(lists) => Json(ListsResponse::<ListSummary> {
            success: true,
            lists,
        })
        .into_response(),
        Err(error) => query_failed("lists", &error),
    }
}

pub(crate) async fn all(State(state): State<AppState>) -> Response {
    match state.store().resolved_books().await {
        Ok(books) => Json(ListsResponse::<ListGroup> {
            success: true,
            lists: group_by_list(books),
        })
        .into_response(),
        Err(error) => query_failed("books", &error),
    }
}

pub(crate) async fn by_list(
    State(state): State<AppState>,
    Path(list_name): Path<String>,
) -> Response {
    match state.store().books_by_list(&list_name).await {
        Ok(books) => Json(ListBooksResponse {
            success: true,
            list_name,
            books,
        })
        .into_response(),
        Err(error) => query_failed("list", &error),
    }
}

pub(crate) async fn popular(State(state): State<AppState>) -> Response {
    match state
        .store()
        .popular_books(POPULAR_MAX_RANK, POPULAR_LIMIT)
        .await
    {
        Ok(books) => Json(BooksResponse {
            success: true,
            books,
        })
        .into_response(),
        Err(error) => query_failed("popular books", &error),
    }
}
