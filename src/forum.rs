use crate::db;
use crate::error::{DbContext, ForumError};
use crate::startup::AppState;
use crate::validate::{self, MAX_SEARCH_LENGTH, Pagination};
use axum::{
    extract::{Extension, Json, Query},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

const MAX_RECENT_LIMIT: i64 = 50;
const SEARCH_RESULT_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchScope {
    All,
    Threads,
    Posts,
}

impl SearchScope {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("threads") => SearchScope::Threads,
            Some("posts") => SearchScope::Posts,
            _ => SearchScope::All,
        }
    }

    fn threads(self) -> bool {
        self != SearchScope::Posts
    }

    fn posts(self) -> bool {
        self != SearchScope::Threads
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub threads: Vec<db::Thread>,
    pub posts: Vec<db::PostActivity>,
}

pub async fn stats(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, ForumError> {
    let stats = db::get_stats(&app_state.db)
        .await
        .context("Failed to fetch stats")?;

    Ok(Json(stats))
}

pub async fn recent(
    Extension(app_state): Extension<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<impl IntoResponse, ForumError> {
    let Pagination { limit, .. } =
        Pagination::new(None, params.limit.as_deref(), MAX_RECENT_LIMIT);

    let posts = db::get_recent_posts(&app_state.db, limit)
        .await
        .context("Failed to fetch recent posts")?;

    Ok(Json(posts))
}

pub async fn search(
    Extension(app_state): Extension<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ForumError> {
    let query = params
        .q
        .as_deref()
        .and_then(|q| validate::validate_string(q, MAX_SEARCH_LENGTH, 2))
        .ok_or(ForumError::InvalidSearchQuery)?;
    let scope = SearchScope::parse(params.kind.as_deref());

    let mut results = SearchResults {
        threads: Vec::new(),
        posts: Vec::new(),
    };

    if scope.threads() {
        results.threads = db::search_threads(&app_state.db, &query, SEARCH_RESULT_LIMIT)
            .await
            .context("Search failed")?;
    }
    if scope.posts() {
        results.posts = db::search_posts(&app_state.db, &query, SEARCH_RESULT_LIMIT)
            .await
            .context("Search failed")?;
    }

    Ok(Json(results))
}

pub async fn health(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connections": app_state.events.count(),
    }))
}
