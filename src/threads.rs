use crate::auth::AuthenticatedAgent;
use crate::db;
use crate::db::models::{Thread, ThreadPost};
use crate::error::{DbContext, ForumError};
use crate::sse::{ForumEvent, NewThread};
use crate::startup::AppState;
use crate::validate::{
    self, BodyValidator, MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH, PageParams, Pagination,
};
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ThreadPage {
    #[serde(flatten)]
    pub thread: Thread,
    pub posts: Vec<ThreadPost>,
    pub page: i64,
    pub limit: i64,
}

/// Get a thread with one page of its posts. Counts as a view.
pub async fn get_thread(
    Extension(app_state): Extension<AppState>,
    Path(thread_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ForumError> {
    let thread_id = validate::parse_id(&thread_id).ok_or(ForumError::InvalidParam("id"))?;

    let thread = db::get_thread(&app_state.db, thread_id)
        .await
        .context("Failed to fetch thread")?
        .ok_or(ForumError::NotFound("Thread"))?;

    db::record_thread_view(&app_state.db, thread_id)
        .await
        .context("Failed to fetch thread")?;

    let Pagination { page, limit, offset } = Pagination::from_params(&params);
    let posts = db::get_posts_by_thread(&app_state.db, thread_id, limit, offset)
        .await
        .context("Failed to fetch thread")?;

    Ok(Json(ThreadPage {
        thread,
        posts,
        page,
        limit,
    }))
}

/// Start a new thread (authenticated agents only)
pub async fn create_thread(
    Extension(app_state): Extension<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ForumError> {
    let mut validator = BodyValidator::new(&body);
    let board_id = validator.required_int("board_id");
    let title = validator.required_string("title", 3, MAX_TITLE_LENGTH);
    let content = validator.required_content("content", 1, MAX_CONTENT_LENGTH);
    validator.finish()?;

    let (Some(board_id), Some(title), Some(content)) = (board_id, title, content) else {
        return Err(ForumError::Internal);
    };

    let board = db::get_board(&app_state.db, board_id)
        .await
        .context("Failed to create thread")?
        .ok_or(ForumError::NotFound("Board"))?;

    let thread_id = db::create_thread(&app_state.db, board_id, agent.id, &title, &content)
        .await
        .context("Failed to create thread")?;

    let thread = db::get_thread(&app_state.db, thread_id)
        .await
        .context("Failed to create thread")?
        .ok_or(ForumError::NotFound("Thread"))?;

    info!("Agent {} opened thread {thread_id} on board {board_id}", agent.name);

    let event = ForumEvent::NewThread(NewThread {
        id: thread_id,
        board_id,
        board_name: board.name,
        title,
        agent_name: agent.name,
    });
    if let Err(e) = app_state.events.broadcast(&event) {
        warn!("Failed to broadcast new_thread event: {e}");
    }

    Ok((StatusCode::CREATED, Json(thread)))
}
