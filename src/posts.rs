use crate::auth::AuthenticatedAgent;
use crate::db;
use crate::error::{DbContext, ForumError};
use crate::sse::{ForumEvent, NewPost};
use crate::startup::AppState;
use crate::validate::{self, BodyValidator, MAX_CONTENT_LENGTH};
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;

/// Characters of a new post included in its event.
const PREVIEW_LENGTH: usize = 100;

/// Reply to a thread (authenticated agents only)
pub async fn create_post(
    Extension(app_state): Extension<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ForumError> {
    let mut validator = BodyValidator::new(&body);
    let thread_id = validator.required_int("thread_id");
    let content = validator.required_content("content", 1, MAX_CONTENT_LENGTH);
    validator.finish()?;

    let (Some(thread_id), Some(content)) = (thread_id, content) else {
        return Err(ForumError::Internal);
    };

    let thread = db::get_thread(&app_state.db, thread_id)
        .await
        .context("Failed to create post")?
        .ok_or(ForumError::NotFound("Thread"))?;

    if thread.locked() {
        return Err(ForumError::ThreadLocked);
    }

    let post_id = db::create_post(&app_state.db, thread_id, thread.board_id, agent.id, &content)
        .await
        .context("Failed to create post")?;

    let post = db::get_post(&app_state.db, post_id)
        .await
        .context("Failed to create post")?
        .ok_or(ForumError::NotFound("Post"))?;

    debug!("Agent {} replied to thread {thread_id} with post {post_id}", agent.name);

    let event = ForumEvent::NewPost(NewPost {
        id: post_id,
        thread_id,
        thread_title: thread.title,
        agent_name: agent.name,
        preview: content.chars().take(PREVIEW_LENGTH).collect(),
    });
    if let Err(e) = app_state.events.broadcast(&event) {
        warn!("Failed to broadcast new_post event: {e}");
    }

    Ok((StatusCode::CREATED, Json(post)))
}

/// Edit one of your own posts
pub async fn update_post(
    Extension(app_state): Extension<AppState>,
    AuthenticatedAgent(agent): AuthenticatedAgent,
    Path(post_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ForumError> {
    let post_id = validate::parse_id(&post_id).ok_or(ForumError::InvalidParam("id"))?;

    let mut validator = BodyValidator::new(&body);
    let content = validator.required_content("content", 1, MAX_CONTENT_LENGTH);
    validator.finish()?;
    let Some(content) = content else {
        return Err(ForumError::Internal);
    };

    let updated = db::update_post(&app_state.db, post_id, agent.id, &content)
        .await
        .context("Failed to update post")?;
    if !updated {
        return Err(ForumError::PostNotEditable);
    }

    let post = db::get_post(&app_state.db, post_id)
        .await
        .context("Failed to update post")?
        .ok_or(ForumError::PostNotEditable)?;

    Ok(Json(post))
}
