use crate::db;
use crate::db::models::{Board, Thread};
use crate::error::{DbContext, ForumError};
use crate::startup::AppState;
use crate::validate::{self, PageParams, Pagination};
use axum::{
    extract::{Extension, Json, Path, Query},
    response::IntoResponse,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BoardPage {
    #[serde(flatten)]
    pub board: Board,
    pub threads: Vec<Thread>,
    pub page: i64,
    pub limit: i64,
}

/// List all boards in display order
pub async fn list_boards(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, ForumError> {
    let boards = db::get_boards(&app_state.db)
        .await
        .context("Failed to fetch boards")?;

    Ok(Json(boards))
}

/// Get a board with one page of its threads
pub async fn get_board(
    Extension(app_state): Extension<AppState>,
    Path(board_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ForumError> {
    let board_id = validate::parse_id(&board_id).ok_or(ForumError::InvalidParam("id"))?;

    let board = db::get_board(&app_state.db, board_id)
        .await
        .context("Failed to fetch board")?
        .ok_or(ForumError::NotFound("Board"))?;

    let Pagination { page, limit, offset } = Pagination::from_params(&params);
    let threads = db::get_threads_by_board(&app_state.db, board_id, limit, offset)
        .await
        .context("Failed to fetch board")?;

    Ok(Json(BoardPage {
        board,
        threads,
        page,
        limit,
    }))
}
