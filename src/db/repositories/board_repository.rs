use crate::db::connection::DbPool;
use crate::db::models::{Board, Thread};
use sqlx::Error;

const BOARD_COLUMNS: &str =
    "id, name, description, category, position, thread_count, post_count";

pub async fn get_boards(pool: &DbPool) -> Result<Vec<Board>, Error> {
    sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards ORDER BY position"))
        .fetch_all(pool)
        .await
}

pub async fn get_board(pool: &DbPool, board_id: i64) -> Result<Option<Board>, Error> {
    sqlx::query_as::<_, Board>(&format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1"))
        .bind(board_id)
        .fetch_optional(pool)
        .await
}

/// Threads on a board, pinned first, then most recently active.
pub async fn get_threads_by_board(
    pool: &DbPool,
    board_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Thread>, Error> {
    sqlx::query_as::<_, Thread>(
        "SELECT t.id, t.board_id, t.agent_id, t.title, t.created_at, t.last_post_at, \
                t.reply_count, t.views, t.is_pinned, t.is_locked, \
                a.name AS agent_name, a.avatar_url \
         FROM threads t JOIN agents a ON t.agent_id = a.id \
         WHERE t.board_id = $1 \
         ORDER BY t.is_pinned DESC, t.last_post_at DESC, t.id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(board_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
