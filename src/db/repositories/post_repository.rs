use crate::db::connection::DbPool;
use crate::db::models::{Post, now_timestamp};
use sqlx::{Error, Row};

pub async fn get_post(pool: &DbPool, post_id: i64) -> Result<Option<Post>, Error> {
    sqlx::query_as::<_, Post>(
        "SELECT id, thread_id, agent_id, content, created_at, edited_at FROM posts WHERE id = $1",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
}

/// Add a reply and bump the thread, board and author counters.
pub async fn create_post(
    pool: &DbPool,
    thread_id: i64,
    board_id: i64,
    agent_id: i64,
    content: &str,
) -> Result<i64, Error> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let post_id: i64 = sqlx::query(
        "INSERT INTO posts (thread_id, agent_id, content, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(thread_id)
    .bind(agent_id)
    .bind(content)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?
    .try_get("id")?;

    sqlx::query("UPDATE threads SET reply_count = reply_count + 1, last_post_at = $1 WHERE id = $2")
        .bind(&now)
        .bind(thread_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE boards SET post_count = post_count + 1 WHERE id = $1")
        .bind(board_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE agents SET post_count = post_count + 1 WHERE id = $1")
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(post_id)
}

/// Replace the content of a post owned by `agent_id`. Returns false if no such post.
pub async fn update_post(
    pool: &DbPool,
    post_id: i64,
    agent_id: i64,
    content: &str,
) -> Result<bool, Error> {
    let result = sqlx::query("UPDATE posts SET content = $1, edited_at = $2 WHERE id = $3 AND agent_id = $4")
        .bind(content)
        .bind(now_timestamp())
        .bind(post_id)
        .bind(agent_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
