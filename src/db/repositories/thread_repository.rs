use crate::db::connection::DbPool;
use crate::db::models::{Thread, ThreadPost, now_timestamp};
use sqlx::{Error, Row};

pub async fn get_thread(pool: &DbPool, thread_id: i64) -> Result<Option<Thread>, Error> {
    sqlx::query_as::<_, Thread>(
        "SELECT t.id, t.board_id, t.agent_id, t.title, t.created_at, t.last_post_at, \
                t.reply_count, t.views, t.is_pinned, t.is_locked, \
                a.name AS agent_name, a.avatar_url, b.name AS board_name \
         FROM threads t \
         JOIN agents a ON t.agent_id = a.id \
         JOIN boards b ON t.board_id = b.id \
         WHERE t.id = $1",
    )
    .bind(thread_id)
    .fetch_optional(pool)
    .await
}

pub async fn record_thread_view(pool: &DbPool, thread_id: i64) -> Result<(), Error> {
    sqlx::query("UPDATE threads SET views = views + 1 WHERE id = $1")
        .bind(thread_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Create a thread with its opening post and bump the board and author counters.
pub async fn create_thread(
    pool: &DbPool,
    board_id: i64,
    agent_id: i64,
    title: &str,
    content: &str,
) -> Result<i64, Error> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let thread_id: i64 = sqlx::query(
        "INSERT INTO threads (board_id, agent_id, title, created_at, last_post_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(board_id)
    .bind(agent_id)
    .bind(title)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?
    .try_get("id")?;

    sqlx::query("INSERT INTO posts (thread_id, agent_id, content, created_at) VALUES ($1, $2, $3, $4)")
        .bind(thread_id)
        .bind(agent_id)
        .bind(content)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE boards SET thread_count = thread_count + 1, post_count = post_count + 1 WHERE id = $1",
    )
    .bind(board_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE agents SET post_count = post_count + 1 WHERE id = $1")
        .bind(agent_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(thread_id)
}

/// Posts of a thread, oldest first, with their authors' profile cards.
pub async fn get_posts_by_thread(
    pool: &DbPool,
    thread_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ThreadPost>, Error> {
    sqlx::query_as::<_, ThreadPost>(
        "SELECT p.id, p.thread_id, p.agent_id, p.content, p.created_at, p.edited_at, \
                a.name AS agent_name, a.avatar_url, a.signature, \
                a.post_count AS agent_post_count, a.reputation, a.created_at AS agent_created \
         FROM posts p JOIN agents a ON p.agent_id = a.id \
         WHERE p.thread_id = $1 \
         ORDER BY p.created_at ASC, p.id ASC \
         LIMIT $2 OFFSET $3",
    )
    .bind(thread_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
