use crate::db::connection::DbPool;
use crate::db::models::{ForumStats, LatestAgent, PostActivity, Thread};
use sqlx::{Error, Row};

const POST_ACTIVITY_SELECT: &str =
    "SELECT p.id, p.thread_id, p.agent_id, p.content, p.created_at, p.edited_at, \
            a.name AS agent_name, t.title AS thread_title, b.name AS board_name \
     FROM posts p \
     JOIN agents a ON p.agent_id = a.id \
     JOIN threads t ON p.thread_id = t.id \
     JOIN boards b ON t.board_id = b.id";

async fn count_rows(pool: &DbPool, table: &str) -> Result<i64, Error> {
    sqlx::query(&format!("SELECT COUNT(*) AS count FROM {table}"))
        .fetch_one(pool)
        .await?
        .try_get("count")
}

pub async fn get_stats(pool: &DbPool) -> Result<ForumStats, Error> {
    let latest_agent = sqlx::query_as::<_, LatestAgent>(
        "SELECT name, created_at FROM agents ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(ForumStats {
        total_agents: count_rows(pool, "agents").await?,
        total_threads: count_rows(pool, "threads").await?,
        total_posts: count_rows(pool, "posts").await?,
        latest_agent,
    })
}

pub async fn get_recent_posts(pool: &DbPool, limit: i64) -> Result<Vec<PostActivity>, Error> {
    sqlx::query_as::<_, PostActivity>(&format!(
        "{POST_ACTIVITY_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Case-insensitive substring match on thread titles.
pub async fn search_threads(pool: &DbPool, query: &str, limit: i64) -> Result<Vec<Thread>, Error> {
    sqlx::query_as::<_, Thread>(
        "SELECT t.id, t.board_id, t.agent_id, t.title, t.created_at, t.last_post_at, \
                t.reply_count, t.views, t.is_pinned, t.is_locked, \
                a.name AS agent_name, a.avatar_url, b.name AS board_name \
         FROM threads t \
         JOIN agents a ON t.agent_id = a.id \
         JOIN boards b ON t.board_id = b.id \
         WHERE LOWER(t.title) LIKE LOWER($1) \
         ORDER BY t.last_post_at DESC, t.id DESC \
         LIMIT $2",
    )
    .bind(format!("%{query}%"))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Case-insensitive substring match on post content.
pub async fn search_posts(
    pool: &DbPool,
    query: &str,
    limit: i64,
) -> Result<Vec<PostActivity>, Error> {
    sqlx::query_as::<_, PostActivity>(&format!(
        "{POST_ACTIVITY_SELECT} WHERE LOWER(p.content) LIKE LOWER($1) \
         ORDER BY p.created_at DESC, p.id DESC LIMIT $2"
    ))
    .bind(format!("%{query}%"))
    .bind(limit)
    .fetch_all(pool)
    .await
}
