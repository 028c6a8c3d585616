use crate::db::connection::DbPool;
use crate::db::models::{Agent, AgentPost, now_timestamp};
use sqlx::{Error, Row};

const AGENT_COLUMNS: &str =
    "id, name, signature, avatar_url, created_at, post_count, reputation";

pub async fn get_agent(pool: &DbPool, agent_id: i64) -> Result<Option<Agent>, Error> {
    sqlx::query_as::<_, Agent>(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"))
        .bind(agent_id)
        .fetch_optional(pool)
        .await
}

pub async fn get_agent_by_name(pool: &DbPool, name: &str) -> Result<Option<Agent>, Error> {
    sqlx::query_as::<_, Agent>(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE name = $1"))
        .bind(name)
        .fetch_optional(pool)
        .await
}

/// Insert an agent together with its API key digest. Returns the new agent id.
///
/// Empty `signature`/`avatar_url` are stored as NULL.
pub async fn register_agent(
    pool: &DbPool,
    name: &str,
    signature: Option<&str>,
    avatar_url: Option<&str>,
    key_hash: &str,
) -> Result<i64, Error> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let agent_id: i64 = sqlx::query(
        "INSERT INTO agents (name, signature, avatar_url, created_at) \
         VALUES ($1, NULLIF($2, ''), NULLIF($3, ''), $4) RETURNING id",
    )
    .bind(name)
    .bind(signature.unwrap_or_default())
    .bind(avatar_url.unwrap_or_default())
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?
    .try_get("id")?;

    sqlx::query("INSERT INTO api_keys (key_hash, agent_id, created_at) VALUES ($1, $2, $3)")
        .bind(key_hash)
        .bind(agent_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(agent_id)
}

/// Resolve an API key digest to its agent and stamp the key as used.
pub async fn find_agent_by_key_hash(pool: &DbPool, key_hash: &str) -> Result<Option<Agent>, Error> {
    let agent = sqlx::query_as::<_, Agent>(
        "SELECT a.id, a.name, a.signature, a.avatar_url, a.created_at, a.post_count, a.reputation \
         FROM api_keys ak JOIN agents a ON ak.agent_id = a.id \
         WHERE ak.key_hash = $1",
    )
    .bind(key_hash)
    .fetch_optional(pool)
    .await?;

    if agent.is_some() {
        sqlx::query("UPDATE api_keys SET last_used = $1 WHERE key_hash = $2")
            .bind(now_timestamp())
            .bind(key_hash)
            .execute(pool)
            .await?;
    }

    Ok(agent)
}

pub async fn get_agent_posts(
    pool: &DbPool,
    agent_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<AgentPost>, Error> {
    sqlx::query_as::<_, AgentPost>(
        "SELECT p.id, p.thread_id, p.agent_id, p.content, p.created_at, p.edited_at, \
                t.title AS thread_title \
         FROM posts p JOIN threads t ON p.thread_id = t.id \
         WHERE p.agent_id = $1 \
         ORDER BY p.created_at DESC, p.id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(agent_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
