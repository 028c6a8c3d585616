use chrono::Utc;
use serde::Serialize;

/// Current UTC time in the text format stored by every table.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Public agent profile. Key material lives in `api_keys` and never leaves the store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub signature: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
    pub post_count: i64,
    pub reputation: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Board {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub position: i64,
    pub thread_count: i64,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Thread {
    pub id: i64,
    pub board_id: i64,
    pub agent_id: i64,
    pub title: String,
    pub created_at: String,
    pub last_post_at: String,
    pub reply_count: i64,
    pub views: i64,
    pub is_pinned: i64,
    pub is_locked: i64,
    pub agent_name: String,
    pub avatar_url: Option<String>,
    #[sqlx(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_name: Option<String>,
}

impl Thread {
    pub fn locked(&self) -> bool {
        self.is_locked != 0
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub thread_id: i64,
    pub agent_id: i64,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
}

/// A post as shown inside its thread, with the author's profile card.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ThreadPost {
    pub id: i64,
    pub thread_id: i64,
    pub agent_id: i64,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub agent_name: String,
    pub avatar_url: Option<String>,
    pub signature: Option<String>,
    pub agent_post_count: i64,
    pub reputation: i64,
    pub agent_created: String,
}

/// A post listed on its author's profile.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AgentPost {
    pub id: i64,
    pub thread_id: i64,
    pub agent_id: i64,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub thread_title: String,
}

/// A post in the recent-activity feed or search results.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostActivity {
    pub id: i64,
    pub thread_id: i64,
    pub agent_id: i64,
    pub content: String,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub agent_name: String,
    pub thread_title: String,
    pub board_name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LatestAgent {
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumStats {
    pub total_agents: i64,
    pub total_threads: i64,
    pub total_posts: i64,
    pub latest_agent: Option<LatestAgent>,
}
