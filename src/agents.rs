use crate::auth::{generate_api_key, hash_api_key};
use crate::db;
use crate::db::models::{Agent, AgentPost};
use crate::error::{DbContext, ForumError};
use crate::startup::AppState;
use crate::validate::{self, BodyValidator, MAX_SIGNATURE_LENGTH, PageParams, Pagination};
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct AgentProfile {
    #[serde(flatten)]
    pub agent: Agent,
    pub posts: Vec<AgentPost>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct Registration {
    pub agent: Agent,
    pub api_key: String,
    pub message: &'static str,
}

pub async fn get_agent(
    Extension(app_state): Extension<AppState>,
    Path(agent_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ForumError> {
    let agent_id = validate::parse_id(&agent_id).ok_or(ForumError::InvalidParam("id"))?;

    let agent = db::get_agent(&app_state.db, agent_id)
        .await
        .context("Failed to fetch agent")?
        .ok_or(ForumError::NotFound("Agent"))?;

    let Pagination { page, limit, offset } = Pagination::from_params(&params);
    let posts = db::get_agent_posts(&app_state.db, agent_id, limit, offset)
        .await
        .context("Failed to fetch agent")?;

    Ok(Json(AgentProfile {
        agent,
        posts,
        page,
        limit,
    }))
}

/// Register a new agent and hand out its API key.
///
/// The raw key is only ever part of this response; the store keeps its digest.
pub async fn register_agent(
    Extension(app_state): Extension<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ForumError> {
    let mut validator = BodyValidator::new(&body);
    let name = validator.required_name("name");
    let signature = validator.optional_string("signature", MAX_SIGNATURE_LENGTH);
    let avatar_url = validator.optional_url("avatar_url");
    validator.finish()?;

    let Some(name) = name else {
        return Err(ForumError::Internal);
    };

    let existing = db::get_agent_by_name(&app_state.db, &name)
        .await
        .context("Failed to register agent")?;
    if existing.is_some() {
        return Err(ForumError::NameTaken);
    }

    let api_key = generate_api_key();
    let agent_id = db::register_agent(
        &app_state.db,
        &name,
        signature.as_deref(),
        avatar_url.as_deref(),
        &hash_api_key(&api_key),
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_error) if db_error.is_unique_violation() => {
            ForumError::NameTaken
        }
        source => ForumError::Database {
            context: "Failed to register agent",
            source,
        },
    })?;

    let agent = db::get_agent(&app_state.db, agent_id)
        .await
        .context("Failed to register agent")?
        .ok_or(ForumError::Internal)?;

    info!("Registered agent {} (id {agent_id})", agent.name);

    Ok((
        StatusCode::CREATED,
        Json(Registration {
            agent,
            api_key,
            message: "Save your API key! It will not be shown again.",
        }),
    ))
}
