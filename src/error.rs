use crate::config::ConfigError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForumError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid {0}")]
    InvalidParam(&'static str),
    #[error("Search query must be 2-200 characters")]
    InvalidSearchQuery,
    #[error("Missing or invalid authorization header")]
    MissingCredentials,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Post not found or not authorized to edit")]
    PostNotEditable,
    #[error("Agent name already taken")]
    NameTaken,
    #[error("Thread is locked")]
    ThreadLocked,
    #[error("Too many connections, try again later")]
    TooManyConnections,
    #[error("Event stream disabled")]
    EventStreamDisabled,
    #[error("{0}")]
    RateLimited(&'static str),
    #[error("Request timeout")]
    RequestTimeout,
    #[error("Internal server error")]
    Internal,
    #[error("{context}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        let status = match &self {
            ForumError::Validation(_)
            | ForumError::InvalidParam(_)
            | ForumError::InvalidSearchQuery => StatusCode::BAD_REQUEST,
            ForumError::MissingCredentials | ForumError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ForumError::NotFound(_) | ForumError::PostNotEditable => StatusCode::NOT_FOUND,
            ForumError::NameTaken => StatusCode::CONFLICT,
            ForumError::ThreadLocked => StatusCode::FORBIDDEN,
            ForumError::TooManyConnections | ForumError::EventStreamDisabled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ForumError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ForumError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ForumError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ForumError::Database { context, source } => {
                error!("{context}: {source}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({ "error": self.to_string() }));

        (status, body).into_response()
    }
}

/// Attach a client-facing message to a store failure.
pub trait DbContext<T> {
    fn context(self, context: &'static str) -> Result<T, ForumError>;
}

impl<T> DbContext<T> for Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T, ForumError> {
        self.map_err(|source| ForumError::Database { context, source })
    }
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
