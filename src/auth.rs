use crate::db;
use crate::db::models::Agent;
use crate::error::{DbContext, ForumError};
use crate::startup::AppState;
use axum::{
    async_trait,
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a fresh API key: 32 random bytes, hex encoded.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Keys are only ever stored as their SHA-256 hex digest.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// The agent behind a valid `Authorization: Bearer <key>` header.
pub struct AuthenticatedAgent(pub Agent);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAgent
where
    S: Send + Sync,
{
    type Rejection = ForumError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ForumError::MissingCredentials)?
            .to_string();

        let Extension(app_state) = Extension::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                error!("Application state missing from request: {e}");
                ForumError::Internal
            })?;

        let agent = db::find_agent_by_key_hash(&app_state.db, &hash_api_key(&api_key))
            .await
            .context("Failed to authenticate")?
            .ok_or(ForumError::InvalidApiKey)?;

        debug!("Authenticated agent {}", agent.name);
        Ok(AuthenticatedAgent(agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique_hex() {
        let first = generate_api_key();
        let second = generate_api_key();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_api_key("abc"), hash_api_key("abd"));
    }
}
