//! Bearer-token identity boundary.
//!
//! Token issuance (signup/login) lives in the account service; this
//! side only mints tokens for tooling and tests, and verifies the HS256
//! tokens presented on incoming requests.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError, state::SharedState};

/// Claims carried by access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User identifier.
    pub sub: Uuid,
    /// Account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Issued-at (seconds since epoch).
    pub iat: i64,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

/// Authenticated actor resolved from the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User identifier.
    pub id: Uuid,
    /// Account email.
    pub email: String,
    /// Display name, recorded on posts and results.
    pub name: String,
}

/// Mint an HS256 access token for the given identity.
pub fn mint_access_token(
    user: &CurrentUser,
    now: SystemTime,
    config: &AppConfig,
) -> Result<String, AppError> {
    let iat = now
        .duration_since(UNIX_EPOCH)
        .map_err(|_| AppError::Internal("current time predates the epoch".into()))?
        .as_secs() as i64;
    let exp = iat + config.token_ttl().as_secs() as i64;

    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        iat,
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.token_secret()),
    )
    .map_err(|err| AppError::Internal(format!("failed to encode token: {err}")))
}

/// Verify a bearer token and return its claims.
pub fn verify_access_token(token: &str, config: &AppConfig) -> Result<Claims, AppError> {
    // Default validation already checks `exp`; pin the algorithm.
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.token_secret()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("token expired".into())
        }
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            AppError::Unauthorized("invalid signature".into())
        }
        _ => AppError::Unauthorized("invalid token".into()),
    })
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;

        let claims = verify_access_token(token, state.config())?;
        Ok(CurrentUser {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
        })
    }
}
