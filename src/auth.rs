use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub const TOKEN_ISSUER: &str = "video-upload-access";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header is missing")]
    MissingHeader,
    #[error("authorization header is malformed")]
    MalformedHeader,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is not a user id")]
    InvalidSubject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn get_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Validate an HS256 access token and return the user it was issued to.
pub fn validate_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject)
}

pub fn make_jwt(user_id: Uuid, secret: &str, expires_in: Duration) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        iss: TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now,
        exp: now + expires_in.as_secs() as i64,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Authenticate a request: bearer extraction followed by token validation.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Uuid, AuthError> {
    let token = get_bearer_token(headers)?;
    validate_jwt(token, secret)
}
