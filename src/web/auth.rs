//! Bearer-token session extraction.
//!
//! The browser forwards the subject's Google ID token. Its signature is not
//! checked here: the Backend API verifies every token it receives. Claims are
//! used only to key coalescing state and to fill `auth0_id` fields.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tracing::debug;

use crate::backend::BearerToken;
use crate::web::error::ApiError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization scheme is not Bearer")]
    NotBearer,
    #[error("token is not a decodable JWT")]
    Malformed,
    #[error("token has no {0} claim")]
    MissingClaim(&'static str),
    #[error("token expired")]
    Expired,
}

#[derive(Deserialize)]
struct Claims {
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
    exp: Option<i64>,
}

/// The authenticated subject of a request.
#[derive(Clone, custom_debug_derive::Debug)]
pub struct Session {
    /// Stable subject identifier; keys the generation guards.
    pub sub: String,
    /// Keys the freshness caches.
    #[debug(with = "crate::fmt::email")]
    pub email: String,
    #[debug(skip_if = Option::is_none, with = "crate::fmt::opt")]
    pub name: Option<String>,
    #[debug(skip)]
    pub picture: Option<String>,
    #[debug(skip)]
    pub token: BearerToken,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingHeader)?;
        let token = value
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotBearer)?;
        Self::from_token(token, chrono::Utc::now().timestamp())
    }

    /// Decode `token`'s claims, treating it as expired at or after `exp`.
    pub fn from_token(token: &str, now: i64) -> Result<Self, AuthError> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => return Err(AuthError::Malformed),
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)?;

        if claims.exp.is_some_and(|exp| exp <= now) {
            return Err(AuthError::Expired);
        }
        let sub = claims
            .sub
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingClaim("sub"))?;
        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::MissingClaim("email"))?;

        Ok(Session {
            sub,
            email,
            name: claims.name,
            picture: claims.picture,
            token: BearerToken::new(token),
        })
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let session = Session::from_headers(&parts.headers).map_err(|reason| {
            debug!(%reason, path = parts.uri.path(), "rejecting unauthenticated request");
            ApiError::unauthenticated()
        })?;
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}
