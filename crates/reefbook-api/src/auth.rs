//! Bearer token authentication.
//!
//! Identity lives outside this system. The API trusts tokens minted by
//! the identity provider with a shared secret: four dot-separated
//! segments, `{user_id}.{role}.{expiry}.{signature}`, where the
//! signature is an HMAC-SHA256 over the first three. Verification is
//! pure string work, so it needs no store round trip and no cache.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use reefbook_core::actor::{Actor, Role};
use reefbook_core::clock::Clock as _;
use reefbook_payments::signature;

use crate::error::ErrorBody;
use crate::state::AppState;

/// Mints and verifies bearer tokens.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    secret: String,
    ttl: Duration,
}

impl TokenVerifier {
    /// A verifier trusting tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    /// Mint a token for `user_id` expiring after the configured
    /// lifetime.
    #[must_use]
    pub fn issue(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> String {
        let expiry = (now + self.ttl).timestamp();
        let payload = format!("{user_id}.{}.{expiry}", role.as_str());
        let sig = signature::sign(&self.secret, &payload);
        format!("{payload}.{sig}")
    }

    /// Check a presented token. Returns the actor it authenticates, or
    /// `None` for a malformed, tampered, or expired token.
    #[must_use]
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Option<Actor> {
        let (payload, presented) = token.rsplit_once('.')?;
        if !signature::verify(&self.secret, payload, presented) {
            return None;
        }
        let mut segments = payload.split('.');
        let user_id = Uuid::parse_str(segments.next()?).ok()?;
        let role = Role::parse(segments.next()?)?;
        let expiry: i64 = segments.next()?.parse().ok()?;
        if segments.next().is_some() || expiry <= now.timestamp() {
            return None;
        }
        Some(Actor::new(user_id, role))
    }
}

/// The bearer token from an `Authorization` header, if one is present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// The actor a valid bearer token authenticates. Extracting this in a
/// handler makes the route require authentication.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Actor);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let actor = bearer_token(&parts.headers)
            .and_then(|token| state.verifier.verify(token, state.clock.now()));
        match actor {
            Some(actor) => Ok(Self(actor)),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody::new(
                    "unauthenticated",
                    "a valid bearer token is required",
                )),
            )
                .into_response()),
        }
    }
}
