//! Request authorization
//!
//! Two layers run on every request. [`authorization_filter`] turns a valid
//! bearer access token into an [`Identity`] in the request extensions and
//! otherwise lets the request through unauthenticated. [`enforce_access_policy`]
//! then evaluates the policy table and is the only place a request is refused.

use crate::{AppState, WebError};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use gatehouse_auth::{AuthorizationFailure, Decision, Identity};
use tracing::debug;

/// Bearer token from the `Authorization` header, if any
///
/// The scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim_start().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Attach the verified identity, never rejecting
pub async fn authorization_filter(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match state.codec.verify_access(token) {
            Ok(claims) => {
                if let Some(identity) = Identity::from_claims(claims) {
                    request.extensions_mut().insert(identity);
                }
            }
            Err(e) => {
                debug!("Proceeding unauthenticated: {}", e);
            }
        }
    }

    next.run(request).await
}

/// Refuse the request if the policy table denies it
pub async fn enforce_access_policy(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let decision = state.policy.evaluate(
        request.method().as_str(),
        request.uri().path(),
        request.extensions().get::<Identity>(),
    );

    match decision {
        Decision::Permit => next.run(request).await,
        Decision::Deny(failure) => WebError::from(failure).into_response(),
    }
}

/// Extractor for the identity attached by [`authorization_filter`]
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| AuthorizationFailure::Unauthenticated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("BEARER  abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearerabc.def.ghi"));
        assert_eq!(bearer_token(&headers), None);
    }
}
