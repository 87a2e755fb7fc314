//! Identity resolution and the authorization gates layered on top of it.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::{ApiError, AppState};
use crate::models::token::{TokenScope, validate_token_plaintext};
use crate::models::user::{Identity, User};
use crate::models::validator::Validator;

/// The identity `authenticate` attached to this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                ApiError::internal("request identity missing; authenticate middleware did not run")
            })
    }
}

/// Resolves the bearer token (if any) to an identity for every request.
///
/// No `Authorization` header means anonymous. A malformed, unknown or expired
/// token is rejected outright rather than downgraded to anonymous.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_identity(&state, request.headers()).await {
        Ok(identity) => {
            if let Some(user) = identity.user() {
                tracing::Span::current().record("user_id", user.id);
            }
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;
    let token = match value.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] => *token,
        _ => return Err(ApiError::InvalidAuthenticationToken),
    };

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, token);
    if !v.valid() {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match state
        .users()
        .get_for_token(TokenScope::Authentication, token)
        .await?
    {
        Some(user) => Ok(Identity::User(user)),
        None => Err(ApiError::InvalidAuthenticationToken),
    }
}

fn authenticated(identity: &Identity) -> Result<&User, ApiError> {
    identity.user().ok_or(ApiError::AuthenticationRequired)
}

fn activated(identity: &Identity) -> Result<&User, ApiError> {
    let user = authenticated(identity)?;
    if user.activated {
        Ok(user)
    } else {
        Err(ApiError::InactiveAccount)
    }
}

pub async fn require_authenticated_user(
    CurrentUser(identity): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authenticated(&identity)?;
    Ok(next.run(request).await)
}

pub async fn require_activated_user(
    CurrentUser(identity): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    activated(&identity)?;
    Ok(next.run(request).await)
}

/// Gate for routes needing permission `code`. Permissions are looked up on
/// every request.
pub async fn require_permission(
    State((state, code)): State<(Arc<AppState>, &'static str)>,
    CurrentUser(identity): CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = activated(&identity)?;

    let permissions = state.users().permissions_for(user.id).await?;
    if !permissions.includes(code) {
        return Err(ApiError::NotPermitted);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware::from_fn, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn user(activated: bool) -> User {
        User {
            id: 7,
            created_at: String::new(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            activated,
            version: 1,
        }
    }

    async fn whoami(CurrentUser(identity): CurrentUser) -> String {
        identity
            .user()
            .map_or_else(|| "anonymous".to_string(), |u| u.email.clone())
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/authenticated",
                get(whoami).route_layer(from_fn(require_authenticated_user)),
            )
            .route(
                "/activated",
                get(whoami).route_layer(from_fn(require_activated_user)),
            )
            .route("/open", get(whoami))
    }

    async fn call(uri: &str, identity: Option<Identity>) -> (StatusCode, String) {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(identity) = identity {
            builder = builder.extension(identity);
        }
        let response = app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_authenticated_gate() {
        let (status, body) = call("/authenticated", Some(Identity::Anonymous)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("you must be authenticated to access this resource"));

        let (status, body) = call("/authenticated", Some(Identity::User(user(false)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice@example.com");
    }

    #[tokio::test]
    async fn test_activated_gate() {
        let (status, _) = call("/activated", Some(Identity::Anonymous)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call("/activated", Some(Identity::User(user(false)))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("your user account must be activated to access this resource"));

        let (status, body) = call("/activated", Some(Identity::User(user(true)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice@example.com");
    }

    #[tokio::test]
    async fn test_missing_identity_is_a_server_error() {
        let (status, _) = call("/activated", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = call("/open", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = call("/open", Some(Identity::Anonymous)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }
}
