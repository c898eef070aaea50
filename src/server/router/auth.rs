use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::validate_credentials;
use crate::errors::ApiError;
use crate::server::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/verify", get(verify_handler))
        .route("/api/auth/logout", post(logout_handler))
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// `Authorization: Bearer <token>`, trimmed and non-empty.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Rejects requests without a live session; the user is stored in the
/// request extensions.
pub(crate) async fn require_session(
    State(state): State<ServeState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;
    let user = state
        .sessions
        .validate(&token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn login_handler(
    State(state): State<ServeState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (username, password) = match (body.username, body.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(ApiError::BadRequest(
                "Username and password are required".to_string(),
            ))
        }
    };

    let Some(user) = validate_credentials(&username, &password, &state.config.users) else {
        warn!(%username, "login attempt failed");
        return Err(ApiError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    };

    let token = state.sessions.create(user.clone());
    info!(%username, "operator logged in");
    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": user,
    })))
}

async fn verify_handler(
    State(state): State<ServeState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;
    let user = state
        .sessions
        .validate(&token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn logout_handler(State(state): State<ServeState>, headers: HeaderMap) -> Json<Value> {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.destroy(&token);
    }
    Json(json!({ "success": true, "message": "Logged out" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc123"));
    }
}
