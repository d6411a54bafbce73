//! Bearer token authorization
//!
//! Each configured token grants one role. Administrative endpoints sit behind
//! [`require_admin`].

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::str::FromStr;

use crate::api::AppState;
use crate::api::error::ApiError;

/// Role granted by an API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Viewer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "viewer" => Ok(Role::Viewer),
            other => anyhow::bail!("Unknown role '{}', expected 'admin' or 'viewer'", other),
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Lets the request through only for admin tokens
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let role = state
        .api_keys
        .get(token)
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;

    if role != Role::Admin {
        tracing::warn!("Rejected {} token on {}", role.as_str(), request.uri().path());
        return Err(ApiError::Forbidden(
            "Administrator role required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("VIEWER".parse::<Role>().unwrap(), Role::Viewer);
        assert!("operator".parse::<Role>().is_err());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let request = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("s3cret"));

        let basic = axum::http::Request::builder()
            .header(header::AUTHORIZATION, "Basic YWRtaW46YWRtaW4=")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&basic), None);
    }
}
