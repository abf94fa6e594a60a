//! Authentication extractors
//!
//! Toy scheme: the `token` query parameter is looked up as a user name.
//! Handlers ask for `UserContext` or `AdminContext` as arguments; the
//! extractor runs the lookup once per request.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::{AppState, AppError};
use crate::models::User;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Authenticated user
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user: User,
}

/// Authenticated user holding the admin role
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub user: User,
}

/// RBAC: Require admin role
pub fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        tracing::warn!("Admin required but user {} has role '{}'", user.id, user.role);
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn token_from(parts: &Parts) -> Result<String, AppError> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(&parts.uri)
        .map_err(|_| AppError::Unauthorized)?;

    query
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for UserContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from(parts)?;

        let user = User::find_by_token(&state.pool, &token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        Ok(UserContext { user })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let UserContext { user } = UserContext::from_request_parts(parts, state).await?;
        require_admin(&user)?;
        Ok(AdminContext { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use chrono::Utc;

    fn parts(uri: &str) -> Parts {
        Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    fn user(role: &str) -> User {
        User {
            id: 7,
            name: "alice".into(),
            email: "alice@example.com".into(),
            role: role.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_extraction() {
        assert_eq!(token_from(&parts("/api/v1/profile?token=alice")).unwrap(), "alice");
        assert!(matches!(token_from(&parts("/api/v1/profile")), Err(AppError::Unauthorized)));
        assert!(matches!(token_from(&parts("/api/v1/profile?token=")), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&user("admin")).is_ok());
        assert!(matches!(require_admin(&user("user")), Err(AppError::Forbidden)));
    }
}
