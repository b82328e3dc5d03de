use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::types::UserRole;

/// Identity established by the surrounding platform's gateway, which owns
/// session validation and injects these headers on every proxied request.
const USER_ID_HEADER: &str = "x-user-id";
const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub(crate) id: String,
    pub(crate) role: UserRole,
}

impl Identity {
    pub(crate) fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub(crate) struct CurrentUser(pub(crate) Identity);
pub(crate) struct CurrentAdmin(pub(crate) Identity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::Unauthorized("Missing gateway identity"))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_role)
            .ok_or(ApiError::Unauthorized("Missing or invalid gateway role"))?;

        Ok(CurrentUser(Identity { id: id.to_string(), role }))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(identity) = CurrentUser::from_request_parts(parts, state).await?;

        if identity.is_admin() {
            Ok(CurrentAdmin(identity))
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

pub(crate) fn require_staff(identity: &Identity) -> Result<(), ApiError> {
    match identity.role {
        UserRole::Admin | UserRole::Teacher => Ok(()),
        UserRole::Student => {
            Err(ApiError::Forbidden("Teacher or admin access required".to_string()))
        }
    }
}

fn parse_role(value: &str) -> Option<UserRole> {
    match value.trim().to_ascii_lowercase().as_str() {
        "admin" => Some(UserRole::Admin),
        "teacher" => Some(UserRole::Teacher),
        "student" => Some(UserRole::Student),
        _ => None,
    }
}
