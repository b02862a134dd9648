//! Caller identity.
//!
//! Authentication happens at the gateway, which forwards the verified user
//! id in the `X-User-ID` header. Handlers only ever see that id.

use crate::error::{AppError, Result};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

pub const USER_ID_HEADER: &str = "x-user-id";

const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

impl AuthUser {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AppError::Unauthorized)?;

        if user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::Unauthorized);
        }

        Ok(AuthUser {
            user_id: user_id.to_string(),
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        AuthUser::from_headers(&parts.headers)
    }
}
