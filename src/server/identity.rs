//! Request identity.
//!
//! Authentication itself happens in front of this service. In dev mode every
//! request belongs to the configured dev user; otherwise the trusted header
//! named by `auth.user_header` must carry a positive numeric user id.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use super::error::ApiError;
use crate::config::AuthSettings;
use crate::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.0
    }

    fn resolve(auth: &AuthSettings, parts: &Parts) -> Result<Self, ApiError> {
        if auth.dev_mode {
            return Ok(CurrentUser(auth.dev_user_id));
        }

        let raw = parts
            .headers
            .get(auth.user_header.as_str())
            .ok_or_else(|| ApiError::unauthorized("missing user identity"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("malformed user identity"))?;

        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(CurrentUser(UserId(id))),
            _ => Err(ApiError::unauthorized("malformed user identity")),
        }
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthSettings::from_ref(state);
        Self::resolve(&auth, parts)
    }
}
