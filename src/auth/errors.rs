//! Authentication error taxonomy
//! Mission: One explicit result type for every auth/authorization failure

use crate::auth::jwt::TokenError;
use crate::auth::user_store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Every way an auth-gated request can fail. Failures are values that flow
/// through the middleware chain, not exceptions: handlers and middleware
/// return these and the router maps them to HTTP at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token, invalid/expired token, or the referenced identity is gone.
    #[error("authentication required")]
    Unauthenticated,
    /// Bad email/password at signin. Deliberately does not reveal whether
    /// the email exists.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Resolved identity lacks the required role or ownership.
    #[error("insufficient permissions")]
    Forbidden,
    /// Malformed signup/update payload, with field-level messages.
    #[error("validation failed")]
    Validation(Vec<String>),
    /// Duplicate email at signup or profile update.
    #[error("email already registered")]
    Conflict,
    /// Target identity does not exist.
    #[error("user not found")]
    NotFound,
    /// Admins cannot delete their own account.
    #[error("cannot delete your own account")]
    CannotDeleteSelf,
    /// Credential store unreachable. The gate fails closed: an unreachable
    /// store denies access, it never authenticates.
    #[error("credential store unavailable")]
    Unavailable,
    #[error("internal server error")]
    Internal,
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmailTaken => AuthError::Conflict,
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Db(db) => {
                error!("credential store failure: {}", db);
                AuthError::Unavailable
            }
            StoreError::Hash(hash) => {
                error!("password hashing failure: {}", hash);
                AuthError::Internal
            }
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        AuthError::Unauthenticated
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::CannotDeleteSelf => StatusCode::BAD_REQUEST,
            AuthError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::Validation(fields) => json!({
                "success": false,
                "message": self.to_string(),
                "errors": fields,
            }),
            _ => json!({
                "success": false,
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
