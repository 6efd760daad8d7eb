//! Identity Resolution Middleware & Authorization Gate
//! Mission: Turn bearer tokens into request identities, then gate by policy

use crate::auth::{
    api::AuthState,
    errors::AuthError,
    models::CurrentUser,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};
use uuid::Uuid;

/// Pull the bearer token out of the Authorization header.
fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Identity resolution: the single middleware every protected route
/// composes through.
///
/// Missing, malformed, or expired tokens short-circuit with 401. A token
/// whose identity no longer exists is dead immediately, not at expiry.
/// A store failure is 503; it never falls through to the handler.
pub async fn require_identity(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req).ok_or(AuthError::Unauthenticated)?;

    let identity_id = state.jwt_handler.verify(token)?;

    let identity = state
        .user_store
        .get_user_by_id(&identity_id)
        .map_err(AuthError::from)?
        .ok_or_else(|| {
            debug!("token references deleted identity {}", identity_id);
            AuthError::Unauthenticated
        })?;

    req.extensions_mut()
        .insert(CurrentUser::from_identity(&identity));

    Ok(next.run(req).await)
}

/// Role policy: admin or 403. Must be layered after `require_identity`;
/// reaching it without a resolved identity is a composition bug and fails
/// closed.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AuthError> {
    let Some(user) = req.extensions().get::<CurrentUser>() else {
        error!("authorization gate ran without a resolved identity; failing closed");
        return Err(AuthError::Unauthenticated);
    };

    if !user.is_admin() {
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Ownership-or-admin policy: pass iff the resolved identity is an admin or
/// owns the target resource.
pub fn authorize_owner_or_admin(user: &CurrentUser, owner_id: Uuid) -> Result<(), AuthError> {
    if user.is_admin() || user.id == owner_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Extract the resolved identity from a request (use after `require_identity`)
pub fn current_user(req: &Request) -> Option<&CurrentUser> {
    req.extensions().get::<CurrentUser>()
}
