//! Authentication API Endpoints
//! Mission: Provide signup/signin/session endpoints and admin user management

use crate::auth::{
    errors::AuthError,
    jwt::JwtHandler,
    middleware::{authorize_owner_or_admin, require_admin, require_identity},
    models::{
        CreateUserRequest, CurrentUser, Identity, IdentityResponse, SessionResponse,
        SigninRequest, SignupRequest, UpdateProfileRequest, UpdateRoleRequest,
    },
    user_store::UserStore,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Self-service signups must choose a password of at least this length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }
}

/// Build the full auth surface: public signup/signin/signout, the
/// identity-gated routes, and the admin-gated routes. Every protected route
/// composes through `require_identity`; admin routes additionally layer
/// `require_admin` after it.
pub fn router(state: AuthState) -> Router {
    let public = Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/signin", post(signin))
        .route("/api/auth/signout", get(signout))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/users/:id", put(update_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state.clone());

    let admin = Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users", post(create_user))
        .route("/api/admin/users/:id/role", put(update_role))
        .route("/api/admin/users/:id", delete(delete_user))
        // Order matters: require_admin consumes the identity that
        // require_identity resolves, so it must run after it.
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ))
        .with_state(state);

    Router::new().merge(public).merge(protected).merge(admin)
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_new_user(name: &str, email: &str, password: &str) -> Result<(), AuthError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push("name is required".to_string());
    }
    if !is_valid_email(email.trim()) {
        errors.push("email is invalid".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AuthError::Validation(errors))
    }
}

fn session_response(
    state: &AuthState,
    identity: &Identity,
) -> Result<SessionResponse, AuthError> {
    let (token, expires_in) = state
        .jwt_handler
        .generate_token(identity.id)
        .map_err(|_| AuthError::Internal)?;

    Ok(SessionResponse {
        token,
        expires_in,
        user: IdentityResponse::from_identity(identity),
    })
}

/// Register a new identity - POST /api/auth/signup
///
/// Self-service signups always get the `user` role; roles are only granted
/// through the admin endpoints.
pub async fn signup(
    State(state): State<AuthState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    validate_new_user(&payload.name, &payload.email, &payload.password)?;

    let identity = state.user_store.create_user(
        payload.name.trim(),
        payload.email.trim(),
        &payload.password,
        crate::auth::models::Role::User,
    )?;

    info!("✅ Signup: {}", identity.email);

    let response = session_response(&state, &identity)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Sign in - POST /api/auth/signin
pub async fn signin(
    State(state): State<AuthState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let identity = state
        .user_store
        .verify_password(payload.email.trim(), &payload.password)
        .map_err(AuthError::from)?
        .ok_or_else(|| {
            warn!("❌ Failed signin attempt: {}", payload.email);
            AuthError::InvalidCredentials
        })?;

    info!("✅ Signin: {} ({})", identity.email, identity.role.as_str());

    let response = session_response(&state, &identity)?;
    Ok(Json(response))
}

/// Sign out - GET /api/auth/signout
///
/// Tokens are stateless and there is no revocation list, so this is a
/// server-side no-op that always answers 200. The client's local cleanup is
/// the authoritative part of logout.
pub async fn signout() -> Json<Value> {
    Json(json!({ "success": true, "message": "Signed out" }))
}

/// Current identity - GET /api/auth/me
///
/// The middleware already re-read the identity from the store, so this
/// reflects role changes and deletions immediately.
pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({ "success": true, "user": user }))
}

/// Update a profile - PUT /api/users/:id (owner or admin)
pub async fn update_profile(
    State(state): State<AuthState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<IdentityResponse>, AuthError> {
    authorize_owner_or_admin(&user, id)?;

    let mut errors = Vec::new();
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            errors.push("name cannot be empty".to_string());
        }
    }
    if let Some(email) = &payload.email {
        if !is_valid_email(email.trim()) {
            errors.push("email is invalid".to_string());
        }
    }
    if let Some(password) = &payload.password {
        if password.len() < MIN_PASSWORD_LEN {
            errors.push(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }
    }
    if !errors.is_empty() {
        return Err(AuthError::Validation(errors));
    }

    let updated = state.user_store.update_user(&id, &payload)?;

    info!("✏️  Profile updated: {}", updated.email);

    Ok(Json(IdentityResponse::from_identity(&updated)))
}

/// Dashboard aggregates - GET /api/admin/dashboard (admin only)
pub async fn dashboard(State(state): State<AuthState>) -> Result<Json<Value>, AuthError> {
    let stats = state.user_store.dashboard_stats()?;
    Ok(Json(json!({ "success": true, "data": stats })))
}

/// List identities - GET /api/admin/users (admin only)
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<Vec<IdentityResponse>>, AuthError> {
    let users = state.user_store.list_users()?;
    let response = users.iter().map(IdentityResponse::from_identity).collect();
    Ok(Json(response))
}

/// Create identity with explicit role - POST /api/admin/users (admin only)
pub async fn create_user(
    State(state): State<AuthState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<IdentityResponse>), AuthError> {
    validate_new_user(&payload.name, &payload.email, &payload.password)?;

    let identity = state.user_store.create_user(
        payload.name.trim(),
        payload.email.trim(),
        &payload.password,
        payload.role,
    )?;

    info!(
        "✅ Admin created identity: {} ({})",
        identity.email,
        identity.role.as_str()
    );

    Ok((StatusCode::CREATED, Json(IdentityResponse::from_identity(&identity))))
}

/// Change a role - PUT /api/admin/users/:id/role (admin only)
///
/// This is the only path that mutates a role.
pub async fn update_role(
    State(state): State<AuthState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<IdentityResponse>, AuthError> {
    let updated = state.user_store.set_role(&id, payload.role)?;
    Ok(Json(IdentityResponse::from_identity(&updated)))
}

/// Delete identity - DELETE /api/admin/users/:id (admin only)
pub async fn delete_user(
    State(state): State<AuthState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AuthError> {
    // Don't allow deleting yourself
    if id == user.id {
        return Err(AuthError::CannotDeleteSelf);
    }

    state.user_store.delete_user(&id)?;

    info!("🗑️  Identity deleted: {}", id);

    Ok(StatusCode::NO_CONTENT)
}
