//! Authentication Module
//! Mission: Bearer-token session auth and role-based access control

pub mod api;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use api::AuthState;
pub use errors::AuthError;
pub use jwt::{JwtHandler, TOKEN_TTL_HOURS};
pub use middleware::{authorize_owner_or_admin, require_admin, require_identity};
pub use models::{CurrentUser, Identity, Role};
pub use user_store::UserStore;
