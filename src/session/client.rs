//! Session Client
//! Mission: Explicit client-side session state machine with reconciled updates

use crate::auth::models::{CurrentUser, SigninRequest, SignupRequest};
use crate::session::storage::{SessionStorage, IDENTITY_KEY, TOKEN_KEY};
use crate::session::transport::{AuthTransport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// The client's derived view of authentication status.
///
/// `Loading` only exists between client start and the first `bootstrap()`
/// resolution; every other transition lands on `Anonymous` or
/// `Authenticated`.
#[derive(Debug, Clone)]
pub enum SessionState {
    Loading,
    Anonymous,
    Authenticated {
        identity: CurrentUser,
        token: String,
    },
}

/// User-facing session failures. `Superseded` means a later session event
/// (typically a logout) won the race and this call's result was discarded.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    EmailTaken(String),
    #[error("{0}")]
    Validation(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("{0}")]
    Rejected(String),
    #[error("superseded by a later session event")]
    Superseded,
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Rejected { status: 401, message } => {
                SessionError::InvalidCredentials(message)
            }
            TransportError::Rejected { status: 409, message } => SessionError::EmailTaken(message),
            TransportError::Rejected {
                status: 400 | 422,
                message,
            } => SessionError::Validation(message),
            TransportError::Rejected { message, .. } => SessionError::Rejected(message),
            TransportError::Network(message) => SessionError::Network(message),
        }
    }
}

/// What the UI router should do with a route, given the current session.
/// Advisory only: the server middleware is the enforcement boundary, these
/// checks just pick which view to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGuard {
    Public,
    RequiresAuth,
    RequiresAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    ShowSignIn,
    RedirectHome,
}

struct Inner {
    state: SessionState,
    last_error: Option<String>,
    // Bumped at the start of every session event. An in-flight call only
    // applies its result while its stamp is still current, which makes
    // overlapping calls resolve in initiation order.
    version: u64,
}

/// One `SessionClient` owns the session for the application lifetime.
///
/// All transport awaits happen outside the state lock; results are applied
/// under the lock after a version check.
pub struct SessionClient {
    transport: Arc<dyn AuthTransport>,
    storage: Arc<dyn SessionStorage>,
    inner: Mutex<Inner>,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn AuthTransport>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            transport,
            storage,
            inner: Mutex::new(Inner {
                state: SessionState::Loading,
                last_error: None,
                version: 0,
            }),
        }
    }

    fn begin(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.version += 1;
        inner.version
    }

    /// Resolve the initial `Loading` state: verify any stored token with a
    /// one-shot "who am I" call. Any failure - rejection or network - clears
    /// local storage and lands on `Anonymous`.
    pub async fn bootstrap(&self) {
        let stamp = self.begin();

        let Some(token) = self.storage.get(TOKEN_KEY) else {
            let mut inner = self.inner.lock();
            if inner.version == stamp {
                inner.state = SessionState::Anonymous;
            }
            return;
        };

        match self.transport.me(&token).await {
            Ok(identity) => {
                let mut inner = self.inner.lock();
                if inner.version != stamp {
                    return;
                }
                self.persist_identity(&identity);
                inner.state = SessionState::Authenticated { identity, token };
                inner.last_error = None;
            }
            Err(e) => {
                debug!("stored token failed verification, clearing: {}", e);
                let mut inner = self.inner.lock();
                if inner.version != stamp {
                    return;
                }
                self.storage.remove(TOKEN_KEY);
                self.storage.remove(IDENTITY_KEY);
                inner.state = SessionState::Anonymous;
            }
        }
    }

    /// Sign in. On success stores token + identity and transitions to
    /// `Authenticated`. On failure nothing is stored - not even partially -
    /// and the error is surfaced on the snapshot.
    pub async fn login(&self, credentials: SigninRequest) -> Result<CurrentUser, SessionError> {
        let stamp = self.begin();

        match self.transport.signin(&credentials).await {
            Ok(response) => self.apply_authenticated(stamp, response.token, response.user.into()),
            Err(e) => Err(self.apply_failure(stamp, e)),
        }
    }

    /// Create an account and sign in. Identical contract to `login`; a
    /// duplicate email surfaces as the distinguishable
    /// `SessionError::EmailTaken`.
    pub async fn signup(&self, registration: SignupRequest) -> Result<CurrentUser, SessionError> {
        let stamp = self.begin();

        match self.transport.signup(&registration).await {
            Ok(response) => self.apply_authenticated(stamp, response.token, response.user.into()),
            Err(e) => Err(self.apply_failure(stamp, e)),
        }
    }

    /// Sign out.
    ///
    /// Local cleanup happens first and unconditionally - the user is
    /// `Anonymous` the moment this is called, regardless of what the
    /// best-effort remote invalidation does. A remote failure is logged and
    /// swallowed.
    pub async fn logout(&self) {
        let token = {
            let mut inner = self.inner.lock();
            inner.version += 1;
            let token = match &inner.state {
                SessionState::Authenticated { token, .. } => Some(token.clone()),
                _ => self.storage.get(TOKEN_KEY),
            };
            inner.state = SessionState::Anonymous;
            inner.last_error = None;
            token
        };

        self.storage.remove(TOKEN_KEY);
        self.storage.remove(IDENTITY_KEY);

        if let Some(token) = token {
            if let Err(e) = self.transport.signout(&token).await {
                warn!("remote signout failed, local session already cleared: {}", e);
            }
        }
    }

    fn apply_authenticated(
        &self,
        stamp: u64,
        token: String,
        identity: CurrentUser,
    ) -> Result<CurrentUser, SessionError> {
        let mut inner = self.inner.lock();
        if inner.version != stamp {
            return Err(SessionError::Superseded);
        }

        self.storage.set(TOKEN_KEY, &token);
        self.persist_identity(&identity);

        inner.state = SessionState::Authenticated {
            identity: identity.clone(),
            token,
        };
        inner.last_error = None;

        Ok(identity)
    }

    fn apply_failure(&self, stamp: u64, e: TransportError) -> SessionError {
        let error = SessionError::from(e);

        let mut inner = self.inner.lock();
        if inner.version == stamp {
            // State is left where it was; only the error surfaces.
            inner.last_error = Some(error.to_string());
        }

        error
    }

    fn persist_identity(&self, identity: &CurrentUser) {
        match serde_json::to_string(identity) {
            Ok(json) => self.storage.set(IDENTITY_KEY, &json),
            Err(e) => warn!("failed to serialize identity for storage: {}", e),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn identity(&self) -> Option<CurrentUser> {
        match &self.inner.lock().state {
            SessionState::Authenticated { identity, .. } => Some(identity.clone()),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<String> {
        match &self.inner.lock().state {
            SessionState::Authenticated { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.inner.lock().state, SessionState::Authenticated { .. })
    }

    pub fn is_admin(&self) -> bool {
        self.identity().map(|i| i.is_admin()).unwrap_or(false)
    }

    /// Route gating for the UI router. `Loading` is treated like
    /// `Anonymous`: a protected route shows the sign-in view until the
    /// session resolves.
    pub fn route_decision(&self, guard: RouteGuard) -> RouteDecision {
        match guard {
            RouteGuard::Public => RouteDecision::Allow,
            RouteGuard::RequiresAuth => {
                if self.is_authenticated() {
                    RouteDecision::Allow
                } else {
                    RouteDecision::ShowSignIn
                }
            }
            RouteGuard::RequiresAdmin => match &self.inner.lock().state {
                SessionState::Authenticated { identity, .. } if identity.is_admin() => {
                    RouteDecision::Allow
                }
                SessionState::Authenticated { .. } => RouteDecision::RedirectHome,
                _ => RouteDecision::ShowSignIn,
            },
        }
    }
}

impl From<crate::auth::models::IdentityResponse> for CurrentUser {
    fn from(response: crate::auth::models::IdentityResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            email: response.email,
            role: response.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{IdentityResponse, Role, SessionResponse};
    use crate::session::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;
    use uuid::Uuid;

    fn test_identity(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
            role,
        }
    }

    fn session_response(identity: &CurrentUser, token: &str) -> SessionResponse {
        SessionResponse {
            token: token.to_string(),
            expires_in: 86400,
            user: IdentityResponse {
                id: identity.id,
                name: identity.name.clone(),
                email: identity.email.clone(),
                role: identity.role,
                created_at: "2025-01-01T00:00:00Z".to_string(),
            },
        }
    }

    fn network_error() -> TransportError {
        TransportError::Network("connection refused".to_string())
    }

    #[derive(Default)]
    struct MockTransport {
        signup_result: Option<Result<SessionResponse, TransportError>>,
        signin_result: Option<Result<SessionResponse, TransportError>>,
        signout_result: Option<Result<(), TransportError>>,
        me_result: Option<Result<CurrentUser, TransportError>>,
        signin_gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl AuthTransport for MockTransport {
        async fn signup(&self, _: &SignupRequest) -> Result<SessionResponse, TransportError> {
            self.signup_result.clone().expect("signup not configured")
        }

        async fn signin(&self, _: &SigninRequest) -> Result<SessionResponse, TransportError> {
            if let Some(gate) = &self.signin_gate {
                gate.notified().await;
            }
            self.signin_result.clone().expect("signin not configured")
        }

        async fn signout(&self, _: &str) -> Result<(), TransportError> {
            self.signout_result.clone().expect("signout not configured")
        }

        async fn me(&self, _: &str) -> Result<CurrentUser, TransportError> {
            self.me_result.clone().expect("me not configured")
        }
    }

    fn client_with(
        transport: MockTransport,
    ) -> (Arc<SessionClient>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let client = Arc::new(SessionClient::new(Arc::new(transport), storage.clone()));
        (client, storage)
    }

    fn credentials() -> SigninRequest {
        SigninRequest {
            email: "test@example.com".to_string(),
            password: "secret1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_starts_loading_then_bootstraps_anonymous_without_token() {
        let (client, _storage) = client_with(MockTransport::default());

        assert!(matches!(client.state(), SessionState::Loading));
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAuth),
            RouteDecision::ShowSignIn
        );

        client.bootstrap().await;
        assert!(matches!(client.state(), SessionState::Anonymous));
    }

    #[tokio::test]
    async fn test_bootstrap_with_valid_stored_token_authenticates() {
        let identity = test_identity(Role::User);
        let (client, storage) = client_with(MockTransport {
            me_result: Some(Ok(identity.clone())),
            ..Default::default()
        });
        storage.set(TOKEN_KEY, "stored-token");

        client.bootstrap().await;

        assert!(client.is_authenticated());
        assert_eq!(client.token().as_deref(), Some("stored-token"));
        assert_eq!(client.identity().unwrap().id, identity.id);
    }

    #[tokio::test]
    async fn test_bootstrap_with_dead_token_clears_storage() {
        let (client, storage) = client_with(MockTransport {
            me_result: Some(Err(TransportError::Rejected {
                status: 401,
                message: "authentication required".to_string(),
            })),
            ..Default::default()
        });
        storage.set(TOKEN_KEY, "expired-token");
        storage.set(IDENTITY_KEY, "{}");

        client.bootstrap().await;

        assert!(matches!(client.state(), SessionState::Anonymous));
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(IDENTITY_KEY).is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_network_failure_also_clears() {
        let (client, storage) = client_with(MockTransport {
            me_result: Some(Err(network_error())),
            ..Default::default()
        });
        storage.set(TOKEN_KEY, "some-token");

        client.bootstrap().await;

        assert!(matches!(client.state(), SessionState::Anonymous));
        assert!(storage.get(TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_login_success_stores_and_authenticates() {
        let identity = test_identity(Role::User);
        let (client, storage) = client_with(MockTransport {
            signin_result: Some(Ok(session_response(&identity, "fresh-token"))),
            ..Default::default()
        });
        client.bootstrap().await;

        let result = client.login(credentials()).await;
        assert!(result.is_ok());

        assert!(client.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).as_deref(), Some("fresh-token"));
        assert!(storage.get(IDENTITY_KEY).is_some());
        assert!(client.last_error().is_none());
    }

    #[tokio::test]
    async fn test_login_failure_stores_nothing_and_surfaces_error() {
        let (client, storage) = client_with(MockTransport {
            signin_result: Some(Err(TransportError::Rejected {
                status: 401,
                message: "invalid email or password".to_string(),
            })),
            ..Default::default()
        });
        client.bootstrap().await;

        let result = client.login(credentials()).await;
        assert!(matches!(result, Err(SessionError::InvalidCredentials(_))));

        assert!(matches!(client.state(), SessionState::Anonymous));
        assert!(storage.get(TOKEN_KEY).is_none());
        assert_eq!(
            client.last_error().as_deref(),
            Some("invalid email or password")
        );
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_is_distinguishable() {
        let (client, _storage) = client_with(MockTransport {
            signup_result: Some(Err(TransportError::Rejected {
                status: 409,
                message: "email already registered".to_string(),
            })),
            ..Default::default()
        });
        client.bootstrap().await;

        let result = client
            .signup(SignupRequest {
                name: "A".to_string(),
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await;

        assert!(matches!(result, Err(SessionError::EmailTaken(_))));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_remote_fails() {
        let identity = test_identity(Role::User);
        let (client, storage) = client_with(MockTransport {
            signin_result: Some(Ok(session_response(&identity, "t1"))),
            signout_result: Some(Err(network_error())),
            ..Default::default()
        });
        client.bootstrap().await;
        client.login(credentials()).await.unwrap();
        assert!(client.is_authenticated());

        client.logout().await;

        assert!(matches!(client.state(), SessionState::Anonymous));
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(IDENTITY_KEY).is_none());
    }

    #[tokio::test]
    async fn test_logout_during_inflight_login_forces_anonymous() {
        let identity = test_identity(Role::User);
        let gate = Arc::new(Notify::new());
        let (client, storage) = client_with(MockTransport {
            signin_result: Some(Ok(session_response(&identity, "t1"))),
            signout_result: Some(Ok(())),
            signin_gate: Some(gate.clone()),
            ..Default::default()
        });
        client.bootstrap().await;

        let login_client = client.clone();
        let login_task =
            tokio::spawn(async move { login_client.login(credentials()).await });

        // Let the login reach its transport call, then fire the logout.
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.logout().await;

        // Release the login; its result must be discarded.
        gate.notify_one();
        let result = login_task.await.unwrap();

        assert!(matches!(result, Err(SessionError::Superseded)));
        assert!(matches!(client.state(), SessionState::Anonymous));
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(storage.get(IDENTITY_KEY).is_none());
    }

    #[tokio::test]
    async fn test_route_gating_matrix() {
        let admin = test_identity(Role::Admin);
        let (client, _storage) = client_with(MockTransport {
            signin_result: Some(Ok(session_response(&admin, "t1"))),
            signout_result: Some(Ok(())),
            ..Default::default()
        });

        // Loading: protected routes show sign-in
        assert_eq!(client.route_decision(RouteGuard::Public), RouteDecision::Allow);
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAuth),
            RouteDecision::ShowSignIn
        );
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAdmin),
            RouteDecision::ShowSignIn
        );

        client.bootstrap().await;
        client.login(credentials()).await.unwrap();

        // Admin: everything allowed
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAuth),
            RouteDecision::Allow
        );
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAdmin),
            RouteDecision::Allow
        );
        assert!(client.is_admin());
    }

    #[tokio::test]
    async fn test_non_admin_redirected_from_admin_routes() {
        let user = test_identity(Role::User);
        let (client, _storage) = client_with(MockTransport {
            signin_result: Some(Ok(session_response(&user, "t1"))),
            ..Default::default()
        });
        client.bootstrap().await;
        client.login(credentials()).await.unwrap();

        assert_eq!(
            client.route_decision(RouteGuard::RequiresAuth),
            RouteDecision::Allow
        );
        assert_eq!(
            client.route_decision(RouteGuard::RequiresAdmin),
            RouteDecision::RedirectHome
        );
        assert!(!client.is_admin());
    }
}
