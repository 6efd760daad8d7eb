//! Session transport
//! Mission: One async seam between the session client and the auth API

use crate::auth::models::{CurrentUser, SessionResponse, SigninRequest, SignupRequest};
use async_trait::async_trait;
use serde::Deserialize;

/// Transport failures, split so callers can tell a server rejection from a
/// network problem. Timeouts belong to the transport layer and surface here
/// as `Network`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
}

/// The calls the session client needs from the server. Implemented over
/// reqwest in production and by in-memory fakes in tests.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn signup(&self, request: &SignupRequest) -> Result<SessionResponse, TransportError>;
    async fn signin(&self, request: &SigninRequest) -> Result<SessionResponse, TransportError>;
    async fn signout(&self, token: &str) -> Result<(), TransportError>;
    async fn me(&self, token: &str) -> Result<CurrentUser, TransportError>;
}

/// HTTP implementation of the auth transport
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: CurrentUser,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Turn a non-2xx response into `Rejected`, keeping the server's message
    /// when the body carries one.
    async fn rejection(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message.unwrap_or_else(|| "request rejected".to_string()),
            Err(_) => "request rejected".to_string(),
        };
        TransportError::Rejected { status, message }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Network(e.to_string())
    }
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn signup(&self, request: &SignupRequest) -> Result<SessionResponse, TransportError> {
        let response = self
            .client
            .post(self.url("/api/auth/signup"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.json::<SessionResponse>().await?)
    }

    async fn signin(&self, request: &SigninRequest) -> Result<SessionResponse, TransportError> {
        let response = self
            .client
            .post(self.url("/api/auth/signin"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.json::<SessionResponse>().await?)
    }

    async fn signout(&self, token: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .get(self.url("/api/auth/signout"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    async fn me(&self, token: &str) -> Result<CurrentUser, TransportError> {
        let response = self
            .client
            .get(self.url("/api/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.json::<MeResponse>().await?.user)
    }
}
