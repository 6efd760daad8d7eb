//! JWT Token Handler
//! Mission: Issue and verify bearer tokens securely

use crate::auth::models::Claims;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;
use uuid::Uuid;

/// Fixed validity window for issued tokens. There is no refresh or
/// revocation mechanism: once a token expires the client must sign in again.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// Token verification failures. All of them collapse to 401 at the HTTP
/// boundary, but the distinction matters for logs and tests.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not verify")]
    BadSignature,
    #[error("token is expired")]
    Expired,
}

/// JWT handler for token operations.
///
/// Verification is a pure function of (token, secret, current time) - it
/// performs no I/O and keeps no state besides the secret.
pub struct JwtHandler {
    secret: String,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Issue a token referencing one identity id.
    ///
    /// Returns the encoded token and its lifetime in seconds. Always
    /// succeeds for a valid identity id.
    pub fn generate_token(&self, identity_id: Uuid) -> anyhow::Result<(String, usize)> {
        let now = Utc::now();
        let issued_at = now.timestamp() as usize;
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(TOKEN_TTL_HOURS))
            .ok_or_else(|| anyhow::anyhow!("invalid expiry timestamp"))?
            .timestamp() as usize;

        let expires_in = (TOKEN_TTL_HOURS * 3600) as usize;

        let claims = Claims {
            sub: identity_id.to_string(),
            iat: issued_at,
            exp: expiration,
        };

        debug!("Issuing token for identity {}, ttl {}h", identity_id, TOKEN_TTL_HOURS);

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok((token, expires_in))
    }

    /// Verify a token and extract its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        // No expiry leeway: a token is valid strictly while now < exp.
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }
        })?;

        Ok(decoded.claims)
    }

    /// Verify a token and resolve the identity id it references.
    /// Fails on bad signature, malformed input, or expiry.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.validate_token(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)
    }
}
