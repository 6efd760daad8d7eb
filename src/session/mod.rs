//! Session Client Module
//! Mission: Client-side session state machine, transport, and local storage

pub mod client;
pub mod storage;
pub mod transport;

pub use client::{RouteDecision, RouteGuard, SessionClient, SessionError, SessionState};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, IDENTITY_KEY, TOKEN_KEY};
pub use transport::{AuthTransport, HttpTransport, TransportError};
