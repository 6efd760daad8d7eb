//! Cross-cutting HTTP middleware (request logging).

pub mod logging;

pub use logging::request_logging;
