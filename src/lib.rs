//! Portfolio Backend Library
//!
//! Exposes the auth subsystem and session client for binaries and tests.

pub mod auth;
pub mod config;
pub mod middleware;
pub mod session;
