//! Request policies that run before any handler: API key auth, origin
//! allow-list, and per-client rate limiting. None of them touch storage.

pub mod auth;
pub mod cors;
pub mod rate_limit;
