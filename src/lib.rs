//! Memory API: a small HTTP persistence service for conversational records.
//!
//! Clients save records (`/save_memory`, `/save_reflection`) and read them back
//! filtered and cursor-paginated (`/get_memory`, `/get_reflections`). Storage is
//! PostgreSQL when a usable `DATABASE_URL` is configured, otherwise an embedded
//! SQLite file; the choice is made once at startup.
//!
//! # Modules
//!
//! - [`config`]: TOML config plus environment overrides
//! - [`db`]: backend selection, SQL builder, SQLite and PostgreSQL stores
//! - [`memory`]: record types, sanitizers, slide id allocation, the store trait
//! - [`policy`]: API key auth, CORS, rate limiting
//! - [`routes`]: HTTP handlers
//! - [`server`]: router assembly and the serve loop

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod policy;
pub mod routes;
pub mod server;
