//! # Astra Shared Library
//!
//! Types, persistence and business logic shared by the Astra API server,
//! the background worker and the integration tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their sqlx queries
//! - `auth`: JWT, password hashing, request auth context and authorization
//! - `db`: Connection pool and migrations
//! - `dashboard`: Bulk dashboard bundle and the in-memory aggregator
//! - `campaigns`: Marketing email delivery
//! - `integrations`: Third-party HTTP clients (email, generative AI, Google OAuth, Drive sync)
//! - `redis`: Redis client and the realtime change feed
//! - `deadline`: Deadline enforcement for long-running calls
//! - `debounce`: Trailing debounce for draft persistence

pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod db;
pub mod deadline;
pub mod debounce;
pub mod integrations;
pub mod models;
pub mod redis;

/// Current version of the Astra shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
