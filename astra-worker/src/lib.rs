//! # Astra Worker Library
//!
//! Background jobs that run beside the API server.
//!
//! ## Modules
//!
//! - `token_refresh`: Keeps Gmail access tokens fresh
//! - `campaigns`: Delivers scheduled marketing emails
//! - `scheduler`: Runs both on fixed periods until shutdown
//! - `config`: Environment configuration

pub mod campaigns;
pub mod config;
pub mod scheduler;
pub mod token_refresh;
