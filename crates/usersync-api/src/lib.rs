//! Usersync HTTP API.
//!
//! Receives identity-provider webhook deliveries, verifies their
//! signatures, and mirrors user lifecycle events into the user store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod handlers;
pub mod monitor;
pub mod server;

pub use config::Config;
pub use crypto::{VerifyError, WebhookVerifier};
pub use monitor::Monitor;
pub use server::{create_router, start_server, AppState};
