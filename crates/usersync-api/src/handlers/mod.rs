//! HTTP request handlers for the usersync API.
//!
//! Handlers follow a consistent pattern: verify and validate input,
//! trace the outcome, and convert every failure into a structured
//! response at the handler boundary so nothing propagates as an
//! unhandled fault.

pub mod health;
pub mod webhooks;

pub use health::{health_check, liveness_check, readiness_check};
pub use webhooks::handle_webhook;
