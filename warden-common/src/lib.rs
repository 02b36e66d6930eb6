//! Warden Common - Shared foundation for the Warden agent runtime.
//!
//! This crate provides:
//! - The agent event bus with bounded, queryable history
//! - Error types and handling utilities
//! - Runtime configuration and loading
//! - Logging setup

#![warn(clippy::all)]

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;

pub use bus::{AgentEvent, EventBus, EventFilter, EventKind, Subscription, SubscriptionId};
pub use config::RuntimeConfig;
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::bus::{AgentEvent, EventBus, EventFilter, EventKind, Subscription};
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
}
