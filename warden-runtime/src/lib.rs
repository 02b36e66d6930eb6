//! Warden Runtime - Autonomous-agent orchestration.
//!
//! Drives the monitor → analyze → execute pipeline for every registered
//! agent:
//! - Registry with per-agent cron schedules
//! - Shared action queue with a human-approval gate
//! - Periodic drain cycle executing approved actions at most once each
//! - Lifecycle events published to the shared bus at every transition
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_common::{EventBus, RuntimeConfig};
//! use warden_runtime::Runtime;
//!
//! let config = RuntimeConfig::default();
//! let bus = Arc::new(EventBus::with_capacity(config.event_log_capacity));
//! let runtime = Runtime::new(bus, config);
//!
//! runtime.register_agent(my_agent).await?;
//! runtime.start().await;
//! ```

#![warn(clippy::all)]

pub mod queue;
pub mod runtime;
pub mod schedule;

pub use queue::ActionQueue;
pub use runtime::{AgentInfo, Runtime};
pub use schedule::MonitorSchedule;
