//! Warden Agent - The agent abstraction for the Warden runtime.
//!
//! Provides:
//! - Core entity types: configs, decisions, actions, state
//! - The [`Agent`] trait (monitor → analyze → execute pipeline)
//! - [`AgentCore`], the shared state cell concrete agents embed
//! - The [`tools::Toolkit`] capability surface agents call out through
//! - Reference agent implementations under [`instances`]

#![warn(clippy::all)]

pub mod agent;
pub mod instances;
pub mod tools;
pub mod types;

pub use agent::{Agent, AgentCore};
pub use tools::{StubToolkit, ToolResult, Toolkit};
pub use types::{
    ActionStatus, AgentAction, AgentConfig, AgentDecision, AgentDomain, AgentState, AgentStatus,
    AutonomyTier, DailyMetrics, StateUpdate,
};
