//! The agent capability trait and the shared state cell.
//!
//! A concrete agent implements the three-stage decision pipeline
//! (monitor, analyze, execute) plus lifecycle hooks. The runtime drives the
//! pipeline and never touches agent state except through
//! [`Agent::apply_update`].

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use warden_common::Result;

use crate::types::{
    ActionStatus, AgentAction, AgentConfig, AgentDecision, AgentState, StateUpdate,
};

/// An autonomous unit implementing the monitor → analyze → execute pipeline
/// for one domain.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The agent's immutable configuration.
    fn config(&self) -> &AgentConfig;

    /// Prepare agent-local resources. Called once, before the agent becomes
    /// schedulable. Safe to call again defensively.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Inspect external signals and return a decision only when
    /// action-worthy conditions are met. "No signal" is `Ok(None)`, never an
    /// error; errors are reserved for unexpected I/O failures.
    async fn monitor(&self) -> Result<Option<AgentDecision>>;

    /// Given a decision, either propose a concrete action or decline when
    /// confidence or policy thresholds are not met.
    async fn analyze(&self, decision: &AgentDecision) -> Result<Option<AgentAction>>;

    /// Perform the side-effecting work. The runtime guarantees this is
    /// invoked at most once per action.
    async fn execute(&self, action: &AgentAction) -> Result<serde_json::Value>;

    /// Release agent-local resources. Called at most once.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Immutable snapshot of the agent's state.
    fn state(&self) -> AgentState;

    /// Merge a partial update into the agent's state. The only mutation
    /// path available to the runtime.
    fn apply_update(&self, update: StateUpdate);
}

/// Shared plumbing for concrete agents: the config, a guarded state cell,
/// and constructors for decisions and actions that keep the daily counters
/// honest.
///
/// Concrete agents embed an `AgentCore` and delegate [`Agent::state`] and
/// [`Agent::apply_update`] to it.
pub struct AgentCore {
    config: AgentConfig,
    state: Mutex<AgentState>,
}

impl AgentCore {
    /// Create a core with fresh idle state.
    pub fn new(config: AgentConfig) -> Self {
        let state = AgentState::new(config.id.clone());
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// The agent's configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> AgentState {
        self.state.lock().expect("state lock poisoned").clone()
    }

    /// Merge a partial update into the state.
    pub fn apply(&self, update: StateUpdate) {
        self.state.lock().expect("state lock poisoned").apply(update);
    }

    /// Create a decision owned by this agent and bump `decisions_today`.
    pub fn new_decision(
        &self,
        trigger: impl Into<String>,
        reasoning: impl Into<String>,
        confidence: u8,
        data_points: HashMap<String, serde_json::Value>,
    ) -> AgentDecision {
        let decision = AgentDecision {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: self.config.id.clone(),
            timestamp: Utc::now(),
            trigger: trigger.into(),
            reasoning: reasoning.into(),
            confidence: confidence.min(100),
            data_points,
        };

        let mut state = self.state.lock().expect("state lock poisoned");
        state.metrics.decisions_today += 1;

        decision
    }

    /// Create a pending action derived from a decision and bump
    /// `actions_today`. The autonomy tier is inherited from the config.
    pub fn new_action(
        &self,
        decision: &AgentDecision,
        kind: impl Into<String>,
        description: impl Into<String>,
        payload: HashMap<String, serde_json::Value>,
        requires_approval: bool,
    ) -> AgentAction {
        let action = AgentAction {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: self.config.id.clone(),
            decision_id: decision.id.clone(),
            kind: kind.into(),
            description: description.into(),
            payload,
            autonomy: self.config.autonomy,
            status: ActionStatus::Pending,
            requires_approval,
            approved_by: None,
            approved_at: None,
            executed_at: None,
            result: None,
            error: None,
        };

        let mut state = self.state.lock().expect("state lock poisoned");
        state.metrics.actions_today += 1;

        action
    }
}
