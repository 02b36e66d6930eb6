//! Core entity types for the agent decision pipeline.
//!
//! Every identifier is a UUID string; timestamps are UTC. Decisions and
//! actions are immutable from the agent's point of view once created; only
//! the runtime advances an action's status along its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Policy level governing whether an agent's proposed action may bypass
/// human approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutonomyTier {
    /// Surface findings only; never act.
    Notify,
    /// Propose actions; a human approves every one.
    Suggest,
    /// May act without approval when the action itself allows it.
    Execute,
}

impl fmt::Display for AutonomyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutonomyTier::Notify => "notify",
            AutonomyTier::Suggest => "suggest",
            AutonomyTier::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Where an agent currently is in its monitoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Waiting for the next trigger.
    Idle,
    /// Running the monitor stage.
    Monitoring,
    /// Running the analyze stage.
    Analyzing,
    /// An action of this agent is executing.
    Executing,
    /// The last cycle failed; cleared on the next trigger.
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Monitoring => "monitoring",
            AgentStatus::Analyzing => "analyzing",
            AgentStatus::Executing => "executing",
            AgentStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Status of an action in the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Awaiting approval.
    Pending,
    /// Cleared for execution.
    Approved,
    /// Declined by a human; terminal.
    Rejected,
    /// Executed successfully; terminal.
    Completed,
    /// Execution failed; terminal.
    Failed,
}

impl ActionStatus {
    /// Whether the action can never transition again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Approved => "approved",
            ActionStatus::Rejected => "rejected",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Domain an agent operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentDomain {
    Macro,
    Content,
    Portfolio,
    Regulatory,
    Health,
}

/// Immutable agent configuration, created once at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the agent does.
    pub description: String,
    /// Domain tag.
    pub domain: AgentDomain,
    /// Human-readable capability list.
    pub capabilities: Vec<String>,
    /// Autonomy tier inherited by every action the agent proposes.
    pub autonomy: AutonomyTier,
    /// Whether the runtime arms a schedule for this agent.
    pub enabled: bool,
    /// Cron expression driving periodic monitoring.
    pub schedule: String,
}

/// Output of an agent's monitor stage: why it believes action may be
/// warranted. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDecision {
    /// Unique decision identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Short label for what fired.
    pub trigger: String,
    /// Free-form reasoning text.
    pub reasoning: String,
    /// Confidence score in [0, 100].
    pub confidence: u8,
    /// Named data points that justified the decision.
    pub data_points: HashMap<String, serde_json::Value>,
}

/// A concrete, potentially side-effecting operation proposed by an agent's
/// analyze stage, subject to the approval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAction {
    /// Unique action identifier.
    pub id: String,
    /// Owning agent.
    pub agent_id: String,
    /// Decision that produced this action.
    pub decision_id: String,
    /// Type tag, e.g. "generate_video_content".
    pub kind: String,
    /// Human-readable description for the approval surface.
    pub description: String,
    /// Execution payload.
    pub payload: HashMap<String, serde_json::Value>,
    /// Autonomy tier inherited from the agent config.
    pub autonomy: AutonomyTier,
    /// Position in the approval workflow.
    pub status: ActionStatus,
    /// Whether a human must approve before execution.
    pub requires_approval: bool,
    /// Who approved the action, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// When the action was approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// When execution finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    /// Opaque execution result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Execution error or rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counters accumulated over the runtime's lifetime. No automatic midnight
/// reset; the embedding environment decides when to roll them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Decisions produced by the monitor stage.
    pub decisions_today: u64,
    /// Actions proposed by the analyze stage.
    pub actions_today: u64,
    /// Share of resolved approvals that were approved, in [0, 1].
    pub approval_rate: f64,
    /// Share of successful outcomes among all recorded successes and
    /// failures, in [0, 1].
    pub success_rate: f64,
}

/// Mutable agent state, owned by the agent and read by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Owning agent.
    pub agent_id: String,
    /// Current pipeline status.
    pub status: AgentStatus,
    /// When the last monitoring cycle started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// Most recent decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<AgentDecision>,
    /// Most recent action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<AgentAction>,
    /// Cumulative failed cycles and executions.
    pub error_count: u64,
    /// Cumulative successful executions.
    pub success_count: u64,
    /// Daily counters and rates.
    pub metrics: DailyMetrics,
}

impl AgentState {
    /// Fresh idle state for an agent.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: AgentStatus::Idle,
            last_run: None,
            last_decision: None,
            last_action: None,
            error_count: 0,
            success_count: 0,
            metrics: DailyMetrics::default(),
        }
    }

    /// Merge a partial update into this state, preserving unnamed fields.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(last_run) = update.last_run {
            self.last_run = Some(last_run);
        }
        if let Some(decision) = update.last_decision {
            self.last_decision = Some(decision);
        }
        if let Some(action) = update.last_action {
            self.last_action = Some(action);
        }
        if update.success_increment > 0 || update.error_increment > 0 {
            self.success_count += update.success_increment;
            self.error_count += update.error_increment;
            let resolved = self.success_count + self.error_count;
            self.metrics.success_rate = self.success_count as f64 / resolved as f64;
        }
        if let Some(rate) = update.approval_rate {
            self.metrics.approval_rate = rate;
        }
    }
}

/// Partial state update. Unset fields leave the current value untouched.
///
/// Counters are expressed as increments, never absolute values, so that
/// concurrent updates applied under the state lock cannot lose a bump.
/// The success rate is recomputed inside [`AgentState::apply`] whenever a
/// counter moves.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub status: Option<AgentStatus>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_decision: Option<AgentDecision>,
    pub last_action: Option<AgentAction>,
    pub success_increment: u64,
    pub error_increment: u64,
    pub approval_rate: Option<f64>,
}

impl StateUpdate {
    /// Update only the status.
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the last-run timestamp.
    pub fn with_last_run(mut self, at: DateTime<Utc>) -> Self {
        self.last_run = Some(at);
        self
    }

    /// Set the last decision.
    pub fn with_last_decision(mut self, decision: AgentDecision) -> Self {
        self.last_decision = Some(decision);
        self
    }

    /// Set the last action.
    pub fn with_last_action(mut self, action: AgentAction) -> Self {
        self.last_action = Some(action);
        self
    }

    /// Record one successful outcome.
    pub fn record_success(mut self) -> Self {
        self.success_increment += 1;
        self
    }

    /// Record one failed outcome.
    pub fn record_error(mut self) -> Self {
        self.error_increment += 1;
        self
    }

    /// Set the approval rate.
    pub fn with_approval_rate(mut self, rate: f64) -> Self {
        self.approval_rate = Some(rate);
        self
    }
}
