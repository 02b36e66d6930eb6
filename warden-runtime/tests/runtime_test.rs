//! Integration tests for the Warden runtime.
//!
//! Exercises the monitoring cycle, the approval workflow, and the drain
//! cycle end to end with scripted agents.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use warden_agent::types::{
    ActionStatus, AgentAction, AgentConfig, AgentDecision, AgentDomain, AgentState, AgentStatus,
    AutonomyTier, StateUpdate,
};
use warden_agent::{Agent, AgentCore};
use warden_common::{Error, EventBus, EventFilter, EventKind, Result, RuntimeConfig};
use warden_runtime::Runtime;

#[derive(Clone, Copy)]
enum MonitorScript {
    NoSignal,
    Decide(u8),
    Fail,
}

#[derive(Clone, Copy)]
enum AnalyzeScript {
    Propose { requires_approval: bool },
    Decline,
}

#[derive(Clone, Copy)]
enum ExecuteScript {
    Succeed,
    Fail,
}

/// Agent whose pipeline stages follow a fixed script.
struct ScriptedAgent {
    core: AgentCore,
    monitor: MonitorScript,
    analyze: AnalyzeScript,
    execute: ExecuteScript,
    executions: AtomicUsize,
    shutdown_called: AtomicBool,
}

impl ScriptedAgent {
    fn new(
        config: AgentConfig,
        monitor: MonitorScript,
        analyze: AnalyzeScript,
        execute: ExecuteScript,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: AgentCore::new(config),
            monitor,
            analyze,
            execute,
            executions: AtomicUsize::new(0),
            shutdown_called: AtomicBool::new(false),
        })
    }

    fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn config(&self) -> &AgentConfig {
        self.core.config()
    }

    async fn monitor(&self) -> Result<Option<AgentDecision>> {
        match self.monitor {
            MonitorScript::NoSignal => Ok(None),
            MonitorScript::Fail => Err(Error::Tool("feed unavailable".into())),
            MonitorScript::Decide(confidence) => Ok(Some(self.core.new_decision(
                "signal detected",
                "scripted reasoning",
                confidence,
                HashMap::new(),
            ))),
        }
    }

    async fn analyze(&self, decision: &AgentDecision) -> Result<Option<AgentAction>> {
        match self.analyze {
            AnalyzeScript::Decline => Ok(None),
            AnalyzeScript::Propose { requires_approval } => Ok(Some(self.core.new_action(
                decision,
                "notify",
                "send a note",
                HashMap::new(),
                requires_approval,
            ))),
        }
    }

    async fn execute(&self, _action: &AgentAction) -> Result<serde_json::Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        match self.execute {
            ExecuteScript::Succeed => Ok(serde_json::json!({ "ok": true })),
            ExecuteScript::Fail => Err(Error::Execution("downstream exploded".into())),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.shutdown_called.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> AgentState {
        self.core.snapshot()
    }

    fn apply_update(&self, update: StateUpdate) {
        self.core.apply(update);
    }
}

fn config(id: &str, autonomy: AutonomyTier) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        name: format!("Agent {id}"),
        description: "scripted test agent".to_string(),
        domain: AgentDomain::Portfolio,
        capabilities: vec![],
        autonomy,
        // Manual triggers only; schedules are exercised separately.
        enabled: false,
        schedule: "*/5 * * * *".to_string(),
    }
}

fn runtime() -> Runtime {
    Runtime::new(Arc::new(EventBus::new()), RuntimeConfig::default())
}

fn event_kinds(bus: &EventBus, agent_id: &str) -> Vec<EventKind> {
    bus.query(&EventFilter::default().with_agent(agent_id))
        .into_iter()
        .map(|e| e.kind)
        .collect()
}

#[tokio::test]
async fn test_pending_action_and_counters_after_manual_trigger() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("suggester", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();

    rt.trigger_monitoring("suggester").await.unwrap();

    let pending = rt.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, ActionStatus::Pending);
    assert_eq!(pending[0].agent_id, "suggester");

    let state = rt.agent_state("suggester").await.unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
    assert_eq!(state.metrics.decisions_today, 1);
    assert_eq!(state.metrics.actions_today, 1);
    assert!(state.last_run.is_some());
    assert!(state.last_decision.is_some());
}

#[tokio::test]
async fn test_no_signal_cycle_returns_to_idle() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("quiet", AutonomyTier::Notify),
        MonitorScript::NoSignal,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();

    rt.trigger_monitoring("quiet").await.unwrap();

    let state = rt.agent_state("quiet").await.unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
    assert!(rt.pending_actions().is_empty());
    assert_eq!(state.metrics.decisions_today, 0);
}

#[tokio::test]
async fn test_declined_analysis_returns_to_idle_without_action() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("cautious", AutonomyTier::Suggest),
        MonitorScript::Decide(40),
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();

    rt.trigger_monitoring("cautious").await.unwrap();

    let state = rt.agent_state("cautious").await.unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
    assert_eq!(state.metrics.decisions_today, 1);
    assert_eq!(state.metrics.actions_today, 0);
    assert!(rt.pending_actions().is_empty());
}

#[tokio::test]
async fn test_auto_approval_attributed_to_system() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("autonomous", AutonomyTier::Execute),
        MonitorScript::Decide(90),
        AnalyzeScript::Propose {
            requires_approval: false,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();

    rt.trigger_monitoring("autonomous").await.unwrap();

    // Approved immediately: never observable as pending.
    assert!(rt.pending_actions().is_empty());

    rt.drain_once().await;
    assert_eq!(agent.executions(), 1);

    let completion = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Completion));
    assert_eq!(completion.len(), 1);

    let approvals = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Approval));
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].payload["approved_by"], "system");
}

#[tokio::test]
async fn test_suggest_tier_action_is_not_auto_approved() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("suggester", AutonomyTier::Suggest),
        MonitorScript::Decide(90),
        AnalyzeScript::Propose {
            requires_approval: false,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();

    rt.trigger_monitoring("suggester").await.unwrap();

    // Tier gates auto-approval even when the action itself would allow it.
    assert_eq!(rt.pending_actions().len(), 1);
    rt.drain_once().await;
    assert_eq!(agent.executions(), 0);
}

#[tokio::test]
async fn test_approve_then_drain_completes_action() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("worker", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();
    rt.trigger_monitoring("worker").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    let approved = rt.approve_action(&action_id, "alice").await.unwrap();
    assert_eq!(approved.status, ActionStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("alice"));

    rt.drain_once().await;

    assert_eq!(agent.executions(), 1);
    let state = rt.agent_state("worker").await.unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
    assert_eq!(state.success_count, 1);
    assert_eq!(state.metrics.success_rate, 1.0);
    assert_eq!(state.metrics.approval_rate, 1.0);

    let last_action = state.last_action.unwrap();
    assert_eq!(last_action.status, ActionStatus::Completed);
    assert!(last_action.executed_at.is_some());
    assert_eq!(last_action.result.unwrap()["ok"], true);
}

#[tokio::test]
async fn test_at_most_once_execution_across_repeated_drains() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("worker", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();
    rt.trigger_monitoring("worker").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    rt.approve_action(&action_id, "alice").await.unwrap();

    rt.drain_once().await;
    rt.drain_once().await;
    rt.drain_once().await;

    assert_eq!(agent.executions(), 1);
    let completions = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Completion));
    assert_eq!(completions.len(), 1);
}

#[tokio::test]
async fn test_reject_records_reason_and_clears_pending() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("worker", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();
    rt.trigger_monitoring("worker").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    let rejected = rt.reject_action(&action_id, "not relevant").await.unwrap();

    assert_eq!(rejected.status, ActionStatus::Rejected);
    assert_eq!(rejected.error.as_deref(), Some("not relevant"));
    assert!(rt.pending_actions().is_empty());

    // Rejected means gone for good: drain executes nothing.
    rt.drain_once().await;
    assert_eq!(agent.executions(), 0);
}

#[tokio::test]
async fn test_failed_execution_marks_failed_without_completion_event() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("fragile", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Fail,
    );
    rt.register_agent(agent.clone()).await.unwrap();
    rt.trigger_monitoring("fragile").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    rt.approve_action(&action_id, "alice").await.unwrap();

    let errors_before = rt.agent_state("fragile").await.unwrap().error_count;
    rt.drain_once().await;

    let state = rt.agent_state("fragile").await.unwrap();
    assert_eq!(state.error_count, errors_before + 1);
    assert_eq!(state.status, AgentStatus::Idle);

    let last_action = state.last_action.unwrap();
    assert_eq!(last_action.status, ActionStatus::Failed);
    assert!(last_action.error.unwrap().contains("downstream exploded"));

    let completions = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Completion));
    assert!(completions.is_empty());
    let errors = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Error));
    assert_eq!(errors.len(), 1);

    // Terminal: never re-queued.
    rt.drain_once().await;
    assert_eq!(agent.executions(), 1);
}

#[tokio::test]
async fn test_approve_unknown_action_fails_and_queue_unchanged() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("worker", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();
    rt.trigger_monitoring("worker").await.unwrap();

    let err = rt.approve_action("no-such-action", "alice").await.unwrap_err();
    assert!(matches!(err, Error::ActionNotFound(_)));
    assert_eq!(rt.pending_actions().len(), 1);
}

#[tokio::test]
async fn test_approve_non_pending_action_is_an_error() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("worker", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();
    rt.trigger_monitoring("worker").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    rt.approve_action(&action_id, "alice").await.unwrap();

    let err = rt.approve_action(&action_id, "bob").await.unwrap_err();
    assert!(matches!(err, Error::InvalidActionState { .. }));
}

#[tokio::test]
async fn test_event_ordering_for_one_cycle() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("autonomous", AutonomyTier::Execute),
        MonitorScript::Decide(90),
        AnalyzeScript::Propose {
            requires_approval: false,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();
    rt.trigger_monitoring("autonomous").await.unwrap();
    rt.drain_once().await;

    // Registration emits the first monitoring event; the cycle follows.
    let kinds = event_kinds(rt.bus(), "autonomous");
    assert_eq!(
        kinds,
        vec![
            EventKind::Monitoring,
            EventKind::Monitoring,
            EventKind::Decision,
            EventKind::Action,
            EventKind::Approval,
            EventKind::Completion,
        ]
    );
}

#[tokio::test]
async fn test_monitor_failure_sets_error_and_is_not_sticky() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("flaky", AutonomyTier::Notify),
        MonitorScript::Fail,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();

    rt.trigger_monitoring("flaky").await.unwrap();
    let state = rt.agent_state("flaky").await.unwrap();
    assert_eq!(state.status, AgentStatus::Error);
    assert_eq!(state.error_count, 1);

    let errors = rt
        .bus()
        .query(&EventFilter::default().with_kind(EventKind::Error));
    assert_eq!(errors.len(), 1);

    // The next trigger runs a full cycle again rather than refusing.
    rt.trigger_monitoring("flaky").await.unwrap();
    let state = rt.agent_state("flaky").await.unwrap();
    assert_eq!(state.status, AgentStatus::Error);
    assert_eq!(state.error_count, 2);
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let rt = runtime();
    let first = ScriptedAgent::new(
        config("dup", AutonomyTier::Notify),
        MonitorScript::NoSignal,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );
    let second = ScriptedAgent::new(
        config("dup", AutonomyTier::Notify),
        MonitorScript::NoSignal,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );

    rt.register_agent(first).await.unwrap();
    let err = rt.register_agent(second).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateAgent(_)));
    assert_eq!(rt.agents().await.len(), 1);
}

#[tokio::test]
async fn test_trigger_unknown_agent_fails() {
    let rt = runtime();
    let err = rt.trigger_monitoring("ghost").await.unwrap_err();
    assert!(matches!(err, Error::AgentNotFound(_)));
}

#[tokio::test]
async fn test_invalid_schedule_registers_but_stays_manual() {
    let rt = runtime();
    let mut cfg = config("lopsided", AutonomyTier::Notify);
    cfg.enabled = true;
    cfg.schedule = "every full moon".to_string();
    let agent = ScriptedAgent::new(
        cfg,
        MonitorScript::NoSignal,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );

    rt.register_agent(agent).await.unwrap();

    // Still reachable through the control surface.
    rt.trigger_monitoring("lopsided").await.unwrap();
    let state = rt.agent_state("lopsided").await.unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
}

#[tokio::test]
async fn test_unregister_shuts_down_and_is_noop_when_absent() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("leaver", AutonomyTier::Notify),
        MonitorScript::NoSignal,
        AnalyzeScript::Decline,
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();

    rt.unregister_agent("leaver").await;
    assert!(agent.shutdown_called.load(Ordering::SeqCst));
    assert!(matches!(
        rt.agent_state("leaver").await.unwrap_err(),
        Error::AgentNotFound(_)
    ));

    // No-op when already gone
    rt.unregister_agent("leaver").await;
}

#[tokio::test]
async fn test_drain_drops_actions_of_unregistered_agents() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("leaver", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent.clone()).await.unwrap();
    rt.trigger_monitoring("leaver").await.unwrap();

    let action_id = rt.pending_actions()[0].id.clone();
    rt.approve_action(&action_id, "alice").await.unwrap();
    rt.unregister_agent("leaver").await;

    rt.drain_once().await;
    assert_eq!(agent.executions(), 0);
    assert!(rt.pending_actions().is_empty());
}

#[tokio::test]
async fn test_approval_rate_reflects_rejections() {
    let rt = runtime();
    let agent = ScriptedAgent::new(
        config("mixed", AutonomyTier::Suggest),
        MonitorScript::Decide(80),
        AnalyzeScript::Propose {
            requires_approval: true,
        },
        ExecuteScript::Succeed,
    );
    rt.register_agent(agent).await.unwrap();

    rt.trigger_monitoring("mixed").await.unwrap();
    let first = rt.pending_actions()[0].id.clone();
    rt.approve_action(&first, "alice").await.unwrap();

    rt.trigger_monitoring("mixed").await.unwrap();
    let second = rt.pending_actions()[0].id.clone();
    rt.reject_action(&second, "too risky").await.unwrap();

    let state = rt.agent_state("mixed").await.unwrap();
    assert_eq!(state.metrics.approval_rate, 0.5);
}
