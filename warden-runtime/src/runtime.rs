//! The orchestrator: agent registry, per-agent schedules, the shared action
//! queue, and the drain cycle.
//!
//! Per-agent monitoring cycles are serialized through a per-agent mutex: a
//! manual trigger waits its turn, a scheduled tick that finds a cycle in
//! flight skips. Unregistering disarms future ticks but lets an in-flight
//! cycle finish; its state bookkeeping is tolerated.
//!
//! The bus and the config are injected; the runtime owns no global state.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};
use tokio::time::MissedTickBehavior;

use warden_agent::types::{
    ActionStatus, AgentAction, AgentConfig, AgentState, AgentStatus, AutonomyTier, StateUpdate,
};
use warden_agent::Agent;
use warden_common::{AgentEvent, Error, EventBus, EventKind, Result, RuntimeConfig};

use crate::queue::ActionQueue;
use crate::schedule::MonitorSchedule;

/// Config plus state snapshot, as exposed to the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub config: AgentConfig,
    pub state: AgentState,
}

#[derive(Default)]
struct ApprovalStats {
    approved: u64,
    rejected: u64,
}

/// State shared between the runtime handle, schedule loops, and the drain
/// loop.
struct Shared {
    config: RuntimeConfig,
    bus: Arc<EventBus>,
    queue: ActionQueue,
    approval_stats: Mutex<HashMap<String, ApprovalStats>>,
}

impl Shared {
    fn emit(&self, agent_id: &str, kind: EventKind, payload: serde_json::Value) {
        self.bus.publish(AgentEvent::new(agent_id, kind, payload));
    }

    /// Record an approve/reject outcome and refresh the owning agent's
    /// approval rate.
    fn record_approval_outcome(
        &self,
        agent: Option<&Arc<dyn Agent>>,
        agent_id: &str,
        approved: bool,
    ) {
        let rate = {
            let mut stats = self.approval_stats.lock().expect("stats lock poisoned");
            let entry = stats.entry(agent_id.to_string()).or_default();
            if approved {
                entry.approved += 1;
            } else {
                entry.rejected += 1;
            }
            entry.approved as f64 / (entry.approved + entry.rejected) as f64
        };

        if let Some(agent) = agent {
            agent.apply_update(StateUpdate::default().with_approval_rate(rate));
        }
    }
}

struct AgentEntry {
    agent: Arc<dyn Agent>,
    /// Serializes monitoring cycles for this agent.
    cycle_lock: Arc<AsyncMutex<()>>,
    /// Dropping the sender disarms the schedule loop.
    schedule_tx: Option<mpsc::Sender<()>>,
}

/// Autonomous-agent orchestrator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
    agents: Arc<RwLock<HashMap<String, AgentEntry>>>,
    drain_tx: Arc<AsyncMutex<Option<mpsc::Sender<()>>>>,
}

impl Runtime {
    /// Create a runtime over an injected event bus.
    pub fn new(bus: Arc<EventBus>, config: RuntimeConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                bus,
                queue: ActionQueue::new(),
                approval_stats: Mutex::new(HashMap::new()),
            }),
            agents: Arc::new(RwLock::new(HashMap::new())),
            drain_tx: Arc::new(AsyncMutex::new(None)),
        }
    }

    /// The event bus this runtime publishes to.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    /// Register an agent: initialize it, store it, and arm its schedule when
    /// it is enabled and the expression parses. An invalid expression is a
    /// warning, not a registration failure; the agent stays manual-only.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> Result<()> {
        let config = agent.config().clone();

        let mut agents = self.agents.write().await;
        if agents.contains_key(&config.id) {
            return Err(Error::DuplicateAgent(config.id));
        }

        agent.initialize().await?;

        let cycle_lock = Arc::new(AsyncMutex::new(()));
        let schedule_tx = if config.enabled && !config.schedule.trim().is_empty() {
            match MonitorSchedule::parse(&config.schedule) {
                Ok(schedule) => Some(self.arm_schedule(
                    &config.id,
                    schedule,
                    Arc::clone(&agent),
                    Arc::clone(&cycle_lock),
                )),
                Err(e) => {
                    tracing::warn!(
                        agent_id = %config.id,
                        error = %e,
                        "Invalid schedule; agent registered but will not run on a timer"
                    );
                    None
                }
            }
        } else {
            None
        };

        agents.insert(
            config.id.clone(),
            AgentEntry {
                agent,
                cycle_lock,
                schedule_tx,
            },
        );
        drop(agents);

        self.shared.emit(
            &config.id,
            EventKind::Monitoring,
            serde_json::json!({
                "message": format!(
                    "Agent {} registered and {}",
                    config.name,
                    if config.enabled { "enabled" } else { "disabled" }
                ),
            }),
        );
        tracing::info!(agent_id = %config.id, name = %config.name, "Agent registered");
        Ok(())
    }

    /// Disarm the schedule, shut the agent down, and remove it. No-op when
    /// absent. An in-flight cycle is not cancelled.
    pub async fn unregister_agent(&self, agent_id: &str) {
        let entry = self.agents.write().await.remove(agent_id);
        let Some(mut entry) = entry else {
            return;
        };

        entry.schedule_tx.take();
        if let Err(e) = entry.agent.shutdown().await {
            tracing::warn!(agent_id = %agent_id, error = %e, "Agent shutdown failed");
        }
        tracing::info!(agent_id = %agent_id, "Agent unregistered");
    }

    /// Run one monitoring cycle now, serialized against the agent's
    /// scheduled cycles.
    pub async fn trigger_monitoring(&self, agent_id: &str) -> Result<()> {
        let (agent, cycle_lock) = {
            let agents = self.agents.read().await;
            let entry = agents
                .get(agent_id)
                .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;
            (Arc::clone(&entry.agent), Arc::clone(&entry.cycle_lock))
        };

        let _guard = cycle_lock.lock().await;
        run_monitoring_cycle(&self.shared, &agent).await;
        Ok(())
    }

    /// Approve a pending action on behalf of `approved_by`.
    pub async fn approve_action(&self, action_id: &str, approved_by: &str) -> Result<AgentAction> {
        let action = self.shared.queue.approve(action_id, approved_by)?;

        let agent = {
            let agents = self.agents.read().await;
            agents.get(&action.agent_id).map(|e| Arc::clone(&e.agent))
        };
        self.shared
            .record_approval_outcome(agent.as_ref(), &action.agent_id, true);

        self.shared.emit(
            &action.agent_id,
            EventKind::Approval,
            serde_json::json!({
                "action_id": action.id,
                "approved_by": approved_by,
                "action_type": action.kind,
            }),
        );
        tracing::info!(action_id = %action.id, approved_by = %approved_by, "Action approved");
        Ok(action)
    }

    /// Reject a pending action, recording the reason as its error and
    /// removing it from the queue. Returns the terminal action.
    pub async fn reject_action(&self, action_id: &str, reason: &str) -> Result<AgentAction> {
        let action = self.shared.queue.reject(action_id, reason)?;

        let agent = {
            let agents = self.agents.read().await;
            agents.get(&action.agent_id).map(|e| Arc::clone(&e.agent))
        };
        self.shared
            .record_approval_outcome(agent.as_ref(), &action.agent_id, false);

        tracing::info!(action_id = %action.id, reason = %reason, "Action rejected");
        Ok(action)
    }

    /// Snapshot of all `pending` actions.
    pub fn pending_actions(&self) -> Vec<AgentAction> {
        self.shared.queue.pending()
    }

    /// Config plus state for every registered agent.
    pub async fn agents(&self) -> Vec<AgentInfo> {
        let agents = self.agents.read().await;
        agents
            .values()
            .map(|e| AgentInfo {
                config: e.agent.config().clone(),
                state: e.agent.state(),
            })
            .collect()
    }

    /// State snapshot for one agent.
    pub async fn agent_state(&self, agent_id: &str) -> Result<AgentState> {
        let agents = self.agents.read().await;
        agents
            .get(agent_id)
            .map(|e| e.agent.state())
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    /// Start the periodic drain loop. No-op when already started.
    pub async fn start(&self) {
        let mut drain_tx = self.drain_tx.lock().await;
        if drain_tx.is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::channel::<()>(1);
        *drain_tx = Some(tx);
        drop(drain_tx);

        let runtime = self.clone();
        let period = Duration::from_secs(self.shared.config.drain_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // interval fires immediately; skip tick zero
            loop {
                tokio::select! {
                    _ = rx.recv() => {
                        tracing::info!("Drain loop shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        runtime.drain_once().await;
                    }
                }
            }
        });
        tracing::info!(
            drain_interval_secs = self.shared.config.drain_interval_secs,
            "Runtime started"
        );
    }

    /// Stop the drain loop, disarm every schedule, shut down and remove all
    /// agents.
    pub async fn stop(&self) {
        self.drain_tx.lock().await.take();

        let entries: Vec<(String, AgentEntry)> = {
            let mut agents = self.agents.write().await;
            agents.drain().collect()
        };
        for (id, mut entry) in entries {
            entry.schedule_tx.take();
            if let Err(e) = entry.agent.shutdown().await {
                tracing::warn!(agent_id = %id, error = %e, "Agent shutdown failed");
            }
        }
        tracing::info!("Runtime stopped");
    }

    /// One drain pass: claim every approved action and execute each exactly
    /// once. Public so tests and embedders can drain deterministically.
    pub async fn drain_once(&self) {
        let claimed = self.shared.queue.claim_approved();
        if claimed.is_empty() {
            return;
        }
        tracing::debug!(count = claimed.len(), "Draining approved actions");

        for mut action in claimed {
            let agent = {
                let agents = self.agents.read().await;
                agents.get(&action.agent_id).map(|e| Arc::clone(&e.agent))
            };
            let Some(agent) = agent else {
                tracing::warn!(
                    action_id = %action.id,
                    agent_id = %action.agent_id,
                    "Owning agent no longer registered; dropping action"
                );
                continue;
            };

            agent.apply_update(
                StateUpdate::status(AgentStatus::Executing).with_last_action(action.clone()),
            );

            match agent.execute(&action).await {
                Ok(result) => {
                    action.status = ActionStatus::Completed;
                    action.executed_at = Some(Utc::now());
                    action.result = Some(result.clone());

                    agent.apply_update(
                        StateUpdate::status(AgentStatus::Idle)
                            .with_last_action(action.clone())
                            .record_success(),
                    );

                    self.shared.emit(
                        &action.agent_id,
                        EventKind::Completion,
                        serde_json::json!({
                            "action_id": action.id,
                            "action_type": action.kind,
                            "result": result,
                        }),
                    );
                    tracing::info!(action_id = %action.id, kind = %action.kind, "Action completed");
                }
                Err(e) => {
                    action.status = ActionStatus::Failed;
                    action.error = Some(e.to_string());

                    agent.apply_update(
                        StateUpdate::status(AgentStatus::Idle)
                            .with_last_action(action.clone())
                            .record_error(),
                    );

                    self.shared.emit(
                        &action.agent_id,
                        EventKind::Error,
                        serde_json::json!({
                            "action_id": action.id,
                            "error": e.to_string(),
                        }),
                    );
                    tracing::error!(action_id = %action.id, error = %e, "Action failed");
                }
            }
        }
    }

    /// Spawn the per-agent schedule loop. Scheduled ticks skip when a cycle
    /// is already in flight instead of queueing behind it.
    fn arm_schedule(
        &self,
        agent_id: &str,
        schedule: MonitorSchedule,
        agent: Arc<dyn Agent>,
        cycle_lock: Arc<AsyncMutex<()>>,
    ) -> mpsc::Sender<()> {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let shared = Arc::clone(&self.shared);
        let agent_id = agent_id.to_string();

        tracing::info!(
            agent_id = %agent_id,
            schedule = %schedule.expression(),
            "Monitoring schedule armed"
        );

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_after(now) else {
                    tracing::warn!(agent_id = %agent_id, "Schedule has no future occurrence; disarming");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();

                tokio::select! {
                    _ = rx.recv() => {
                        tracing::debug!(agent_id = %agent_id, "Schedule disarmed");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        match cycle_lock.try_lock() {
                            Ok(_guard) => run_monitoring_cycle(&shared, &agent).await,
                            Err(_) => {
                                tracing::debug!(agent_id = %agent_id, "Cycle already in flight, skipping tick");
                            }
                        }
                    }
                }
            }
        });

        tx
    }
}

/// One monitoring cycle: monitor → (decision) → analyze → (action, queued,
/// maybe auto-approved) → idle. Stage failures set status `error`, bump the
/// error counter, and publish an `error` event instead of propagating.
async fn run_monitoring_cycle(shared: &Shared, agent: &Arc<dyn Agent>) {
    let agent_id = agent.config().id.clone();

    agent.apply_update(StateUpdate::status(AgentStatus::Monitoring).with_last_run(Utc::now()));
    shared.emit(
        &agent_id,
        EventKind::Monitoring,
        serde_json::json!({ "message": "monitoring cycle started" }),
    );

    let decision = match agent.monitor().await {
        Ok(decision) => decision,
        Err(e) => {
            record_cycle_error(shared, agent, &e);
            return;
        }
    };
    let Some(decision) = decision else {
        agent.apply_update(StateUpdate::status(AgentStatus::Idle));
        return;
    };

    agent.apply_update(
        StateUpdate::status(AgentStatus::Analyzing).with_last_decision(decision.clone()),
    );
    shared.emit(
        &agent_id,
        EventKind::Decision,
        serde_json::json!({
            "decision": decision.trigger,
            "confidence": decision.confidence,
        }),
    );

    let action = match agent.analyze(&decision).await {
        Ok(action) => action,
        Err(e) => {
            record_cycle_error(shared, agent, &e);
            return;
        }
    };

    if let Some(mut action) = action {
        let auto_approve =
            action.autonomy == AutonomyTier::Execute && !action.requires_approval;
        if auto_approve {
            action.status = ActionStatus::Approved;
            action.approved_by = Some(shared.config.system_approver.clone());
            action.approved_at = Some(Utc::now());
        }

        shared.queue.push(action.clone());
        shared.emit(
            &agent_id,
            EventKind::Action,
            serde_json::json!({
                "action_id": action.id,
                "action_type": action.kind,
                "requires_approval": action.requires_approval,
            }),
        );

        if auto_approve {
            shared.record_approval_outcome(Some(agent), &agent_id, true);
            shared.emit(
                &agent_id,
                EventKind::Approval,
                serde_json::json!({
                    "action_id": action.id,
                    "approved_by": shared.config.system_approver,
                    "action_type": action.kind,
                }),
            );
        }
    }

    agent.apply_update(StateUpdate::status(AgentStatus::Idle));
}

fn record_cycle_error(shared: &Shared, agent: &Arc<dyn Agent>, error: &Error) {
    let agent_id = &agent.config().id;
    agent.apply_update(StateUpdate::status(AgentStatus::Error).record_error());
    shared.emit(
        agent_id,
        EventKind::Error,
        serde_json::json!({ "error": error.to_string() }),
    );
    tracing::error!(agent_id = %agent_id, error = %error, "Monitoring cycle failed");
}
