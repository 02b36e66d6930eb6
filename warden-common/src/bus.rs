//! Event bus for agent lifecycle events.
//!
//! Decouples producers (the runtime, agents) from consumers (UI polling,
//! diagnostics, future webhooks) and retains a bounded, queryable history.
//!
//! Delivery semantics:
//!
//! - `publish` appends the event to the bounded log, evicting the oldest entry
//!   past capacity, then invokes every handler subscribed to the event's kind
//!   and every wildcard handler, in subscription order.
//! - A handler returning an error never stops delivery to later handlers and
//!   never propagates to the publisher; it is logged and dropped.
//! - `query` returns a snapshot, not a live view.
//!
//! Nothing survives a process restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Default number of events retained in the log.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Kind of an agent lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A monitoring cycle started, or an agent was registered.
    Monitoring,
    /// An agent's monitor stage produced a decision.
    Decision,
    /// An agent's analyze stage proposed an action.
    Action,
    /// An action was approved (by a human or the system approver).
    Approval,
    /// An approved action executed successfully.
    Completion,
    /// A cycle stage or an action execution failed.
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Monitoring => "monitoring",
            EventKind::Decision => "decision",
            EventKind::Action => "action",
            EventKind::Approval => "approval",
            EventKind::Completion => "completion",
            EventKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// An agent lifecycle event. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Unique event ID.
    pub id: String,
    /// Identifier of the agent the event belongs to.
    pub agent_id: String,
    /// Event kind.
    pub kind: EventKind,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
    /// JSON payload describing the transition.
    pub payload: serde_json::Value,
}

impl AgentEvent {
    /// Create a new event with auto-generated ID and timestamp.
    pub fn new(agent_id: impl Into<String>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// What a handler is subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// Events of one kind.
    Kind(EventKind),
    /// Every event, regardless of kind.
    All,
}

impl Subscription {
    fn matches(&self, kind: EventKind) -> bool {
        match self {
            Subscription::Kind(k) => *k == kind,
            Subscription::All => true,
        }
    }
}

/// Capability to deregister a handler. Returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Handler invoked synchronously on publish.
pub type EventHandler = Arc<dyn Fn(&AgentEvent) -> anyhow::Result<()> + Send + Sync>;

/// Filter for querying the event log. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events from this agent.
    pub agent_id: Option<String>,
    /// Only events of this kind.
    pub kind: Option<EventKind>,
    /// Only events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent N matches.
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Filter by agent identifier.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Filter by event kind.
    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Filter by timestamp lower bound.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Keep only the most recent N matches.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, event: &AgentEvent) -> bool {
        if let Some(ref agent_id) = self.agent_id {
            if &event.agent_id != agent_id {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        true
    }
}

struct Subscriber {
    id: u64,
    selector: Subscription,
    handler: EventHandler,
}

struct BusInner {
    log: VecDeque<AgentEvent>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
}

/// In-memory event bus with bounded history.
pub struct EventBus {
    inner: Mutex<BusInner>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus with the default log capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create a bus retaining at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BusInner {
                log: VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
                subscribers: Vec::new(),
                next_subscriber_id: 0,
            }),
            capacity: capacity.max(1),
        }
    }

    /// Publish an event: log it, then notify matching handlers in
    /// subscription order. Handler failures are logged and swallowed.
    pub fn publish(&self, event: AgentEvent) {
        let handlers: Vec<EventHandler> = {
            let mut inner = self.inner.lock().expect("bus lock poisoned");

            inner.log.push_back(event.clone());
            while inner.log.len() > self.capacity {
                inner.log.pop_front();
            }

            inner
                .subscribers
                .iter()
                .filter(|s| s.selector.matches(event.kind))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        tracing::debug!(
            agent_id = %event.agent_id,
            kind = %event.kind,
            id = %event.id,
            "Event published"
        );

        // Invoke outside the lock so handlers may query or publish.
        for handler in handlers {
            if let Err(e) = handler(&event) {
                tracing::warn!(
                    agent_id = %event.agent_id,
                    kind = %event.kind,
                    error = %e,
                    "Event handler failed"
                );
            }
        }
    }

    /// Register a handler for one kind or for every event.
    ///
    /// Returns a [`SubscriptionId`] usable with [`EventBus::unsubscribe`].
    /// Multiple handlers for the same kind are permitted and all are invoked.
    pub fn subscribe<F>(&self, selector: Subscription, handler: F) -> SubscriptionId
    where
        F: Fn(&AgentEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner.subscribers.push(Subscriber {
            id,
            selector,
            handler: Arc::new(handler),
        });
        SubscriptionId(id)
    }

    /// Deregister a handler. No-op if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.subscribers.retain(|s| s.id != id.0);
    }

    /// Snapshot of matching events, oldest first.
    pub fn query(&self, filter: &EventFilter) -> Vec<AgentEvent> {
        let inner = self.inner.lock().expect("bus lock poisoned");
        let mut events: Vec<AgentEvent> = inner
            .log
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            if events.len() > limit {
                events.drain(..events.len() - limit);
            }
        }

        events
    }

    /// Number of events currently retained.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("bus lock poisoned").log.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop log entries older than the cutoff.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) {
        let mut inner = self.inner.lock().expect("bus lock poisoned");
        inner.log.retain(|e| e.timestamp >= cutoff);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
