//! Shared action queue with approval transitions.
//!
//! All mutation goes through one internal mutex, so the scheduler, manual
//! triggers, and the drain cycle can race without lost updates. The drain
//! cycle must call [`ActionQueue::claim_approved`], which removes actions
//! before anyone executes them; filtering by status and executing in place
//! would double-execute under overlapping drains.
//!
//! Queue membership: actions enter `pending` (or pre-`approved` when
//! auto-approved) and leave on `rejected`, or when claimed for execution.
//! `completed` and `failed` actions never return to the queue.

use chrono::Utc;
use std::sync::Mutex;

use warden_agent::types::{ActionStatus, AgentAction};
use warden_common::{Error, Result};

/// In-memory action queue shared across the runtime.
#[derive(Default)]
pub struct ActionQueue {
    actions: Mutex<Vec<AgentAction>>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn push(&self, action: AgentAction) {
        self.actions.lock().expect("queue lock poisoned").push(action);
    }

    /// Approve a pending action: records approver and timestamp, returns the
    /// updated action.
    ///
    /// Fails with [`Error::ActionNotFound`] when absent and
    /// [`Error::InvalidActionState`] when not `pending`.
    pub fn approve(&self, action_id: &str, approved_by: &str) -> Result<AgentAction> {
        let mut actions = self.actions.lock().expect("queue lock poisoned");
        let action = actions
            .iter_mut()
            .find(|a| a.id == action_id)
            .ok_or_else(|| Error::ActionNotFound(action_id.to_string()))?;

        if action.status != ActionStatus::Pending {
            return Err(Error::InvalidActionState {
                id: action.id.clone(),
                status: action.status.to_string(),
            });
        }

        action.status = ActionStatus::Approved;
        action.approved_by = Some(approved_by.to_string());
        action.approved_at = Some(Utc::now());
        Ok(action.clone())
    }

    /// Reject a pending action: records the reason as the action's error,
    /// removes it from the queue, and returns the terminal action.
    pub fn reject(&self, action_id: &str, reason: &str) -> Result<AgentAction> {
        let mut actions = self.actions.lock().expect("queue lock poisoned");
        let idx = actions
            .iter()
            .position(|a| a.id == action_id)
            .ok_or_else(|| Error::ActionNotFound(action_id.to_string()))?;

        if actions[idx].status != ActionStatus::Pending {
            return Err(Error::InvalidActionState {
                id: actions[idx].id.clone(),
                status: actions[idx].status.to_string(),
            });
        }

        let mut action = actions.remove(idx);
        action.status = ActionStatus::Rejected;
        action.error = Some(reason.to_string());
        Ok(action)
    }

    /// Snapshot of all `pending` actions.
    pub fn pending(&self) -> Vec<AgentAction> {
        self.actions
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .filter(|a| a.status == ActionStatus::Pending)
            .cloned()
            .collect()
    }

    /// Atomically remove and return every `approved` action, claiming them
    /// for exclusive execution.
    pub fn claim_approved(&self) -> Vec<AgentAction> {
        let mut actions = self.actions.lock().expect("queue lock poisoned");
        let mut claimed = Vec::new();
        let mut i = 0;
        while i < actions.len() {
            if actions[i].status == ActionStatus::Approved {
                claimed.push(actions.remove(i));
            } else {
                i += 1;
            }
        }
        claimed
    }

    /// Look up an action still in the queue.
    pub fn get(&self, action_id: &str) -> Option<AgentAction> {
        self.actions
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .find(|a| a.id == action_id)
            .cloned()
    }

    /// Number of actions currently queued.
    pub fn len(&self) -> usize {
        self.actions.lock().expect("queue lock poisoned").len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
