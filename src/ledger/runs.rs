//! Serialization of matching runs per (user, period)

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::types::{Period, ResicoError, ResicoResult};

type RunKey = (String, Period);

/// Set of (user, period) scopes with a matching run in flight.
///
/// Clones share the same set, so every ledger handed a clone sees the same
/// in-flight runs.
#[derive(Debug, Clone, Default)]
pub struct MatchRunRegistry {
    active: Arc<Mutex<HashSet<RunKey>>>,
}

impl MatchRunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the scope, or fail with `RunInProgress` if another run holds it
    pub fn try_acquire(&self, user_id: &str, period: Period) -> ResicoResult<RunPermit> {
        let key = (user_id.to_string(), period);
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        if !active.insert(key.clone()) {
            return Err(ResicoError::RunInProgress {
                user_id: user_id.to_string(),
                period,
            });
        }

        Ok(RunPermit {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_running(&self, user_id: &str, period: Period) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(user_id.to_string(), period))
    }
}

/// Held for the duration of a run; releases the scope when dropped
#[derive(Debug)]
pub struct RunPermit {
    active: Arc<Mutex<HashSet<RunKey>>>,
    key: RunKey,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}
