//! Shared progress of one transfer run
//!
//! Holds the cooperative stop flag and the outcome of every message. The
//! pipeline writes outcomes, status reporters read them concurrently.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{Result, TransferError};

/// Terminal outcome of one source message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MessageOutcome {
    Imported { remote_id: String },
    Failed { error: String },
}

impl MessageOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, MessageOutcome::Imported { .. })
    }
}

/// Counters published to status reporters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub imported: u64,
    pub failed: u64,
    pub finished: bool,
}

impl ProgressCounts {
    pub fn total(&self) -> u64 {
        self.imported + self.failed
    }
}

#[derive(Default)]
struct ProgressState {
    outcomes: HashMap<String, MessageOutcome>,
    /// Source IDs in the order their outcome was first recorded
    order: Vec<String>,
    counts: ProgressCounts,
    finished_at: Option<DateTime<Utc>>,
}

/// Progress tracker of one transfer run
pub struct Progress {
    started_at: DateTime<Utc>,
    stop: AtomicBool,
    state: RwLock<ProgressState>,
    updates: watch::Sender<ProgressCounts>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(ProgressCounts::default());
        Self {
            started_at: Utc::now(),
            stop: AtomicBool::new(false),
            state: RwLock::new(ProgressState::default()),
            updates,
        }
    }

    /// Request the run to stop.
    ///
    /// No new batch or message import is started afterwards; calls already
    /// issued are left to complete.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            info!("Transfer stop requested");
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Record the terminal outcome of one source message
    pub fn message_imported(&self, source_id: &str, result: Result<String>) {
        let outcome = match result {
            Ok(remote_id) => MessageOutcome::Imported { remote_id },
            Err(e) => {
                warn!(msg = %source_id, "Message import failed: {}", e);
                MessageOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let counts = {
            let mut state = self.write();
            match state.outcomes.insert(source_id.to_string(), outcome.clone()) {
                Some(previous) => {
                    warn!(msg = %source_id, "Outcome recorded twice, keeping the latest");
                    if previous.is_imported() {
                        state.counts.imported -= 1;
                    } else {
                        state.counts.failed -= 1;
                    }
                }
                None => state.order.push(source_id.to_string()),
            }
            if outcome.is_imported() {
                state.counts.imported += 1;
            } else {
                state.counts.failed += 1;
            }
            state.counts
        };

        self.updates.send_replace(counts);
    }

    /// Run one unit of work, surfacing its error or panic as a value.
    ///
    /// Keeps a single message from unwinding the loop that drives the rest
    /// of its batch.
    pub async fn call_wrap<F>(&self, work: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = TransferError::from_panic("importing message", payload);
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Mark the run as finished
    pub fn finish(&self) {
        let (counts, finished_at) = {
            let mut state = self.write();
            state.counts.finished = true;
            let finished_at = *state.finished_at.get_or_insert_with(Utc::now);
            (state.counts, finished_at)
        };
        info!(
            imported = counts.imported,
            failed = counts.failed,
            seconds = (finished_at - self.started_at).num_seconds(),
            "Transfer finished"
        );
        self.updates.send_replace(counts);
    }

    pub fn outcome(&self, source_id: &str) -> Option<MessageOutcome> {
        self.read().outcomes.get(source_id).cloned()
    }

    /// All outcomes in the order they were recorded
    pub fn outcomes(&self) -> Vec<(String, MessageOutcome)> {
        let state = self.read();
        state
            .order
            .iter()
            .filter_map(|id| state.outcomes.get(id).map(|o| (id.clone(), o.clone())))
            .collect()
    }

    /// Source IDs and errors of failed messages
    pub fn failed_messages(&self) -> Vec<(String, String)> {
        self.outcomes()
            .into_iter()
            .filter_map(|(id, outcome)| match outcome {
                MessageOutcome::Failed { error } => Some((id, error)),
                MessageOutcome::Imported { .. } => None,
            })
            .collect()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time of the first call to [`Progress::finish`]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.read().finished_at
    }

    pub fn counts(&self) -> ProgressCounts {
        self.read().counts
    }

    /// Receive counters whenever an outcome is recorded
    pub fn subscribe(&self) -> watch::Receiver<ProgressCounts> {
        self.updates.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, ProgressState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProgressState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
