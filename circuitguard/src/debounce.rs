//! Debounced validation for live editing.
//!
//! Rapid edits to one circuit are coalesced into a single engine call. The
//! deadline is fixed by the first request for a key; later requests within
//! the window only replace the circuit data and join the waiter list, so a
//! user typing continuously still gets a result every window.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::circuit::CircuitRecord;
use crate::engine::{ValidationEngine, ValidationResult};
use crate::error::CircuitGuardError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Invoked once with the result when the debounced validation runs.
pub type ValidationCallback = Box<dyn FnOnce(&ValidationResult) + Send + 'static>;

struct PendingValidation {
    circuit: CircuitRecord,
    deadline: Instant,
    generation: u64,
    timer: JoinHandle<()>,
    waiters: Vec<oneshot::Sender<ValidationResult>>,
    callbacks: Vec<ValidationCallback>,
}

#[derive(Default)]
struct PendingTable {
    entries: HashMap<String, PendingValidation>,
    next_generation: u64,
}

pub struct ValidationDebouncer {
    engine: Arc<ValidationEngine>,
    delay: Duration,
    pending: Arc<Mutex<PendingTable>>,
}

impl ValidationDebouncer {
    pub fn new(engine: Arc<ValidationEngine>, delay: Duration) -> Self {
        Self {
            engine,
            delay,
            pending: Arc::new(Mutex::new(PendingTable::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn engine(&self) -> &Arc<ValidationEngine> {
        &self.engine
    }

    /// Schedule validation of `circuit` under `key`.
    ///
    /// Every call returns its own future; all futures for a key resolve with
    /// the one result computed from the latest data when the window closes.
    /// A cancelled request resolves to [`CircuitGuardError::Cancelled`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule_validation(
        &self,
        key: &str,
        circuit: CircuitRecord,
        callback: Option<ValidationCallback>,
    ) -> impl Future<Output = Result<ValidationResult, CircuitGuardError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        let mut table = lock(&self.pending);

        if let Some(pending) = table.entries.get_mut(key) {
            pending.circuit = circuit;
            pending.waiters.push(tx);
            pending.callbacks.extend(callback);
            debug!(
                "Coalesced validation for '{}' ({} waiter(s))",
                key,
                pending.waiters.len()
            );
        } else {
            let generation = table.next_generation;
            table.next_generation += 1;
            let deadline = Instant::now() + self.delay;
            let timer = tokio::spawn(fire(
                self.engine.clone(),
                self.pending.clone(),
                key.to_string(),
                generation,
                deadline,
            ));
            table.entries.insert(
                key.to_string(),
                PendingValidation {
                    circuit,
                    deadline,
                    generation,
                    timer,
                    waiters: vec![tx],
                    callbacks: callback.into_iter().collect(),
                },
            );
            debug!("Scheduled validation for '{}' in {:?}", key, self.delay);
        }

        let key = key.to_string();
        async move { rx.await.map_err(|_| CircuitGuardError::Cancelled { key }) }
    }

    /// Drop the pending request for `key`. Unknown keys are ignored.
    pub fn cancel_validation(&self, key: &str) -> bool {
        let removed = lock(&self.pending).entries.remove(key);
        match removed {
            Some(pending) => {
                pending.timer.abort();
                debug!("Cancelled validation for '{}'", key);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending key. Returns how many were pending.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingValidation> = lock(&self.pending)
            .entries
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        for pending in &drained {
            pending.timer.abort();
        }
        if !drained.is_empty() {
            debug!("Cancelled {} pending validation(s)", drained.len());
        }
        drained.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).entries.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).entries.len()
    }

    /// When the pending request for `key` will run.
    pub fn deadline(&self, key: &str) -> Option<Instant> {
        lock(&self.pending).entries.get(key).map(|p| p.deadline)
    }
}

impl Drop for ValidationDebouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn lock(pending: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn fire(
    engine: Arc<ValidationEngine>,
    pending: Arc<Mutex<PendingTable>>,
    key: String,
    generation: u64,
    deadline: Instant,
) {
    tokio::time::sleep_until(deadline).await;

    let entry = {
        let mut table = lock(&pending);
        let current = table.entries.get(&key).map(|p| p.generation);
        if current == Some(generation) {
            table.entries.remove(&key)
        } else {
            None
        }
    };
    // Cancelled or superseded while waking up.
    let Some(entry) = entry else {
        return;
    };

    let result = engine.validate_circuit(&key, &entry.circuit);
    debug!(
        "Debounced validation for '{}' resolved {} waiter(s)",
        key,
        entry.waiters.len()
    );

    for waiter in entry.waiters {
        if waiter.send(result.clone()).is_err() {
            warn!("Validation waiter for '{}' went away before the result", key);
        }
    }
    for callback in entry.callbacks {
        if panic::catch_unwind(AssertUnwindSafe(|| callback(&result))).is_err() {
            warn!("Validation callback for '{}' panicked", key);
        }
    }
}
