use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Identifier of the margin pool an execution lock protects
///
/// All symbols traded from one account compete for the same margin, so the
/// lock is keyed by account rather than by symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The single account this process trades
    pub fn primary() -> Self {
        Self("primary".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutual-exclusion gate for executor runs on one account
///
/// Clones share the same gate. Waiters are served in FIFO order.
#[derive(Debug, Clone)]
pub struct ExecutionLock {
    account: AccountId,
    gate: Arc<Mutex<()>>,
    active: Arc<AtomicUsize>,
}

impl ExecutionLock {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            gate: Arc::new(Mutex::new(())),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Wait until every run queued ahead of this call has finished
    pub async fn wait_idle(&self) {
        drop(self.gate.lock().await);
    }

    /// Wait for the gate and hold it until the guard drops
    pub async fn acquire(&self) -> ExecutionGuard {
        let guard = self.gate.clone().lock_owned().await;
        self.active.fetch_add(1, Ordering::SeqCst);
        ExecutionGuard {
            _guard: guard,
            active: self.active.clone(),
        }
    }

    /// Number of runs currently holding the gate (0 or 1)
    pub fn active_runs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.active_runs() > 0
    }
}

impl Default for ExecutionLock {
    fn default() -> Self {
        Self::new(AccountId::primary())
    }
}

/// Held for the duration of one executor run
#[derive(Debug)]
pub struct ExecutionGuard {
    _guard: OwnedMutexGuard<()>,
    active: Arc<AtomicUsize>,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
