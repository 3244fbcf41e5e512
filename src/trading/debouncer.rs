use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use super::types::SubmitStatus;
use crate::common::types::{Action, Signal};

/// Receives the collapsed action when a debounce window closes
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, symbol: String, action: Action);
}

/// Pick the effective action of a window: BUY, then SELL, then FLAT
pub fn resolve_action(actions: &BTreeSet<Action>) -> Option<Action> {
    // `Action`'s ordering is the priority order
    actions.first().copied()
}

struct DebouncerInner {
    window: Duration,
    /// Key presence marks an open window; the set is its pending buffer
    windows: DashMap<String, BTreeSet<Action>>,
    handler: Arc<dyn ActionHandler>,
    /// Flush tasks and the handler runs they start
    tasks: TaskTracker,
}

/// Collapses bursts of signals per symbol into a single action
///
/// Cloning yields another handle onto the same windows. Must be used from
/// within a tokio runtime since opening a window spawns its flush task.
#[derive(Clone)]
pub struct SignalDebouncer {
    inner: Arc<DebouncerInner>,
}

impl SignalDebouncer {
    pub fn new(window: Duration, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                window,
                windows: DashMap::new(),
                handler,
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    /// Add a signal to its symbol's window, opening one if none is open
    ///
    /// Returns immediately. Actions are assumed already validated.
    pub fn submit(&self, signal: Signal) -> SubmitStatus {
        let Signal { symbol, action, .. } = signal;

        let status = match self.inner.windows.entry(symbol.clone()) {
            Entry::Occupied(mut open) => {
                open.get_mut().insert(action);
                SubmitStatus::WindowJoined
            }
            Entry::Vacant(slot) => {
                slot.insert(BTreeSet::from([action]));
                SubmitStatus::WindowOpened
            }
        };

        match status {
            SubmitStatus::WindowOpened => {
                info!("Debounce window opened for {} ({})", symbol, action);
                self.inner
                    .tasks
                    .spawn(flush_after_window(self.inner.clone(), symbol));
            }
            SubmitStatus::WindowJoined => {
                debug!("{} joined open window for {}", action, symbol);
            }
        }

        status
    }

    /// Symbols with an open window
    pub fn active_windows(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .inner
            .windows
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Wait for every open window to flush and every run it started to end
    ///
    /// Windows are not cut short; each closes on its normal schedule.
    /// Call after the inbound side has stopped accepting signals.
    pub async fn shutdown(&self) {
        let open = self.active_windows();
        if !open.is_empty() || !self.inner.tasks.is_empty() {
            info!(
                "Waiting for {} pending task(s), open windows: {:?}",
                self.inner.tasks.len(),
                open
            );
        }
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
    }

    /// Actions buffered so far in a symbol's open window
    pub fn pending_actions(&self, symbol: &str) -> Option<BTreeSet<Action>> {
        self.inner.windows.get(symbol).map(|entry| entry.value().clone())
    }
}

async fn flush_after_window(inner: Arc<DebouncerInner>, symbol: String) {
    tokio::time::sleep(inner.window).await;

    // One removal closes the window and takes the buffer, so a signal
    // arriving from here on opens a fresh window.
    let actions = inner
        .windows
        .remove(&symbol)
        .map(|(_, actions)| actions)
        .unwrap_or_default();

    match resolve_action(&actions) {
        Some(action) => {
            info!(
                "Debounce window closed for {}: {:?} -> {}",
                symbol, actions, action
            );
            let handler = inner.handler.clone();
            inner.tasks.spawn(async move {
                handler.handle(symbol, action).await;
            });
        }
        None => {
            debug!("Debounce window closed for {} with nothing buffered", symbol);
        }
    }
}
