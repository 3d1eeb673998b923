//! Status observation for analysis runs.
//!
//! The orchestrator reports three kinds of event to a [`StatusObserver`]:
//! state transitions, status text changes, and busy toggles. The status text
//! is what a submission surface shows the user ("Uploading the file...",
//! "Error converting PDF", ...).
//!
//! # Why an observer instead of a return value?
//!
//! Status changes while the run is still in flight. A terminal spinner, a
//! web socket or a test recorder all need the intermediate texts, not only
//! the final one. The trait is `Send + Sync` so one observer can be shared
//! by several analyzers.
//!
//! Three implementations ship with the crate:
//!
//! * [`NoopStatus`] drops every event.
//! * [`StatusLog`] records events in order; handy for tests and summaries.
//! * [`WatchStatus`] publishes the latest status on a `tokio::sync::watch`
//!   channel that UI code can consume as a `Stream`.

use crate::pipeline::state::PipelineState;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Receives events from a running pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait StatusObserver: Send + Sync {
    /// Called on every state transition, including the terminal one.
    fn on_state(&self, state: &PipelineState) {
        let _ = state;
    }

    /// Called whenever the user-visible status text changes.
    fn on_status(&self, text: &str) {
        let _ = text;
    }

    /// Called when the submission surface becomes busy or idle again.
    fn on_busy(&self, busy: bool) {
        let _ = busy;
    }
}

/// Drops every event.
pub struct NoopStatus;

impl StatusObserver for NoopStatus {}

/// One recorded observer event.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    State(PipelineState),
    Status(String),
    Busy(bool),
}

/// Records every event in arrival order.
#[derive(Debug, Default)]
pub struct StatusLog {
    events: Mutex<Vec<StatusEvent>>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.lock().clone()
    }

    /// Status texts only, in order.
    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::Status(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// States only, in order.
    pub fn states(&self) -> Vec<PipelineState> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                StatusEvent::State(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: StatusEvent) {
        self.lock().push(event);
    }

    // A poisoned log still holds valid events.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StatusEvent>> {
        self.events.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StatusObserver for StatusLog {
    fn on_state(&self, state: &PipelineState) {
        self.push(StatusEvent::State(state.clone()));
    }

    fn on_status(&self, text: &str) {
        self.push(StatusEvent::Status(text.to_string()));
    }

    fn on_busy(&self, busy: bool) {
        self.push(StatusEvent::Busy(busy));
    }
}

/// Snapshot published by [`WatchStatus`].
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: PipelineState,
    pub status: String,
    pub busy: bool,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            status: String::new(),
            busy: false,
        }
    }
}

/// Publishes the latest [`StatusSnapshot`] on a watch channel.
///
/// Receivers only see the most recent value; intermediate updates may be
/// skipped by slow consumers.
pub struct WatchStatus {
    tx: watch::Sender<StatusSnapshot>,
}

impl WatchStatus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    pub fn current(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// A stream yielding the current snapshot and then every change.
    pub fn subscribe(&self) -> WatchStream<StatusSnapshot> {
        WatchStream::new(self.tx.subscribe())
    }
}

impl Default for WatchStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusObserver for WatchStatus {
    fn on_state(&self, state: &PipelineState) {
        self.tx.send_modify(|s| s.state = state.clone());
    }

    fn on_status(&self, text: &str) {
        self.tx.send_modify(|s| s.status = text.to_string());
    }

    fn on_busy(&self, busy: bool) {
        self.tx.send_modify(|s| s.busy = busy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_stream::StreamExt;

    #[test]
    fn noop_does_not_panic() {
        let obs = NoopStatus;
        obs.on_state(&PipelineState::Uploading);
        obs.on_status("Uploading the file...");
        obs.on_busy(true);
    }

    #[test]
    fn log_records_in_order() {
        let log = StatusLog::new();
        log.on_busy(true);
        log.on_state(&PipelineState::Uploading);
        log.on_status("Uploading the file...");
        log.on_busy(false);

        assert_eq!(
            log.events(),
            vec![
                StatusEvent::Busy(true),
                StatusEvent::State(PipelineState::Uploading),
                StatusEvent::Status("Uploading the file...".into()),
                StatusEvent::Busy(false),
            ]
        );
        assert_eq!(log.statuses(), vec!["Uploading the file...".to_string()]);
        assert_eq!(log.states(), vec![PipelineState::Uploading]);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Arc<dyn StatusObserver> = Arc::new(StatusLog::new());
        obs.on_status("Analyzing...");
    }

    #[tokio::test]
    async fn watch_publishes_latest_snapshot() {
        let watch = WatchStatus::new();
        let mut stream = watch.subscribe();

        let first = stream.next().await.unwrap();
        assert_eq!(first, StatusSnapshot::default());

        watch.on_busy(true);
        watch.on_state(&PipelineState::Analyzing);
        watch.on_status("Analyzing...");

        let latest = stream.next().await.unwrap();
        assert_eq!(latest.status, "Analyzing...");
        assert_eq!(latest.state, PipelineState::Analyzing);
        assert!(latest.busy);
        assert_eq!(watch.current(), latest);
    }
}
