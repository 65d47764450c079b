//! Timer manager: named one-shot and recurring timers delivered as
//! [`Event::Timer`] onto component queues.

// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::message::Event;

/// Schedules timer events for components.
///
/// Cheap to clone; clones share the timer table. Each timer runs as its
/// own task and is cancelled by id or when the manager stops.
#[derive(Clone)]
pub struct TimerManager {
    timers: Arc<DashMap<String, CancellationToken>>,
    cancel: CancellationToken,
}

impl TimerManager {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            timers: Arc::new(DashMap::new()),
            cancel,
        }
    }

    /// Schedule a timer. A recurring timer fires every `interval` until
    /// cancelled; a one-shot timer fires once after `interval`.
    ///
    /// Re-using an id cancels the previous timer.
    pub fn add_timer(
        &self,
        id: impl Into<String>,
        interval: Duration,
        recurring: bool,
        payload: Value,
        target: mpsc::Sender<Event>,
    ) {
        let id = id.into();
        let token = self.cancel.child_token();
        if let Some(previous) = self.timers.insert(id.clone(), token.clone()) {
            previous.cancel();
        }

        let timers = Arc::clone(&self.timers);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let event = Event::Timer {
                    id: id.clone(),
                    payload: payload.clone(),
                };
                if target.send(event).await.is_err() {
                    warn!(timer = %id, "timer target queue closed; timer cancelled");
                    break;
                }
                if !recurring {
                    break;
                }
            }
            timers.remove(&id);
            debug!("timer task exited");
        });
    }

    /// Cancel a timer. Returns `false` when the id is unknown.
    pub fn cancel_timer(&self, id: &str) -> bool {
        match self.timers.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of scheduled timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_one_shot_timer_fires_once() {
        let manager = TimerManager::new(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(4);

        manager.add_timer("once", Duration::from_millis(10), false, json!(1), tx);

        match rx.recv().await.unwrap() {
            Event::Timer { id, payload } => {
                assert_eq!(id, "once");
                assert_eq!(payload, json!(1));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // No second firing
        let second = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_recurring_timer_fires_until_cancelled() {
        let manager = TimerManager::new(CancellationToken::new());
        let (tx, mut rx) = mpsc::channel(16);

        manager.add_timer("tick", Duration::from_millis(10), true, json!(null), tx);
        for _ in 0..3 {
            assert!(matches!(rx.recv().await.unwrap(), Event::Timer { .. }));
        }
        assert!(manager.cancel_timer("tick"));
        assert!(!manager.cancel_timer("tick"));
    }

    #[tokio::test]
    async fn test_manager_stop_cancels_all() {
        let cancel = CancellationToken::new();
        let manager = TimerManager::new(cancel.clone());
        let (tx, mut rx) = mpsc::channel(4);

        manager.add_timer("t", Duration::from_millis(5), true, json!(null), tx);
        assert!(rx.recv().await.is_some());

        cancel.cancel();
        // Drain anything in flight, then the channel goes quiet
        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx.try_recv().is_ok() {}
        let after = tokio::time::timeout(Duration::from_millis(30), rx.recv()).await;
        assert!(after.is_err() || after.unwrap().is_none());
    }
}
