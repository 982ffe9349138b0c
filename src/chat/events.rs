// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session notifications and their fan-out

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::chat::state::SessionSnapshot;
use crate::llm::message::Message;

/// A notification delivered to session subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// General state change
    Update(SessionSnapshot),
    /// The in-progress reply grew; carries its full text so far
    Stream { text: String },
    /// A submission failed for good, or a transcript failed to load
    Error { message: String },
    /// The assistant reply was finalized
    Finish { message: Message },
    /// The active submission was cancelled
    Abort,
    /// A failed attempt will be retried after `delay`
    Retry { attempt: u32, delay: Duration },
}

impl SessionEvent {
    /// Notification name
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Update(_) => "update",
            SessionEvent::Stream { .. } => "stream",
            SessionEvent::Error { .. } => "error",
            SessionEvent::Finish { .. } => "finish",
            SessionEvent::Abort => "abort",
            SessionEvent::Retry { .. } => "retry",
        }
    }
}

/// Publish/subscribe list of event channels.
///
/// Subscribers whose receiver was dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<SessionEvent>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Event bus lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Attach a new subscriber; it sees events published from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, in subscription order
    pub fn publish(&self, event: SessionEvent) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(SessionEvent::Abort.name(), "abort");
        assert_eq!(
            SessionEvent::Stream {
                text: "x".to_string()
            }
            .name(),
            "stream"
        );
        assert_eq!(
            SessionEvent::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
            .name(),
            "retry"
        );
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(SessionEvent::Abort);

        assert!(matches!(a.try_recv(), Ok(SessionEvent::Abort)));
        assert!(matches!(b.try_recv(), Ok(SessionEvent::Abort)));
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let bus = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);

        bus.publish(SessionEvent::Abort);
        assert_eq!(bus.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(SessionEvent::Stream {
            text: "a".to_string(),
        });
        bus.publish(SessionEvent::Abort);

        assert_eq!(rx.try_recv().unwrap().name(), "stream");
        assert_eq!(rx.try_recv().unwrap().name(), "abort");
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(SessionEvent::Abort);
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
