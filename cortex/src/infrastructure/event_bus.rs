// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Cortex Events
//
// In-memory event streaming over a tokio broadcast channel, plus a bounded
// journal so events stay discoverable when nobody is subscribed (a drift
// rollback must never be silent).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::CortexEvent;

/// Event bus for publishing and subscribing to cortex events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CortexEvent>>,
    journal: Arc<Mutex<VecDeque<CortexEvent>>>,
    journal_capacity: usize,
}

impl EventBus {
    /// Create a new event bus.
    /// `capacity` bounds the broadcast buffer, `journal_capacity` the retained history.
    pub fn new(capacity: usize, journal_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
            journal: Arc::new(Mutex::new(VecDeque::with_capacity(journal_capacity))),
            journal_capacity,
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000, 1000)
    }

    /// Publish an event to all subscribers and the journal
    pub fn publish(&self, event: CortexEvent) {
        debug!(event_type = event.event_type(), "Publishing cortex event");

        if self.journal_capacity > 0 {
            let mut journal = self.journal.lock();
            if journal.len() == self.journal_capacity {
                journal.pop_front();
            }
            journal.push_back(event.clone());
        }

        // send() fails only when there are no receivers
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Retained events, oldest first
    pub fn journal(&self) -> Vec<CortexEvent> {
        self.journal.lock().iter().cloned().collect()
    }

    /// Retained events of one type, oldest first
    pub fn journal_of(&self, event_type: &str) -> Vec<CortexEvent> {
        self.journal
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for cortex events
pub struct EventReceiver {
    receiver: broadcast::Receiver<CortexEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<CortexEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<CortexEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VectorId;
    use chrono::Utc;

    fn inserted(id: u64) -> CortexEvent {
        CortexEvent::VectorInserted {
            vector_id: VectorId(id),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10, 10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(inserted(7));

        match receiver.recv().await.unwrap() {
            CortexEvent::VectorInserted { vector_id, .. } => assert_eq!(vector_id, VectorId(7)),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10, 10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(inserted(1));

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_journal_is_bounded_and_kept_without_subscribers() {
        let event_bus = EventBus::new(4, 3);
        for id in 0..5 {
            event_bus.publish(inserted(id));
        }

        let journal = event_bus.journal();
        assert_eq!(journal.len(), 3);
        match &journal[0] {
            CortexEvent::VectorInserted { vector_id, .. } => assert_eq!(*vector_id, VectorId(2)),
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(event_bus.journal_of("vector_inserted").len(), 3);
        assert!(event_bus.journal_of("drift_rollback").is_empty());
    }
}
