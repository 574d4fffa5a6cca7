//! Subscription event listener.
//!
//! State machine: `Unsubscribed → Subscribed(mask) → Unsubscribed`.
//!
//! While subscribed, the read loop hands every packet on the reserved event
//! tag to [`EventListener::deliver`], which decodes it and forwards it to the
//! consumer's channel.  Delivery uses `try_send`: the read loop never waits
//! on a slow consumer, and events that do not fit are dropped with a warning.

use std::sync::Mutex;

use pulse_proto::domain::{SubscriptionEvent, SubscriptionMask};
use pulse_proto::protocol::{decode, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiving end handed to the consumer by `subscribe`.
pub type EventReceiver = mpsc::Receiver<SubscriptionEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribed(SubscriptionMask),
}

/// What happened to one event packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NotSubscribed,
    /// The facility is outside the subscribed mask.
    Filtered,
    /// Not a `SUBSCRIBE_EVENT`, or the body did not decode.
    Malformed,
    /// The consumer's buffer is full.
    Lagging,
    /// The consumer dropped its receiver; the listener unsubscribes itself.
    ConsumerGone,
}

enum ListenerState {
    Unsubscribed,
    Subscribed {
        mask: SubscriptionMask,
        tx: mpsc::Sender<SubscriptionEvent>,
    },
}

pub struct EventListener {
    state: Mutex<ListenerState>,
}

impl Default for EventListener {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState::Unsubscribed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SubscriptionState {
        match &*self.lock() {
            ListenerState::Unsubscribed => SubscriptionState::Unsubscribed,
            ListenerState::Subscribed { mask, .. } => SubscriptionState::Subscribed(*mask),
        }
    }

    /// Registers a new consumer, replacing any previous one.
    pub fn subscribe(&self, mask: SubscriptionMask, buffer: usize) -> EventReceiver {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        *self.lock() = ListenerState::Subscribed { mask, tx };
        debug!(mask = mask.0, "event listener subscribed");
        rx
    }

    /// Drops the consumer; its receiver sees the end of the stream.
    pub fn unsubscribe(&self) {
        *self.lock() = ListenerState::Unsubscribed;
    }

    /// Decodes and forwards one packet from the reserved event tag.
    pub fn deliver(&self, command: u32, body: &[u8]) -> Delivery {
        let mut state = self.lock();
        let ListenerState::Subscribed { mask, tx } = &*state else {
            debug!("event received while unsubscribed; dropping");
            return Delivery::NotSubscribed;
        };
        if command != Command::SubscribeEvent as u32 {
            warn!(command, "non-event packet on the event tag; dropping");
            return Delivery::Malformed;
        }
        let event = match decode(body)
            .map_err(|e| e.to_string())
            .and_then(|values| SubscriptionEvent::decode(&values).map_err(|e| e.to_string()))
        {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "failed to decode subscription event; dropping");
                return Delivery::Malformed;
            }
        };
        if !mask.matches(event.facility) {
            return Delivery::Filtered;
        }
        match tx.try_send(event) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "event consumer lagging; dropping event");
                Delivery::Lagging
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event consumer gone; unsubscribing listener");
                *state = ListenerState::Unsubscribed;
                Delivery::ConsumerGone
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_proto::domain::{EventKind, Facility};
    use pulse_proto::protocol::{encode, Value};

    fn event_body(facility: Facility, kind: EventKind, index: u32) -> Vec<u8> {
        encode(
            &SubscriptionEvent {
                kind,
                facility,
                index,
            }
            .encode(),
        )
    }

    const EVENT: u32 = Command::SubscribeEvent as u32;

    #[test]
    fn test_starts_unsubscribed() {
        let listener = EventListener::new();
        assert_eq!(listener.state(), SubscriptionState::Unsubscribed);
        assert_eq!(
            listener.deliver(EVENT, &event_body(Facility::Sink, EventKind::New, 0)),
            Delivery::NotSubscribed
        );
    }

    #[tokio::test]
    async fn test_delivers_matching_events() {
        // Arrange
        let listener = EventListener::new();
        let mut rx = listener.subscribe(SubscriptionMask::CARD, 4);

        // Act
        let outcome = listener.deliver(EVENT, &event_body(Facility::Card, EventKind::Change, 2));

        // Assert
        assert_eq!(outcome, Delivery::Delivered);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.facility, Facility::Card);
        assert_eq!(event.index, 2);
    }

    #[test]
    fn test_filters_by_mask() {
        let listener = EventListener::new();
        let _rx = listener.subscribe(SubscriptionMask::SINK, 4);
        assert_eq!(
            listener.deliver(EVENT, &event_body(Facility::Module, EventKind::New, 1)),
            Delivery::Filtered
        );
    }

    #[test]
    fn test_malformed_event_is_dropped_and_listener_stays_subscribed() {
        // Arrange
        let listener = EventListener::new();
        let _rx = listener.subscribe(SubscriptionMask::ALL, 4);

        // Act
        let outcome = listener.deliver(EVENT, &encode(&[Value::string("garbage")]));

        // Assert
        assert_eq!(outcome, Delivery::Malformed);
        assert_eq!(
            listener.state(),
            SubscriptionState::Subscribed(SubscriptionMask::ALL)
        );
    }

    #[test]
    fn test_full_buffer_drops_event() {
        let listener = EventListener::new();
        let _rx = listener.subscribe(SubscriptionMask::ALL, 1);
        let body = event_body(Facility::Sink, EventKind::Change, 0);
        assert_eq!(listener.deliver(EVENT, &body), Delivery::Delivered);
        assert_eq!(listener.deliver(EVENT, &body), Delivery::Lagging);
    }

    #[test]
    fn test_dropped_receiver_unsubscribes() {
        let listener = EventListener::new();
        drop(listener.subscribe(SubscriptionMask::ALL, 1));
        let body = event_body(Facility::Sink, EventKind::Remove, 0);
        assert_eq!(listener.deliver(EVENT, &body), Delivery::ConsumerGone);
        assert_eq!(listener.state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_consumer_stream() {
        let listener = EventListener::new();
        let mut rx = listener.subscribe(SubscriptionMask::ALL, 1);
        listener.unsubscribe();
        assert!(rx.recv().await.is_none());
        assert_eq!(listener.state(), SubscriptionState::Unsubscribed);
    }
}
