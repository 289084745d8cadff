//! Event Dispatcher Module
//!
//! Subscriber registration and synchronous fan-out of [`DiceEvent`]s.
//! Delivery happens in registration order on whatever context the registry
//! runs its own processing on; the subscriber list is snapshotted before
//! each dispatch, so registering or removing a subscriber mid-dispatch never
//! drops, duplicates, or reorders events already in flight.

use crate::domain::models::{DeviceId, DiceEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Handle returned by [`EventDispatcher::subscribe`], used to unsubscribe.
pub type SubscriptionId = u64;

/// Receives every event the registry emits.
pub trait DiceEventSubscriber: Send + Sync {
    fn on_event(&self, event: &DiceEvent);
}

#[derive(Default)]
struct Inner {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Arc<dyn DiceEventSubscriber>)>,
}

/// Fan-out point shared between the registry and the service facade.
/// Cheap to clone; clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Mutex<Inner>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn DiceEventSubscriber>) -> SubscriptionId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
        inner.subscribers.len() != before
    }

    /// Deliver an event to every currently registered subscriber,
    /// synchronously, in registration order.
    pub fn dispatch(&self, event: &DiceEvent) {
        trace!(?event, "dispatching");
        let snapshot: Vec<Arc<dyn DiceEventSubscriber>> = self
            .inner
            .lock()
            .subscribers
            .iter()
            .map(|(_, sub)| Arc::clone(sub))
            .collect();
        for subscriber in snapshot {
            subscriber.on_event(event);
        }
    }
}

type FoundFn = dyn Fn(&DeviceId, &str) + Send + Sync;
type ConnectedFn = dyn Fn(&DeviceId) + Send + Sync;
type DisconnectedFn = dyn Fn(&DeviceId, Option<&str>) + Send + Sync;
type DataFn = dyn Fn(&DiceEvent) + Send + Sync;

/// Closure-based subscriber for callers that do not want to implement
/// [`DiceEventSubscriber`] themselves. Unset slots drop their events;
/// `on_data` receives every per-die event not covered by a dedicated slot.
#[derive(Default)]
pub struct DiceCallbacks {
    pub on_found: Option<Box<FoundFn>>,
    pub on_connected: Option<Box<ConnectedFn>>,
    pub on_connection_failed: Option<Box<ConnectedFn>>,
    pub on_disconnected: Option<Box<DisconnectedFn>>,
    pub on_data: Option<Box<DataFn>>,
}

impl DiceEventSubscriber for DiceCallbacks {
    fn on_event(&self, event: &DiceEvent) {
        match event {
            DiceEvent::Found { id, name } => {
                if let Some(cb) = &self.on_found {
                    cb(id, name);
                }
            }
            DiceEvent::Connected { id } => {
                if let Some(cb) = &self.on_connected {
                    cb(id);
                }
            }
            DiceEvent::ConnectionFailed { id, .. } => {
                if let Some(cb) = &self.on_connection_failed {
                    cb(id);
                }
            }
            DiceEvent::Disconnected { id, reason } => {
                if let Some(cb) = &self.on_disconnected {
                    cb(id, reason.as_deref());
                }
            }
            DiceEvent::ListeningStopped => {}
            other => {
                if let Some(cb) = &self.on_data {
                    cb(other);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::testing::CollectingSubscriber;
    use crate::domain::models::Vector3;

    fn stable(id: &str) -> DiceEvent {
        DiceEvent::Stable {
            id: DeviceId::from(id),
            vector: Vector3 { x: 1, y: 2, z: 3 },
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        struct Tagged(Arc<Mutex<Vec<u8>>>, u8);
        impl DiceEventSubscriber for Tagged {
            fn on_event(&self, _: &DiceEvent) {
                self.0.lock().push(self.1);
            }
        }

        dispatcher.subscribe(Arc::new(Tagged(Arc::clone(&order), 1)));
        dispatcher.subscribe(Arc::new(Tagged(Arc::clone(&order), 2)));
        dispatcher.subscribe(Arc::new(Tagged(Arc::clone(&order), 3)));

        dispatcher.dispatch(&stable("AA"));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn unsubscribed_callbacks_stop_receiving() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(CollectingSubscriber::default());
        let id = dispatcher.subscribe(collector.clone());

        dispatcher.dispatch(&stable("AA"));
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.dispatch(&stable("BB"));

        assert_eq!(collector.events().len(), 1);
    }

    #[test]
    fn subscribing_mid_dispatch_does_not_affect_the_event_in_flight() {
        let dispatcher = EventDispatcher::new();
        let collector = Arc::new(CollectingSubscriber::default());

        struct Registrar {
            dispatcher: EventDispatcher,
            late: Arc<CollectingSubscriber>,
        }
        impl DiceEventSubscriber for Registrar {
            fn on_event(&self, _: &DiceEvent) {
                self.dispatcher.subscribe(self.late.clone());
            }
        }

        dispatcher.subscribe(Arc::new(Registrar {
            dispatcher: dispatcher.clone(),
            late: collector.clone(),
        }));

        dispatcher.dispatch(&stable("AA"));
        // The late subscriber missed the in-flight event but sees the next one.
        assert_eq!(collector.events().len(), 0);
        dispatcher.dispatch(&stable("BB"));
        assert_eq!(collector.events().len(), 1);
    }

    #[test]
    fn callback_slots_route_by_event_kind() {
        let found = Arc::new(Mutex::new(Vec::new()));
        let data = Arc::new(Mutex::new(Vec::new()));

        let callbacks = DiceCallbacks {
            on_found: Some(Box::new({
                let found = Arc::clone(&found);
                move |id, name| found.lock().push((id.clone(), name.to_string()))
            })),
            on_data: Some(Box::new({
                let data = Arc::clone(&data);
                move |event| data.lock().push(event.clone())
            })),
            ..Default::default()
        };

        callbacks.on_event(&DiceEvent::Found {
            id: DeviceId::from("AA"),
            name: "GoDice_AA".into(),
        });
        callbacks.on_event(&stable("AA"));
        callbacks.on_event(&DiceEvent::Connected {
            id: DeviceId::from("AA"),
        });

        assert_eq!(
            *found.lock(),
            vec![(DeviceId::from("AA"), "GoDice_AA".to_string())]
        );
        assert_eq!(*data.lock(), vec![stable("AA")]);
    }
}
