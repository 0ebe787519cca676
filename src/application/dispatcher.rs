//! Event dispatcher - fans decoded inbound events out to handlers.
//!
//! Raw `(name, payload)` frames are decoded once into a [`SyncEvent`] and
//! delivered to every handler registered for that name, in registration
//! order. A handler that errors or panics is logged and skipped; the
//! remaining handlers still run.
//!
//! Registrations are owned by [`SubscriptionHandle`]s. Dropping the handle
//! unregisters the handler, so a view context that goes away cannot leave a
//! stale callback behind.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::events::{EventName, SyncEvent};
use crate::domain::foundation::DomainError;
use crate::ports::SyncEventHandler;

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to one raw frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Decoded and handed to this many handlers (failures included).
    Delivered(usize),
    /// Name not known to this build.
    Ignored,
    /// Known name, payload did not decode.
    Malformed,
}

/// Wraps a closure as a [`SyncEventHandler`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&SyncEvent) -> Result<(), DomainError> + Send + Sync + 'static,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> SyncEventHandler for FnHandler<F>
where
    F: Fn(&SyncEvent) -> Result<(), DomainError> + Send + Sync + 'static,
{
    fn handle(&self, event: &SyncEvent) -> Result<(), DomainError> {
        (self.f)(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

struct Registration {
    id: HandlerId,
    handler: Arc<dyn SyncEventHandler>,
}

#[derive(Default)]
struct Registry {
    handlers: RwLock<HashMap<EventName, Vec<Registration>>>,
}

impl Registry {
    fn remove(&self, event: EventName, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = handlers.get_mut(&event) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&event);
        }
        removed
    }
}

/// Registers handlers by event name and delivers decoded events to them.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`.
    ///
    /// The registration lives as long as the returned handle.
    #[must_use = "dropping the handle unregisters the handler"]
    pub fn on(&self, event: EventName, handler: Arc<dyn SyncEventHandler>) -> SubscriptionHandle {
        let id = HandlerId::new();
        tracing::debug!(event = %event, handler = handler.name(), handler_id = %id, "Handler registered");
        self.registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(Registration { id, handler });

        SubscriptionHandle {
            id,
            event,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Registers a closure for `event`.
    #[must_use = "dropping the handle unregisters the handler"]
    pub fn on_fn<F>(&self, event: EventName, name: &'static str, f: F) -> SubscriptionHandle
    where
        F: Fn(&SyncEvent) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        self.on(event, Arc::new(FnHandler::new(name, f)))
    }

    /// Removes every handler for `event`; returns how many were removed.
    pub fn off(&self, event: EventName) -> usize {
        let removed = self
            .registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event)
            .map(|list| list.len())
            .unwrap_or(0);
        if removed > 0 {
            tracing::debug!(event = %event, removed, "Handlers removed");
        }
        removed
    }

    /// Removes every handler for every event.
    pub fn clear(&self) {
        self.registry
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of handlers currently registered for `event`.
    pub fn handler_count(&self, event: EventName) -> usize {
        self.registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Decodes a raw frame and dispatches it.
    pub fn dispatch_frame(&self, name: &str, payload: JsonValue) -> DispatchOutcome {
        match SyncEvent::decode(name, payload) {
            Ok(Some(event)) => DispatchOutcome::Delivered(self.dispatch(&event)),
            Ok(None) => {
                tracing::trace!(event = name, "Ignoring unknown event");
                DispatchOutcome::Ignored
            }
            Err(e) => {
                tracing::warn!(event = name, error = %e, "Dropping malformed event payload");
                DispatchOutcome::Malformed
            }
        }
    }

    /// Delivers an event to its handlers; returns how many were invoked.
    ///
    /// The handler list is snapshotted first, so handlers may register or
    /// unregister while being called.
    pub fn dispatch(&self, event: &SyncEvent) -> usize {
        let name = event.name();
        let handlers: Vec<Arc<dyn SyncEventHandler>> = self
            .registry
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .map(|list| list.iter().map(|r| Arc::clone(&r.handler)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(
                        event = %name,
                        handler = handler.name(),
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    tracing::error!(event = %name, handler = handler.name(), "Event handler panicked");
                }
            }
        }
        handlers.len()
    }
}

/// Keeps one handler registered; unregisters it on drop.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: HandlerId,
    event: EventName,
    registry: Weak<Registry>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn event(&self) -> EventName {
        self.event
    }

    /// Unregisters now. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.event, self.id) {
                tracing::debug!(event = %self.event, handler_id = %self.id, "Handler unregistered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;
    use serde_json::json;
    use std::sync::Mutex;

    fn message_frame(id: &str) -> JsonValue {
        json!({
            "_id": id,
            "senderId": "7",
            "receiverId": "9",
            "content": "hello",
            "createdAt": "2024-01-15T10:30:00Z"
        })
    }

    fn recorder(
        dispatcher: &EventDispatcher,
        log: &Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    ) -> SubscriptionHandle {
        let log = Arc::clone(log);
        dispatcher.on_fn(EventName::MessageNew, tag, move |_| {
            log.lock().unwrap().push(tag);
            Ok(())
        })
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&dispatcher, &log, "a");
        let _b = recorder(&dispatcher, &log, "b");
        let _c = recorder(&dispatcher, &log, "c");

        let outcome = dispatcher.dispatch_frame("message:new", message_frame("m1"));

        assert_eq!(outcome, DispatchOutcome::Delivered(3));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn failing_handler_does_not_stop_siblings() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&dispatcher, &log, "a");
        let _err = dispatcher.on_fn(EventName::MessageNew, "failing", |_| {
            Err(DomainError::new(ErrorCode::HandlerFailed, "boom"))
        });
        let _panics = dispatcher.on_fn(EventName::MessageNew, "panicking", |_| panic!("boom"));
        let _b = recorder(&dispatcher, &log, "b");

        dispatcher.dispatch_frame("message:new", message_frame("m1"));

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_event_is_ignored() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&dispatcher, &log, "a");

        let outcome = dispatcher.dispatch_frame("typing:start", json!({"userId": "7"}));

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let _a = recorder(&dispatcher, &log, "a");

        let outcome = dispatcher.dispatch_frame("message:new", json!({"content": 42}));

        assert_eq!(outcome, DispatchOutcome::Malformed);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn dropping_handle_unregisters() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&dispatcher, &log, "a");
        let _b = recorder(&dispatcher, &log, "b");
        assert_eq!(dispatcher.handler_count(EventName::MessageNew), 2);

        drop(a);
        dispatcher.dispatch_frame("message:new", message_frame("m1"));

        assert_eq!(dispatcher.handler_count(EventName::MessageNew), 1);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn off_removes_all_handlers_for_name() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = recorder(&dispatcher, &log, "a");
        let b = recorder(&dispatcher, &log, "b");

        assert_eq!(dispatcher.off(EventName::MessageNew), 2);
        assert_eq!(dispatcher.off(EventName::MessageNew), 0);

        // Handles outliving the registration are harmless.
        a.unsubscribe();
        drop(b);
        assert_eq!(
            dispatcher.dispatch_frame("message:new", message_frame("m1")),
            DispatchOutcome::Delivered(0)
        );
    }

    #[test]
    fn handle_outliving_dispatcher_is_harmless() {
        let dispatcher = EventDispatcher::new();
        let handle = dispatcher.on_fn(EventName::AlertCreated, "noop", |_| Ok(()));
        drop(dispatcher);
        drop(handle);
    }
}
