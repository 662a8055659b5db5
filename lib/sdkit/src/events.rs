//! Event dispatching.
//!
//! Listeners subscribe to an event name and receive a mutable [`Event`];
//! a listener may stop propagation to skip the remaining ones.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

/// A named event with a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    name: String,
    payload: Value,
    stopped: bool,
}

impl Event {
    /// A new event.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            stopped: false,
        }
    }

    /// Event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Mutable payload, so listeners can annotate the event.
    #[must_use]
    pub fn payload_mut(&mut self) -> &mut Value {
        &mut self.payload
    }

    /// Skip the listeners that have not run yet.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    /// Whether propagation was stopped.
    #[must_use]
    pub const fn is_propagation_stopped(&self) -> bool {
        self.stopped
    }
}

/// An event listener.
pub type Listener = Arc<dyn Fn(&mut Event) + Send + Sync>;

struct Registered {
    priority: i32,
    listener: Listener,
}

/// Dispatches events to listeners by descending priority, then registration order.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<String, Vec<Registered>>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let counts: HashMap<&str, usize> = listeners
            .iter()
            .map(|(name, registered)| (name.as_str(), registered.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventDispatcher {
    /// A dispatcher without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to `event` with priority 0.
    pub fn add_listener(&self, event: impl Into<String>, listener: Listener) {
        self.add_listener_with_priority(event, listener, 0);
    }

    /// Subscribe `listener` to `event`; higher priorities run first.
    pub fn add_listener_with_priority(
        &self,
        event: impl Into<String>,
        listener: Listener,
        priority: i32,
    ) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let registered = listeners.entry(event.into()).or_default();
        // Stable position: after every listener of the same or higher priority.
        let position = registered
            .iter()
            .position(|entry| entry.priority < priority)
            .unwrap_or(registered.len());
        registered.insert(position, Registered { priority, listener });
    }

    /// Whether `event` has listeners.
    #[must_use]
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Number of listeners of `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Run the listeners of the event and return it.
    ///
    /// Listeners run outside the registry lock, so they may register more listeners.
    pub fn dispatch(&self, mut event: Event) -> Event {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.name())
            .map(|registered| registered.iter().map(|entry| Arc::clone(&entry.listener)).collect())
            .unwrap_or_default();

        tracing::trace!(event = event.name(), listeners = listeners.len(), "dispatching event");
        for listener in listeners {
            if event.is_propagation_stopped() {
                break;
            }
            listener(&mut event);
        }
        event
    }
}

/// Named listeners that configuration can refer to (`events.listeners`).
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Listener>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.listeners.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ListenerRegistry").field("names", &names).finish()
    }
}

impl ListenerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `name`, replacing a previous one.
    pub fn insert(&mut self, name: impl Into<String>, listener: Listener) {
        self.listeners.insert(name.into(), listener);
    }

    /// Listener registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Listener> {
        self.listeners.get(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::check;
    use serde_json::json;

    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Listener {
        let log = Arc::clone(log);
        Arc::new(move |event: &mut Event| {
            log.lock().expect("log").push(format!("{tag}:{}", event.name()));
        })
    }

    #[test]
    fn dispatch_by_priority_then_registration() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new();
        dispatcher.add_listener("sent", recorder(&log, "a"));
        dispatcher.add_listener_with_priority("sent", recorder(&log, "high"), 10);
        dispatcher.add_listener("sent", recorder(&log, "b"));
        dispatcher.add_listener_with_priority("sent", recorder(&log, "low"), -5);

        dispatcher.dispatch(Event::new("sent", Value::Null));

        check!(*log.lock().expect("log") == vec!["high:sent", "a:sent", "b:sent", "low:sent"]);
        check!(dispatcher.listener_count("sent") == 4);
        check!(!dispatcher.has_listeners("other"));
    }

    #[test]
    fn stop_propagation_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::new();
        dispatcher.add_listener(
            "sent",
            Arc::new(|event: &mut Event| {
                event.payload_mut()["seen"] = json!(true);
                event.stop_propagation();
            }),
        );
        dispatcher.add_listener("sent", recorder(&log, "never"));

        let event = dispatcher.dispatch(Event::new("sent", json!({})));

        check!(event.is_propagation_stopped());
        check!(event.payload() == &json!({"seen": true}));
        check!(log.lock().expect("log").is_empty());
    }
}
