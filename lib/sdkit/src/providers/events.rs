use std::sync::Arc;

use serde_json::Value;

use crate::container::names;
use crate::{Error, EventDispatcher, Result, ServiceContainer, ServiceProvider};

/// Registers an [`EventDispatcher`] as `events`.
///
/// `events.listeners` maps event names to lists of listener names, which are
/// looked up in the builder's listener registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDispatcherServiceProvider;

impl ServiceProvider for EventDispatcherServiceProvider {
    fn register(&self, container: &ServiceContainer) -> Result<()> {
        container.container().set(names::EVENTS, build_dispatcher);
        Ok(())
    }
}

fn build_dispatcher(container: &ServiceContainer) -> Result<EventDispatcher> {
    let dispatcher = EventDispatcher::new();
    let config = container.config()?;
    let Some(listeners) = config.get("events.listeners") else {
        return Ok(dispatcher);
    };
    let Value::Object(events) = listeners else {
        return Err(Error::invalid_config(format!(
            "`events.listeners` must map event names to listener names, got {listeners}"
        )));
    };

    let registry = container.listener_registry();
    for (event, listener_names) in events {
        let listener_names = match listener_names {
            Value::Array(names) => names.iter().collect::<Vec<_>>(),
            single @ Value::String(_) => vec![single],
            other => {
                return Err(Error::invalid_config(format!(
                    "listeners of `{event}` must be a list of names, got {other}"
                )));
            }
        };
        for name in listener_names {
            let listener = name
                .as_str()
                .and_then(|name| registry.get(name))
                .ok_or_else(|| {
                    Error::invalid_config(format!("unknown listener {name} for event `{event}`"))
                })?;
            dispatcher.add_listener(event.clone(), Arc::clone(listener));
        }
    }
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;
    use crate::Event;

    #[test]
    fn listeners_wired_from_config() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let container = ServiceContainer::builder()
            .config(json!({"events": {"listeners": {"token.refreshed": ["audit", "audit"]}}}))
            .listener(
                "audit",
                Arc::new(move |_: &mut Event| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .build()
            .expect("container");

        let events = container.events().expect("events");
        check!(events.listener_count("token.refreshed") == 2);
        events.dispatch(Event::new("token.refreshed", json!({})));
        check!(hits.load(Ordering::SeqCst) == 2);
    }

    #[test]
    fn unknown_listener_is_invalid_config() {
        let container = ServiceContainer::new(json!({"events": {"listeners": {"sent": ["nope"]}}}))
            .expect("container");
        let_assert!(Err(err) = container.events());
        check!(err.is_invalid_config());
        check!(err.to_string().contains("\"nope\""));
    }
}
