//! The event bus — queued, named events routed to registered consumers.
//!
//! RULES:
//!   - Delivery order is FIFO per event name.
//!   - Handlers for a name run in registration order; a dispatch list keeps
//!     event i fully processed by every handler before event i+1 starts.
//!   - `transmit` drains the queue before anything runs, so events queued
//!     by a handler during processing wait for a later transmit.

use crate::event::{Event, EventCategory};
use std::collections::{HashMap, VecDeque};

/// Identifies a registered event consumer (an object type, or a test probe).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId(pub String);

impl HandlerId {
    pub fn new(name: &str) -> HandlerId {
        HandlerId(name.to_string())
    }
}

/// One delivery: this event goes to this consumer.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub target: HandlerId,
    pub event: Event,
}

#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<String, Vec<HandlerId>>,
    queues: HashMap<String, VecDeque<Event>>,
}

impl EventBus {
    pub fn new() -> EventBus {
        EventBus::default()
    }

    /// Append a handler to the named event's handler list.
    pub fn register(&mut self, event_name: &str, handler: HandlerId) {
        let list = self.handlers.entry(event_name.to_string()).or_default();
        log::debug!(
            "register handler #{} for '{}': {:?}",
            list.len() + 1,
            event_name,
            handler
        );
        list.push(handler);
    }

    /// Remove the first matching handler from the named event.  When a
    /// name's handler list empties it is removed entirely.
    pub fn unregister(&mut self, event_name: &str, handler: &HandlerId) {
        if let Some(list) = self.handlers.get_mut(event_name) {
            if let Some(pos) = list.iter().position(|h| h == handler) {
                list.remove(pos);
            }
            if list.is_empty() {
                self.handlers.remove(event_name);
            }
        }
    }

    pub fn has_handlers(&self, event_name: &str) -> bool {
        self.handlers.contains_key(event_name)
    }

    /// Append the event to its name's FIFO queue.
    pub fn queue(&mut self, event: Event) {
        self.queues
            .entry(event.name.clone())
            .or_default()
            .push_back(event);
    }

    pub fn queued_len(&self, event_name: &str) -> usize {
        self.queues.get(event_name).map_or(0, VecDeque::len)
    }

    /// Drain the named queue into an ordered dispatch list.
    ///
    /// With no handler registered this is a no-op and the queue, if any, is
    /// left untouched for a later transmit.  Otherwise every queued event is
    /// paired with every handler (FIFO-major, registration-order-minor) and
    /// the queue is cleared.
    pub fn transmit(&mut self, event_name: &str) -> Vec<Dispatch> {
        let Some(handlers) = self.handlers.get(event_name) else {
            return Vec::new();
        };
        let Some(events) = self.queues.remove(event_name) else {
            return Vec::new();
        };
        if !events.is_empty() {
            log::debug!("transmit {} queued '{}' event(s)", events.len(), event_name);
        }
        let mut dispatches = Vec::with_capacity(events.len() * handlers.len());
        for event in events {
            for handler in handlers {
                dispatches.push(Dispatch {
                    target: handler.clone(),
                    event: event.clone(),
                });
            }
        }
        dispatches
    }

    /// Transmit every name belonging to a category.
    ///
    /// Categories with a closed name list transmit those names in list
    /// order.  Constructed categories (collision, keyboard) transmit the
    /// names currently registered with the bus, sorted for determinism.
    pub fn transmit_category(&mut self, category: EventCategory) -> Vec<Dispatch> {
        let names: Vec<String> = match category.enumerable_names() {
            Some(list) => list.iter().map(|s| s.to_string()).collect(),
            None => {
                let mut names: Vec<String> = self
                    .handlers
                    .keys()
                    .filter(|name| Event::categorize(name) == Some(category))
                    .cloned()
                    .collect();
                names.sort();
                names
            }
        };
        names
            .iter()
            .flat_map(|name| self.transmit(name))
            .collect()
    }
}
