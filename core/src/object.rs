//! Object types: definitions that own instances and the action sequences
//! bound to their events.
//!
//! An object type is the consumer side of the event bus.  Binding a
//! sequence to an event name registers the type as a handler for that
//! name; removing the binding unregisters it.

use crate::{
    bus::{EventBus, HandlerId},
    collision::{CollisionShape, Mask},
    error::{KernelError, KernelResult},
    event::Event,
    instance::ObjectInstance,
    sequence::ActionSequence,
    types::InstanceId,
};
use std::collections::BTreeMap;

pub struct ObjectType {
    pub name: String,
    pub visible: bool,
    pub solid: bool,
    pub depth: i32,
    pub shape: CollisionShape,
    /// Prototype occupancy mask copied into every new instance.
    pub mask: Mask,
    sequences: BTreeMap<String, ActionSequence>,
    /// Live instances, in creation order.
    pub instances: Vec<InstanceId>,
}

impl ObjectType {
    pub fn new(name: &str, shape: CollisionShape, mask: Mask) -> ObjectType {
        ObjectType {
            name: name.to_string(),
            visible: true,
            solid: false,
            depth: 0,
            shape,
            mask,
            sequences: BTreeMap::new(),
            instances: Vec::new(),
        }
    }

    pub fn handler_id(&self) -> HandlerId {
        HandlerId::new(&self.name)
    }

    /// Bind an action sequence to an event name and register this type as a
    /// handler for it.  Unclassifiable event names are rejected.
    pub fn set_sequence(
        &mut self,
        event_name: &str,
        sequence: ActionSequence,
        bus: &mut EventBus,
    ) -> KernelResult<()> {
        if Event::categorize(event_name).is_none() {
            return Err(KernelError::UnknownEvent(event_name.to_string()));
        }
        if !self.sequences.contains_key(event_name) {
            log::debug!("{}: register handler for '{}'", self.name, event_name);
            bus.register(event_name, self.handler_id());
        }
        self.sequences.insert(event_name.to_string(), sequence);
        Ok(())
    }

    /// Remove an event binding and unregister the handler.
    pub fn remove_sequence(&mut self, event_name: &str, bus: &mut EventBus) {
        if self.sequences.remove(event_name).is_some() {
            bus.unregister(event_name, &self.handler_id());
        }
    }

    pub fn sequence(&self, event_name: &str) -> Option<&ActionSequence> {
        self.sequences.get(event_name)
    }

    pub fn handled_events(&self) -> Vec<&str> {
        self.sequences.keys().map(String::as_str).collect()
    }

    /// Build a fresh instance of this type at a position.
    pub fn instantiate(&self, id: InstanceId, position: (f64, f64)) -> ObjectInstance {
        ObjectInstance::new(
            id,
            &self.name,
            position,
            self.mask.clone(),
            self.shape,
            self.visible,
        )
    }
}
