//! Events: named messages with parameters, grouped into closed categories.
//!
//! Every event name belongs to exactly one category.  Most categories carry
//! a fixed name list; collision names are constructed from the other object
//! type's name (`collision_<type>`), and keyboard names are built from a key
//! name plus an optional press/release suffix.

use crate::{
    error::{KernelError, KernelResult},
    types::{Value, ALARM_COUNT},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const OBJECT_STATE_EVENTS: &[&str] = &["create", "destroy"];

pub const STEP_EVENTS: &[&str] = &["begin_step", "normal_step", "end_step"];

pub const DRAW_EVENTS: &[&str] = &["draw"];

pub const MOUSE_EVENTS: &[&str] = &[
    "mouse_button_left",
    "mouse_button_right",
    "mouse_button_middle",
    "mouse_nobutton",
    "mouse_global_button_left",
    "mouse_global_button_right",
    "mouse_global_button_middle",
];

pub const OTHER_EVENTS: &[&str] = &[
    "outside_room",
    "intersect_boundary",
    "game_start",
    "room_start",
    "user_defined_0",
    "user_defined_1",
    "user_defined_2",
    "user_defined_3",
    "user_defined_4",
    "user_defined_5",
    "user_defined_6",
    "user_defined_7",
];

pub const ALARM_EVENTS: &[&str] = &[
    "alarm0", "alarm1", "alarm2", "alarm3", "alarm4", "alarm5", "alarm6", "alarm7", "alarm8",
    "alarm9", "alarm10", "alarm11",
];

/// Keyboard base names that are not a single letter or digit key.
const KEY_SPECIAL: &[&str] = &[
    "kb_no_key", "kb_any_key", "kb_left", "kb_right", "kb_up", "kb_down", "kb_space", "kb_enter",
    "kb_escape",
];

/// Prefix every collision event name starts with.
pub const COLLISION_PREFIX: &str = "collision_";

pub const KEY_UP_SUFFIX: &str = "_keyup";
pub const KEY_DOWN_SUFFIX: &str = "_keydn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    ObjectState,
    Alarm,
    Step,
    Mouse,
    Keyboard,
    Collision,
    Draw,
    Other,
}

impl EventCategory {
    /// The fixed name list for this category, or None for categories whose
    /// names are constructed (collision, keyboard).
    pub fn enumerable_names(&self) -> Option<&'static [&'static str]> {
        match self {
            EventCategory::ObjectState => Some(OBJECT_STATE_EVENTS),
            EventCategory::Alarm => Some(ALARM_EVENTS),
            EventCategory::Step => Some(STEP_EVENTS),
            EventCategory::Mouse => Some(MOUSE_EVENTS),
            EventCategory::Draw => Some(DRAW_EVENTS),
            EventCategory::Other => Some(OTHER_EVENTS),
            EventCategory::Keyboard | EventCategory::Collision => None,
        }
    }
}

fn is_key_event_name(name: &str) -> bool {
    let base = name
        .strip_suffix(KEY_UP_SUFFIX)
        .or_else(|| name.strip_suffix(KEY_DOWN_SUFFIX))
        .unwrap_or(name);
    if KEY_SPECIAL.contains(&base) {
        return true;
    }
    match base.strip_prefix("kb_") {
        Some(key) => key.len() == 1 && key.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

/// A named message with parameters.  Immutable once queued; delivered then
/// discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub category: EventCategory,
    pub params: BTreeMap<String, Value>,
}

impl Event {
    /// Classify an event name into its category, or None for names no
    /// category claims.
    pub fn categorize(name: &str) -> Option<EventCategory> {
        if OBJECT_STATE_EVENTS.contains(&name) {
            return Some(EventCategory::ObjectState);
        }
        if STEP_EVENTS.contains(&name) {
            return Some(EventCategory::Step);
        }
        if DRAW_EVENTS.contains(&name) {
            return Some(EventCategory::Draw);
        }
        if MOUSE_EVENTS.contains(&name) {
            return Some(EventCategory::Mouse);
        }
        if OTHER_EVENTS.contains(&name) {
            return Some(EventCategory::Other);
        }
        if let Some(n) = name.strip_prefix("alarm") {
            if n.parse::<usize>().map_or(false, |n| n < ALARM_COUNT) {
                return Some(EventCategory::Alarm);
            }
        }
        if name
            .strip_prefix(COLLISION_PREFIX)
            .map_or(false, |other| !other.is_empty())
        {
            return Some(EventCategory::Collision);
        }
        if is_key_event_name(name) {
            return Some(EventCategory::Keyboard);
        }
        None
    }

    /// Build an event, failing with `UnknownEvent` for unclassifiable names.
    pub fn new(name: &str, params: BTreeMap<String, Value>) -> KernelResult<Event> {
        let category =
            Event::categorize(name).ok_or_else(|| KernelError::UnknownEvent(name.to_string()))?;
        Ok(Event {
            name: name.to_string(),
            category,
            params,
        })
    }

    /// Build a parameterless event.
    pub fn simple(name: &str) -> KernelResult<Event> {
        Event::new(name, BTreeMap::new())
    }

    /// Build a collision event against the named object type.  Collision
    /// names are constructed, so this cannot fail.
    pub fn collision(other_type: &str, params: BTreeMap<String, Value>) -> Event {
        Event {
            name: format!("{COLLISION_PREFIX}{other_type}"),
            category: EventCategory::Collision,
            params,
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// For collision events, the name of the object type collided with.
    pub fn collision_object_name(&self) -> Option<&str> {
        self.name.strip_prefix(COLLISION_PREFIX)
    }
}
