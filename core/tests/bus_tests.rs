//! Event bus tests: FIFO delivery, registration order, queue retention.

use playfield_core::{
    bus::{EventBus, HandlerId},
    event::{Event, EventCategory},
    types::Value,
};
use std::collections::BTreeMap;

fn hit(x: i64) -> Event {
    Event::new(
        "user_defined_0",
        BTreeMap::from([("x".to_string(), Value::Int(x))]),
    )
    .expect("known event")
}

#[test]
fn fifo_events_cross_registration_ordered_handlers() {
    let mut bus = EventBus::new();
    bus.register("user_defined_0", HandlerId::new("h1"));
    bus.register("user_defined_0", HandlerId::new("h2"));
    bus.queue(hit(1));
    bus.queue(hit(2));

    let dispatches = bus.transmit("user_defined_0");
    let order: Vec<(String, i64)> = dispatches
        .iter()
        .map(|d| {
            (
                d.target.0.clone(),
                d.event.param("x").and_then(Value::as_i64).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        vec![
            ("h1".to_string(), 1),
            ("h2".to_string(), 1),
            ("h1".to_string(), 2),
            ("h2".to_string(), 2),
        ],
        order,
        "event i must reach every handler before event i+1"
    );
    assert_eq!(0, bus.queued_len("user_defined_0"), "queue must be cleared");
}

#[test]
fn transmit_without_handlers_leaves_the_queue() {
    let mut bus = EventBus::new();
    bus.queue(hit(7));
    let dispatches = bus.transmit("user_defined_0");
    assert!(dispatches.is_empty());
    assert_eq!(
        1,
        bus.queued_len("user_defined_0"),
        "undelivered events stay queued for a later transmit"
    );

    bus.register("user_defined_0", HandlerId::new("late"));
    let dispatches = bus.transmit("user_defined_0");
    assert_eq!(1, dispatches.len());
    assert_eq!(0, bus.queued_len("user_defined_0"));
}

#[test]
fn events_queued_during_processing_wait_for_the_next_transmit() {
    let mut bus = EventBus::new();
    bus.register("user_defined_0", HandlerId::new("h"));
    bus.queue(hit(1));

    let first = bus.transmit("user_defined_0");
    assert_eq!(1, first.len());
    // a handler reacting to the delivery queues another event
    bus.queue(hit(2));
    // the in-progress batch never grows; the new event waits
    assert_eq!(1, bus.queued_len("user_defined_0"));

    let second = bus.transmit("user_defined_0");
    assert_eq!(1, second.len());
    assert_eq!(
        Some(2),
        second[0].event.param("x").and_then(Value::as_i64)
    );
}

#[test]
fn unregistering_the_last_handler_removes_the_entry() {
    let mut bus = EventBus::new();
    let h1 = HandlerId::new("h1");
    let h2 = HandlerId::new("h2");
    bus.register("draw", h1.clone());
    bus.register("draw", h2.clone());
    bus.unregister("draw", &h1);
    assert!(bus.has_handlers("draw"));
    bus.unregister("draw", &h2);
    assert!(!bus.has_handlers("draw"), "empty entries must be dropped");
}

#[test]
fn category_transmit_covers_every_name_in_order() {
    let mut bus = EventBus::new();
    bus.register("begin_step", HandlerId::new("h"));
    bus.register("end_step", HandlerId::new("h"));
    bus.queue(Event::simple("end_step").unwrap());
    bus.queue(Event::simple("begin_step").unwrap());

    let dispatches = bus.transmit_category(EventCategory::Step);
    let names: Vec<&str> = dispatches.iter().map(|d| d.event.name.as_str()).collect();
    assert_eq!(vec!["begin_step", "end_step"], names);
}

#[test]
fn collision_category_transmits_registered_names_sorted() {
    let mut bus = EventBus::new();
    bus.register("collision_obj_wall", HandlerId::new("ball"));
    bus.register("collision_obj_ball", HandlerId::new("wall"));
    bus.queue(Event::collision("obj_wall", BTreeMap::new()));
    bus.queue(Event::collision("obj_ball", BTreeMap::new()));

    let dispatches = bus.transmit_category(EventCategory::Collision);
    let names: Vec<&str> = dispatches.iter().map(|d| d.event.name.as_str()).collect();
    assert_eq!(vec!["collision_obj_ball", "collision_obj_wall"], names);
}

#[test]
fn unknown_event_names_are_rejected_at_construction() {
    let err = Event::simple("flying_spaghetti").unwrap_err();
    assert!(matches!(
        err,
        playfield_core::KernelError::UnknownEvent(name) if name == "flying_spaghetti"
    ));
}

#[test]
fn event_names_classify_into_closed_categories() {
    for (name, category) in [
        ("create", EventCategory::ObjectState),
        ("alarm11", EventCategory::Alarm),
        ("normal_step", EventCategory::Step),
        ("mouse_button_left", EventCategory::Mouse),
        ("kb_A_keydn", EventCategory::Keyboard),
        ("kb_left", EventCategory::Keyboard),
        ("collision_obj_wall", EventCategory::Collision),
        ("draw", EventCategory::Draw),
        ("outside_room", EventCategory::Other),
    ] {
        assert_eq!(Some(category), Event::categorize(name), "{name}");
    }
    assert_eq!(None, Event::categorize("alarm12"));
    assert_eq!(None, Event::categorize("collision_"));
    assert_eq!(None, Event::categorize("kb_"));
}
