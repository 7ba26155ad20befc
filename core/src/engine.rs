//! The kernel — drives frames, routes events, and executes action
//! sequences against instances.
//!
//! FRAME ORDER (fixed, documented, never reordered):
//!   1. Flush deferred instance creations (each fires 'create')
//!   2. begin_step
//!   3. Queued input (keyboard, then mouse)
//!   4. normal_step
//!   5. Instance kinematics, boundary and alarm events
//!   6. Deferred deletions
//!   7. Collision sweep, then collision events
//!   8. end_step
//!   9. draw
//!
//! RULES:
//!   - Single-threaded and cooperative: every phase runs to completion.
//!   - Instances created during a frame are not seen by collision
//!     detection until the next frame begins.
//!   - Instances marked for deletion are removed only after the update
//!     pass completes; nothing is removed mid-iteration.
//!   - All randomness flows through the kernel RNG.

use crate::{
    action::{compass_degrees, Action, ActionCatalog, ActionKind},
    bus::{Dispatch, EventBus},
    collision::{
        colliders_overlap, collision_normal, mask_overlap, solid_displacement, CollisionShape,
        Mask,
    },
    config::{ObjectTypeConfig, SceneConfig},
    error::{KernelError, KernelResult},
    event::{Event, EventCategory},
    instance::{direction_to, BoundaryState, ObjectInstance},
    language::LanguageEngine,
    object::ObjectType,
    rng::KernelRng,
    sequence::ActionSequence,
    symbols::SymbolTable,
    types::{Frame, InstanceId, Value, ALARM_COUNT},
};
use std::collections::{BTreeMap, BTreeSet};

/// One delivered event, as recorded in the kernel's event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLogEntry {
    pub frame: Frame,
    pub event: String,
    pub target: String,
}

struct PendingCreate {
    type_name: String,
    position: (f64, f64),
}

pub struct Kernel {
    pub frame: Frame,
    pub room: (i64, i64),
    catalog: ActionCatalog,
    bus: EventBus,
    objects: Vec<ObjectType>,
    pool: BTreeMap<InstanceId, ObjectInstance>,
    doomed: BTreeSet<InstanceId>,
    next_instance_id: InstanceId,
    language: Box<dyn LanguageEngine>,
    globals: SymbolTable,
    rng: KernelRng,
    pending_creates: Vec<PendingCreate>,
    event_log: Vec<EventLogEntry>,
}

/// Mutable kernel state handed to the execution machinery.  Object type
/// definitions stay behind a shared borrow so sequences can be walked
/// while everything else mutates.
struct ExecCtx<'a> {
    frame: Frame,
    room: (i64, i64),
    bus: &'a mut EventBus,
    pool: &'a mut BTreeMap<InstanceId, ObjectInstance>,
    doomed: &'a mut BTreeSet<InstanceId>,
    language: &'a mut dyn LanguageEngine,
    globals: &'a mut SymbolTable,
    rng: &'a mut KernelRng,
    pending_creates: &'a mut Vec<PendingCreate>,
    event_log: &'a mut Vec<EventLogEntry>,
}

impl Kernel {
    pub fn new(room: (i64, i64), seed: u64, language: Box<dyn LanguageEngine>) -> Kernel {
        let mut globals = SymbolTable::new();
        globals.set_constant("pi", Value::Float(std::f64::consts::PI));
        globals.set_constant("e", Value::Float(std::f64::consts::E));
        Kernel {
            frame: 0,
            room,
            catalog: ActionCatalog::standard(),
            bus: EventBus::new(),
            objects: Vec::new(),
            pool: BTreeMap::new(),
            doomed: BTreeSet::new(),
            next_instance_id: 0,
            language,
            globals,
            rng: KernelRng::new(seed),
            pending_creates: Vec::new(),
            event_log: Vec::new(),
        }
    }

    /// Build a fully wired kernel from a scene: object types first, then
    /// placements, then the game_start/room_start events.
    pub fn build(scene: &SceneConfig, language: Box<dyn LanguageEngine>) -> KernelResult<Kernel> {
        let mut kernel = Kernel::new(scene.room, scene.seed, language);
        for object in &scene.objects {
            kernel.add_object_type(object)?;
        }
        for placement in &scene.placements {
            let id = kernel.spawn(&placement.object, placement.position)?;
            if placement.speed != 0.0 {
                if let Some(inst) = kernel.pool.get_mut(&id) {
                    inst.set_velocity(placement.speed, placement.direction);
                }
            }
        }
        kernel.queue_and_transmit("game_start")?;
        kernel.queue_and_transmit("room_start")?;
        Ok(kernel)
    }

    /// Define an object type and bind its event action sequences.
    pub fn add_object_type(&mut self, cfg: &ObjectTypeConfig) -> KernelResult<()> {
        let mask = match (&cfg.mask_rows, cfg.shape) {
            (Some(rows), _) => {
                let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
                Mask::from_rows(&rows)
            }
            (None, CollisionShape::Disk) => Mask::disk(cfg.size.0.min(cfg.size.1)),
            (None, _) => Mask::filled(cfg.size.0, cfg.size.1),
        };
        let mut object = ObjectType::new(&cfg.name, cfg.shape, mask);
        object.visible = cfg.visible;
        object.solid = cfg.solid;
        object.depth = cfg.depth;
        for (event_name, entries) in &cfg.events {
            let sequence = ActionSequence::from_entries(&self.catalog, entries)?;
            object.set_sequence(event_name, sequence, &mut self.bus)?;
        }
        log::debug!("defined object type '{}'", cfg.name);
        self.objects.push(object);
        Ok(())
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn instances_of(&self, name: &str) -> Vec<InstanceId> {
        self.object(name)
            .map(|o| o.instances.clone())
            .unwrap_or_default()
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ObjectInstance> {
        self.pool.get(&id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut ObjectInstance> {
        self.pool.get_mut(&id)
    }

    pub fn live_instance_count(&self) -> usize {
        self.pool.len()
    }

    pub fn globals(&self) -> &SymbolTable {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut SymbolTable {
        &mut self.globals
    }

    pub fn event_log(&self) -> &[EventLogEntry] {
        &self.event_log
    }

    /// Create an instance immediately (scene setup and deferred-create
    /// flushing).  Fires the create event for the new instance.
    pub fn spawn(&mut self, type_name: &str, position: (f64, f64)) -> KernelResult<InstanceId> {
        let index = self
            .objects
            .iter()
            .position(|o| o.name == type_name)
            .ok_or_else(|| KernelError::UnknownObjectType(type_name.to_string()))?;
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        let instance = self.objects[index].instantiate(id, position);
        self.objects[index].instances.push(id);
        self.pool.insert(id, instance);
        log::debug!("spawned {} instance {}", type_name, id);
        if self.bus.has_handlers("create") {
            let mut params = BTreeMap::new();
            params.insert("type".to_string(), Value::Str(type_name.to_string()));
            params.insert("instance".to_string(), Value::Int(id as i64));
            self.bus.queue(Event::new("create", params)?);
            self.transmit_event("create")?;
        }
        Ok(id)
    }

    /// Queue an event from the host (translated input, user events).
    pub fn queue_event(&mut self, event: Event) {
        self.bus.queue(event);
    }

    /// Drain and deliver the named queue through registered handlers.
    pub fn transmit_event(&mut self, name: &str) -> KernelResult<()> {
        let (objects, mut ctx) = split(self);
        transmit_now(objects, &mut ctx, name)
    }

    /// Drain and deliver every queued name of a category.
    pub fn transmit_category(&mut self, category: EventCategory) -> KernelResult<()> {
        let (objects, mut ctx) = split(self);
        let dispatches = ctx.bus.transmit_category(category);
        for dispatch in dispatches {
            deliver(objects, &mut ctx, dispatch)?;
        }
        Ok(())
    }

    /// Advance one frame.
    pub fn step(&mut self) -> KernelResult<()> {
        self.frame += 1;
        log::debug!("frame {} begin", self.frame);
        self.flush_pending_creates()?;
        self.queue_and_transmit("begin_step")?;
        self.transmit_category(EventCategory::Keyboard)?;
        self.transmit_category(EventCategory::Mouse)?;
        self.queue_and_transmit("normal_step")?;
        self.update_instances()?;
        self.purge_doomed();
        self.collision_sweep()?;
        self.queue_and_transmit("end_step")?;
        self.queue_and_transmit("draw")?;
        Ok(())
    }

    /// Run n frames in a loop.
    pub fn run_frames(&mut self, n: u64) -> KernelResult<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    fn queue_and_transmit(&mut self, name: &str) -> KernelResult<()> {
        // frame-driver events are only queued when someone listens, so
        // unhandled names don't pile up in the queues
        if self.bus.has_handlers(name) {
            self.bus.queue(Event::simple(name)?);
            self.transmit_event(name)?;
        }
        Ok(())
    }

    fn flush_pending_creates(&mut self) -> KernelResult<()> {
        let pending = std::mem::take(&mut self.pending_creates);
        for create in pending {
            self.spawn(&create.type_name, create.position)?;
        }
        Ok(())
    }

    /// Kinematics, boundary classification, and alarm countdowns for every
    /// live instance, followed by transmission of whatever those queued.
    fn update_instances(&mut self) -> KernelResult<()> {
        let mut queued_names: BTreeSet<String> = BTreeSet::new();
        for index in 0..self.objects.len() {
            let ids = self.objects[index].instances.clone();
            let type_name = self.objects[index].name.clone();
            for id in ids {
                if self.doomed.contains(&id) {
                    continue;
                }
                let Some(instance) = self.pool.get_mut(&id) else {
                    continue;
                };
                instance.step_kinematics();
                let boundary = instance.boundary_state(self.room);
                let fired = instance.tick_alarms();
                let boundary_name = match boundary {
                    BoundaryState::Inside => None,
                    BoundaryState::IntersectBoundary => Some("intersect_boundary"),
                    BoundaryState::OutsideRoom => Some("outside_room"),
                };
                if let Some(name) = boundary_name {
                    if self.bus.has_handlers(name) {
                        let mut params = BTreeMap::new();
                        params.insert("type".to_string(), Value::Str(type_name.clone()));
                        params.insert("instance".to_string(), Value::Int(id as i64));
                        self.bus.queue(Event::new(name, params)?);
                        queued_names.insert(name.to_string());
                    }
                }
                for slot in fired {
                    let name = format!("alarm{slot}");
                    if self.bus.has_handlers(&name) {
                        let mut params = BTreeMap::new();
                        params.insert("type".to_string(), Value::Str(type_name.clone()));
                        params.insert("instance".to_string(), Value::Int(id as i64));
                        self.bus.queue(Event::new(&name, params)?);
                        queued_names.insert(name);
                    }
                }
            }
        }
        for name in queued_names {
            self.transmit_event(&name)?;
        }
        Ok(())
    }

    fn purge_doomed(&mut self) {
        if self.doomed.is_empty() {
            return;
        }
        let doomed = std::mem::take(&mut self.doomed);
        for object in &mut self.objects {
            object.instances.retain(|id| !doomed.contains(id));
        }
        for id in doomed {
            self.pool.remove(&id);
        }
    }

    /// Pairwise overlap test across object types, with solid-body
    /// separation and one queued collision event per (collider, other
    /// type) carrying every simultaneous other.
    fn collision_sweep(&mut self) -> KernelResult<()> {
        let mut queued_names: BTreeSet<String> = BTreeSet::new();
        for i in 0..self.objects.len() {
            for j in 0..self.objects.len() {
                let a_ids: Vec<InstanceId> = self.objects[i]
                    .instances
                    .iter()
                    .copied()
                    .filter(|id| !self.doomed.contains(id))
                    .collect();
                let b_ids: Vec<InstanceId> = self.objects[j]
                    .instances
                    .iter()
                    .copied()
                    .filter(|id| !self.doomed.contains(id))
                    .collect();
                if a_ids.is_empty() || b_ids.is_empty() {
                    continue;
                }
                // an object cannot collide with itself
                if i == j && a_ids.len() == 1 {
                    continue;
                }
                let other_solid = self.objects[j].solid;
                let other_name = self.objects[j].name.clone();
                let self_name = self.objects[i].name.clone();
                let event_name = format!("collision_{other_name}");
                let handled = self.bus.has_handlers(&event_name);
                for &a in &a_ids {
                    let mut others: Vec<InstanceId> = Vec::new();
                    let mut last_normal: Option<(i64, i64)> = None;
                    for &b in &b_ids {
                        if a == b {
                            continue;
                        }
                        let hit = {
                            let ia = &self.pool[&a];
                            let ib = &self.pool[&b];
                            let ca = ia.collider();
                            let cb = ib.collider();
                            if colliders_overlap(&ca, &cb) {
                                Some((mask_overlap(&ca, &cb), collision_normal(&ca, &cb)))
                            } else {
                                None
                            }
                        };
                        let Some((overlap, normal)) = hit else {
                            continue;
                        };
                        others.push(b);
                        if let Some(n) = normal {
                            last_normal = Some(n);
                        }
                        // a solid other is stationary; kick the collider
                        // back outside its mask
                        if other_solid {
                            if let Some(n) = normal {
                                if let Some((dx, dy)) = solid_displacement(overlap, n) {
                                    let ia = self.pool.get_mut(&a).expect("collider is live");
                                    ia.position.0 += dx as f64;
                                    ia.position.1 += dy as f64;
                                    ia.sync_rect();
                                }
                            }
                        }
                    }
                    if others.is_empty() || !handled {
                        continue;
                    }
                    log::debug!("{} instance {}: queue {}", self_name, a, event_name);
                    let mut params = BTreeMap::new();
                    params.insert("type".to_string(), Value::Str(self_name.clone()));
                    params.insert("instance".to_string(), Value::Int(a as i64));
                    params.insert(
                        "others".to_string(),
                        Value::List(others.iter().map(|id| Value::Int(*id as i64)).collect()),
                    );
                    if let Some((nx, ny)) = last_normal {
                        params.insert(
                            "normal".to_string(),
                            Value::List(vec![Value::Int(nx), Value::Int(ny)]),
                        );
                    }
                    self.bus.queue(Event::collision(&other_name, params));
                    queued_names.insert(event_name.clone());
                }
            }
        }
        for name in queued_names {
            self.transmit_event(&name)?;
        }
        Ok(())
    }
}

/// Split the kernel into the shared object-type slice and the mutable rest.
fn split(kernel: &mut Kernel) -> (&[ObjectType], ExecCtx<'_>) {
    let Kernel {
        frame,
        room,
        catalog: _,
        bus,
        objects,
        pool,
        doomed,
        next_instance_id: _,
        language,
        globals,
        rng,
        pending_creates,
        event_log,
    } = kernel;
    (
        objects.as_slice(),
        ExecCtx {
            frame: *frame,
            room: *room,
            bus,
            pool,
            doomed,
            language: language.as_mut(),
            globals,
            rng,
            pending_creates,
            event_log,
        },
    )
}

fn transmit_now(objects: &[ObjectType], ctx: &mut ExecCtx<'_>, name: &str) -> KernelResult<()> {
    let dispatches = ctx.bus.transmit(name);
    for dispatch in dispatches {
        deliver(objects, ctx, dispatch)?;
    }
    Ok(())
}

/// Route one delivery to its object type and run the bound sequence on the
/// selected instances.
fn deliver(objects: &[ObjectType], ctx: &mut ExecCtx<'_>, dispatch: Dispatch) -> KernelResult<()> {
    let Dispatch { target, event } = dispatch;
    let Some(index) = objects.iter().position(|o| o.name == target.0) else {
        return Ok(());
    };
    let object = &objects[index];
    // instance-scoped events name their type; deliveries for another
    // type's instance are not ours
    let selected: Vec<InstanceId> = match event.param("type") {
        Some(Value::Str(t)) if *t != object.name => return Ok(()),
        Some(Value::Str(_)) => match event.param("instance").and_then(Value::as_i64) {
            Some(id) => vec![id as InstanceId],
            None => object.instances.clone(),
        },
        _ => object.instances.clone(),
    };
    ctx.event_log.push(EventLogEntry {
        frame: ctx.frame,
        event: event.name.clone(),
        target: object.name.clone(),
    });
    for id in selected {
        if ctx.doomed.contains(&id) {
            continue;
        }
        run_sequence(objects, index, &event, id, ctx)?;
    }
    Ok(())
}

/// Walk the event's sequence for one instance, feeding each question
/// action's outcome back into the walk so only the chosen branch runs.
fn run_sequence(
    objects: &[ObjectType],
    object_index: usize,
    event: &Event,
    instance: InstanceId,
    ctx: &mut ExecCtx<'_>,
) -> KernelResult<()> {
    let object = &objects[object_index];
    let Some(sequence) = object.sequence(&event.name) else {
        return Ok(());
    };
    let mut walk = sequence.walk();
    while let Some(action) = walk.next() {
        let targets = applied_instances(objects, action, event, instance);
        for target in targets {
            if ctx.doomed.contains(&target) {
                log::debug!("skipping doomed instance {}", target);
                continue;
            }
            if let Some(outcome) = execute_action(objects, action, event, target, ctx)? {
                action.set_taken(outcome);
            }
        }
    }
    Ok(())
}

/// The instances an action applies to: the current one by default, the
/// event's collision partners for "other", or every instance of a named
/// object type.
fn applied_instances(
    objects: &[ObjectType],
    action: &Action,
    event: &Event,
    self_id: InstanceId,
) -> Vec<InstanceId> {
    match action.param("apply_to").and_then(Value::as_str) {
        None | Some("self") => vec![self_id],
        Some("other") => event
            .param("others")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_i64)
                    .map(|id| id as InstanceId)
                    .collect()
            })
            .unwrap_or_default(),
        Some(type_name) => objects
            .iter()
            .find(|o| o.name == type_name)
            .map(|o| o.instances.clone())
            .unwrap_or_default(),
    }
}

/// Execute one action against one instance.  Question actions return the
/// branch outcome.
fn execute_action(
    objects: &[ObjectType],
    action: &Action,
    event: &Event,
    target: InstanceId,
    ctx: &mut ExecCtx<'_>,
) -> KernelResult<Option<bool>> {
    if !ctx.pool.contains_key(&target) {
        return Ok(None);
    }
    match action.kind {
        // structural markers carry no behavior of their own
        ActionKind::StartOfBlock | ActionKind::EndOfBlock | ActionKind::Else => Ok(None),

        ActionKind::IfVariableValue => {
            let invert = param_bool(action, "invert");
            let test = param_str(action, "test", "equals");
            let (var_val, cmp_val) = {
                let inst = ctx.pool.get_mut(&target).expect("checked above");
                inst.refresh_symbols();
                let variable = param_str(action, "variable", "");
                let var_val = if inst.symbols.contains(&variable) {
                    inst.symbols.get(&variable)
                } else {
                    ctx.globals.get(&variable)
                };
                // a string comparison value naming a known symbol compares
                // against that symbol's value
                let raw = action.param("value").cloned().unwrap_or(Value::Int(0));
                let cmp_val = match &raw {
                    Value::Str(s) if inst.symbols.contains(s) => inst.symbols.get(s),
                    Value::Str(s) if ctx.globals.contains(s) => ctx.globals.get(s),
                    _ => raw,
                };
                (var_val, cmp_val)
            };
            use std::cmp::Ordering::*;
            let result = match test.as_str() {
                "equals" => var_val == cmp_val,
                "not_equals" => var_val != cmp_val,
                "less_than" => matches!(var_val.compare(&cmp_val), Some(Less)),
                "less_than_or_equals" => {
                    matches!(var_val.compare(&cmp_val), Some(Less | Equal))
                }
                "greater_than" => matches!(var_val.compare(&cmp_val), Some(Greater)),
                "greater_than_or_equals" => {
                    matches!(var_val.compare(&cmp_val), Some(Greater | Equal))
                }
                _ => false,
            };
            Ok(Some(result != invert))
        }

        ActionKind::IfExpression => {
            let invert = param_bool(action, "invert");
            let value = {
                let inst = ctx.pool.get_mut(&target).expect("checked above");
                inst.refresh_symbols();
                action.evaluate_code("expression", &mut inst.symbols, &mut *ctx.language)?
            };
            Ok(Some(value.truthy() != invert))
        }

        ActionKind::SetVelocityCompass => {
            let speed = resolve_num(action, "speed", target, ctx)?;
            let directions = param_str(action, "compass_directions", "NONE");
            if directions == "NONE" {
                let inst = ctx.pool.get_mut(&target).expect("checked above");
                inst.set_speed(speed);
                return Ok(None);
            }
            let choices: Vec<&str> = directions.split('|').collect();
            let chosen = if choices.len() > 1 {
                *ctx.rng.pick(&choices)
            } else {
                choices[0]
            };
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            if chosen == "STOP" {
                inst.set_speed(0.0);
            } else if let Some(degrees) = compass_degrees(chosen) {
                inst.set_velocity(speed, degrees);
            }
            Ok(None)
        }

        ActionKind::SetVelocityDegrees => {
            let speed = resolve_num(action, "speed", target, ctx)?;
            let direction = resolve_num(action, "direction", target, ctx)?;
            let relative = param_bool(action, "relative");
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            if relative {
                inst.set_velocity(inst.speed() + speed, inst.direction() + direction);
            } else {
                inst.set_velocity(speed, direction);
            }
            Ok(None)
        }

        ActionKind::SetHorizontalSpeed => {
            let speed = resolve_num(action, "horizontal_speed", target, ctx)?;
            let relative = param_bool(action, "relative");
            let direction = param_str(action, "horizontal_direction", "RIGHT");
            let signed = match direction.as_str() {
                "LEFT" => -speed,
                "RIGHT" => speed,
                _ => return Ok(None),
            };
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let base = if relative { inst.hspeed() } else { 0.0 };
            inst.set_hspeed(base + signed);
            Ok(None)
        }

        ActionKind::SetVerticalSpeed => {
            let speed = resolve_num(action, "vertical_speed", target, ctx)?;
            let relative = param_bool(action, "relative");
            let direction = param_str(action, "vertical_direction", "DOWN");
            let signed = match direction.as_str() {
                "UP" => -speed,
                "DOWN" => speed,
                _ => return Ok(None),
            };
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let base = if relative { inst.vspeed() } else { 0.0 };
            inst.set_vspeed(base + signed);
            Ok(None)
        }

        ActionKind::MoveTowardPoint => {
            let speed = resolve_num(action, "speed", target, ctx)?;
            let destination = action
                .param("destination")
                .and_then(Value::as_list)
                .and_then(|items| {
                    let x = items.first().and_then(Value::as_f64)?;
                    let y = items.get(1).and_then(Value::as_f64)?;
                    Some((x, y))
                });
            let Some(destination) = destination else {
                return Ok(None);
            };
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let direction = direction_to(inst.center(), destination);
            inst.set_velocity(speed, direction);
            Ok(None)
        }

        ActionKind::SetFriction => {
            let friction = resolve_num(action, "friction", target, ctx)?;
            ctx.pool.get_mut(&target).expect("checked above").friction = friction;
            Ok(None)
        }

        ActionKind::SetGravity => {
            let gravity = resolve_num(action, "gravity", target, ctx)?;
            let direction = resolve_num(action, "gravity_direction", target, ctx)?;
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            inst.gravity = gravity;
            inst.gravity_direction = direction;
            Ok(None)
        }

        ActionKind::ReverseHorizontalSpeed => {
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let direction = inst.direction();
            inst.set_direction(-direction);
            Ok(None)
        }

        ActionKind::ReverseVerticalSpeed => {
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let direction = inst.direction();
            inst.set_direction(180.0 - direction);
            Ok(None)
        }

        ActionKind::BounceOffCollider => {
            let precise = param_str(action, "precision", "imprecise") == "precise";
            let normal = event.param("normal").and_then(Value::as_list).and_then(|n| {
                let nx = n.first().and_then(Value::as_i64)?;
                let ny = n.get(1).and_then(Value::as_i64)?;
                Some((nx, ny))
            });
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let direction = inst.direction();
            match normal {
                // a clean dominant axis reflects; diagonal or missing
                // normals fall back to a plain 180 reversal
                Some((nx, ny)) if precise && nx.abs() != ny.abs() => {
                    if nx.abs() > ny.abs() {
                        inst.set_direction(-direction);
                    } else {
                        inst.set_direction(180.0 - direction);
                    }
                }
                _ => inst.set_direction(180.0 + direction),
            }
            Ok(None)
        }

        ActionKind::JumpTo => {
            let x = resolve_num(action, "x", target, ctx)?;
            let y = resolve_num(action, "y", target, ctx)?;
            let relative = param_bool(action, "relative");
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            if relative {
                let (cx, cy) = inst.position;
                inst.set_position((cx + x, cy + y));
            } else {
                inst.set_position((x, y));
            }
            Ok(None)
        }

        ActionKind::JumpToStart => {
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            let start = inst.start_position;
            inst.set_position(start);
            Ok(None)
        }

        ActionKind::JumpRandom => {
            let (room_w, room_h) = ctx.room;
            let (w, h) = {
                let inst = &ctx.pool[&target];
                (inst.rect.w, inst.rect.h)
            };
            let max_x = (room_w - w).max(1) as u64;
            let max_y = (room_h - h).max(1) as u64;
            let x = ctx.rng.below(max_x) as f64;
            let y = ctx.rng.below(max_y) as f64;
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            inst.set_position((x, y));
            Ok(None)
        }

        ActionKind::CreateObject => {
            let type_name = param_str(action, "object", "");
            if !objects.iter().any(|o| o.name == type_name) {
                return Err(KernelError::UnknownObjectType(type_name));
            }
            let x = resolve_num(action, "x", target, ctx)?;
            let y = resolve_num(action, "y", target, ctx)?;
            // not visible to this frame; created when the next frame begins
            ctx.pending_creates.push(PendingCreate {
                type_name,
                position: (x, y),
            });
            Ok(None)
        }

        ActionKind::DestroyObject => {
            let type_name = ctx.pool[&target].type_name.clone();
            ctx.doomed.insert(target);
            if ctx.bus.has_handlers("destroy") {
                let mut params = BTreeMap::new();
                params.insert("type".to_string(), Value::Str(type_name));
                params.insert("instance".to_string(), Value::Int(target as i64));
                ctx.bus.queue(Event::new("destroy", params)?);
                transmit_now(objects, ctx, "destroy")?;
            }
            Ok(None)
        }

        ActionKind::SetVariableValue => {
            let variable = param_str(action, "variable", "");
            if variable.is_empty() {
                return Ok(None);
            }
            if param_bool(action, "is_global") {
                let value = action.resolve("value", ctx.globals, &mut *ctx.language)?;
                ctx.globals.set(&variable, value);
            } else {
                let value = {
                    let inst = ctx.pool.get_mut(&target).expect("checked above");
                    inst.refresh_symbols();
                    action.resolve("value", &mut inst.symbols, &mut *ctx.language)?
                };
                let inst = ctx.pool.get_mut(&target).expect("checked above");
                inst.apply_symbol(&variable, value);
            }
            Ok(None)
        }

        ActionKind::ExecuteCode => {
            let result = {
                let inst = ctx.pool.get_mut(&target).expect("checked above");
                inst.refresh_symbols();
                action.evaluate_code("code", &mut inst.symbols, &mut *ctx.language)?
            };
            let target_symbol = param_str(action, "target", "last_result");
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            inst.apply_symbol(&target_symbol, result);
            Ok(None)
        }

        ActionKind::SetAlarm => {
            let slot = action
                .param("alarm")
                .and_then(Value::as_i64)
                .unwrap_or(0)
                .clamp(0, ALARM_COUNT as i64 - 1) as usize;
            let frames = resolve_num(action, "frames", target, ctx)?.max(0.0) as u64;
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            inst.alarms[slot] = Some(frames);
            Ok(None)
        }

        ActionKind::DebugMessage => {
            let message = param_str(action, "message", "");
            let inst = ctx.pool.get_mut(&target).expect("checked above");
            inst.refresh_symbols();
            let rendered = interpolate(&message, &inst.symbols, ctx.globals);
            log::info!("{} instance {}: {}", inst.type_name, target, rendered);
            Ok(None)
        }
    }
}

fn param_str(action: &Action, field: &str, default: &str) -> String {
    action
        .param(field)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn param_bool(action: &Action, field: &str) -> bool {
    action
        .param(field)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolve a numeric parameter against the target instance's symbols,
/// honoring `"=expr"` expression values.
fn resolve_num(
    action: &Action,
    field: &str,
    target: InstanceId,
    ctx: &mut ExecCtx<'_>,
) -> KernelResult<f64> {
    let inst = ctx.pool.get_mut(&target).expect("target is live");
    inst.refresh_symbols();
    let value = action.resolve(field, &mut inst.symbols, &mut *ctx.language)?;
    Ok(value.as_f64().unwrap_or(0.0))
}

/// Replace `{symbol}` markers with symbol values, local table first.
fn interpolate(message: &str, symbols: &SymbolTable, globals: &SymbolTable) -> String {
    let mut out = String::new();
    let mut rest = message;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        match rest[start + 1..].find('}') {
            Some(len) => {
                let name = &rest[start + 1..start + 1 + len];
                if symbols.contains(name) {
                    out.push_str(&symbols.get(name).to_string());
                } else if globals.contains(name) {
                    out.push_str(&globals.get(name).to_string());
                } else {
                    out.push_str("UNKNOWN");
                }
                rest = &rest[start + len + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
