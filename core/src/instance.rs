//! Live object instances: position, velocity, forces, alarms, symbols.
//!
//! Velocity is carried both as speed + direction and as horizontal/vertical
//! components; setting either representation recomputes the other so they
//! never disagree.  Direction uses compass degrees: 0 is up, 90 is right.

use crate::{
    collision::{Collider, CollisionShape, Mask, Rect},
    symbols::SymbolTable,
    types::{InstanceId, Value, ALARM_COUNT},
};

/// X, Y velocity components for a speed and compass direction.
pub fn velocity_components(speed: f64, direction: f64) -> (f64, f64) {
    let radians = direction.to_radians();
    (speed * radians.sin(), -speed * radians.cos())
}

/// Speed and compass direction for X, Y velocity components.
pub fn velocity_from_components(x: f64, y: f64) -> (f64, f64) {
    let speed = (x * x + y * y).sqrt();
    (speed, normalize_direction(x.atan2(-y).to_degrees()))
}

/// Compass direction from one point toward another.
pub fn direction_to(from: (f64, f64), to: (f64, f64)) -> f64 {
    normalize_direction((to.0 - from.0).atan2(-(to.1 - from.1)).to_degrees())
}

pub fn normalize_direction(direction: f64) -> f64 {
    let mut d = direction % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    d
}

/// Result of the per-frame boundary check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Inside,
    IntersectBoundary,
    OutsideRoom,
}

pub struct ObjectInstance {
    pub id: InstanceId,
    pub type_name: String,
    pub position: (f64, f64),
    pub start_position: (f64, f64),
    pub rect: Rect,
    speed: f64,
    direction: f64,
    hspeed: f64,
    vspeed: f64,
    pub gravity: f64,
    pub gravity_direction: f64,
    pub friction: f64,
    pub visible: bool,
    pub alarms: [Option<u64>; ALARM_COUNT],
    pub symbols: SymbolTable,
    pub mask: Mask,
    pub shape: CollisionShape,
    pub radius: f64,
}

impl ObjectInstance {
    pub fn new(
        id: InstanceId,
        type_name: &str,
        position: (f64, f64),
        mask: Mask,
        shape: CollisionShape,
        visible: bool,
    ) -> ObjectInstance {
        let (w, h) = (mask.width() as i64, mask.height() as i64);
        let radius = w.min(h) as f64 / 2.0;
        let mut instance = ObjectInstance {
            id,
            type_name: type_name.to_string(),
            position,
            start_position: position,
            rect: Rect::new(0, 0, w, h),
            speed: 0.0,
            direction: 0.0,
            hspeed: 0.0,
            vspeed: 0.0,
            gravity: 0.0,
            gravity_direction: 180.0,
            friction: 0.0,
            visible,
            alarms: [None; ALARM_COUNT],
            symbols: SymbolTable::new(),
            mask,
            shape,
            radius,
        };
        instance.sync_rect();
        instance
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn hspeed(&self) -> f64 {
        self.hspeed
    }

    pub fn vspeed(&self) -> f64 {
        self.vspeed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
        self.recompute_components();
    }

    pub fn set_direction(&mut self, direction: f64) {
        self.direction = normalize_direction(direction);
        self.recompute_components();
    }

    /// Set speed and direction together, recomputing components once.
    pub fn set_velocity(&mut self, speed: f64, direction: f64) {
        self.speed = speed;
        self.direction = normalize_direction(direction);
        self.recompute_components();
    }

    pub fn set_hspeed(&mut self, hspeed: f64) {
        self.hspeed = hspeed;
        self.recompute_polar();
    }

    pub fn set_vspeed(&mut self, vspeed: f64) {
        self.vspeed = vspeed;
        self.recompute_polar();
    }

    fn recompute_components(&mut self) {
        let (x, y) = velocity_components(self.speed, self.direction);
        self.hspeed = x;
        self.vspeed = y;
    }

    fn recompute_polar(&mut self) {
        let (speed, direction) = velocity_from_components(self.hspeed, self.vspeed);
        self.speed = speed;
        self.direction = direction;
    }

    pub fn set_position(&mut self, position: (f64, f64)) {
        self.position = position;
        self.sync_rect();
    }

    /// Round the floating-point position into the integer collision rect.
    pub fn sync_rect(&mut self) {
        self.rect.x = (self.position.0 + 0.5).floor() as i64;
        self.rect.y = (self.position.1 + 0.5).floor() as i64;
    }

    pub fn center(&self) -> (f64, f64) {
        self.rect.center()
    }

    pub fn collider(&self) -> Collider<'_> {
        Collider {
            shape: self.shape,
            rect: self.rect,
            radius: self.radius,
            mask: &self.mask,
        }
    }

    /// One frame of kinematics: move along the velocity, then apply
    /// friction and gravity for the next frame.
    pub fn step_kinematics(&mut self) {
        if self.speed > 0.0 {
            self.position.0 += self.hspeed;
            self.position.1 += self.vspeed;
            self.sync_rect();
        }
        if self.gravity != 0.0 {
            let (gx, gy) = velocity_components(self.gravity, self.gravity_direction);
            self.hspeed += gx;
            self.vspeed += gy;
            self.recompute_polar();
        }
        if self.friction > 0.0 && self.speed > 0.0 {
            let slowed = (self.speed - self.friction).max(0.0);
            self.set_speed(slowed);
        }
    }

    /// Classify this instance against the room bounds.  Fully outside wins
    /// over crossing an edge, so the two states are mutually exclusive.
    pub fn boundary_state(&self, room: (i64, i64)) -> BoundaryState {
        let (rw, rh) = room;
        let r = &self.rect;
        if r.x > rw || r.x + r.w < 0 || r.y > rh || r.y + r.h < 0 {
            return BoundaryState::OutsideRoom;
        }
        let crosses_x = (r.x <= 0 && 0 <= r.x + r.w) || (r.x <= rw && rw <= r.x + r.w);
        let crosses_y = (r.y <= 0 && 0 <= r.y + r.h) || (r.y <= rh && rh <= r.y + r.h);
        if crosses_x || crosses_y {
            return BoundaryState::IntersectBoundary;
        }
        BoundaryState::Inside
    }

    /// Count down armed alarms; returns the slots that fired this frame.
    pub fn tick_alarms(&mut self) -> Vec<usize> {
        let mut fired = Vec::new();
        for (slot, alarm) in self.alarms.iter_mut().enumerate() {
            if let Some(frames) = alarm {
                if *frames == 0 {
                    fired.push(slot);
                    *alarm = None;
                } else {
                    *frames -= 1;
                }
            }
        }
        fired
    }

    /// Mirror the built-in state into the symbol table before user code or
    /// expressions read it.
    pub fn refresh_symbols(&mut self) {
        let entries = [
            ("position.x", Value::Float(self.position.0)),
            ("position.y", Value::Float(self.position.1)),
            ("speed", Value::Float(self.speed)),
            ("direction", Value::Float(self.direction)),
            ("hspeed", Value::Float(self.hspeed)),
            ("vspeed", Value::Float(self.vspeed)),
            ("gravity", Value::Float(self.gravity)),
            ("gravity_direction", Value::Float(self.gravity_direction)),
            ("friction", Value::Float(self.friction)),
            ("visible", Value::Bool(self.visible)),
        ];
        for (name, value) in entries {
            self.symbols.set(name, value);
        }
    }

    /// Route a symbol write to built-in state when the name matches one,
    /// otherwise into the instance's symbol table.
    pub fn apply_symbol(&mut self, name: &str, value: Value) {
        let number = value.as_f64();
        match (name, number) {
            ("speed", Some(n)) => self.set_speed(n),
            ("direction", Some(n)) => self.set_direction(n),
            ("hspeed", Some(n)) => self.set_hspeed(n),
            ("vspeed", Some(n)) => self.set_vspeed(n),
            ("gravity", Some(n)) => self.gravity = n,
            ("gravity_direction", Some(n)) => self.gravity_direction = normalize_direction(n),
            ("friction", Some(n)) => self.friction = n,
            ("position.x", Some(n)) => {
                self.position.0 = n;
                self.sync_rect();
            }
            ("position.y", Some(n)) => {
                self.position.1 = n;
                self.sync_rect();
            }
            ("visible", _) => {
                if let Some(b) = value.as_bool() {
                    self.visible = b;
                }
            }
            _ => self.symbols.set(name, value),
        }
    }
}
