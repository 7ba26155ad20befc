//! Actions: named, schema-validated units of behavior.
//!
//! Dispatch is by the `ActionKind` tag resolved once at catalog lookup, not
//! by matching name strings per call.  The catalog itself is an explicit
//! object threaded through constructors; there is no ambient registry.

use crate::{
    error::{KernelError, KernelResult},
    language::{CodeHandle, LanguageEngine},
    symbols::SymbolTable,
    types::Value,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Structural role an action plays in a sequence, derived once from its
/// name at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    None,
    OpenConditional,
    OpenBlock,
    CloseBlock,
}

impl ControlRole {
    pub fn classify(name: &str) -> ControlRole {
        if name.starts_with("if_") || name == "else" {
            ControlRole::OpenConditional
        } else if name == "start_of_block" {
            ControlRole::OpenBlock
        } else if name == "end_of_block" {
            ControlRole::CloseBlock
        } else {
            ControlRole::None
        }
    }
}

/// Every behavior the kernel knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    // control flow
    StartOfBlock,
    EndOfBlock,
    Else,
    // questions
    IfVariableValue,
    IfExpression,
    // motion
    SetVelocityCompass,
    SetVelocityDegrees,
    SetHorizontalSpeed,
    SetVerticalSpeed,
    MoveTowardPoint,
    SetFriction,
    SetGravity,
    ReverseHorizontalSpeed,
    ReverseVerticalSpeed,
    BounceOffCollider,
    JumpTo,
    JumpToStart,
    JumpRandom,
    // object lifecycle
    CreateObject,
    DestroyObject,
    // variables and code
    SetVariableValue,
    ExecuteCode,
    // timing
    SetAlarm,
    // info
    DebugMessage,
}

/// Compass direction names accepted by velocity actions.
pub const COMPASS_DIRECTIONS: &[(&str, f64)] = &[
    ("UP", 0.0),
    ("UPRIGHT", 45.0),
    ("RIGHT", 90.0),
    ("DOWNRIGHT", 135.0),
    ("DOWN", 180.0),
    ("DOWNLEFT", 225.0),
    ("LEFT", 270.0),
    ("UPLEFT", 315.0),
];

pub fn compass_degrees(name: &str) -> Option<f64> {
    COMPASS_DIRECTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}

struct CatalogEntry {
    kind: ActionKind,
    defaults: BTreeMap<String, Value>,
}

/// The explicit registry of known actions, built once at startup and
/// threaded through everything that constructs actions.
pub struct ActionCatalog {
    specs: BTreeMap<String, CatalogEntry>,
}

impl ActionCatalog {
    /// The stock catalog.
    pub fn standard() -> ActionCatalog {
        let mut c = ActionCatalog {
            specs: BTreeMap::new(),
        };
        // control flow
        c.define("start_of_block", ActionKind::StartOfBlock, &[]);
        c.define("end_of_block", ActionKind::EndOfBlock, &[]);
        c.define("else", ActionKind::Else, &[]);
        // questions
        c.define(
            "if_variable_value",
            ActionKind::IfVariableValue,
            &[
                ("variable", Value::Str(String::new())),
                ("test", Value::Str("equals".into())),
                ("value", Value::Int(0)),
                ("invert", Value::Bool(false)),
            ],
        );
        c.define(
            "if_expression",
            ActionKind::IfExpression,
            &[
                ("expression", Value::Str(String::new())),
                ("invert", Value::Bool(false)),
            ],
        );
        // motion
        c.define(
            "set_velocity_compass",
            ActionKind::SetVelocityCompass,
            &[
                ("apply_to", Value::Str("self".into())),
                ("compass_directions", Value::Str("NONE".into())),
                ("speed", Value::Float(0.0)),
            ],
        );
        c.define(
            "set_velocity_degrees",
            ActionKind::SetVelocityDegrees,
            &[
                ("apply_to", Value::Str("self".into())),
                ("direction", Value::Float(0.0)),
                ("speed", Value::Float(0.0)),
                ("relative", Value::Bool(false)),
            ],
        );
        c.define(
            "set_horizontal_speed",
            ActionKind::SetHorizontalSpeed,
            &[
                ("apply_to", Value::Str("self".into())),
                ("horizontal_direction", Value::Str("RIGHT".into())),
                ("horizontal_speed", Value::Float(0.0)),
                ("relative", Value::Bool(false)),
            ],
        );
        c.define(
            "set_vertical_speed",
            ActionKind::SetVerticalSpeed,
            &[
                ("apply_to", Value::Str("self".into())),
                ("vertical_direction", Value::Str("DOWN".into())),
                ("vertical_speed", Value::Float(0.0)),
                ("relative", Value::Bool(false)),
            ],
        );
        c.define(
            "move_toward_point",
            ActionKind::MoveTowardPoint,
            &[
                ("apply_to", Value::Str("self".into())),
                ("destination", Value::List(vec![Value::Int(0), Value::Int(0)])),
                ("speed", Value::Float(0.0)),
            ],
        );
        c.define(
            "set_friction",
            ActionKind::SetFriction,
            &[
                ("apply_to", Value::Str("self".into())),
                ("friction", Value::Float(0.0)),
            ],
        );
        c.define(
            "set_gravity",
            ActionKind::SetGravity,
            &[
                ("apply_to", Value::Str("self".into())),
                ("gravity", Value::Float(0.0)),
                ("gravity_direction", Value::Float(180.0)),
            ],
        );
        c.define(
            "reverse_horizontal_speed",
            ActionKind::ReverseHorizontalSpeed,
            &[("apply_to", Value::Str("self".into()))],
        );
        c.define(
            "reverse_vertical_speed",
            ActionKind::ReverseVerticalSpeed,
            &[("apply_to", Value::Str("self".into()))],
        );
        c.define(
            "bounce_off_collider",
            ActionKind::BounceOffCollider,
            &[
                ("apply_to", Value::Str("self".into())),
                ("precision", Value::Str("imprecise".into())),
            ],
        );
        c.define(
            "jump_to",
            ActionKind::JumpTo,
            &[
                ("apply_to", Value::Str("self".into())),
                ("x", Value::Float(0.0)),
                ("y", Value::Float(0.0)),
                ("relative", Value::Bool(false)),
            ],
        );
        c.define(
            "jump_to_start",
            ActionKind::JumpToStart,
            &[("apply_to", Value::Str("self".into()))],
        );
        c.define(
            "jump_random",
            ActionKind::JumpRandom,
            &[("apply_to", Value::Str("self".into()))],
        );
        // object lifecycle
        c.define(
            "create_object",
            ActionKind::CreateObject,
            &[
                ("object", Value::Str(String::new())),
                ("x", Value::Float(0.0)),
                ("y", Value::Float(0.0)),
            ],
        );
        c.define(
            "destroy_object",
            ActionKind::DestroyObject,
            &[("apply_to", Value::Str("self".into()))],
        );
        // variables and code
        c.define(
            "set_variable_value",
            ActionKind::SetVariableValue,
            &[
                ("apply_to", Value::Str("self".into())),
                ("variable", Value::Str(String::new())),
                ("value", Value::Int(0)),
                ("is_global", Value::Bool(false)),
            ],
        );
        c.define(
            "execute_code",
            ActionKind::ExecuteCode,
            &[
                ("apply_to", Value::Str("self".into())),
                ("code", Value::Str(String::new())),
                ("target", Value::Str("last_result".into())),
            ],
        );
        // timing
        c.define(
            "set_alarm",
            ActionKind::SetAlarm,
            &[
                ("apply_to", Value::Str("self".into())),
                ("alarm", Value::Int(0)),
                ("frames", Value::Int(0)),
            ],
        );
        // info
        c.define(
            "debug_message",
            ActionKind::DebugMessage,
            &[("message", Value::Str(String::new()))],
        );
        c
    }

    fn define(&mut self, name: &str, kind: ActionKind, defaults: &[(&str, Value)]) {
        let defaults = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.specs
            .insert(name.to_string(), CatalogEntry { kind, defaults });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<ActionKind> {
        self.specs.get(name).map(|e| e.kind)
    }

    /// Instantiate a catalog action.  Parameters start from the schema
    /// defaults; overrides for parameters the schema does not name are
    /// ignored, like the original authoring tool did.
    pub fn create(&self, name: &str, overrides: &[(&str, Value)]) -> KernelResult<Action> {
        let entry = self
            .specs
            .get(name)
            .ok_or_else(|| KernelError::UnknownAction(name.to_string()))?;
        let mut data = entry.defaults.clone();
        for (key, value) in overrides {
            if data.contains_key(*key) {
                data.insert(key.to_string(), value.clone());
            }
        }
        Ok(Action::assemble(name, entry.kind, data))
    }

    /// Instantiate from an already-built parameter map (persisted format).
    pub fn create_from_map(
        &self,
        name: &str,
        params: &BTreeMap<String, Value>,
    ) -> KernelResult<Action> {
        let overrides: Vec<(&str, Value)> =
            params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        self.create(name, &overrides)
    }
}

/// A single named, parameterized unit of behavior.
///
/// `data` holds the author-set/default parameter values and is what
/// persists.  `runtime_data` is engine-attached bookkeeping (expression
/// handles) and never serializes.  `taken` is written by whatever executes
/// a question action and read by the sequence walk to pick a branch; it is
/// the one piece of runtime state on an otherwise declarative value.
#[derive(Debug)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    pub control_role: ControlRole,
    pub data: BTreeMap<String, Value>,
    pub runtime_data: RefCell<BTreeMap<String, Value>>,
    taken: Cell<Option<bool>>,
}

impl Action {
    fn assemble(name: &str, kind: ActionKind, data: BTreeMap<String, Value>) -> Action {
        Action {
            name: name.to_string(),
            kind,
            control_role: ControlRole::classify(name),
            data,
            runtime_data: RefCell::new(BTreeMap::new()),
            taken: Cell::new(None),
        }
    }

    pub fn param(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// The branch outcome recorded by the last execution of this action.
    /// Question actions default to the taken branch until executed.
    pub fn taken(&self) -> bool {
        self.taken.get().unwrap_or(true)
    }

    pub fn set_taken(&self, taken: bool) {
        self.taken.set(Some(taken));
    }

    /// Resolve a parameter to a concrete value.
    ///
    /// Literal values come back unchanged.  An `"=expr"` string registers
    /// the expression with the language engine once per (action, field),
    /// caches the handle in `runtime_data`, and evaluates it against the
    /// given symbols.
    pub fn resolve(
        &self,
        field: &str,
        symbols: &mut SymbolTable,
        engine: &mut dyn LanguageEngine,
    ) -> KernelResult<Value> {
        let Some(value) = self.data.get(field) else {
            return Ok(Value::uninitialized());
        };
        let Some(expr) = value.expression() else {
            return Ok(value.clone());
        };
        let cache_key = format!("{field}_block");
        let cached = self
            .runtime_data
            .borrow()
            .get(&cache_key)
            .and_then(Value::as_i64);
        let handle = match cached {
            Some(id) => CodeHandle(id as u64),
            None => {
                let label = format!("{}_{}", self.name, field);
                let handle = engine.register_code_block(&label, expr)?;
                self.runtime_data
                    .borrow_mut()
                    .insert(cache_key, Value::Int(handle.0 as i64));
                handle
            }
        };
        engine.execute_code_block(&handle, symbols)
    }

    /// Evaluate a parameter whose whole value is expression source (the
    /// `=` marker is accepted but not required).  Registration is cached
    /// exactly like `resolve`.
    pub fn evaluate_code(
        &self,
        field: &str,
        symbols: &mut SymbolTable,
        engine: &mut dyn LanguageEngine,
    ) -> KernelResult<Value> {
        let source = self
            .data
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or("");
        if source.is_empty() {
            return Ok(Value::uninitialized());
        }
        let source = source.strip_prefix('=').unwrap_or(source);
        let cache_key = format!("{field}_block");
        let cached = self
            .runtime_data
            .borrow()
            .get(&cache_key)
            .and_then(Value::as_i64);
        let handle = match cached {
            Some(id) => CodeHandle(id as u64),
            None => {
                let label = format!("{}_{}", self.name, field);
                let handle = engine.register_code_block(&label, source)?;
                self.runtime_data
                    .borrow_mut()
                    .insert(cache_key, Value::Int(handle.0 as i64));
                handle
            }
        };
        engine.execute_code_block(&handle, symbols)
    }
}

impl Clone for Action {
    fn clone(&self) -> Action {
        Action {
            name: self.name.clone(),
            kind: self.kind,
            control_role: self.control_role,
            data: self.data.clone(),
            runtime_data: RefCell::new(self.runtime_data.borrow().clone()),
            taken: Cell::new(self.taken.get()),
        }
    }
}

/// Equality covers the declarative part only: name and persisted data.
impl PartialEq for Action {
    fn eq(&self, other: &Action) -> bool {
        self.name == other.name && self.data == other.data
    }
}
