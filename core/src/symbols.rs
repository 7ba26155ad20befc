//! Symbol tables: variables and constants visible to actions and code.
//!
//! Reads of unknown names are never errors; they yield the uninitialized
//! sentinel value.  Writes to constants are silently rejected.  Every
//! successful write fires the change-notification callback, if one is set.

use crate::types::Value;
use std::collections::BTreeMap;
use std::fmt;

type ChangeCallback = Box<dyn FnMut(&str, &Value)>;

#[derive(Default)]
pub struct SymbolTable {
    vars: BTreeMap<String, Value>,
    consts: BTreeMap<String, Value>,
    callback: Option<ChangeCallback>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn with_initial(initial: BTreeMap<String, Value>) -> SymbolTable {
        SymbolTable {
            vars: initial,
            ..SymbolTable::default()
        }
    }

    /// Install the callback fired on every successful `set`.
    pub fn set_callback(&mut self, callback: impl FnMut(&str, &Value) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Look up a symbol.  Constants shadow variables; unknown names yield
    /// the uninitialized sentinel.
    pub fn get(&self, name: &str) -> Value {
        if let Some(v) = self.consts.get(name) {
            return v.clone();
        }
        self.vars
            .get(name)
            .cloned()
            .unwrap_or_else(Value::uninitialized)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.consts.contains_key(name) || self.vars.contains_key(name)
    }

    /// Write a variable.  Names registered as constants are silently left
    /// unchanged and the callback does not fire.
    pub fn set(&mut self, name: &str, value: Value) {
        if self.consts.contains_key(name) {
            return;
        }
        self.vars.insert(name.to_string(), value.clone());
        if let Some(callback) = self.callback.as_mut() {
            callback(name, &value);
        }
    }

    /// Register a value user code can read but never overwrite.
    pub fn set_constant(&mut self, name: &str, value: Value) {
        self.consts.insert(name.to_string(), value);
    }

    pub fn keys(&self) -> Vec<&str> {
        self.vars
            .keys()
            .chain(self.consts.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    pub fn consts(&self) -> &BTreeMap<String, Value> {
        &self.consts
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("vars", &self.vars)
            .field("consts", &self.consts)
            .finish()
    }
}
