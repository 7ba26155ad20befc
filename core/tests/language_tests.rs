//! Symbol table and language-engine seam tests.

use playfield_core::{
    action::ActionCatalog,
    error::KernelResult,
    language::{CelEngine, CodeHandle, LanguageEngine},
    symbols::SymbolTable,
    types::Value,
};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn unknown_symbols_read_as_the_uninitialized_sentinel() {
    let table = SymbolTable::new();
    let value = table.get("never_written");
    assert!(value.is_uninitialized());
}

#[test]
fn constants_shadow_and_reject_writes() {
    let mut table = SymbolTable::new();
    table.set_constant("pi", Value::Float(3.14));
    table.set("pi", Value::Int(4));
    assert_eq!(Value::Float(3.14), table.get("pi"), "constants never change");
    table.set("radius", Value::Int(2));
    assert_eq!(Value::Int(2), table.get("radius"));
}

#[test]
fn every_successful_write_fires_the_callback() {
    let seen: Rc<RefCell<Vec<(String, Value)>>> = Rc::new(RefCell::new(Vec::new()));
    let mut table = SymbolTable::new();
    table.set_constant("locked", Value::Int(0));
    let sink = Rc::clone(&seen);
    table.set_callback(move |name, value| {
        sink.borrow_mut().push((name.to_string(), value.clone()));
    });

    table.set("a", Value::Int(1));
    table.set("locked", Value::Int(9)); // rejected, no callback
    table.set("a", Value::Int(2));

    assert_eq!(
        vec![
            ("a".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Int(2)),
        ],
        *seen.borrow()
    );
}

#[test]
fn cel_engine_evaluates_against_symbols() {
    let mut engine = CelEngine::new();
    let mut symbols = SymbolTable::new();
    symbols.set("a", Value::Int(2));
    symbols.set("b", Value::Int(3));

    let handle = engine.register_code_block("sum", "a + b").expect("compile");
    let result = engine
        .execute_code_block(&handle, &mut symbols)
        .expect("execute");
    assert_eq!(Value::Int(5), result);
}

#[test]
fn dotted_symbols_are_reachable_as_members() {
    let mut engine = CelEngine::new();
    let mut symbols = SymbolTable::new();
    symbols.set("position.x", Value::Float(4.0));
    symbols.set("position.y", Value::Float(6.0));

    let handle = engine
        .register_code_block("px", "position.x * 2.0 + position.y")
        .expect("compile");
    let result = engine
        .execute_code_block(&handle, &mut symbols)
        .expect("execute");
    assert_eq!(Value::Float(14.0), result);
}

#[test]
fn executing_an_unknown_handle_is_an_error() {
    let mut engine = CelEngine::new();
    let mut symbols = SymbolTable::new();
    let err = engine
        .execute_code_block(&CodeHandle(999), &mut symbols)
        .unwrap_err();
    assert!(matches!(err, playfield_core::KernelError::Language(_)));
}

#[test]
fn unregistered_blocks_are_gone() {
    let mut engine = CelEngine::new();
    let mut symbols = SymbolTable::new();
    let handle = engine.register_code_block("gone", "1 + 1").expect("compile");
    engine.unregister_code_block(&handle);
    assert!(engine.execute_code_block(&handle, &mut symbols).is_err());
}

/// Counts registrations and executions to observe resolve's caching.
struct CountingEngine {
    registered: usize,
    executed: usize,
}

impl LanguageEngine for CountingEngine {
    fn register_code_block(&mut self, _label: &str, _source: &str) -> KernelResult<CodeHandle> {
        self.registered += 1;
        Ok(CodeHandle(self.registered as u64))
    }

    fn execute_code_block(
        &mut self,
        _handle: &CodeHandle,
        _locals: &mut SymbolTable,
    ) -> KernelResult<Value> {
        self.executed += 1;
        Ok(Value::Int(41))
    }

    fn unregister_code_block(&mut self, _handle: &CodeHandle) {}
}

#[test]
fn expression_parameters_register_once_per_action_field() {
    let catalog = ActionCatalog::standard();
    let action = catalog
        .create("set_friction", &[("friction", Value::from("=speed + 1.0"))])
        .expect("known action");
    let mut engine = CountingEngine {
        registered: 0,
        executed: 0,
    };
    let mut symbols = SymbolTable::new();

    let first = action
        .resolve("friction", &mut symbols, &mut engine)
        .expect("resolve");
    let second = action
        .resolve("friction", &mut symbols, &mut engine)
        .expect("resolve");

    assert_eq!(Value::Int(41), first);
    assert_eq!(Value::Int(41), second);
    assert_eq!(1, engine.registered, "expression registers exactly once");
    assert_eq!(2, engine.executed, "each resolve executes the cached block");
}

#[test]
fn literal_parameters_never_touch_the_engine() {
    let catalog = ActionCatalog::standard();
    let action = catalog
        .create("set_friction", &[("friction", Value::Float(2.5))])
        .expect("known action");
    let mut engine = CountingEngine {
        registered: 0,
        executed: 0,
    };
    let mut symbols = SymbolTable::new();
    let value = action
        .resolve("friction", &mut symbols, &mut engine)
        .expect("resolve");
    assert_eq!(Value::Float(2.5), value);
    assert_eq!(0, engine.registered);
    assert_eq!(0, engine.executed);
}
