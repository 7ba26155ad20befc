//! The language-engine seam: a trait the kernel consumes, plus the stock
//! CEL-backed implementation.
//!
//! The kernel never sees expression source beyond handing it over for
//! registration; it holds on to opaque handles and asks for values back.

use crate::{
    error::{KernelError, KernelResult},
    symbols::SymbolTable,
    types::Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque handle to a registered code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeHandle(pub u64);

pub trait LanguageEngine {
    /// Compile and register a code block.  The label is for diagnostics;
    /// uniqueness comes from the returned handle.
    fn register_code_block(&mut self, label: &str, source: &str) -> KernelResult<CodeHandle>;

    /// Execute a registered block against the given symbols and return the
    /// resulting value.
    fn execute_code_block(
        &mut self,
        handle: &CodeHandle,
        locals: &mut SymbolTable,
    ) -> KernelResult<Value>;

    /// Drop a code block that is no longer needed.
    fn unregister_code_block(&mut self, handle: &CodeHandle);
}

/// CEL-backed language engine.
pub struct CelEngine {
    programs: HashMap<u64, (String, cel::Program)>,
    next_id: u64,
}

impl CelEngine {
    pub fn new() -> CelEngine {
        CelEngine {
            programs: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Default for CelEngine {
    fn default() -> CelEngine {
        CelEngine::new()
    }
}

impl LanguageEngine for CelEngine {
    fn register_code_block(&mut self, label: &str, source: &str) -> KernelResult<CodeHandle> {
        let program = cel::Program::compile(source)
            .map_err(|e| KernelError::Language(format!("compile '{label}': {e:?}")))?;
        let id = self.next_id;
        self.next_id += 1;
        log::debug!("registered code block '{label}' as #{id}");
        self.programs.insert(id, (label.to_string(), program));
        Ok(CodeHandle(id))
    }

    fn execute_code_block(
        &mut self,
        handle: &CodeHandle,
        locals: &mut SymbolTable,
    ) -> KernelResult<Value> {
        let (label, program) = self
            .programs
            .get(&handle.0)
            .ok_or_else(|| KernelError::Language(format!("unknown code block #{}", handle.0)))?;
        let context = build_context(locals)
            .map_err(|e| KernelError::Language(format!("context for '{label}': {e}")))?;
        let result = program
            .execute(&context)
            .map_err(|e| KernelError::Language(format!("execute '{label}': {e:?}")))?;
        from_cel(result)
    }

    fn unregister_code_block(&mut self, handle: &CodeHandle) {
        self.programs.remove(&handle.0);
    }
}

/// Load a symbol table into a CEL evaluation context.  Dotted names such as
/// `position.x` become members of a map bound to the head segment, so CEL
/// member access finds them.
fn build_context(symbols: &SymbolTable) -> Result<cel::Context<'static>, String> {
    let mut context = cel::Context::default();
    let mut grouped: HashMap<String, HashMap<Arc<String>, cel::Value>> = HashMap::new();
    let entries = symbols
        .consts()
        .iter()
        .chain(symbols.vars().iter());
    for (name, value) in entries {
        match name.split_once('.') {
            Some((head, member)) => {
                grouped
                    .entry(head.to_string())
                    .or_default()
                    .insert(Arc::new(member.to_string()), to_cel(value));
            }
            None => {
                context
                    .add_variable(name.as_str(), to_cel(value))
                    .map_err(|e| format!("{e:?}"))?;
            }
        }
    }
    for (head, members) in grouped {
        context
            .add_variable(head.as_str(), cel::Value::Map(members.into()))
            .map_err(|e| format!("{e:?}"))?;
    }
    Ok(context)
}

fn to_cel(value: &Value) -> cel::Value {
    match value {
        Value::Bool(b) => cel::Value::Bool(*b),
        Value::Int(n) => cel::Value::Int(*n),
        Value::Float(f) => cel::Value::Float(*f),
        Value::Str(s) => cel::Value::String(Arc::new(s.clone())),
        Value::List(items) => cel::Value::List(Arc::new(items.iter().map(to_cel).collect())),
    }
}

fn from_cel(value: cel::Value) -> KernelResult<Value> {
    match value {
        cel::Value::Bool(b) => Ok(Value::Bool(b)),
        cel::Value::Int(n) => Ok(Value::Int(n)),
        cel::Value::UInt(n) => Ok(Value::Int(n as i64)),
        cel::Value::Float(f) => Ok(Value::Float(f)),
        cel::Value::String(s) => Ok(Value::Str((*s).clone())),
        cel::Value::List(items) => {
            let converted: KernelResult<Vec<Value>> =
                items.iter().map(|v| from_cel(v.clone())).collect();
            Ok(Value::List(converted?))
        }
        cel::Value::Null => Ok(Value::uninitialized()),
        other => Err(KernelError::Language(format!(
            "unsupported expression result: {other:?}"
        ))),
    }
}
