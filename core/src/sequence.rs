//! Action sequences: the control-flow core.
//!
//! Sequences are authored and persisted as a flat, linear action list, but
//! execution needs branch-sensitive nesting.  The tree of statements is
//! reconstructed online, one action at a time in authoring order, and
//! `walk()` later re-derives, lazily, only the path the runtime actually
//! takes, so untaken branches never execute.

use crate::{
    action::{Action, ActionCatalog, ControlRole},
    error::{KernelError, KernelResult},
    types::Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One entry of the persisted sequence format: a single-key map from the
/// action name to its parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEntry(pub BTreeMap<String, BTreeMap<String, Value>>);

impl SequenceEntry {
    pub fn new(name: &str, params: BTreeMap<String, Value>) -> SequenceEntry {
        let mut map = BTreeMap::new();
        map.insert(name.to_string(), params);
        SequenceEntry(map)
    }

    /// The entry's action name, or an error for maps that are not
    /// single-key.
    pub fn name(&self) -> KernelResult<&str> {
        if self.0.len() != 1 {
            return Err(KernelError::SequenceStructure(format!(
                "sequence entry must have exactly one action name, found {}",
                self.0.len()
            )));
        }
        Ok(self.0.keys().next().expect("len checked").as_str())
    }

    pub fn params(&self) -> Option<&BTreeMap<String, Value>> {
        self.0.values().next()
    }
}

/// A statement wraps exactly one action and gives it structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Plain(Action),
    Block(Block),
    Conditional(Conditional),
}

impl Statement {
    fn classify(action: Action) -> Statement {
        match action.control_role {
            ControlRole::OpenConditional => Statement::Conditional(Conditional::new(action)),
            ControlRole::OpenBlock => Statement::Block(Block::new(Some(action))),
            // end_of_block rides in a plain statement; blocks close on it
            _ => Statement::Plain(action),
        }
    }

    fn is_close(&self) -> bool {
        matches!(self, Statement::Plain(a) if a.control_role == ControlRole::CloseBlock)
    }

    fn is_bare_else(&self) -> bool {
        matches!(self, Statement::Conditional(c) if !c.is_if)
    }

    fn flatten_into<'s>(&'s self, out: &mut Vec<&'s Action>) {
        match self {
            Statement::Plain(a) => out.push(a),
            Statement::Block(b) => b.flatten_into(out),
            Statement::Conditional(c) => c.flatten_into(out),
        }
    }
}

/// An ordered run of statements.  Every sequence has one unnamed main
/// block, which can never be closed; explicit blocks open with a
/// `start_of_block` action and own exactly one `end_of_block` terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    action: Option<Action>,
    statements: Vec<Statement>,
    closed: bool,
    main: bool,
}

impl Block {
    fn new(action: Option<Action>) -> Block {
        Block {
            action,
            statements: Vec::new(),
            closed: false,
            main: false,
        }
    }

    fn new_main() -> Block {
        Block {
            main: true,
            ..Block::new(None)
        }
    }

    /// Place a statement, delegating into whatever open structure the last
    /// entry still offers before falling back to this block.
    fn add_statement(&mut self, stmt: Statement) -> KernelResult<()> {
        let stmt = match self.statements.last_mut() {
            Some(Statement::Conditional(last)) => match last.try_add(stmt)? {
                None => return Ok(()),
                Some(unplaced) => unplaced,
            },
            Some(Statement::Block(last)) if !last.closed => {
                return last.add_statement(stmt);
            }
            _ => stmt,
        };
        self.append(stmt)
    }

    fn append(&mut self, stmt: Statement) -> KernelResult<()> {
        if stmt.is_close() {
            if self.main {
                return Err(KernelError::SequenceStructure(
                    "end_of_block cannot be added to the main block".into(),
                ));
            }
            if self.closed {
                return Err(KernelError::SequenceStructure(
                    "block already has an end_of_block".into(),
                ));
            }
            self.closed = true;
            self.statements.push(stmt);
            return Ok(());
        }
        if stmt.is_bare_else() {
            return Err(KernelError::SequenceStructure(
                "cannot add an 'else' without a matching 'if'".into(),
            ));
        }
        self.statements.push(stmt);
        Ok(())
    }

    fn flatten_into<'s>(&'s self, out: &mut Vec<&'s Action>) {
        if let Some(a) = &self.action {
            out.push(a);
        }
        for stmt in &self.statements {
            stmt.flatten_into(out);
        }
    }

    fn pretty_into(&self, indent: usize, out: &mut String) {
        let mut inner = indent;
        if let Some(a) = &self.action {
            let _ = writeln!(out, "{}{}", "\t".repeat(indent), a.name);
            inner += 1;
        }
        for stmt in &self.statements {
            match stmt {
                Statement::Plain(a) if a.control_role == ControlRole::CloseBlock => {
                    let _ = writeln!(out, "{}{}", "\t".repeat(indent), a.name);
                }
                Statement::Plain(a) => {
                    let _ = writeln!(out, "{}{}", "\t".repeat(inner), a.name);
                }
                Statement::Block(b) => b.pretty_into(inner, out),
                Statement::Conditional(c) => c.pretty_into(inner, out),
            }
        }
    }
}

/// A conditional: one `if_*` or `else` action plus at most one contained
/// statement (its clause).  Only `if` conditionals own an else branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub action: Action,
    is_if: bool,
    body: Option<Box<Statement>>,
    else_branch: Option<Box<Conditional>>,
}

impl Conditional {
    fn new(action: Action) -> Conditional {
        let is_if = action.name.starts_with("if_");
        Conditional {
            action,
            is_if,
            body: None,
            else_branch: None,
        }
    }

    fn taken(&self) -> bool {
        self.action.taken()
    }

    /// Attempt to place a statement inside this conditional.  `Ok(None)`
    /// means placed; `Ok(Some(stmt))` hands the statement back for the
    /// caller's container to absorb.
    fn try_add(&mut self, stmt: Statement) -> KernelResult<Option<Statement>> {
        let stmt = match self.try_add_clause(stmt)? {
            None => return Ok(None),
            Some(unplaced) => unplaced,
        };
        if !self.is_if {
            return Ok(Some(stmt));
        }
        match &mut self.else_branch {
            None => {
                if let Statement::Conditional(c) = stmt {
                    if !c.is_if {
                        self.else_branch = Some(Box::new(c));
                        return Ok(None);
                    }
                    return Ok(Some(Statement::Conditional(c)));
                }
                Ok(Some(stmt))
            }
            Some(els) => els.try_add(stmt),
        }
    }

    /// The clause half of placement: fill an empty clause, or delegate into
    /// a still-open block or conditional already sitting there.
    fn try_add_clause(&mut self, stmt: Statement) -> KernelResult<Option<Statement>> {
        match &mut self.body {
            None => {
                self.body = Some(Box::new(stmt));
                Ok(None)
            }
            Some(contained) => match contained.as_mut() {
                Statement::Block(b) if !b.closed => {
                    b.add_statement(stmt)?;
                    Ok(None)
                }
                Statement::Conditional(c) => c.try_add(stmt),
                _ => Ok(Some(stmt)),
            },
        }
    }

    fn flatten_into<'s>(&'s self, out: &mut Vec<&'s Action>) {
        out.push(&self.action);
        if let Some(body) = &self.body {
            body.flatten_into(out);
        }
        if let Some(els) = &self.else_branch {
            els.flatten_into(out);
        }
    }

    fn pretty_into(&self, indent: usize, out: &mut String) {
        let _ = writeln!(out, "{}{}", "\t".repeat(indent), self.action.name);
        if let Some(body) = &self.body {
            match body.as_ref() {
                Statement::Plain(a) => {
                    let _ = writeln!(out, "{}{}", "\t".repeat(indent + 1), a.name);
                }
                Statement::Block(b) => b.pretty_into(indent + 1, out),
                Statement::Conditional(c) => c.pretty_into(indent + 1, out),
            }
        }
        if let Some(els) = &self.else_branch {
            els.pretty_into(indent, out);
        }
    }
}

/// The ordered, authored action list for one (object type, event) pair,
/// reconstructed into a statement tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionSequence {
    main: Block,
}

impl Default for Block {
    fn default() -> Block {
        Block::new_main()
    }
}

impl ActionSequence {
    pub fn new() -> ActionSequence {
        ActionSequence {
            main: Block::new_main(),
        }
    }

    /// Append the next action in authoring order.  Structural errors
    /// (misplaced `else`/`end_of_block`) are fatal to this call and leave
    /// the sequence unchanged except for any nesting already consumed.
    pub fn append(&mut self, action: Action) -> KernelResult<()> {
        self.main.add_statement(Statement::classify(action))
    }

    pub fn is_empty(&self) -> bool {
        self.main.statements.is_empty()
    }

    /// All actions in authored order, structural markers included.
    pub fn flatten(&self) -> Vec<&Action> {
        let mut out = Vec::new();
        self.main.flatten_into(&mut out);
        out
    }

    /// A fresh lazy traversal of the runtime-selected path.  Restartable:
    /// each call starts at the top.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.main.statements.iter()],
            pending: None,
        }
    }

    /// Build a sequence from the persisted flat-entry list.  The failing
    /// entry's index and action name are reported on error.
    pub fn from_entries(
        catalog: &ActionCatalog,
        entries: &[SequenceEntry],
    ) -> KernelResult<ActionSequence> {
        let mut sequence = ActionSequence::new();
        for (index, entry) in entries.iter().enumerate() {
            let name = entry.name().map_err(|e| KernelError::SequenceLoad {
                index,
                name: "<malformed>".into(),
                source: Box::new(e),
            })?;
            let empty = BTreeMap::new();
            let params = entry.params().unwrap_or(&empty);
            let result = catalog
                .create_from_map(name, params)
                .and_then(|action| sequence.append(action));
            if let Err(e) = result {
                return Err(KernelError::SequenceLoad {
                    index,
                    name: name.to_string(),
                    source: Box::new(e),
                });
            }
        }
        Ok(sequence)
    }

    /// Serialize back to the flat-entry list.  Running the result through
    /// `from_entries` reproduces an equal sequence.
    pub fn to_entries(&self) -> Vec<SequenceEntry> {
        self.flatten()
            .into_iter()
            .map(|action| SequenceEntry::new(&action.name, action.data.clone()))
            .collect()
    }

    /// Indented listing of the authored structure.
    pub fn pretty(&self) -> String {
        let mut out = String::new();
        self.main.pretty_into(0, &mut out);
        out
    }
}

/// Lazy, branch-selecting traversal.
///
/// An `if` conditional's own action is yielded before its branch is chosen:
/// executing it sets `taken`, which is read only on the next step.  `else`
/// and `end_of_block` actions are never yielded from block positions.
pub struct Walk<'s> {
    stack: Vec<std::slice::Iter<'s, Statement>>,
    pending: Option<&'s Conditional>,
}

impl<'s> Walk<'s> {
    /// Record the branch outcome for the conditional action yielded last.
    /// Equivalent to `action.set_taken()` on the yielded action; offered so
    /// consumers can stay on the walk handle.
    pub fn set_taken(&self, taken: bool) {
        if let Some(cond) = self.pending {
            cond.action.set_taken(taken);
        }
    }

    /// Start into a chosen clause statement.  Returns an action to yield
    /// immediately, or None after pushing deeper structure onto the stack.
    fn enter(&mut self, stmt: &'s Statement) -> Option<&'s Action> {
        match stmt {
            Statement::Plain(a) => Some(a),
            Statement::Block(b) => {
                self.stack.push(b.statements.iter());
                None
            }
            Statement::Conditional(c) => {
                self.pending = Some(c);
                Some(&c.action)
            }
        }
    }

    fn resolve_pending(&mut self) -> Option<&'s Action> {
        let cond = self.pending.take()?;
        let chosen: Option<&Statement> = if cond.taken() {
            cond.body.as_deref()
        } else {
            // the else action itself carries no behavior; descend straight
            // into its clause
            cond.else_branch.as_deref().and_then(|e| e.body.as_deref())
        };
        match chosen {
            Some(stmt) => self.enter(stmt),
            // incomplete conditional: nothing more on this path
            None => None,
        }
    }
}

impl<'s> Iterator for Walk<'s> {
    type Item = &'s Action;

    fn next(&mut self) -> Option<&'s Action> {
        if self.pending.is_some() {
            if let Some(action) = self.resolve_pending() {
                return Some(action);
            }
        }
        loop {
            let frame = self.stack.last_mut()?;
            match frame.next() {
                None => {
                    self.stack.pop();
                }
                Some(stmt) => match stmt {
                    Statement::Plain(a) if a.control_role == ControlRole::CloseBlock => {
                        // a closer ends its enclosing block without being
                        // yielded
                        self.stack.pop();
                    }
                    Statement::Plain(a) => return Some(a),
                    Statement::Block(b) => {
                        self.stack.push(b.statements.iter());
                    }
                    Statement::Conditional(c) => {
                        self.pending = Some(c);
                        return Some(&c.action);
                    }
                },
            }
        }
    }
}
