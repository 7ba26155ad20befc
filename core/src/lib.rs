//! playfield-core — the runtime simulation kernel of a GameMaker-style 2D
//! engine.
//!
//! Three pieces do the real work and stay consistent with each other: the
//! event bus (queued, named messages delivered to registered object
//! types), the action-sequence engine (a flat authored action list
//! reconstructed into nested control flow and walked lazily along the
//! runtime-chosen branch), and the collision engine (mask overlap tests,
//! finite-difference collision normals, solid-body separation).  The
//! `Kernel` in `engine` ties them together into a fixed per-frame order.

pub mod action;
pub mod bus;
pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod instance;
pub mod language;
pub mod object;
pub mod rng;
pub mod sequence;
pub mod symbols;
pub mod types;

pub use error::{KernelError, KernelResult};
