//! In-tree adapters for the engine's ports.

pub mod dispatch;

pub use dispatch::{ClosureDispatcher, ScriptedDispatcher};
