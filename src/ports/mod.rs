//! Port traits defining external boundaries.
//!
//! The only boundary the core crosses is tool execution. Implementations live
//! in `src/adapters/`.

pub mod tools;

pub use tools::{ToolBackend, ToolError};
