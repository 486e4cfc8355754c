//! Live adapters that run real code.

pub mod tools;

pub use tools::ToolRegistry;
