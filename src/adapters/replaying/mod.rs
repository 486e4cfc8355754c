//! Replaying adapters that serve recorded tool results.

pub mod tools;

pub use tools::ReplayingTools;
