//! Recording adapters that capture tool calls for a cassette.

pub mod tools;

pub use tools::RecordingTools;
