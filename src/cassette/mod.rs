//! Cassettes: persisted runs and the recorder that produces them.

pub mod codec;
pub mod recorder;

pub use codec::{decode, encode, load, save, CassetteError, Format};
pub use recorder::Recorder;
