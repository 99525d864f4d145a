//! Shared runtime machinery used by every role: the multiplexer session
//! abstraction spec §4.3 asks for, layered on the `yamux` crate.

pub mod mux;

pub use mux::{MuxError, MuxStream, Session};
pub use yamux::Mode;
