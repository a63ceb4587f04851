//! Shared data models for the Artifex daemon.
//!
//! Everything that crosses a crate boundary lives here: the domain enums,
//! the persisted record shapes, the HTTP request/response payloads, and the
//! event-stream payloads broadcast by the scan and auto-apply engines.

pub mod api;
pub mod events;
pub mod kinds;
pub mod records;

pub use api::*;
pub use events::*;
pub use kinds::*;
pub use records::*;
