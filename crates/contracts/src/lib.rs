//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Event timestamps are wall-clock unix milliseconds stamped at emission time
//! - Patient ids are positive; id 0 is never valid

mod blueprint;
mod error;
mod event;
mod generator;
mod patient;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use event::PatientEvent;
pub use generator::SignalGenerator;
pub use patient::PatientId;
pub use sink::*;
