//! # Generators
//!
//! Per-patient stochastic signal generators.
//!
//! Responsibilities:
//! - Hold per-patient state for a fixed population (ids `1..=N`)
//! - Decide, once per tick, whether a patient emits an event and what it carries
//! - Run one tick across the whole population without letting a single failure abort it

mod alert;
mod random;
mod saturation;
mod set;

pub use alert::AlertGenerator;
pub use contracts::{PatientEvent, PatientId, SignalGenerator};
pub use random::{RandomSource, ScriptedRandom, StdRandom};
pub use saturation::SaturationGenerator;
pub use set::{build_generator, BoxedGenerator, GeneratorSet, TickReport};
