//! SignalGenerator trait - per-signal stateful producer

use crate::{ContractError, PatientEvent, PatientId};

/// Stateful per-patient signal producer.
///
/// Invoked once per patient per tick. `&mut self` keeps calls for one
/// instance strictly sequential; distinct instances are independent.
pub trait SignalGenerator {
    /// Label stamped on every produced event
    fn label(&self) -> &str;

    /// Highest patient id this generator holds state for
    fn patient_capacity(&self) -> u32;

    /// Advance the patient's state by one tick
    ///
    /// `Ok(None)` means the generator chose to stay silent this tick.
    ///
    /// # Errors
    /// `ContractError::UnknownPatient` if the id is outside the allocated population.
    fn generate(&mut self, patient_id: PatientId) -> Result<Option<PatientEvent>, ContractError>;
}
