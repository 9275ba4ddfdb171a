//! PatientId - stable patient identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Positive patient identifier.
///
/// Generators size their state for ids `1..=patient_count`; slot 0 is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PatientId(u32);

impl PatientId {
    /// Create a patient id, rejecting 0
    pub fn new(id: u32) -> Option<Self> {
        (id > 0).then_some(Self(id))
    }

    /// Raw numeric id
    pub fn get(self) -> u32 {
        self.0
    }

    /// Iterate over all ids of a population of `count` patients (`1..=count`)
    pub fn population(count: u32) -> impl Iterator<Item = PatientId> {
        (1..=count).map(Self)
    }
}

impl TryFrom<u32> for PatientId {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "patient id must be positive".to_string())
    }
}

impl From<PatientId> for u32 {
    fn from(id: PatientId) -> Self {
        id.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
