//! PatientEvent - generator output, sink input

use serde::{Deserialize, Serialize};

use crate::PatientId;

/// One emitted vital-sign sample.
///
/// Immutable once built: fields are private and only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientEvent {
    patient_id: PatientId,
    timestamp: i64,
    label: String,
    value: String,
}

impl PatientEvent {
    /// Build an event with an explicit timestamp (unix millis)
    pub fn new(
        patient_id: PatientId,
        timestamp: i64,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            patient_id,
            timestamp,
            label: label.into(),
            value: value.into(),
        }
    }

    /// Build an event stamped with the current wall-clock time
    pub fn now(patient_id: PatientId, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            patient_id,
            chrono::Utc::now().timestamp_millis(),
            label,
            value,
        )
    }

    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    /// Emission time, unix milliseconds
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}
