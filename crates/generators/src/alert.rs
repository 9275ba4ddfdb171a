//! AlertGenerator - binary triggered / resolved process per patient

use contracts::{AlertConfig, ContractError, PatientEvent, PatientId, SignalGenerator};
use tracing::trace;

use crate::random::{RandomSource, StdRandom};

const TRIGGERED: &str = "triggered";
const RESOLVED: &str = "resolved";

/// Per-patient alert state machine.
///
/// A resolved patient triggers with probability `1 - e^-λ`; a triggered patient
/// resolves with `resolve_probability`. Only transitions are emitted, so an
/// active alert stays silent until it resolves.
#[derive(Debug)]
pub struct AlertGenerator<R = StdRandom> {
    config: AlertConfig,
    trigger_probability: f64,
    /// Indexed by patient id, slot 0 unused
    triggered: Vec<bool>,
    random: R,
}

impl AlertGenerator<StdRandom> {
    /// Create with entropy-seeded randomness
    pub fn new(config: AlertConfig, patient_count: u32) -> Self {
        Self::with_random(config, patient_count, StdRandom::from_entropy())
    }
}

impl<R: RandomSource> AlertGenerator<R> {
    /// Create with an explicit randomness source; every patient starts resolved
    pub fn with_random(config: AlertConfig, patient_count: u32, random: R) -> Self {
        let trigger_probability = config.trigger_probability();
        Self {
            config,
            trigger_probability,
            triggered: vec![false; patient_count as usize + 1],
            random,
        }
    }

    /// Current state, `None` for ids outside the population
    pub fn is_triggered(&self, patient_id: PatientId) -> Option<bool> {
        self.triggered.get(patient_id.get() as usize).copied()
    }

    fn slot(&mut self, patient_id: PatientId) -> Result<&mut bool, ContractError> {
        let capacity = self.patient_capacity();
        let label = &self.config.label;
        self.triggered
            .get_mut(patient_id.get() as usize)
            .ok_or_else(|| ContractError::unknown_patient(label.as_str(), patient_id.get(), capacity))
    }
}

impl<R: RandomSource> SignalGenerator for AlertGenerator<R> {
    fn label(&self) -> &str {
        &self.config.label
    }

    fn patient_capacity(&self) -> u32 {
        (self.triggered.len() - 1) as u32
    }

    fn generate(&mut self, patient_id: PatientId) -> Result<Option<PatientEvent>, ContractError> {
        let active = *self.slot(patient_id)?;
        let draw = self.random.next_unit();

        let next = if active {
            (draw < self.config.resolve_probability).then_some((false, RESOLVED))
        } else {
            (draw < self.trigger_probability).then_some((true, TRIGGERED))
        };

        let Some((state, value)) = next else {
            return Ok(None);
        };

        *self.slot(patient_id)? = state;
        trace!(patient_id = %patient_id, draw, value, "Alert transition");

        Ok(Some(PatientEvent::now(
            patient_id,
            self.config.label.as_str(),
            value,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;

    fn patient(id: u32) -> PatientId {
        PatientId::new(id).unwrap()
    }

    #[test]
    fn test_trigger_then_hold() {
        let random = ScriptedRandom::units(vec![0.05, 0.95]);
        let mut generator = AlertGenerator::with_random(AlertConfig::default(), 1, random);
        assert_eq!(generator.is_triggered(patient(1)), Some(false));

        let event = generator.generate(patient(1)).unwrap().unwrap();
        assert_eq!(event.label(), "Alert");
        assert_eq!(event.value(), "triggered");
        assert_eq!(event.patient_id(), patient(1));
        assert_eq!(generator.is_triggered(patient(1)), Some(true));

        // 0.95 is above the 0.9 resolve threshold: alert stays active, nothing emitted
        assert!(generator.generate(patient(1)).unwrap().is_none());
        assert_eq!(generator.is_triggered(patient(1)), Some(true));
    }

    #[test]
    fn test_resolve_below_threshold() {
        let random = ScriptedRandom::units(vec![0.0, 0.5]);
        let mut generator = AlertGenerator::with_random(AlertConfig::default(), 2, random);

        generator.generate(patient(2)).unwrap();
        let event = generator.generate(patient(2)).unwrap().unwrap();
        assert_eq!(event.value(), "resolved");
        assert_eq!(generator.is_triggered(patient(2)), Some(false));
    }

    #[test]
    fn test_stay_resolved_above_trigger_probability() {
        let random = ScriptedRandom::units(vec![0.0952]);
        let mut generator = AlertGenerator::with_random(AlertConfig::default(), 1, random);
        assert!(generator.generate(patient(1)).unwrap().is_none());
        assert_eq!(generator.is_triggered(patient(1)), Some(false));
    }

    #[test]
    fn test_unknown_patient_is_error() {
        let mut generator =
            AlertGenerator::with_random(AlertConfig::default(), 3, ScriptedRandom::default());
        let err = generator.generate(patient(4)).unwrap_err();
        assert!(matches!(
            err,
            ContractError::UnknownPatient {
                patient_id: 4,
                capacity: 3,
                ..
            }
        ));
        assert_eq!(generator.is_triggered(patient(4)), None);
    }

    #[test]
    fn test_alternates_for_every_patient() {
        let mut generator =
            AlertGenerator::with_random(AlertConfig::default(), 20, StdRandom::seeded(11));
        let mut last: Vec<Option<String>> = vec![None; 21];

        for _ in 0..500 {
            for id in PatientId::population(20) {
                if let Some(event) = generator.generate(id).unwrap() {
                    let slot = &mut last[id.get() as usize];
                    let expected = match slot.as_deref() {
                        None | Some("resolved") => "triggered",
                        _ => "resolved",
                    };
                    assert_eq!(event.value(), expected);
                    *slot = Some(event.value().to_string());
                }
            }
        }
    }

    #[test]
    fn test_empirical_trigger_rate() {
        // Resolve immediately so every draw from the resolved state is a trial
        let config = AlertConfig {
            resolve_probability: 1.0,
            ..AlertConfig::default()
        };
        let mut generator = AlertGenerator::with_random(config, 1, StdRandom::seeded(2024));
        let mut trials = 0u32;
        let mut triggers = 0u32;

        for _ in 0..200_000 {
            let was_triggered = generator.is_triggered(patient(1)).unwrap();
            let event = generator.generate(patient(1)).unwrap();
            if !was_triggered {
                trials += 1;
                if event.is_some() {
                    triggers += 1;
                }
            }
        }

        let rate = f64::from(triggers) / f64::from(trials);
        let expected = 1.0 - (-0.1f64).exp();
        assert!(
            (rate - expected).abs() < 0.005,
            "rate {rate} too far from {expected}"
        );
    }
}
