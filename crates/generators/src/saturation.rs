//! SaturationGenerator - clamped random walk per patient

use contracts::{ContractError, PatientEvent, PatientId, SaturationConfig, SignalGenerator};
use tracing::trace;

use crate::random::{RandomSource, StdRandom};

/// Bounded random walk, one step of `{-1, 0, +1}` per tick.
///
/// Never silent: every call emits the new value.
#[derive(Debug)]
pub struct SaturationGenerator<R = StdRandom> {
    config: SaturationConfig,
    /// Indexed by patient id, slot 0 unused
    last_values: Vec<u32>,
    random: R,
}

impl SaturationGenerator<StdRandom> {
    /// Create with entropy-seeded randomness
    pub fn new(config: SaturationConfig, patient_count: u32) -> Self {
        Self::with_random(config, patient_count, StdRandom::from_entropy())
    }
}

impl<R: RandomSource> SaturationGenerator<R> {
    /// Create and seed each patient uniformly from `[baseline_min, baseline_max]`
    pub fn with_random(config: SaturationConfig, patient_count: u32, mut random: R) -> Self {
        let span = config.baseline_max.saturating_sub(config.baseline_min) + 1;
        let mut last_values = vec![0; patient_count as usize + 1];
        for value in last_values.iter_mut().skip(1) {
            *value = config.baseline_min + random.next_below(span);
        }

        Self {
            config,
            last_values,
            random,
        }
    }

    /// Create with explicit starting values for patients `1..=values.len()`
    pub fn with_initial_values(config: SaturationConfig, values: &[u32], random: R) -> Self {
        let mut last_values = Vec::with_capacity(values.len() + 1);
        last_values.push(0);
        last_values.extend(values.iter().map(|v| (*v).clamp(config.min, config.max)));

        Self {
            config,
            last_values,
            random,
        }
    }

    /// Last emitted (or seeded) value, `None` for ids outside the population
    pub fn last_value(&self, patient_id: PatientId) -> Option<u32> {
        self.last_values.get(patient_id.get() as usize).copied()
    }

    fn step(&mut self) -> i64 {
        i64::from(self.random.next_below(3)) - 1
    }
}

impl<R: RandomSource> SignalGenerator for SaturationGenerator<R> {
    fn label(&self) -> &str {
        &self.config.label
    }

    fn patient_capacity(&self) -> u32 {
        (self.last_values.len() - 1) as u32
    }

    fn generate(&mut self, patient_id: PatientId) -> Result<Option<PatientEvent>, ContractError> {
        let index = patient_id.get() as usize;
        let Some(&last) = self.last_values.get(index) else {
            return Err(ContractError::unknown_patient(
                self.config.label.as_str(),
                patient_id.get(),
                self.patient_capacity(),
            ));
        };

        let delta = self.step();
        let next = (i64::from(last) + delta)
            .clamp(i64::from(self.config.min), i64::from(self.config.max)) as u32;
        self.last_values[index] = next;

        trace!(patient_id = %patient_id, last, delta, next, "Saturation step");

        Ok(Some(PatientEvent::now(
            patient_id,
            self.config.label.as_str(),
            format!("{:.1}%", f64::from(next)),
        )))
    }
}
