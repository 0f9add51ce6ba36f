//! Form Fuzzer - Random configurations against the update loop
//!
//! Tests:
//! - Convergence: every edit settles within the pass ceiling
//! - Idempotence: a settle pass on a settled form mutates nothing
//! - Consistency: enabled fields match their activation condition and no
//!   field whose clear condition holds keeps a value
//!
//! Generated configurations only depend on earlier fields and only affect
//! later ones, and clear conditions are a subset of activation conditions.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use combo_core::{
    AffectKeys, AffectRule, ComboError, Condition, FieldConfig, FieldStates, FieldType, FieldValue,
    Record,
};
use combo_state::{ComboForm, UpdateEvent};
use combo_transport::NoLookup;

use crate::Scenario;

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of fields on the form
    pub field_count: usize,
    /// Number of user edits to replay
    pub edit_count: usize,
    /// Distinct values per field
    pub value_count: usize,
    /// Probability that a field depends on an earlier one
    pub condition_prob: f64,
    /// Probability that a field feeds a later one
    pub affects_prob: f64,
    /// Probability that an edit clears instead of selecting
    pub clear_prob: f64,
    /// Probability that a field is multi-valued
    pub multiple_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            field_count: 8,
            edit_count: 500,
            value_count: 4,
            condition_prob: 0.4,
            affects_prob: 0.2,
            clear_prob: 0.2,
            multiple_prob: 0.1,
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            field_count: 5,
            edit_count: 100,
            value_count: 3,
            ..Default::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzerConfig {
            field_count: 24,
            edit_count: 5000,
            value_count: 6,
            condition_prob: 0.6,
            affects_prob: 0.3,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Convergence check result
#[derive(Debug)]
pub enum ConvergenceResult {
    Converged,
    /// Edits (by index) that hit the pass ceiling
    Diverged(Vec<usize>),
}

impl ConvergenceResult {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Fuzzing result
#[derive(Debug)]
pub struct FuzzResult {
    pub convergence: ConvergenceResult,
    /// Edits applied
    pub edits: usize,
    /// Edits skipped because the field was disabled
    pub skipped: usize,
    /// Most passes a single edit needed
    pub max_passes: usize,
    pub idempotence_violations: usize,
    /// Human-readable descriptions of consistency violations
    pub consistency_violations: Vec<String>,
}

impl FuzzResult {
    pub fn new() -> Self {
        FuzzResult {
            convergence: ConvergenceResult::Converged,
            edits: 0,
            skipped: 0,
            max_passes: 0,
            idempotence_violations: 0,
            consistency_violations: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.convergence.is_converged()
            && self.idempotence_violations == 0
            && self.consistency_violations.is_empty()
    }
}

impl Default for FuzzResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Form fuzzer
pub struct FormFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    configs: Vec<FieldConfig>,
}

impl FormFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        FormFuzzer {
            config,
            rng,
            configs: Vec::new(),
        }
    }

    fn field_type(index: usize) -> FieldType {
        FieldType::new(format!("f{}", index))
    }

    /// Generate the field configurations
    pub fn generate_configs(&mut self) -> Vec<FieldConfig> {
        let count = self.config.field_count;
        let mut configs = Vec::with_capacity(count);

        for i in 0..count {
            let mut config = FieldConfig::new(format!("f{}", i), Self::field_type(i))
                .with_multiple(self.rng.gen_bool(self.config.multiple_prob));

            if i > 0 && self.rng.gen_bool(self.config.condition_prob) {
                let mut parents: Vec<FieldType> = (0..i)
                    .filter(|_| self.rng.gen_bool(0.5))
                    .map(Self::field_type)
                    .collect();
                if parents.is_empty() {
                    parents.push(Self::field_type(self.rng.gen_range(0..i)));
                }
                let cleared: Vec<FieldType> = parents
                    .iter()
                    .filter(|_| self.rng.gen_bool(0.5))
                    .cloned()
                    .collect();

                config = config.with_active_when(Condition::Fields(parents));
                if !cleared.is_empty() {
                    config = config.with_clear_when(Condition::Fields(cleared));
                }
            }

            for target in (i + 1)..count {
                if self.rng.gen_bool(self.config.affects_prob) {
                    config = config.with_affects(
                        Self::field_type(target),
                        AffectRule::Keys(AffectKeys {
                            id: Some("link_id".to_string()),
                            value: "link".to_string(),
                        }),
                    );
                }
            }
            configs.push(config);
        }

        self.configs = configs.clone();
        configs
    }

    fn random_value(&mut self, multiple: bool) -> FieldValue {
        let count = if multiple { self.rng.gen_range(1..=2) } else { 1 };
        let records = (0..count)
            .map(|_| {
                let k = self.rng.gen_range(0..self.config.value_count);
                Record::new(format!("v{}", k), format!("V{}", k))
                    .with_attribute("link_id", format!("l{}", k))
                    .with_attribute("link", format!("L{}", k))
            })
            .collect();
        FieldValue::from_records(records, multiple)
    }

    /// Run the fuzzer
    pub fn run(&mut self) -> FuzzResult {
        let configs = self.generate_configs();
        let mut result = FuzzResult::new();

        let mut form = match Scenario::new(configs).and_then(|s| s.form(Arc::new(NoLookup))) {
            Ok(form) => form,
            Err(err) => {
                result.consistency_violations.push(format!("setup failed: {}", err));
                return result;
            }
        };
        let mut diverged = Vec::new();

        for edit in 0..self.config.edit_count {
            let index = self.rng.gen_range(0..self.config.field_count);
            let field_type = Self::field_type(index);
            if !form.is_enabled(&field_type) {
                result.skipped += 1;
                continue;
            }

            let outcome = if self.rng.gen_bool(self.config.clear_prob) {
                form.clear(&field_type)
            } else {
                let multiple = self.configs[index].multiple;
                let value = self.random_value(multiple);
                form.select(&field_type, value)
            };
            result.edits += 1;

            match outcome {
                Ok(report) => result.max_passes = result.max_passes.max(report.passes),
                Err(ComboError::PropagationLimit { .. }) => {
                    diverged.push(edit);
                    continue;
                }
                Err(err) => {
                    result.consistency_violations.push(format!("edit {}: {}", edit, err));
                    continue;
                }
            }

            match form.update(UpdateEvent::settle()) {
                Ok(report) if report.mutations() == 0 => {}
                _ => result.idempotence_violations += 1,
            }
            self.check_consistency(&form, edit, &mut result.consistency_violations);
        }

        if !diverged.is_empty() {
            result.convergence = ConvergenceResult::Diverged(diverged);
        }
        tracing::debug!(
            seed = self.config.seed,
            edits = result.edits,
            skipped = result.skipped,
            max_passes = result.max_passes,
            "fuzz run finished"
        );
        result
    }

    fn check_consistency(&self, form: &ComboForm, edit: usize, violations: &mut Vec<String>) {
        let view = form.view();
        for config in &self.configs {
            let ty = &config.field_type;
            if let Some(Condition::Fields(types)) = &config.active_when {
                if form.is_enabled(ty) != view.are_set(types, false) {
                    violations.push(format!("edit {}: {} enabled state is stale", edit, ty));
                }
            }
            if let Some(Condition::Fields(types)) = &config.clear_when {
                if !view.are_set(types, true) && !form.is_empty(ty) {
                    violations.push(format!("edit {}: {} holds a value it should clear", edit, ty));
                }
            }
        }
    }
}
