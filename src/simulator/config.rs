//! Simulation configuration.

use crate::combatants::input::EncounterSpec;
use crate::combatants::types::Encounter;
use crate::core::constants::*;
use crate::encounter::InitiativeMode;
use crate::error::{ConfigError, LoadError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Probability thresholds checked against a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guardrails {
    /// A kill in this many rounds or fewer counts as a steamroll.
    pub fast_ttk: u32,
    pub max_fast_prob: f64,

    /// A kill taking this many rounds or more counts as a slog.
    pub slow_ttk: u32,
    pub max_slow_prob: f64,

    /// Flag victories with at least this many PCs down.
    pub pcs_down_k: usize,
    pub max_pcs_down_prob: f64,

    pub tpk_cap: f64,
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            fast_ttk: DEFAULT_FAST_TTK,
            max_fast_prob: DEFAULT_MAX_FAST_PROB,
            slow_ttk: DEFAULT_SLOW_TTK,
            max_slow_prob: DEFAULT_MAX_SLOW_PROB,
            pcs_down_k: DEFAULT_PCS_DOWN_K,
            max_pcs_down_prob: DEFAULT_MAX_PCS_DOWN_PROB,
            tpk_cap: DEFAULT_TPK_CAP,
        }
    }
}

impl Guardrails {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("max_fast_prob", self.max_fast_prob),
            ("max_slow_prob", self.max_slow_prob),
            ("max_pcs_down_prob", self.max_pcs_down_prob),
            ("tpk_cap", self.tpk_cap),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidGuardrail { name, value });
            }
        }
        Ok(())
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of independent trials
    pub trials: u32,

    /// Rounds before a trial is cut off as a non-kill
    pub max_rounds: u32,

    /// Base seed; trial i uses `seed + i` (None = random)
    pub seed: Option<u64>,

    pub initiative: InitiativeMode,

    /// Coefficient of variation of each PC's per-round damage
    pub dpr_cv: f64,

    /// TTK percentiles to report, in [0, 100]
    pub percentiles: Vec<f64>,

    pub guardrails: Guardrails,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            seed: None,
            initiative: InitiativeMode::Random,
            dpr_cv: DEFAULT_DPR_CV,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            guardrails: Guardrails::default(),
        }
    }
}

impl SimConfig {
    /// Small seeded run for quick checks and tests.
    pub fn quick(trials: u32, seed: u64) -> Self {
        Self {
            trials,
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.max_rounds > MAX_ROUNDS_LIMIT {
            return Err(ConfigError::OutOfRange {
                what: "max rounds",
                value: self.max_rounds as f64,
            });
        }
        if !self.dpr_cv.is_finite() || self.dpr_cv <= 0.0 {
            return Err(ConfigError::InvalidCv { cv: self.dpr_cv });
        }
        if let Some(&p) = self
            .percentiles
            .iter()
            .find(|p| !(0.0..=100.0).contains(*p))
        {
            return Err(ConfigError::InvalidPercentile { p });
        }
        self.guardrails.validate()
    }
}

/// Auto-tuner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneConfig {
    /// Median TTK to aim for, in rounds
    pub target_median: f64,

    /// Highest acceptable TPK probability at the tuned HP
    pub tpk_cap: f64,

    pub hp_low: f64,
    pub hp_high: f64,

    /// Trials per probe (None = max(3000, 40% of the run's trials))
    pub probe_trials: Option<u32>,

    /// Accept a probe whose median is this close to the target
    pub tolerance: f64,

    pub max_iterations: u32,

    /// Times the upper bound may double when it is too low
    pub bound_expansions: u32,
}

impl Default for TuneConfig {
    fn default() -> Self {
        Self {
            target_median: DEFAULT_TARGET_MEDIAN,
            tpk_cap: DEFAULT_TPK_CAP,
            hp_low: DEFAULT_HP_LOW,
            hp_high: DEFAULT_HP_HIGH,
            probe_trials: None,
            tolerance: DEFAULT_TUNE_TOLERANCE,
            max_iterations: DEFAULT_TUNE_ITERATIONS,
            bound_expansions: 0,
        }
    }
}

impl TuneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_median.is_finite() || self.target_median <= 0.0 {
            return Err(ConfigError::OutOfRange {
                what: "target median",
                value: self.target_median,
            });
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::OutOfRange {
                what: "tune tolerance",
                value: self.tolerance,
            });
        }
        if !(0.0..=1.0).contains(&self.tpk_cap) {
            return Err(ConfigError::InvalidGuardrail {
                name: "tpk_cap",
                value: self.tpk_cap,
            });
        }
        if !(self.hp_low.is_finite() && self.hp_high.is_finite())
            || self.hp_low <= 0.0
            || self.hp_low >= self.hp_high
        {
            return Err(ConfigError::InvalidBounds {
                low: self.hp_low,
                high: self.hp_high,
            });
        }
        if self.probe_trials == Some(0) {
            return Err(ConfigError::NoTrials);
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::OutOfRange {
                what: "max iterations",
                value: 0.0,
            });
        }
        if self.bound_expansions > MAX_BOUND_EXPANSIONS {
            return Err(ConfigError::OutOfRange {
                what: "bound expansions",
                value: self.bound_expansions as f64,
            });
        }
        Ok(())
    }

    /// Trials per probe for a run configured with `trials`.
    pub fn probe_trials_for(&self, trials: u32) -> u32 {
        self.probe_trials.unwrap_or_else(|| {
            let share = (trials as f64 * PROBE_TRIAL_FRACTION).round() as u32;
            share.max(MIN_PROBE_TRIALS)
        })
    }
}

/// A scenario file: the encounter plus optional run and tune settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(flatten)]
    pub encounter: EncounterSpec,
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub tune: TuneConfig,
}

/// A validated scenario, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub encounter: Encounter,
    pub sim: SimConfig,
    pub tune: TuneConfig,
}

impl ScenarioFile {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every part, failing on the first problem.
    pub fn validate(&self) -> Result<Scenario, ConfigError> {
        let encounter = self.encounter.validate()?;
        self.sim.validate()?;
        self.tune.validate()?;
        Ok(Scenario {
            encounter,
            sim: self.sim.clone(),
            tune: self.tune.clone(),
        })
    }

    /// Read and validate in one step.
    pub fn load(path: &Path) -> Result<Scenario, LoadError> {
        Ok(Self::read(path)?.validate()?)
    }
}
