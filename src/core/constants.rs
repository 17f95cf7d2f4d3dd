//! Engine constants and configuration defaults.
//!
//! Defaults match the values designers start from in a fresh scenario.

// =============================================================================
// SIMULATION DEFAULTS
// =============================================================================

/// Trials per encounter simulation.
pub const DEFAULT_TRIALS: u32 = 10_000;

/// Rounds before a trial is truncated as a non-kill.
pub const DEFAULT_MAX_ROUNDS: u32 = 12;

/// Largest accepted round cap; per-round tables are sized by it.
pub const MAX_ROUNDS_LIMIT: u32 = 1_000;

/// Party per-round damage coefficient of variation.
pub const DEFAULT_DPR_CV: f64 = 0.60;

/// TTK percentiles reported alongside the median.
pub const DEFAULT_PERCENTILES: [f64; 3] = [10.0, 50.0, 90.0];

/// Coefficient of variation for lair and recharge damage per target.
pub const AREA_DAMAGE_CV: f64 = 0.50;

/// Most dice one term of a damage expression may roll.
pub const MAX_DICE_PER_TERM: i32 = 1_000;

/// Floor for AC after riders reduce it.
pub const MIN_EFFECTIVE_AC: i32 = 1;

// =============================================================================
// GUARDRAIL DEFAULTS
// =============================================================================

/// A fight over by this round counts as a steamroll.
pub const DEFAULT_FAST_TTK: u32 = 2;

/// A fight lasting at least this many rounds counts as a slog.
pub const DEFAULT_SLOW_TTK: u32 = 8;

pub const DEFAULT_MAX_FAST_PROB: f64 = 0.10;
pub const DEFAULT_MAX_SLOW_PROB: f64 = 0.10;

/// PCs down at victory considered a costly win.
pub const DEFAULT_PCS_DOWN_K: usize = 2;
pub const DEFAULT_MAX_PCS_DOWN_PROB: f64 = 0.25;

pub const DEFAULT_TPK_CAP: f64 = 0.05;

// =============================================================================
// AUTO-TUNE
// =============================================================================

pub const DEFAULT_TARGET_MEDIAN: f64 = 4.0;
pub const DEFAULT_HP_LOW: f64 = 1.0;
pub const DEFAULT_HP_HIGH: f64 = 300.0;

/// Probe runs use this share of the full trial count...
pub const PROBE_TRIAL_FRACTION: f64 = 0.4;
/// ...but never fewer than this.
pub const MIN_PROBE_TRIALS: u32 = 3_000;

/// Median within this many rounds of the target ends the search.
pub const DEFAULT_TUNE_TOLERANCE: f64 = 0.05;
pub const DEFAULT_TUNE_ITERATIONS: u32 = 16;

/// Hard cap on doubling the upper HP bound while bracketing.
pub const MAX_BOUND_EXPANSIONS: u32 = 12;
