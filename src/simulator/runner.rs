//! Encounter simulation runner.
//!
//! Trials are independent, so they run on the rayon pool. Trial `i` seeds its
//! own `ChaCha8Rng` with `base_seed + i`, which keeps results identical no
//! matter how the work is split across threads.

use super::config::SimConfig;
use super::report::AggregateResult;
use crate::cancel::CancelToken;
use crate::combatants::types::Encounter;
use crate::encounter::round::RoundResolver;
use crate::encounter::trial::{run_trial, TrialOutcome};
use crate::error::ConfigError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{info, warn};

/// Run every trial and aggregate the outcomes.
///
/// # Arguments
/// * `encounter` - Validated party and boss
/// * `config` - Trial count, round cap, seed and guardrails
/// * `cancel` - Checked before each trial; a cancelled run returns the
///   trials that finished, marked incomplete
///
/// # Returns
/// The aggregate, or a `ConfigError` if `encounter` or `config` is
/// invalid. No trial runs on an invalid input.
pub fn run_simulation(
    encounter: &Encounter,
    config: &SimConfig,
    cancel: Option<&CancelToken>,
) -> Result<AggregateResult, ConfigError> {
    encounter.validate()?;
    config.validate()?;
    let seed = config.seed.unwrap_or_else(rand::random);

    info!(
        boss = %encounter.boss.name,
        boss_hp = encounter.boss.max_hp,
        trials = config.trials,
        max_rounds = config.max_rounds,
        seed,
        "starting simulation"
    );

    let (outcomes, complete) = run_trials(encounter, config, seed, cancel);
    let result = AggregateResult::from_outcomes(outcomes, config, seed, complete);

    if !complete {
        warn!(
            finished = result.summary.trials,
            requested = config.trials,
            "simulation cancelled, returning partial results"
        );
    }
    for check in result.guardrails.failures() {
        warn!(
            guardrail = check.name,
            value = check.value,
            limit = check.limit,
            "guardrail failed"
        );
    }
    info!(
        median_ttk = ?result.median_ttk(),
        tpk = result.tpk_prob(),
        "simulation finished"
    );

    Ok(result)
}

/// Run the raw trials. Returns the finished outcomes in trial order and
/// whether every trial ran.
pub fn run_trials(
    encounter: &Encounter,
    config: &SimConfig,
    seed: u64,
    cancel: Option<&CancelToken>,
) -> (Vec<TrialOutcome>, bool) {
    let resolver = RoundResolver::new(encounter, config.initiative, config.dpr_cv);

    let results: Vec<Option<TrialOutcome>> = (0..config.trials)
        .into_par_iter()
        .map(|trial_idx| {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return None;
            }
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(trial_idx as u64));
            Some(run_trial(&resolver, config.max_rounds, &mut rng))
        })
        .collect();

    let complete = results.iter().all(Option::is_some);
    (results.into_iter().flatten().collect(), complete)
}
