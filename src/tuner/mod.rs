//! Boss HP auto-tuner.
//!
//! Median TTK is treated as non-decreasing in boss HP, so a bisection over
//! HP finds the value that hits a target median. Every probe reuses the same
//! base seed so neighbouring probes see the same dice, which keeps the
//! measured median close to monotonic.

use crate::cancel::CancelToken;
use crate::combatants::types::Encounter;
use crate::error::ConfigError;
use crate::simulator::{run_simulation, AggregateResult, SimConfig, TuneConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

/// One evaluated HP value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probe {
    pub hp: f64,
    /// Infinite when no trial killed the boss.
    pub median_ttk: f64,
    pub tpk_prob: f64,
}

impl Probe {
    fn distance(&self, target: f64) -> f64 {
        (self.median_ttk - target).abs()
    }
}

/// Why the tuner could not settle on an acceptable HP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceFailure {
    /// No HP inside the bounds reaches the target median.
    TargetOutOfRange {
        closest_hp: f64,
        median_ttk: f64,
        tpk_prob: f64,
    },
    /// The target is bracketed, but the bisection ran out of iterations
    /// before any probe came within tolerance.
    IterationsExhausted {
        closest_hp: f64,
        median_ttk: f64,
        tpk_prob: f64,
    },
    /// The target median is met but the TPK rate is above the cap.
    TpkCapExceeded {
        hp: f64,
        median_ttk: f64,
        tpk_prob: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TuneOutcome {
    Converged,
    Failed(ConvergenceFailure),
    /// Stopped early; `hp` is the best probe seen so far.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct TuneReport {
    pub hp: f64,
    pub outcome: TuneOutcome,
    pub probes: Vec<Probe>,
    /// Full-trial run at `hp`. Missing only when cancelled before it
    /// started; a run cancelled midway is kept with `complete == false`.
    pub verification: Option<AggregateResult>,
}

impl TuneReport {
    pub fn converged(&self) -> bool {
        self.outcome == TuneOutcome::Converged
    }

    /// Generate a text report.
    pub fn to_text(&self) -> String {
        let mut report = String::new();
        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str("                      BOSS HP AUTO-TUNE\n");
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str("── PROBES ───────────────────────────────────────────────────────\n");
        report.push_str("      HP   Median TTK     TPK\n");
        report.push_str("  ──────   ──────────   ─────\n");
        for probe in &self.probes {
            report.push_str(&format!(
                "  {:6.0}   {:>10.2}   {:>4.1}%\n",
                probe.hp,
                probe.median_ttk,
                probe.tpk_prob * 100.0
            ));
        }
        report.push('\n');

        report.push_str("── RESULT ───────────────────────────────────────────────────────\n");
        report.push_str(&format!("  Tuned HP:  {:.0}\n", self.hp));
        let verdict = match self.outcome {
            TuneOutcome::Converged => "✓ converged".to_string(),
            TuneOutcome::Cancelled => "cancelled (best probe so far)".to_string(),
            TuneOutcome::Failed(ConvergenceFailure::TargetOutOfRange { closest_hp, .. }) => {
                format!("✗ target median out of range (closest HP {:.0})", closest_hp)
            }
            TuneOutcome::Failed(ConvergenceFailure::IterationsExhausted { closest_hp, .. }) => {
                format!("✗ out of iterations (closest HP {:.0})", closest_hp)
            }
            TuneOutcome::Failed(ConvergenceFailure::TpkCapExceeded { tpk_prob, .. }) => {
                format!("✗ TPK cap exceeded ({:.1}%)", tpk_prob * 100.0)
            }
        };
        report.push_str(&format!("  Outcome:   {}\n\n", verdict));

        if let Some(verification) = &self.verification {
            report.push_str(&verification.to_text());
        }
        report
    }

    /// Generate a JSON report for further analysis.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

struct Search<'a> {
    encounter: &'a Encounter,
    config: SimConfig,
    cancel: Option<&'a CancelToken>,
    probes: Vec<Probe>,
}

impl Search<'_> {
    /// Evaluate one HP. `None` if cancelled.
    fn probe(&mut self, hp: f64) -> Result<Option<Probe>, ConfigError> {
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Ok(None);
        }
        let result = run_simulation(&self.encounter.with_boss_hp(hp), &self.config, self.cancel)?;
        if !result.complete {
            return Ok(None);
        }
        let probe = Probe {
            hp,
            median_ttk: result.median_ttk().unwrap_or(f64::INFINITY),
            tpk_prob: result.tpk_prob(),
        };
        debug!(hp, median_ttk = probe.median_ttk, tpk = probe.tpk_prob, "tuner probe");
        self.probes.push(probe);
        Ok(Some(probe))
    }

    fn best(&self, target: f64) -> Option<Probe> {
        self.probes
            .iter()
            .copied()
            .min_by(|a, b| a.distance(target).total_cmp(&b.distance(target)))
    }

    fn cancelled(self, hp: f64, verification: Option<AggregateResult>) -> TuneReport {
        warn!(probes = self.probes.len(), "auto-tune cancelled");
        TuneReport {
            hp,
            outcome: TuneOutcome::Cancelled,
            probes: self.probes,
            verification,
        }
    }
}

/// Search boss HP for the target median TTK.
///
/// # Arguments
/// * `encounter` - Party and boss; the boss's own HP is ignored
/// * `sim` - Full-run settings, used for the verification run; probes use
///   the same settings with `tune.probe_trials_for(sim.trials)` trials
/// * `tune` - Target, TPK cap, bounds and search limits
/// * `cancel` - Checked between probes and between trials
///
/// # Returns
/// A report with the chosen HP, every probe, and the verification run.
/// Missing the target or the TPK cap is reported in `outcome`, not as an
/// error; errors are reserved for invalid configuration.
pub fn tune(
    encounter: &Encounter,
    sim: &SimConfig,
    tune: &TuneConfig,
    cancel: Option<&CancelToken>,
) -> Result<TuneReport, ConfigError> {
    encounter.validate()?;
    sim.validate()?;
    tune.validate()?;

    let seed = sim.seed.unwrap_or_else(rand::random);
    let mut search = Search {
        encounter,
        config: SimConfig {
            trials: tune.probe_trials_for(sim.trials),
            seed: Some(seed),
            ..sim.clone()
        },
        cancel,
        probes: Vec::new(),
    };
    let target = tune.target_median;
    let tolerance = tune.tolerance;

    info!(
        target,
        tpk_cap = tune.tpk_cap,
        low = tune.hp_low,
        high = tune.hp_high,
        probe_trials = search.config.trials,
        "starting auto-tune"
    );

    let cancelled = |search: Search<'_>| -> Result<TuneReport, ConfigError> {
        let hp = search.best(target).map_or(tune.hp_low, |p| p.hp);
        Ok(search.cancelled(hp, None))
    };

    let Some(low) = search.probe(tune.hp_low)? else {
        return cancelled(search);
    };

    let mut out_of_range = None;
    let mut high = low;
    if low.median_ttk - target > tolerance {
        out_of_range = Some(low);
    } else {
        let Some(mut probe) = search.probe(tune.hp_high)? else {
            return cancelled(search);
        };
        let mut expansions = 0;
        while target - probe.median_ttk > tolerance && expansions < tune.bound_expansions {
            expansions += 1;
            let Some(next) = search.probe(probe.hp * 2.0)? else {
                return cancelled(search);
            };
            probe = next;
        }
        high = probe;
        if target - high.median_ttk > tolerance {
            out_of_range = Some(high);
        }
    }

    let mut bracket = None;
    if out_of_range.is_none() {
        let (mut lo, mut hi) = (low.hp, high.hp);
        for _ in 0..tune.max_iterations {
            if search.best(target).is_some_and(|b| b.distance(target) <= tolerance) {
                break;
            }
            let mid = ((lo + hi) / 2.0).round();
            if mid <= lo || mid >= hi {
                break;
            }
            let Some(probe) = search.probe(mid)? else {
                return cancelled(search);
            };
            if probe.median_ttk < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        bracket = Some((lo, hi));
    }

    let chosen = match out_of_range {
        Some(edge) => edge,
        None => search.best(target).unwrap_or(low),
    };

    // A bracket narrowed to adjacent HP values is as close as integer HP
    // gets, even outside tolerance.
    let exhausted = chosen.distance(target) > tolerance
        && bracket.is_some_and(|(lo, hi)| hi - lo > 1.0);

    let verification = run_simulation(&encounter.with_boss_hp(chosen.hp), sim, cancel)?;
    if !verification.complete {
        return Ok(search.cancelled(chosen.hp, Some(verification)));
    }
    let median_ttk = verification.median_ttk().unwrap_or(f64::INFINITY);
    let tpk_prob = verification.tpk_prob();

    let outcome = if out_of_range.is_some() {
        TuneOutcome::Failed(ConvergenceFailure::TargetOutOfRange {
            closest_hp: chosen.hp,
            median_ttk,
            tpk_prob,
        })
    } else if exhausted {
        TuneOutcome::Failed(ConvergenceFailure::IterationsExhausted {
            closest_hp: chosen.hp,
            median_ttk,
            tpk_prob,
        })
    } else if tpk_prob > tune.tpk_cap {
        TuneOutcome::Failed(ConvergenceFailure::TpkCapExceeded {
            hp: chosen.hp,
            median_ttk,
            tpk_prob,
        })
    } else {
        TuneOutcome::Converged
    };

    match outcome {
        TuneOutcome::Converged => info!(hp = chosen.hp, median_ttk, tpk = tpk_prob, "auto-tune converged"),
        _ => warn!(hp = chosen.hp, median_ttk, tpk = tpk_prob, ?outcome, "auto-tune did not converge"),
    }

    Ok(TuneReport {
        hp: chosen.hp,
        outcome,
        probes: search.probes,
        verification: Some(verification),
    })
}
