//! Aggregation and reporting over a finished set of trials.
//!
//! Every statistic here is a pure function of the trial sequence. Censoring
//! policy for non-kills (timeouts and TPKs):
//! - median and percentiles use only trials where the boss died;
//! - fast/slow tail probabilities treat non-kills as `max_rounds + 1` and
//!   divide by all trials;
//! - the PCs-down probability is conditional on victory.

use super::config::{Guardrails, SimConfig};
use crate::encounter::trial::{TrialEnd, TrialOutcome};
use serde::Serialize;

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Linear-interpolated percentile of sorted values, `p` in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Kill times of trials where the boss died, ascending.
pub fn kill_times(outcomes: &[TrialOutcome]) -> Vec<f64> {
    let mut ttks: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.ttk())
        .map(|t| t as f64)
        .collect();
    ttks.sort_by(|a, b| a.total_cmp(b));
    ttks
}

pub fn median_ttk(outcomes: &[TrialOutcome]) -> Option<f64> {
    percentile(&kill_times(outcomes), 50.0)
}

/// P(TTK <= rounds) over all trials, non-kills imputed as `max_rounds + 1`.
pub fn prob_ttk_at_most(outcomes: &[TrialOutcome], rounds: u32, max_rounds: u32) -> f64 {
    let hits = outcomes
        .iter()
        .filter(|o| o.censored_ttk(max_rounds) <= rounds)
        .count();
    fraction(hits, outcomes.len())
}

/// P(TTK >= rounds) over all trials, non-kills imputed as `max_rounds + 1`.
pub fn prob_ttk_at_least(outcomes: &[TrialOutcome], rounds: u32, max_rounds: u32) -> f64 {
    let hits = outcomes
        .iter()
        .filter(|o| o.censored_ttk(max_rounds) >= rounds)
        .count();
    fraction(hits, outcomes.len())
}

/// P(at least `k` PCs down | boss died). Zero when the boss never died.
pub fn prob_pcs_down_at_least(outcomes: &[TrialOutcome], k: usize) -> f64 {
    let victories: Vec<&TrialOutcome> = outcomes
        .iter()
        .filter(|o| o.end == TrialEnd::BossDead)
        .collect();
    let costly = victories.iter().filter(|o| o.pcs_down >= k).count();
    fraction(costly, victories.len())
}

pub fn tpk_probability(outcomes: &[TrialOutcome]) -> f64 {
    fraction(outcomes.iter().filter(|o| o.is_tpk()).count(), outcomes.len())
}

/// Fraction of trials with the boss still standing after each round.
/// Index 0 is the start of the fight and is always 1.0.
pub fn survival_curve(outcomes: &[TrialOutcome], max_rounds: u32) -> Vec<f64> {
    (0..=max_rounds)
        .map(|round| {
            let alive = outcomes
                .iter()
                .filter(|o| o.ttk().map_or(true, |t| t > round))
                .count();
            if outcomes.is_empty() {
                1.0
            } else {
                fraction(alive, outcomes.len())
            }
        })
        .collect()
}

/// Kill counts per round, plus a bucket for fights the boss survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TtkHistogram {
    /// `by_round[i]` counts kills in round `i + 1`.
    pub by_round: Vec<u32>,
    pub not_killed: u32,
}

pub fn ttk_histogram(outcomes: &[TrialOutcome], max_rounds: u32) -> TtkHistogram {
    let mut by_round = vec![0u32; max_rounds as usize];
    let mut not_killed = 0;
    for outcome in outcomes {
        match outcome.ttk() {
            Some(t) if t >= 1 && t <= max_rounds => by_round[t as usize - 1] += 1,
            _ => not_killed += 1,
        }
    }
    TtkHistogram {
        by_round,
        not_killed,
    }
}

/// One threshold check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailCheck {
    pub name: &'static str,
    pub description: String,
    pub value: f64,
    pub limit: f64,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardrailReport {
    pub checks: Vec<GuardrailCheck>,
}

impl GuardrailReport {
    pub fn all_pass(&self) -> bool {
        self.checks.iter().all(|c| c.pass)
    }

    pub fn failures(&self) -> impl Iterator<Item = &GuardrailCheck> {
        self.checks.iter().filter(|c| !c.pass)
    }
}

/// Check every guardrail against a trial sequence.
pub fn evaluate_guardrails(
    outcomes: &[TrialOutcome],
    max_rounds: u32,
    guardrails: &Guardrails,
) -> GuardrailReport {
    let check = |name, description: String, value: f64, limit: f64| GuardrailCheck {
        name,
        description,
        value,
        limit,
        pass: value <= limit,
    };

    GuardrailReport {
        checks: vec![
            check(
                "steamroll",
                format!("P(TTK <= {})", guardrails.fast_ttk),
                prob_ttk_at_most(outcomes, guardrails.fast_ttk, max_rounds),
                guardrails.max_fast_prob,
            ),
            check(
                "slog",
                format!("P(TTK >= {})", guardrails.slow_ttk),
                prob_ttk_at_least(outcomes, guardrails.slow_ttk, max_rounds),
                guardrails.max_slow_prob,
            ),
            check(
                "pcs_down",
                format!("P(>= {} PCs down at victory)", guardrails.pcs_down_k),
                prob_pcs_down_at_least(outcomes, guardrails.pcs_down_k),
                guardrails.max_pcs_down_prob,
            ),
            check(
                "tpk",
                "P(TPK)".to_string(),
                tpk_probability(outcomes),
                guardrails.tpk_cap,
            ),
        ],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentilePoint {
    pub p: f64,
    pub ttk: Option<f64>,
}

/// Statistics derived from a trial sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub trials: usize,
    pub kills: usize,
    pub median_ttk: Option<f64>,
    pub mean_ttk: Option<f64>,
    pub percentiles: Vec<PercentilePoint>,
    pub tpk_prob: f64,
    pub timeout_prob: f64,
    /// `pcs_down_at_victory[k]`: share of victories with exactly k PCs down.
    pub pcs_down_at_victory: Vec<f64>,
    pub survival: Vec<f64>,
    pub histogram: TtkHistogram,
}

impl Summary {
    pub fn from_outcomes(outcomes: &[TrialOutcome], max_rounds: u32, percentiles: &[f64]) -> Self {
        let kills = kill_times(outcomes);
        let mean_ttk = if kills.is_empty() {
            None
        } else {
            Some(kills.iter().sum::<f64>() / kills.len() as f64)
        };

        let max_down = outcomes.iter().map(|o| o.pcs_down).max().unwrap_or(0);
        let mut down_counts = vec![0usize; max_down + 1];
        for o in outcomes.iter().filter(|o| o.end == TrialEnd::BossDead) {
            down_counts[o.pcs_down] += 1;
        }
        let pcs_down_at_victory = down_counts
            .iter()
            .map(|&c| fraction(c, kills.len()))
            .collect();

        let timeouts = outcomes
            .iter()
            .filter(|o| o.end == TrialEnd::MaxRoundsReached)
            .count();

        Self {
            trials: outcomes.len(),
            kills: kills.len(),
            median_ttk: percentile(&kills, 50.0),
            mean_ttk,
            percentiles: percentiles
                .iter()
                .map(|&p| PercentilePoint {
                    p,
                    ttk: percentile(&kills, p),
                })
                .collect(),
            tpk_prob: tpk_probability(outcomes),
            timeout_prob: fraction(timeouts, outcomes.len()),
            pcs_down_at_victory,
            survival: survival_curve(outcomes, max_rounds),
            histogram: ttk_histogram(outcomes, max_rounds),
        }
    }
}

/// Aggregated results from one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub trials_requested: u32,
    pub max_rounds: u32,
    pub seed: u64,
    /// False when the run was cancelled before every trial finished.
    pub complete: bool,
    pub summary: Summary,
    pub guardrails: GuardrailReport,
    #[serde(skip)]
    pub outcomes: Vec<TrialOutcome>,
}

impl AggregateResult {
    /// Build a result from completed trial outcomes.
    pub fn from_outcomes(
        outcomes: Vec<TrialOutcome>,
        config: &SimConfig,
        seed: u64,
        complete: bool,
    ) -> Self {
        let summary = Summary::from_outcomes(&outcomes, config.max_rounds, &config.percentiles);
        let guardrails = evaluate_guardrails(&outcomes, config.max_rounds, &config.guardrails);
        Self {
            trials_requested: config.trials,
            max_rounds: config.max_rounds,
            seed,
            complete,
            summary,
            guardrails,
            outcomes,
        }
    }

    pub fn median_ttk(&self) -> Option<f64> {
        self.summary.median_ttk
    }

    pub fn tpk_prob(&self) -> f64 {
        self.summary.tpk_prob
    }

    /// Generate a text report.
    pub fn to_text(&self) -> String {
        let mut report = String::new();
        let s = &self.summary;
        let rounds = |v: Option<f64>| match v {
            Some(v) => format!("{:.1}", v),
            None => "n/a".to_string(),
        };

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str("                    ENCOUNTER SIMULATION\n");
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!(
            "Trials: {} of {} ({}), max {} rounds, seed {}\n\n",
            s.trials,
            self.trials_requested,
            if self.complete { "complete" } else { "INCOMPLETE" },
            self.max_rounds,
            self.seed
        ));

        report.push_str("── TIME TO KILL ─────────────────────────────────────────────────\n");
        report.push_str(&format!(
            "  Boss killed:     {:>5.1}%\n",
            fraction(s.kills, s.trials) * 100.0
        ));
        report.push_str(&format!("  Median TTK:      {}\n", rounds(s.median_ttk)));
        report.push_str(&format!("  Mean TTK:        {}\n", rounds(s.mean_ttk)));
        for point in &s.percentiles {
            report.push_str(&format!(
                "  p{:<3}             {}\n",
                point.p,
                rounds(point.ttk)
            ));
        }
        report.push('\n');

        report.push_str("── LETHALITY ────────────────────────────────────────────────────\n");
        report.push_str(&format!("  TPK:             {:>5.1}%\n", s.tpk_prob * 100.0));
        report.push_str(&format!("  Timed out:       {:>5.1}%\n", s.timeout_prob * 100.0));
        for (k, share) in s.pcs_down_at_victory.iter().enumerate() {
            report.push_str(&format!(
                "  {} down at win:   {:>5.1}%\n",
                k,
                share * 100.0
            ));
        }
        report.push('\n');

        report.push_str("── TTK HISTOGRAM ────────────────────────────────────────────────\n");
        let total = s.trials.max(1) as f64;
        for (i, &count) in s.histogram.by_round.iter().enumerate() {
            let pct = count as f64 / total * 100.0;
            let bar = "█".repeat((pct / 2.0) as usize);
            report.push_str(&format!("  Round {:2}: {:>5.1}% {}\n", i + 1, pct, bar));
        }
        let pct = s.histogram.not_killed as f64 / total * 100.0;
        report.push_str(&format!(
            "  Survived: {:>5.1}% {}\n\n",
            pct,
            "█".repeat((pct / 2.0) as usize)
        ));

        report.push_str("── GUARDRAILS ───────────────────────────────────────────────────\n");
        for check in &self.guardrails.checks {
            report.push_str(&format!(
                "  {} {:<34} {:>5.1}% (limit {:.1}%)\n",
                if check.pass { "✓" } else { "✗" },
                check.description,
                check.value * 100.0,
                check.limit * 100.0
            ));
        }

        report.push_str("\n═══════════════════════════════════════════════════════════════\n");
        report
    }

    /// Generate a JSON report for further analysis.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
