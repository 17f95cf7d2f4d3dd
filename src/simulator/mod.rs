//! Monte Carlo encounter simulator.
//!
//! Run thousands of independent trials of one encounter to analyze:
//! - Time to kill (median, percentiles, survival curve)
//! - Lethality (TPK rate, PCs down at victory)
//! - Guardrail verdicts for steamrolls and slogs
//!
//! Every trial goes through the same `RoundResolver` (src/encounter/round.rs)
//! the tuner uses, so estimates and tuning agree on the rules.

mod config;
pub mod damage_sim;
pub mod estimate;
mod report;
mod runner;

pub use config::{Guardrails, Scenario, ScenarioFile, SimConfig, TuneConfig};
pub use damage_sim::{simulate_damage_taken, DamageTaken};
pub use estimate::{boss_time_to_defeat, incoming_damage, BossEstimate, IncomingEstimate};
pub use report::{
    evaluate_guardrails, kill_times, median_ttk, percentile, prob_pcs_down_at_least,
    prob_ttk_at_least, prob_ttk_at_most, survival_curve, tpk_probability, ttk_histogram,
    AggregateResult, GuardrailCheck, GuardrailReport, PercentilePoint, Summary, TtkHistogram,
};
pub use runner::{run_simulation, run_trials};
