//! Encounter engine: per-trial state, round resolution, and the trial loop.

pub mod round;
pub mod state;
pub mod trial;

pub use round::{InitiativeMode, Phase, Round, RoundEnd, RoundResolver};
pub use state::{ActiveRider, BossState, PcState, TrialState};
pub use trial::{run_trial, TrialEnd, TrialOutcome};
