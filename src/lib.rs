//! Scales - Monte Carlo Boss Encounter Library
//!
//! Simulates many playouts of a party-versus-boss fight, summarizes pacing
//! and lethality, and searches for the boss HP that hits a target median
//! time-to-kill.

pub mod cancel;
pub mod combatants;
pub mod core;
pub mod encounter;
pub mod error;
pub mod simulator;
pub mod tuner;

pub use cancel::CancelToken;
pub use combatants::{Encounter, EncounterSpec};
pub use error::{ConfigError, LoadError};
pub use simulator::{run_simulation, AggregateResult, ScenarioFile, SimConfig, TuneConfig};
pub use tuner::{tune, ConvergenceFailure, TuneOutcome, TuneReport};
