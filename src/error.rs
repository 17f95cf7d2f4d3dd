//! Error types for scenario loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected configuration. Raised before any trial runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("party is empty")]
    EmptyParty,

    #[error("boss has no offense (no enabled attack, lair action, or recharge ability)")]
    NoBossOffense,

    #[error("party member '{name}': max HP must be positive, got {hp}")]
    InvalidPcHp { name: String, hp: i64 },

    #[error("party member '{name}': AC must be non-negative, got {ac}")]
    NegativeAc { name: String, ac: i32 },

    #[error("party member '{name}': {reason}")]
    InvalidDamageOutput { name: String, reason: String },

    #[error("party member '{name}': resistance factor {factor} is outside (0, 1]")]
    InvalidPcResistance { name: String, factor: f64 },

    #[error("attack '{name}': {reason}")]
    MalformedAttack { name: String, reason: String },

    #[error("attack '{attack}': unknown save ability '{ability}'")]
    UnknownSaveAbility { attack: String, ability: String },

    #[error("invalid damage expression '{expr}'")]
    InvalidDamageExpr { expr: String },

    #[error("invalid recharge '{text}'")]
    InvalidRecharge { text: String },

    #[error("recharge chance {chance} is outside [0, 1]")]
    InvalidRechargeChance { chance: f64 },

    #[error("boss resistance factor {factor} is outside (0, 1]")]
    InvalidResistance { factor: f64 },

    #[error("boss regeneration must be non-negative, got {regen}")]
    NegativeRegen { regen: f64 },

    #[error("boss max HP must be positive, got {hp}")]
    InvalidBossHp { hp: f64 },

    #[error("{what}: {value} is out of range")]
    OutOfRange { what: &'static str, value: f64 },

    #[error("party DPR coefficient of variation must be a finite value > 0, got {cv}")]
    InvalidCv { cv: f64 },

    #[error("trial count must be positive")]
    NoTrials,

    #[error("max rounds must be positive")]
    NoRounds,

    #[error("percentile {p} is outside [0, 100]")]
    InvalidPercentile { p: f64 },

    #[error("guardrail '{name}' probability {value} is outside [0, 1]")]
    InvalidGuardrail { name: &'static str, value: f64 },

    #[error("HP search bounds [{low}, {high}] are empty")]
    InvalidBounds { low: f64, high: f64 },

    #[error("unknown party member '{name}'")]
    UnknownPartyMember { name: String },
}

/// Errors while reading a scenario file from disk.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read scenario file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario JSON in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
