//! Pure combat math, dice, and shared constants.

pub mod combat_math;
pub mod constants;
pub mod dice;

pub use combat_math::{AttackRoll, HitChance, RollMode};
pub use dice::DamageDice;
