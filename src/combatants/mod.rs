//! Party and boss data: raw input, validation, and the resolved model.

pub mod input;
pub mod types;

pub use input::{
    AttackSpec, BossSpec, DamageSpec, EncounterSpec, LairSpec, NovaSpec, PartyMemberSpec,
    RechargeChanceSpec, RechargeSpec, RiderEffectSpec, RiderSpec, SaveBonusSpec,
};
pub use types::{
    Ability, Attack, BossKit, DamageOutput, Encounter, LairAction, LairCadence, PlayerCharacter,
    RechargeAbility, Resolution, Rider, RiderKind, SaveBonuses,
};
