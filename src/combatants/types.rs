//! Validated combatant model.
//!
//! Input from `input.rs` lands here already checked, but every field is
//! public, so `Encounter::validate` re-checks the whole model before a run.
//! Derived numbers such as a PC's effective DPR are computed once, when the
//! model is built.

use crate::core::combat_math::{hit_chance, nova_factor, RollMode};
use crate::core::dice::DamageDice;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const NUM_ABILITIES: usize = 6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn all() -> [Ability; NUM_ABILITIES] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    pub fn abbrev(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Ability::Strength => 0,
            Ability::Dexterity => 1,
            Ability::Constitution => 2,
            Ability::Intelligence => 3,
            Ability::Wisdom => 4,
            Ability::Charisma => 5,
        }
    }
}

impl FromStr for Ability {
    type Err = ();

    /// Accepts the abbreviation or the full name, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        Ability::all()
            .into_iter()
            .find(|a| {
                a.abbrev() == s || format!("{:?}", a).to_ascii_uppercase() == s
            })
            .ok_or(())
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// One save bonus per ability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveBonuses {
    values: [i32; NUM_ABILITIES],
}

impl SaveBonuses {
    pub fn new(values: [i32; NUM_ABILITIES]) -> Self {
        Self { values }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        self.values[ability.index()]
    }
}

/// Where a PC's damage number comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutput {
    /// Effective DPR entered directly.
    Fixed { dpr: f64 },
    /// Best-turn damage, discounted by hit odds against a target AC and by
    /// how often the PC can actually deliver it.
    Nova {
        nova_dpr: f64,
        attack_bonus: i32,
        target_ac: i32,
        crit_ratio: f64,
        uptime: f64,
        roll_mode: RollMode,
    },
}

impl DamageOutput {
    pub fn effective_dpr(&self) -> f64 {
        match *self {
            DamageOutput::Fixed { dpr } => dpr.max(0.0),
            DamageOutput::Nova {
                nova_dpr,
                attack_bonus,
                target_ac,
                crit_ratio,
                uptime,
                roll_mode,
            } => {
                let chance = hit_chance(target_ac, attack_bonus, roll_mode);
                (nova_dpr * nova_factor(chance, crit_ratio, uptime)).max(0.0)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerCharacter {
    pub name: String,
    pub ac: i32,
    pub max_hp: u32,
    pub saves: SaveBonuses,
    pub damage: DamageOutput,
    /// Resolved from `damage` when the PC is built.
    pub effective_dpr: f64,
    /// Multiplier on damage this PC takes, in (0, 1].
    pub resistance: f64,
}

impl PlayerCharacter {
    pub fn new(name: impl Into<String>, ac: i32, max_hp: u32, damage: DamageOutput) -> Self {
        let effective_dpr = damage.effective_dpr();
        Self {
            name: name.into(),
            ac,
            max_hp,
            saves: SaveBonuses::default(),
            damage,
            effective_dpr,
            resistance: 1.0,
        }
    }

    pub fn with_saves(mut self, saves: SaveBonuses) -> Self {
        self.saves = saves;
        self
    }

    pub fn with_resistance(mut self, resistance: f64) -> Self {
        self.resistance = resistance;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_hp == 0 {
            return Err(ConfigError::InvalidPcHp {
                name: self.name.clone(),
                hp: 0,
            });
        }
        if self.ac < 0 {
            return Err(ConfigError::NegativeAc {
                name: self.name.clone(),
                ac: self.ac,
            });
        }
        if !(self.resistance > 0.0 && self.resistance <= 1.0) {
            return Err(ConfigError::InvalidPcResistance {
                name: self.name.clone(),
                factor: self.resistance,
            });
        }
        if !(self.effective_dpr.is_finite() && self.effective_dpr >= 0.0) {
            return Err(ConfigError::InvalidDamageOutput {
                name: self.name.clone(),
                reason: format!("effective DPR {} is not a finite non-negative number", self.effective_dpr),
            });
        }
        Ok(())
    }
}

/// How an attack is resolved against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    AttackRoll { to_hit: i32 },
    Save { dc: i32, ability: Ability },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiderKind {
    /// Attacks against the target roll with advantage.
    GrantAdvantage,
    /// Target's AC drops by `amount`.
    ReduceAc { amount: i32 },
}

/// On-hit effect that lands on the struck PC starting next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rider {
    pub kind: RiderKind,
    /// Rounds the effect stays active once it applies.
    pub duration: u32,
    pub melee_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attack {
    pub name: String,
    pub resolution: Resolution,
    pub damage: DamageDice,
    pub uses_per_round: u32,
    /// Distinct PCs struck per use.
    pub targets: usize,
    pub melee: bool,
    pub rider: Option<Rider>,
}

impl Attack {
    pub fn attack_roll(name: impl Into<String>, to_hit: i32, damage: DamageDice) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::AttackRoll { to_hit },
            damage,
            uses_per_round: 1,
            targets: 1,
            melee: true,
            rider: None,
        }
    }

    pub fn save(name: impl Into<String>, dc: i32, ability: Ability, damage: DamageDice) -> Self {
        Self {
            name: name.into(),
            resolution: Resolution::Save { dc, ability },
            damage,
            uses_per_round: 1,
            targets: 1,
            melee: false,
            rider: None,
        }
    }

    /// Whether a landed hit from this attack carries its rider.
    pub fn rider_applies(&self) -> Option<Rider> {
        self.rider.filter(|r| self.melee || !r.melee_only)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedAttack {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if let Resolution::Save { dc, .. } = self.resolution {
            if dc < 0 {
                return Err(malformed("save DC must be non-negative"));
            }
        }
        if self.targets == 0 {
            return Err(malformed("must strike at least one target"));
        }
        if let Some(rider) = &self.rider {
            if rider.duration == 0 {
                return Err(malformed("rider duration must be at least one round"));
            }
            if let RiderKind::ReduceAc { amount } = rider.kind {
                if amount <= 0 {
                    return Err(malformed("AC reduction must be positive"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LairCadence {
    EveryRound,
    /// Fires on rounds divisible by n.
    EveryNth(u32),
}

impl LairCadence {
    pub fn fires(&self, round: u32) -> bool {
        match *self {
            LairCadence::EveryRound => true,
            LairCadence::EveryNth(n) => n <= 1 || round % n == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LairAction {
    pub average_damage: f64,
    pub targets: usize,
    pub cadence: LairCadence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RechargeAbility {
    pub name: String,
    /// Per-round chance to recharge, in [0, 1].
    pub chance: f64,
    pub average_damage: f64,
    pub targets: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossKit {
    pub name: String,
    pub max_hp: f64,
    /// Multiplier on damage the boss takes, in (0, 1].
    pub resistance: f64,
    pub regen_per_round: f64,
    /// Baseline roll mode for the boss's attack rolls.
    pub roll_mode: RollMode,
    pub attacks: Vec<Attack>,
    pub lair: Option<LairAction>,
    pub recharge: Option<RechargeAbility>,
}

impl BossKit {
    pub fn new(name: impl Into<String>, max_hp: f64, attacks: Vec<Attack>) -> Self {
        Self {
            name: name.into(),
            max_hp,
            resistance: 1.0,
            regen_per_round: 0.0,
            roll_mode: RollMode::Normal,
            attacks,
            lair: None,
            recharge: None,
        }
    }

    pub fn has_offense(&self) -> bool {
        self.attacks.iter().any(|a| a.uses_per_round > 0)
            || self.lair.is_some()
            || self.recharge.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_hp.is_finite() && self.max_hp > 0.0) {
            return Err(ConfigError::InvalidBossHp { hp: self.max_hp });
        }
        if !(self.resistance > 0.0 && self.resistance <= 1.0) {
            return Err(ConfigError::InvalidResistance {
                factor: self.resistance,
            });
        }
        if !(self.regen_per_round.is_finite() && self.regen_per_round >= 0.0) {
            return Err(ConfigError::NegativeRegen {
                regen: self.regen_per_round,
            });
        }
        for attack in &self.attacks {
            attack.validate()?;
        }
        if let Some(lair) = &self.lair {
            check_area("lair average damage", lair.average_damage, "lair targets", lair.targets)?;
        }
        if let Some(recharge) = &self.recharge {
            if !(0.0..=1.0).contains(&recharge.chance) {
                return Err(ConfigError::InvalidRechargeChance {
                    chance: recharge.chance,
                });
            }
            check_area(
                "recharge average damage",
                recharge.average_damage,
                "recharge targets",
                recharge.targets,
            )?;
        }
        if !self.has_offense() {
            return Err(ConfigError::NoBossOffense);
        }
        Ok(())
    }
}

fn check_area(
    damage_what: &'static str,
    average_damage: f64,
    targets_what: &'static str,
    targets: usize,
) -> Result<(), ConfigError> {
    if !(average_damage.is_finite() && average_damage >= 0.0) {
        return Err(ConfigError::OutOfRange {
            what: damage_what,
            value: average_damage,
        });
    }
    if targets == 0 {
        return Err(ConfigError::OutOfRange {
            what: targets_what,
            value: 0.0,
        });
    }
    Ok(())
}

/// A validated fight: the party, the boss, and party-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub party: Vec<PlayerCharacter>,
    pub boss: BossKit,
    /// Temporary HP each standing PC gains at the start of every round.
    pub thp_per_round: f64,
}

impl Encounter {
    pub fn new(party: Vec<PlayerCharacter>, boss: BossKit) -> Self {
        Self {
            party,
            boss,
            thp_per_round: 0.0,
        }
    }

    /// Same encounter with a different boss max HP.
    pub fn with_boss_hp(&self, max_hp: f64) -> Self {
        let mut encounter = self.clone();
        encounter.boss.max_hp = max_hp;
        encounter
    }

    pub fn total_party_dpr(&self) -> f64 {
        self.party.iter().map(|pc| pc.effective_dpr).sum()
    }

    /// Check the whole model. Every entry point runs this before a trial.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.party.is_empty() {
            return Err(ConfigError::EmptyParty);
        }
        for pc in &self.party {
            pc.validate()?;
        }
        self.boss.validate()?;
        if !(self.thp_per_round.is_finite() && self.thp_per_round >= 0.0) {
            return Err(ConfigError::OutOfRange {
                what: "temporary HP per round",
                value: self.thp_per_round,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ability_parse() {
        assert_eq!("dex".parse::<Ability>(), Ok(Ability::Dexterity));
        assert_eq!("WIS".parse::<Ability>(), Ok(Ability::Wisdom));
        assert_eq!("Constitution".parse::<Ability>(), Ok(Ability::Constitution));
        assert!("LUCK".parse::<Ability>().is_err());
    }

    #[test]
    fn test_save_bonuses_by_ability() {
        let saves = SaveBonuses::new([4, 2, 3, 0, 1, -1]);
        assert_eq!(saves.get(Ability::Strength), 4);
        assert_eq!(saves.get(Ability::Charisma), -1);
    }

    #[test]
    fn test_fixed_dpr() {
        let pc = PlayerCharacter::new("Fighter", 18, 40, DamageOutput::Fixed { dpr: 15.0 });
        assert_eq!(pc.effective_dpr, 15.0);
    }

    #[test]
    fn test_nova_dpr_derivation() {
        // +7 vs AC 17: hits on 10..=19 (0.5), crits on 20 (0.05)
        let output = DamageOutput::Nova {
            nova_dpr: 20.0,
            attack_bonus: 7,
            target_ac: 17,
            crit_ratio: 2.0,
            uptime: 0.5,
            roll_mode: RollMode::Normal,
        };
        // (0.5 + 2 * 0.05) * 0.5 * 20 = 6
        assert!((output.effective_dpr() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rider_melee_only() {
        let mut bite = Attack::attack_roll("Bite", 7, DamageDice::flat(5));
        bite.rider = Some(Rider {
            kind: RiderKind::GrantAdvantage,
            duration: 1,
            melee_only: true,
        });
        assert!(bite.rider_applies().is_some());

        bite.melee = false;
        assert!(bite.rider_applies().is_none());
    }

    #[test]
    fn test_lair_cadence() {
        assert!(LairCadence::EveryRound.fires(1));
        let every_other = LairCadence::EveryNth(2);
        assert!(!every_other.fires(1));
        assert!(every_other.fires(2));
        assert!(every_other.fires(4));
    }

    fn duel() -> Encounter {
        Encounter::new(
            vec![PlayerCharacter::new("Hero", 15, 30, DamageOutput::Fixed { dpr: 10.0 })],
            BossKit::new("Ogre", 60.0, vec![Attack::attack_roll("Club", 6, DamageDice::flat(8))]),
        )
    }

    #[test]
    fn test_validate_accepts_duel() {
        assert_eq!(duel().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_boss() {
        let mut enc = duel();
        enc.boss.resistance = 0.0;
        assert_eq!(enc.validate(), Err(ConfigError::InvalidResistance { factor: 0.0 }));

        let mut enc = duel();
        enc.boss.recharge = Some(RechargeAbility {
            name: "Breath".to_string(),
            chance: 1.5,
            average_damage: 30.0,
            targets: 2,
        });
        assert_eq!(enc.validate(), Err(ConfigError::InvalidRechargeChance { chance: 1.5 }));

        let mut enc = duel();
        enc.boss.regen_per_round = -1.0;
        assert_eq!(enc.validate(), Err(ConfigError::NegativeRegen { regen: -1.0 }));

        let mut enc = duel();
        enc.boss.lair = Some(LairAction {
            average_damage: 5.0,
            targets: 0,
            cadence: LairCadence::EveryRound,
        });
        assert!(matches!(
            enc.validate(),
            Err(ConfigError::OutOfRange { what: "lair targets", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_party() {
        let mut enc = duel();
        enc.party.clear();
        assert_eq!(enc.validate(), Err(ConfigError::EmptyParty));

        let mut enc = duel();
        enc.party[0].resistance = 1.5;
        assert!(matches!(enc.validate(), Err(ConfigError::InvalidPcResistance { .. })));

        let mut enc = duel();
        enc.party[0].max_hp = 0;
        assert!(matches!(enc.validate(), Err(ConfigError::InvalidPcHp { .. })));

        let mut enc = duel();
        enc.thp_per_round = f64::NAN;
        assert!(matches!(enc.validate(), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_validate_rejects_inert_riders() {
        let mut enc = duel();
        enc.boss.attacks[0].rider = Some(Rider {
            kind: RiderKind::ReduceAc { amount: -2 },
            duration: 1,
            melee_only: true,
        });
        assert!(matches!(enc.validate(), Err(ConfigError::MalformedAttack { .. })));

        enc.boss.attacks[0].rider = Some(Rider {
            kind: RiderKind::GrantAdvantage,
            duration: 0,
            melee_only: true,
        });
        assert!(matches!(enc.validate(), Err(ConfigError::MalformedAttack { .. })));
    }

    #[test]
    fn test_with_boss_hp_leaves_original() {
        let boss = BossKit::new("Drake", 100.0, vec![]);
        let enc = Encounter::new(vec![], boss);
        let tuned = enc.with_boss_hp(250.0);
        assert_eq!(enc.boss.max_hp, 100.0);
        assert_eq!(tuned.boss.max_hp, 250.0);
    }
}
