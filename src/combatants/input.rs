//! Raw scenario input and its validation into the combatant model.
//!
//! Input mirrors what a designer types into a form: optional fields, dice
//! as text, abilities as names. `EncounterSpec::validate` either produces a
//! complete [`Encounter`] or fails with the first [`ConfigError`] found.

use super::types::{
    Ability, Attack, BossKit, DamageOutput, Encounter, LairAction, LairCadence, PlayerCharacter,
    RechargeAbility, Resolution, Rider, RiderKind, SaveBonuses,
};
use crate::core::combat_math::{parse_recharge, RollMode};
use crate::core::dice::DamageDice;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

fn default_one_f64() -> f64 {
    1.0
}

fn default_one_u32() -> u32 {
    1
}

fn default_one_usize() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_crit_ratio() -> f64 {
    1.5
}

fn default_uptime() -> f64 {
    0.85
}

fn default_ac_reduction() -> i32 {
    2
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveBonusSpec {
    pub str: i32,
    pub dex: i32,
    pub con: i32,
    pub int: i32,
    pub wis: i32,
    pub cha: i32,
}

impl From<&SaveBonusSpec> for SaveBonuses {
    fn from(s: &SaveBonusSpec) -> Self {
        SaveBonuses::new([s.str, s.dex, s.con, s.int, s.wis, s.cha])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovaSpec {
    pub nova_dpr: f64,
    pub attack_bonus: i32,
    pub target_ac: i32,
    #[serde(default = "default_crit_ratio")]
    pub crit_ratio: f64,
    #[serde(default = "default_uptime")]
    pub uptime: f64,
    #[serde(default)]
    pub roll_mode: RollMode,
}

/// `{"dpr": 12.5}` or `{"nova": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSpec {
    Dpr(f64),
    Nova(NovaSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMemberSpec {
    pub name: String,
    pub ac: i32,
    pub hp: i64,
    #[serde(default)]
    pub saves: SaveBonusSpec,
    pub damage: DamageSpec,
    #[serde(default = "default_one_f64")]
    pub resistance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderEffectSpec {
    GrantAdvantage,
    ReduceAc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderSpec {
    pub effect: RiderEffectSpec,
    /// AC reduction; ignored for advantage riders.
    #[serde(default = "default_ac_reduction")]
    pub amount: i32,
    #[serde(default = "default_one_u32")]
    pub duration: u32,
    #[serde(default = "default_true")]
    pub melee_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSpec {
    pub name: String,
    #[serde(default)]
    pub to_hit: Option<i32>,
    #[serde(default)]
    pub dc: Option<i32>,
    #[serde(default)]
    pub save: Option<String>,
    pub damage: String,
    #[serde(default = "default_one_u32")]
    pub uses_per_round: u32,
    #[serde(default = "default_one_usize")]
    pub targets: usize,
    #[serde(default = "default_true")]
    pub melee: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rider: Option<RiderSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LairSpec {
    pub average_damage: f64,
    #[serde(default = "default_one_usize")]
    pub targets: usize,
    /// Fires every `every` rounds.
    #[serde(default = "default_one_u32")]
    pub every: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Recharge odds as a probability (`0.333`) or as recharge text (`"5-6"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RechargeChanceSpec {
    Chance(f64),
    Text(String),
}

impl RechargeChanceSpec {
    fn resolve(&self) -> Result<f64, ConfigError> {
        let chance = match self {
            RechargeChanceSpec::Chance(p) => *p,
            RechargeChanceSpec::Text(text) => {
                parse_recharge(text).ok_or_else(|| ConfigError::InvalidRecharge { text: text.clone() })?
            }
        };
        if !(0.0..=1.0).contains(&chance) {
            return Err(ConfigError::InvalidRechargeChance { chance });
        }
        Ok(chance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RechargeSpec {
    #[serde(default = "default_recharge_name")]
    pub name: String,
    pub recharge: RechargeChanceSpec,
    pub average_damage: f64,
    #[serde(default = "default_one_usize")]
    pub targets: usize,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_recharge_name() -> String {
    "Recharge".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossSpec {
    pub name: String,
    pub hp: f64,
    #[serde(default = "default_one_f64")]
    pub resistance: f64,
    #[serde(default)]
    pub regen: f64,
    #[serde(default)]
    pub roll_mode: RollMode,
    #[serde(default)]
    pub attacks: Vec<AttackSpec>,
    #[serde(default)]
    pub lair: Option<LairSpec>,
    #[serde(default)]
    pub recharge: Option<RechargeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterSpec {
    pub party: Vec<PartyMemberSpec>,
    pub boss: BossSpec,
    /// Dice expression, averaged, granted to each acting PC every round.
    #[serde(default)]
    pub thp_per_round: Option<String>,
}

fn non_negative(what: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { what, value })
    }
}

impl PartyMemberSpec {
    pub fn validate(&self) -> Result<PlayerCharacter, ConfigError> {
        if self.hp <= 0 || self.hp > u32::MAX as i64 {
            return Err(ConfigError::InvalidPcHp {
                name: self.name.clone(),
                hp: self.hp,
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

        let bad_damage = |reason: &str| ConfigError::InvalidDamageOutput {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        let damage = match &self.damage {
            DamageSpec::Dpr(dpr) => {
                if !dpr.is_finite() || *dpr < 0.0 {
                    return Err(bad_damage("DPR must be a finite non-negative number"));
                }
                DamageOutput::Fixed { dpr: *dpr }
            }
            DamageSpec::Nova(nova) => {
                if !nova.nova_dpr.is_finite() || nova.nova_dpr < 0.0 {
                    return Err(bad_damage("nova DPR must be a finite non-negative number"));
                }
                if !nova.crit_ratio.is_finite() || nova.crit_ratio < 0.0 {
                    return Err(bad_damage("crit ratio must be non-negative"));
                }
                if !(0.0..=1.0).contains(&nova.uptime) {
                    return Err(bad_damage("uptime must be within [0, 1]"));
                }
                DamageOutput::Nova {
                    nova_dpr: nova.nova_dpr,
                    attack_bonus: nova.attack_bonus,
                    target_ac: nova.target_ac,
                    crit_ratio: nova.crit_ratio,
                    uptime: nova.uptime,
                    roll_mode: nova.roll_mode,
                }
            }
        };

        Ok(
            PlayerCharacter::new(self.name.clone(), self.ac, self.hp as u32, damage)
                .with_saves((&self.saves).into())
                .with_resistance(self.resistance),
        )
    }
}

impl AttackSpec {
    pub fn validate(&self) -> Result<Attack, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedAttack {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        let resolution = match (self.to_hit, self.dc) {
            (None, None) => return Err(malformed("needs either a to-hit bonus or a save DC")),
            (Some(_), Some(_)) => return Err(malformed("has both a to-hit bonus and a save DC")),
            (Some(to_hit), None) => Resolution::AttackRoll { to_hit },
            (None, Some(dc)) => {
                if dc < 0 {
                    return Err(malformed("save DC must be non-negative"));
                }
                let name = self
                    .save
                    .as_deref()
                    .ok_or_else(|| malformed("save DC given without a save ability"))?;
                let ability = name
                    .parse::<Ability>()
                    .map_err(|_| ConfigError::UnknownSaveAbility {
                        attack: self.name.clone(),
                        ability: name.to_string(),
                    })?;
                Resolution::Save { dc, ability }
            }
        };

        let rider = self.rider.as_ref().map(|r| Rider {
            kind: match r.effect {
                RiderEffectSpec::GrantAdvantage => RiderKind::GrantAdvantage,
                RiderEffectSpec::ReduceAc => RiderKind::ReduceAc { amount: r.amount },
            },
            duration: r.duration,
            melee_only: r.melee_only,
        });

        let attack = Attack {
            name: self.name.clone(),
            resolution,
            damage: DamageDice::parse(&self.damage)?,
            uses_per_round: self.uses_per_round,
            targets: self.targets,
            melee: self.melee,
            rider,
        };
        attack.validate()?;
        Ok(attack)
    }
}

impl BossSpec {
    pub fn validate(&self) -> Result<BossKit, ConfigError> {
        if !(self.hp.is_finite() && self.hp > 0.0) {
            return Err(ConfigError::InvalidBossHp { hp: self.hp });
        }
        if !(self.resistance > 0.0 && self.resistance <= 1.0) {
            return Err(ConfigError::InvalidResistance {
                factor: self.resistance,
            });
        }
        if !(self.regen.is_finite() && self.regen >= 0.0) {
            return Err(ConfigError::NegativeRegen { regen: self.regen });
        }

        let attacks = self
            .attacks
            .iter()
            .filter(|a| a.enabled)
            .map(AttackSpec::validate)
            .collect::<Result<Vec<_>, _>>()?;

        let lair = match &self.lair {
            Some(l) if l.enabled => Some(LairAction {
                average_damage: non_negative("lair average damage", l.average_damage)?,
                targets: l.targets,
                cadence: if l.every <= 1 {
                    LairCadence::EveryRound
                } else {
                    LairCadence::EveryNth(l.every)
                },
            }),
            _ => None,
        };

        let recharge = match &self.recharge {
            Some(r) if r.enabled => Some(RechargeAbility {
                name: r.name.clone(),
                chance: r.recharge.resolve()?,
                average_damage: non_negative("recharge average damage", r.average_damage)?,
                targets: r.targets,
            }),
            _ => None,
        };

        let mut boss = BossKit::new(self.name.clone(), self.hp, attacks);
        boss.resistance = self.resistance;
        boss.regen_per_round = self.regen;
        boss.roll_mode = self.roll_mode;
        boss.lair = lair;
        boss.recharge = recharge;

        boss.validate()?;
        Ok(boss)
    }
}

impl EncounterSpec {
    pub fn validate(&self) -> Result<Encounter, ConfigError> {
        if self.party.is_empty() {
            return Err(ConfigError::EmptyParty);
        }
        let party = self
            .party
            .iter()
            .map(PartyMemberSpec::validate)
            .collect::<Result<Vec<_>, _>>()?;
        let boss = self.boss.validate()?;

        let thp_per_round = match &self.thp_per_round {
            Some(expr) if !expr.trim().is_empty() => DamageDice::parse(expr)?.average(),
            _ => 0.0,
        };

        let mut encounter = Encounter::new(party, boss);
        encounter.thp_per_round = thp_per_round;
        encounter.validate()?;
        Ok(encounter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claw() -> AttackSpec {
        AttackSpec {
            name: "Claw".to_string(),
            to_hit: Some(7),
            dc: None,
            save: None,
            damage: "2d6+5".to_string(),
            uses_per_round: 2,
            targets: 1,
            melee: true,
            enabled: true,
            rider: None,
        }
    }

    fn fighter() -> PartyMemberSpec {
        PartyMemberSpec {
            name: "Fighter".to_string(),
            ac: 18,
            hp: 40,
            saves: SaveBonusSpec {
                str: 4,
                con: 3,
                ..Default::default()
            },
            damage: DamageSpec::Dpr(15.0),
            resistance: 1.0,
        }
    }

    fn boss(attacks: Vec<AttackSpec>) -> BossSpec {
        BossSpec {
            name: "Drake".to_string(),
            hp: 150.0,
            resistance: 1.0,
            regen: 0.0,
            roll_mode: RollMode::Normal,
            attacks,
            lair: None,
            recharge: None,
        }
    }

    #[test]
    fn test_attack_needs_to_hit_or_dc() {
        let mut atk = claw();
        atk.to_hit = None;
        assert!(matches!(
            atk.validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));

        atk.to_hit = Some(5);
        atk.dc = Some(14);
        assert!(matches!(
            atk.validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));
    }

    #[test]
    fn test_save_attack_ability() {
        let mut breath = claw();
        breath.to_hit = None;
        breath.dc = Some(15);
        breath.save = Some("dex".to_string());
        let atk = breath.validate().unwrap();
        assert_eq!(
            atk.resolution,
            Resolution::Save {
                dc: 15,
                ability: Ability::Dexterity
            }
        );

        breath.save = Some("LCK".to_string());
        assert_eq!(
            breath.validate(),
            Err(ConfigError::UnknownSaveAbility {
                attack: "Claw".to_string(),
                ability: "LCK".to_string()
            })
        );

        breath.save = None;
        assert!(matches!(
            breath.validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));
    }

    #[test]
    fn test_bad_damage_expression_rejected() {
        let mut atk = claw();
        atk.damage = "lots".to_string();
        assert!(matches!(
            atk.validate(),
            Err(ConfigError::InvalidDamageExpr { .. })
        ));
    }

    #[test]
    fn test_pc_validation() {
        assert!(fighter().validate().is_ok());

        let mut pc = fighter();
        pc.hp = 0;
        assert!(matches!(pc.validate(), Err(ConfigError::InvalidPcHp { .. })));

        let mut pc = fighter();
        pc.ac = -1;
        assert!(matches!(pc.validate(), Err(ConfigError::NegativeAc { .. })));

        let mut pc = fighter();
        pc.damage = DamageSpec::Dpr(f64::NAN);
        assert!(matches!(
            pc.validate(),
            Err(ConfigError::InvalidDamageOutput { .. })
        ));
    }

    #[test]
    fn test_boss_resistance_bounds() {
        let mut b = boss(vec![claw()]);
        b.resistance = 0.0;
        assert!(matches!(
            b.validate(),
            Err(ConfigError::InvalidResistance { .. })
        ));
        b.resistance = 1.5;
        assert!(b.validate().is_err());
        b.resistance = 0.5;
        assert!(b.validate().is_ok());
    }

    #[test]
    fn test_boss_needs_offense() {
        let mut disabled = claw();
        disabled.enabled = false;
        assert_eq!(
            boss(vec![disabled]).validate(),
            Err(ConfigError::NoBossOffense)
        );

        let mut b = boss(vec![]);
        b.lair = Some(LairSpec {
            average_damage: 6.0,
            targets: 2,
            every: 2,
            enabled: true,
        });
        let kit = b.validate().unwrap();
        assert_eq!(kit.lair.unwrap().cadence, LairCadence::EveryNth(2));
    }

    #[test]
    fn test_recharge_text_and_chance() {
        let mut b = boss(vec![claw()]);
        b.recharge = Some(RechargeSpec {
            name: "Fire Breath".to_string(),
            recharge: RechargeChanceSpec::Text("5-6".to_string()),
            average_damage: 22.0,
            targets: 2,
            enabled: true,
        });
        let kit = b.validate().unwrap();
        assert!((kit.recharge.unwrap().chance - 1.0 / 3.0).abs() < 1e-9);

        if let Some(r) = b.recharge.as_mut() {
            r.recharge = RechargeChanceSpec::Chance(1.2);
        }
        assert!(matches!(
            b.validate(),
            Err(ConfigError::InvalidRechargeChance { .. })
        ));
    }

    #[test]
    fn test_zero_targets_rejected_everywhere() {
        let mut sweep = claw();
        sweep.targets = 0;
        assert!(matches!(
            boss(vec![sweep]).validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));

        let mut b = boss(vec![claw()]);
        b.lair = Some(LairSpec {
            average_damage: 6.0,
            targets: 0,
            every: 1,
            enabled: true,
        });
        assert!(matches!(
            b.validate(),
            Err(ConfigError::OutOfRange { what: "lair targets", .. })
        ));

        let mut b = boss(vec![claw()]);
        b.recharge = Some(RechargeSpec {
            name: "Fire Breath".to_string(),
            recharge: RechargeChanceSpec::Chance(0.5),
            average_damage: 22.0,
            targets: 0,
            enabled: true,
        });
        assert!(matches!(
            b.validate(),
            Err(ConfigError::OutOfRange { what: "recharge targets", .. })
        ));
    }

    #[test]
    fn test_inert_rider_rejected() {
        let mut bite = claw();
        bite.rider = Some(RiderSpec {
            effect: RiderEffectSpec::ReduceAc,
            amount: -2,
            duration: 1,
            melee_only: true,
        });
        assert!(matches!(
            bite.validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));

        bite.rider = Some(RiderSpec {
            effect: RiderEffectSpec::GrantAdvantage,
            amount: 2,
            duration: 0,
            melee_only: true,
        });
        assert!(matches!(
            bite.validate(),
            Err(ConfigError::MalformedAttack { .. })
        ));

        bite.rider = Some(RiderSpec {
            effect: RiderEffectSpec::ReduceAc,
            amount: 2,
            duration: 2,
            melee_only: true,
        });
        assert!(bite.validate().is_ok());
    }

    #[test]
    fn test_encounter_json() {
        let json = r#"{
            "party": [
                {"name": "Fighter", "ac": 18, "hp": 40, "saves": {"str": 4, "con": 3},
                 "damage": {"dpr": 15.0}},
                {"name": "Wizard", "ac": 13, "hp": 30, "saves": {"int": 5},
                 "damage": {"nova": {"nova_dpr": 25.0, "attack_bonus": 8, "target_ac": 17}}}
            ],
            "boss": {
                "name": "Drake", "hp": 150,
                "attacks": [
                    {"name": "Bite", "to_hit": 7, "damage": "2d10+5",
                     "rider": {"effect": "reduce_ac", "amount": 2, "duration": 1}},
                    {"name": "Fire Breath", "dc": 15, "save": "DEX", "damage": "8d6",
                     "melee": false, "targets": 2}
                ],
                "recharge": {"recharge": "5-6", "average_damage": 22.0}
            },
            "thp_per_round": "1d6+4"
        }"#;
        let spec: EncounterSpec = serde_json::from_str(json).unwrap();
        let enc = spec.validate().unwrap();

        assert_eq!(enc.party.len(), 2);
        assert!(enc.party[1].effective_dpr > 0.0);
        assert_eq!(enc.boss.attacks.len(), 2);
        assert_eq!(
            enc.boss.attacks[0].rider.unwrap().kind,
            RiderKind::ReduceAc { amount: 2 }
        );
        assert_eq!(enc.boss.attacks[1].targets, 2);
        assert!((enc.thp_per_round - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_party_rejected() {
        let spec = EncounterSpec {
            party: vec![],
            boss: boss(vec![claw()]),
            thp_per_round: None,
        };
        assert_eq!(spec.validate(), Err(ConfigError::EmptyParty));
    }
}
