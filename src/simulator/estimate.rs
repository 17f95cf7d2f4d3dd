//! Closed-form expectations, no dice rolled.
//!
//! Useful as a sanity check next to the Monte Carlo numbers: incoming damage
//! assumes the whole party stays up (targets spread evenly over all PCs) and
//! riders are ignored.

use crate::combatants::types::{Attack, Encounter, LairCadence, PlayerCharacter, Resolution};
use crate::core::combat_math::{hit_chance, save_fail_chance, save_for_half_damage};
use serde::Serialize;

/// Expected damage one PC takes per round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomingEstimate {
    pub name: String,
    pub max_hp: u32,
    pub incoming_dpr: f64,
    /// Rounds until this PC drops at the expected rate; `None` if it never does.
    pub rounds_to_zero: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BossEstimate {
    pub party_dpr: f64,
    /// Party DPR after boss resistance and regeneration.
    pub net_dpr: f64,
    pub rounds_to_defeat: Option<f64>,
}

/// Chance a given PC is among `targets` picked from a party of `party_size`.
fn target_share(targets: usize, party_size: usize) -> f64 {
    if party_size == 0 {
        0.0
    } else {
        (targets as f64 / party_size as f64).min(1.0)
    }
}

/// Expected damage of one resolution of `attack` against `pc`.
pub fn expected_attack_damage(attack: &Attack, pc: &PlayerCharacter, encounter: &Encounter) -> f64 {
    match attack.resolution {
        Resolution::AttackRoll { to_hit } => {
            let chance = hit_chance(pc.ac, to_hit, encounter.boss.roll_mode);
            chance.noncrit * attack.damage.average() + chance.crit * attack.damage.crit_average()
        }
        Resolution::Save { dc, ability } => {
            let fail = save_fail_chance(dc, pc.saves.get(ability));
            save_for_half_damage(attack.damage.average(), fail)
        }
    }
}

pub fn incoming_damage(encounter: &Encounter) -> Vec<IncomingEstimate> {
    let party_size = encounter.party.len();
    let boss = &encounter.boss;

    encounter
        .party
        .iter()
        .map(|pc| {
            let attacks: f64 = boss
                .attacks
                .iter()
                .map(|a| {
                    a.uses_per_round as f64
                        * target_share(a.targets, party_size)
                        * expected_attack_damage(a, pc, encounter)
                })
                .sum();
            let lair = boss.lair.as_ref().map_or(0.0, |l| {
                let rate = match l.cadence {
                    LairCadence::EveryRound => 1.0,
                    LairCadence::EveryNth(n) => 1.0 / n.max(1) as f64,
                };
                l.average_damage * target_share(l.targets, party_size) * rate
            });
            // Long-run firing rate equals the per-round recharge chance.
            let recharge = boss.recharge.as_ref().map_or(0.0, |r| {
                r.average_damage * target_share(r.targets, party_size) * r.chance
            });

            let incoming_dpr =
                ((attacks + lair + recharge) * pc.resistance - encounter.thp_per_round).max(0.0);
            let rounds_to_zero = (incoming_dpr > 0.0).then(|| pc.max_hp as f64 / incoming_dpr);

            IncomingEstimate {
                name: pc.name.clone(),
                max_hp: pc.max_hp,
                incoming_dpr,
                rounds_to_zero,
            }
        })
        .collect()
}

pub fn boss_time_to_defeat(encounter: &Encounter) -> BossEstimate {
    let party_dpr = encounter.total_party_dpr();
    let net_dpr = party_dpr * encounter.boss.resistance - encounter.boss.regen_per_round;
    BossEstimate {
        party_dpr,
        net_dpr,
        rounds_to_defeat: (net_dpr > 0.0).then(|| encounter.boss.max_hp / net_dpr),
    }
}
