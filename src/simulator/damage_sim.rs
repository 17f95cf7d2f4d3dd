//! Distribution of damage one PC takes over a fixed number of rounds.
//!
//! The rest of the party is assumed to stay up, so the PC's share of each
//! attack is the same every round. Riders landed on the PC carry into the
//! following rounds exactly as in a full encounter.

use super::report::percentile;
use crate::combatants::types::{Encounter, Resolution};
use crate::core::combat_math::{
    choose_targets, classify_attack_roll, damage_distribution, roll_d20, save_fail_chance,
    save_for_half_damage, AttackRoll,
};
use crate::core::constants::AREA_DAMAGE_CV;
use crate::encounter::state::PcState;
use crate::error::ConfigError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageTaken {
    pub name: String,
    pub rounds: u32,
    pub trials: u32,
    pub mean: f64,
    pub p95: f64,
    pub p99: f64,
    /// Share of trials where the total reached the PC's max HP.
    pub lethal_prob: f64,
}

struct AreaSource {
    dist: Gamma<f64>,
    targets: usize,
}

/// Simulate total damage taken by the named PC over `rounds` rounds.
pub fn simulate_damage_taken(
    encounter: &Encounter,
    pc_name: &str,
    rounds: u32,
    trials: u32,
    seed: u64,
) -> Result<DamageTaken, ConfigError> {
    encounter.validate()?;
    if trials == 0 {
        return Err(ConfigError::NoTrials);
    }
    if rounds == 0 {
        return Err(ConfigError::NoRounds);
    }
    let target = encounter
        .party
        .iter()
        .position(|pc| pc.name == pc_name)
        .ok_or_else(|| ConfigError::UnknownPartyMember {
            name: pc_name.to_string(),
        })?;

    info!(pc = pc_name, rounds, trials, "simulating damage taken");

    let area = |dist: Option<Gamma<f64>>, targets: usize| dist.map(|dist| AreaSource { dist, targets });
    let lair = encounter.boss.lair.as_ref().and_then(|l| {
        area(damage_distribution(l.average_damage, AREA_DAMAGE_CV), l.targets)
    });
    let recharge = encounter.boss.recharge.as_ref().and_then(|r| {
        area(damage_distribution(r.average_damage, AREA_DAMAGE_CV), r.targets)
    });

    let mut totals: Vec<f64> = (0..trials)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
            let mut sim = SingleTarget {
                encounter,
                target,
                lair: lair.as_ref(),
                recharge: recharge.as_ref(),
                charged: true,
                riders: PcState::new(encounter.party[target].max_hp),
            };
            (1..=rounds)
                .map(|round| sim.round(round, &mut rng))
                .sum::<f64>()
        })
        .collect();
    totals.sort_by(|a, b| a.total_cmp(b));

    let max_hp = encounter.party[target].max_hp as f64;
    let lethal = totals.iter().filter(|&&t| t >= max_hp).count();

    Ok(DamageTaken {
        name: pc_name.to_string(),
        rounds,
        trials,
        mean: totals.iter().sum::<f64>() / totals.len() as f64,
        p95: percentile(&totals, 95.0).unwrap_or(0.0),
        p99: percentile(&totals, 99.0).unwrap_or(0.0),
        lethal_prob: lethal as f64 / totals.len() as f64,
    })
}

struct SingleTarget<'a> {
    encounter: &'a Encounter,
    target: usize,
    lair: Option<&'a AreaSource>,
    recharge: Option<&'a AreaSource>,
    charged: bool,
    /// Only the rider bookkeeping is used; HP is tallied separately.
    riders: PcState,
}

impl SingleTarget<'_> {
    fn is_struck(&self, targets: usize, rng: &mut impl Rng) -> bool {
        let pool: Vec<usize> = (0..self.encounter.party.len()).collect();
        choose_targets(&pool, targets, rng).contains(&self.target)
    }

    fn round(&mut self, round: u32, rng: &mut impl Rng) -> f64 {
        let boss = &self.encounter.boss;
        let pc = &self.encounter.party[self.target];
        let mut damage = 0.0;

        for attack in &boss.attacks {
            for _ in 0..attack.uses_per_round {
                if !self.is_struck(attack.targets, rng) {
                    continue;
                }
                let (dealt, landed) = match attack.resolution {
                    Resolution::AttackRoll { to_hit } => {
                        let mut mode = boss.roll_mode;
                        if self.riders.grants_advantage() {
                            mode = mode.with_advantage();
                        }
                        let ac = self.riders.effective_ac(pc.ac);
                        match classify_attack_roll(roll_d20(mode, rng), to_hit, ac) {
                            AttackRoll::Miss => (0.0, false),
                            AttackRoll::Hit => (attack.damage.roll(rng), true),
                            AttackRoll::Crit => (attack.damage.roll_crit(rng), true),
                        }
                    }
                    Resolution::Save { dc, ability } => {
                        let fail = save_fail_chance(dc, pc.saves.get(ability));
                        let failed = attack.rider.is_some() && rng.gen::<f64>() < fail;
                        (save_for_half_damage(attack.damage.average(), fail), failed)
                    }
                };
                damage += dealt;
                if landed {
                    if let Some(rider) = attack.rider_applies() {
                        self.riders.queue_rider(rider);
                    }
                }
            }
        }

        if let (Some(lair), Some(source)) = (&boss.lair, self.lair) {
            if lair.cadence.fires(round) && self.is_struck(source.targets, rng) {
                damage += source.dist.sample(rng);
            }
        }

        if let (Some(ability), Some(source)) = (&boss.recharge, self.recharge) {
            if !self.charged && rng.gen_bool(ability.chance) {
                self.charged = true;
            }
            if std::mem::replace(&mut self.charged, false) && self.is_struck(source.targets, rng) {
                damage += source.dist.sample(rng);
            }
        }

        self.riders.tick_riders();
        (damage * pc.resistance - self.encounter.thp_per_round).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatants::types::{
        Ability, Attack, BossKit, DamageOutput, PlayerCharacter, Rider, RiderKind, SaveBonuses,
    };
    use crate::core::dice::DamageDice;

    fn party_of(n: usize) -> Vec<PlayerCharacter> {
        (0..n)
            .map(|i| {
                PlayerCharacter::new(format!("PC{}", i), 15, 40, DamageOutput::Fixed { dpr: 8.0 })
            })
            .collect()
    }

    #[test]
    fn test_unknown_pc() {
        let enc = Encounter::new(
            party_of(2),
            BossKit::new("Ogre", 60.0, vec![Attack::attack_roll("Club", 6, DamageDice::flat(8))]),
        );
        assert_eq!(
            simulate_damage_taken(&enc, "Nobody", 3, 10, 1),
            Err(ConfigError::UnknownPartyMember {
                name: "Nobody".to_string()
            })
        );
    }

    #[test]
    fn test_mean_matches_expectation() {
        // Save attack: deterministic 28 * 0.8 per strike, one of two PCs hit per use
        let breath = Attack::save(
            "Breath",
            15,
            Ability::Dexterity,
            DamageDice::parse("8d6").unwrap(),
        );
        let mut party = party_of(2);
        party[0] = party[0]
            .clone()
            .with_saves(SaveBonuses::new([0, 2, 0, 0, 0, 0]));
        let enc = Encounter::new(party, BossKit::new("Drake", 100.0, vec![breath]));

        let result = simulate_damage_taken(&enc, "PC0", 4, 4_000, 7).unwrap();
        // 4 rounds * 0.5 * 22.4 = 44.8
        assert!((result.mean - 44.8).abs() < 1.5, "mean {}", result.mean);
        assert!(result.p99 >= result.p95);
        assert!(result.p95 <= 4.0 * 22.4 + 1e-9);
    }

    #[test]
    fn test_reduce_ac_rider_raises_damage() {
        // +0 vs AC 15 hits 30% of the time; after a -5 rider, 55%
        let plain = Attack::attack_roll("Bite", 0, DamageDice::flat(1));
        let mut bite = plain.clone();
        bite.rider = Some(Rider {
            kind: RiderKind::ReduceAc { amount: 5 },
            duration: 1,
            melee_only: true,
        });

        let mean = |attack: Attack| {
            let enc = Encounter::new(party_of(1), BossKit::new("Drake", 100.0, vec![attack]));
            simulate_damage_taken(&enc, "PC0", 10, 4_000, 13).unwrap().mean
        };
        let without = mean(plain);
        let with = mean(bite);
        assert!((without - 3.0).abs() < 0.2, "plain mean {}", without);
        assert!(with > without * 1.2, "rider mean {} vs {}", with, without);
    }
}
