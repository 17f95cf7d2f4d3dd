//! A single trial: rounds until someone falls or time runs out.

use super::round::{RoundEnd, RoundResolver};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// How a trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialEnd {
    BossDead,
    PartyWiped,
    MaxRoundsReached,
}

/// Result of one trial. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub end: TrialEnd,
    /// Round the trial stopped in.
    pub rounds: u32,
    /// PCs down when the boss died, or when the trial stopped.
    pub pcs_down: usize,
}

impl TrialOutcome {
    /// Time-to-kill, if the boss died.
    pub fn ttk(&self) -> Option<u32> {
        match self.end {
            TrialEnd::BossDead => Some(self.rounds),
            _ => None,
        }
    }

    pub fn is_tpk(&self) -> bool {
        self.end == TrialEnd::PartyWiped
    }

    /// TTK with non-kills imputed as `max_rounds + 1`.
    pub fn censored_ttk(&self, max_rounds: u32) -> u32 {
        self.ttk().unwrap_or(max_rounds + 1)
    }
}

/// Play one trial from full HP.
pub fn run_trial(resolver: &RoundResolver<'_>, max_rounds: u32, rng: &mut impl Rng) -> TrialOutcome {
    let mut state = resolver.fresh_state();

    for round in 1..=max_rounds {
        let end = resolver.resolve_round(round, &mut state, rng);
        trace!(
            round,
            boss_hp = state.boss.hp,
            pcs_down = state.pcs_down(),
            ?end,
            "round resolved"
        );
        let end = match end {
            RoundEnd::Continue => continue,
            RoundEnd::BossDead => TrialEnd::BossDead,
            RoundEnd::PartyWiped => TrialEnd::PartyWiped,
        };
        return TrialOutcome {
            end,
            rounds: round,
            pcs_down: state.pcs_down(),
        };
    }

    TrialOutcome {
        end: TrialEnd::MaxRoundsReached,
        rounds: max_rounds,
        pcs_down: state.pcs_down(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatants::types::{Attack, BossKit, DamageOutput, Encounter, PlayerCharacter};
    use crate::core::dice::DamageDice;
    use crate::encounter::round::InitiativeMode;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn duel(pc_hp: u32, dpr: f64, boss_hp: f64) -> Encounter {
        Encounter::new(
            vec![PlayerCharacter::new(
                "Hero",
                15,
                pc_hp,
                DamageOutput::Fixed { dpr },
            )],
            BossKit::new(
                "Ogre",
                boss_hp,
                vec![Attack::attack_roll("Club", 6, DamageDice::parse("2d6+1").unwrap())],
            ),
        )
    }

    #[test]
    fn test_outcome_helpers() {
        let kill = TrialOutcome {
            end: TrialEnd::BossDead,
            rounds: 4,
            pcs_down: 1,
        };
        assert_eq!(kill.ttk(), Some(4));
        assert_eq!(kill.censored_ttk(12), 4);
        assert!(!kill.is_tpk());

        let wipe = TrialOutcome {
            end: TrialEnd::PartyWiped,
            rounds: 7,
            pcs_down: 3,
        };
        assert_eq!(wipe.ttk(), None);
        assert_eq!(wipe.censored_ttk(12), 13);
        assert!(wipe.is_tpk());
    }

    #[test]
    fn test_timeout_when_nobody_can_finish() {
        let enc = duel(10_000, 0.0, 100.0);
        let resolver = RoundResolver::new(&enc, InitiativeMode::Random, 0.6);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let outcome = run_trial(&resolver, 5, &mut rng);
        assert_eq!(outcome.end, TrialEnd::MaxRoundsReached);
        assert_eq!(outcome.rounds, 5);
        assert_eq!(outcome.ttk(), None);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let enc = duel(30, 10.0, 60.0);
        let resolver = RoundResolver::new(&enc, InitiativeMode::Random, 0.6);
        for seed in 0..20 {
            let a = run_trial(&resolver, 12, &mut ChaCha8Rng::seed_from_u64(seed));
            let b = run_trial(&resolver, 12, &mut ChaCha8Rng::seed_from_u64(seed));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_hp_stays_in_bounds_every_round() {
        let mut enc = duel(30, 10.0, 60.0);
        enc.boss.regen_per_round = 5.0;
        let resolver = RoundResolver::new(&enc, InitiativeMode::Random, 0.6);
        for seed in 0..200 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut state = resolver.fresh_state();
            for round in 1..=12 {
                let end = resolver.resolve_round(round, &mut state, &mut rng);
                assert!((0.0..=state.boss.max_hp).contains(&state.boss.hp));
                for pc in &state.pcs {
                    assert!((0.0..=pc.max_hp).contains(&pc.hp));
                }
                if end != RoundEnd::Continue {
                    break;
                }
            }
        }
    }
}
