//! Round resolution.
//!
//! A round walks a small state machine:
//!
//! ```text
//! RoundStart -> InitiativeCheck -> BossActs <-> PartyActs -> EndOfRound
//! ```
//!
//! `RoundStart` empties every temporary HP pool and `InitiativeCheck` refills
//! it, so each round's grant only ever absorbs that round's damage.
//! `BossActs` and `PartyActs` run in initiative order, and either one can end
//! the round early (`PartyWiped` after the boss turn, `BossDead` after the
//! party turn). The resolver itself is immutable and shared by every trial of
//! a run; all mutation goes through the trial's [`TrialState`].

use super::state::TrialState;
use crate::combatants::types::{Attack, Encounter, Resolution};
use crate::core::combat_math::{
    choose_targets, classify_attack_roll, damage_distribution, roll_d20, save_fail_chance,
    save_for_half_damage, AttackRoll,
};
use crate::core::constants::AREA_DAMAGE_CV;
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Who acts first each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiativeMode {
    /// Coin flip every round.
    #[default]
    Random,
    BossFirst,
    PartyFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    Continue,
    BossDead,
    PartyWiped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RoundStart,
    InitiativeCheck,
    BossActs,
    PartyActs,
    EndOfRound,
    Finished(RoundEnd),
}

/// Progress through one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Round {
    pub number: u32,
    pub phase: Phase,
    pub boss_first: bool,
    boss_done: bool,
    party_done: bool,
}

impl Round {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            phase: Phase::RoundStart,
            boss_first: false,
            boss_done: false,
            party_done: false,
        }
    }
}

/// Everything about an encounter that stays fixed across rounds and trials.
pub struct RoundResolver<'a> {
    encounter: &'a Encounter,
    initiative: InitiativeMode,
    /// Save-fail odds indexed `[attack][pc]`; zero for attack-roll attacks.
    save_fail: Vec<Vec<f64>>,
    /// Per-PC party damage draw; `None` for a PC with no damage output.
    party_damage: Vec<Option<Gamma<f64>>>,
    lair_damage: Option<Gamma<f64>>,
    recharge_damage: Option<Gamma<f64>>,
}

impl<'a> RoundResolver<'a> {
    /// Precompute per-encounter tables. `dpr_cv` must already be validated.
    pub fn new(encounter: &'a Encounter, initiative: InitiativeMode, dpr_cv: f64) -> Self {
        let save_fail = encounter
            .boss
            .attacks
            .iter()
            .map(|attack| {
                encounter
                    .party
                    .iter()
                    .map(|pc| match attack.resolution {
                        Resolution::Save { dc, ability } => save_fail_chance(dc, pc.saves.get(ability)),
                        Resolution::AttackRoll { .. } => 0.0,
                    })
                    .collect()
            })
            .collect();

        let party_damage = encounter
            .party
            .iter()
            .map(|pc| damage_distribution(pc.effective_dpr, dpr_cv))
            .collect();

        let lair_damage = encounter
            .boss
            .lair
            .as_ref()
            .and_then(|l| damage_distribution(l.average_damage, AREA_DAMAGE_CV));
        let recharge_damage = encounter
            .boss
            .recharge
            .as_ref()
            .and_then(|r| damage_distribution(r.average_damage, AREA_DAMAGE_CV));

        Self {
            encounter,
            initiative,
            save_fail,
            party_damage,
            lair_damage,
            recharge_damage,
        }
    }

    pub fn encounter(&self) -> &Encounter {
        self.encounter
    }

    /// Fresh per-trial state at full HP.
    pub fn fresh_state(&self) -> TrialState {
        TrialState::new(self.encounter)
    }

    /// Run one round to completion.
    pub fn resolve_round(&self, number: u32, state: &mut TrialState, rng: &mut impl Rng) -> RoundEnd {
        let mut round = Round::new(number);
        loop {
            if let Phase::Finished(end) = round.phase {
                return end;
            }
            self.step(&mut round, state, rng);
        }
    }

    /// Advance the round by one phase.
    pub fn step(&self, round: &mut Round, state: &mut TrialState, rng: &mut impl Rng) {
        round.phase = match round.phase {
            Phase::RoundStart => {
                for pc in &mut state.pcs {
                    pc.thp = 0.0;
                }
                Phase::InitiativeCheck
            }
            Phase::InitiativeCheck => {
                // Fresh buffers go up before either side acts
                for pc in &mut state.pcs {
                    pc.grant_thp(self.encounter.thp_per_round);
                }
                round.boss_first = match self.initiative {
                    InitiativeMode::Random => rng.gen_bool(0.5),
                    InitiativeMode::BossFirst => true,
                    InitiativeMode::PartyFirst => false,
                };
                if round.boss_first {
                    Phase::BossActs
                } else {
                    Phase::PartyActs
                }
            }
            Phase::BossActs => {
                self.boss_turn(round.number, state, rng);
                round.boss_done = true;
                if state.party_wiped() {
                    Phase::Finished(RoundEnd::PartyWiped)
                } else if round.party_done {
                    Phase::EndOfRound
                } else {
                    Phase::PartyActs
                }
            }
            Phase::PartyActs => {
                self.party_turn(state, rng);
                round.party_done = true;
                if state.boss.is_dead() {
                    Phase::Finished(RoundEnd::BossDead)
                } else if round.boss_done {
                    Phase::EndOfRound
                } else {
                    Phase::BossActs
                }
            }
            Phase::EndOfRound => {
                state.boss.regenerate(self.encounter.boss.regen_per_round);
                for pc in &mut state.pcs {
                    pc.tick_riders();
                }
                Phase::Finished(RoundEnd::Continue)
            }
            Phase::Finished(end) => Phase::Finished(end),
        };
    }

    fn boss_turn(&self, round: u32, state: &mut TrialState, rng: &mut impl Rng) {
        let boss = &self.encounter.boss;

        let fire_recharge = match &boss.recharge {
            Some(recharge) => {
                if !state.boss.recharge_charged && rng.gen_bool(recharge.chance) {
                    state.boss.recharge_charged = true;
                }
                std::mem::replace(&mut state.boss.recharge_charged, false)
            }
            None => false,
        };

        for (index, attack) in boss.attacks.iter().enumerate() {
            for _ in 0..attack.uses_per_round {
                let pool = state.living();
                if pool.is_empty() {
                    return;
                }
                for target in choose_targets(&pool, attack.targets, rng) {
                    self.resolve_attack(index, attack, target, state, rng);
                }
            }
        }

        if let Some(lair) = &boss.lair {
            if lair.cadence.fires(round) {
                self.area_damage(self.lair_damage.as_ref(), lair.targets, state, rng);
            }
        }

        if fire_recharge {
            if let Some(recharge) = &boss.recharge {
                trace!(round, ability = %recharge.name, "recharge ability fires");
                self.area_damage(self.recharge_damage.as_ref(), recharge.targets, state, rng);
            }
        }
    }

    fn resolve_attack(
        &self,
        index: usize,
        attack: &Attack,
        target: usize,
        state: &mut TrialState,
        rng: &mut impl Rng,
    ) {
        let pc = &self.encounter.party[target];
        let pc_state = &state.pcs[target];

        let (damage, landed) = match attack.resolution {
            Resolution::AttackRoll { to_hit } => {
                let mut mode = self.encounter.boss.roll_mode;
                if pc_state.grants_advantage() {
                    mode = mode.with_advantage();
                }
                let natural = roll_d20(mode, rng);
                match classify_attack_roll(natural, to_hit, pc_state.effective_ac(pc.ac)) {
                    AttackRoll::Miss => (0.0, false),
                    AttackRoll::Hit => (attack.damage.roll(rng), true),
                    AttackRoll::Crit => (attack.damage.roll_crit(rng), true),
                }
            }
            Resolution::Save { .. } => {
                let fail = self.save_fail[index][target];
                let damage = save_for_half_damage(attack.damage.average(), fail);
                let failed = attack.rider.is_some() && rng.gen::<f64>() < fail;
                (damage, failed)
            }
        };

        let dropped = state.pcs[target].take_damage(damage * pc.resistance);
        if dropped {
            trace!(attack = %attack.name, target = %pc.name, "PC drops");
        } else if landed {
            if let Some(rider) = attack.rider_applies() {
                state.pcs[target].queue_rider(rider);
            }
        }
    }

    fn area_damage(
        &self,
        dist: Option<&Gamma<f64>>,
        targets: usize,
        state: &mut TrialState,
        rng: &mut impl Rng,
    ) {
        let Some(dist) = dist else {
            return;
        };
        let pool = state.living();
        for target in choose_targets(&pool, targets, rng) {
            let damage = dist.sample(rng) * self.encounter.party[target].resistance;
            state.pcs[target].take_damage(damage);
        }
    }

    fn party_turn(&self, state: &mut TrialState, rng: &mut impl Rng) {
        let mut total = 0.0;
        for (i, pc) in state.pcs.iter().enumerate() {
            if pc.down {
                continue;
            }
            if let Some(dist) = &self.party_damage[i] {
                total += dist.sample(rng);
            }
        }
        state
            .boss
            .take_damage(total * self.encounter.boss.resistance);
    }
}
