//! Per-trial mutable combatant state.
//!
//! One `TrialState` belongs to exactly one trial and is dropped when the
//! trial ends. Nothing here is shared between trials or threads.

use crate::combatants::types::{Encounter, Rider, RiderKind};
use crate::core::constants::MIN_EFFECTIVE_AC;

/// A rider currently affecting a PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveRider {
    pub kind: RiderKind,
    /// Rounds of effect left, including the current one.
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcState {
    pub hp: f64,
    pub max_hp: f64,
    pub thp: f64,
    pub down: bool,
    /// Riders in effect this round.
    pub riders: Vec<ActiveRider>,
    /// Riders landed this round; they take effect next round.
    pub pending: Vec<ActiveRider>,
}

impl PcState {
    pub fn new(max_hp: u32) -> Self {
        Self {
            hp: max_hp as f64,
            max_hp: max_hp as f64,
            thp: 0.0,
            down: false,
            riders: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.down
    }

    /// Apply damage, temporary HP first. Returns true if this drops the PC.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        if self.down || amount <= 0.0 {
            return false;
        }
        let absorbed = amount.min(self.thp);
        self.thp -= absorbed;
        self.hp = (self.hp - (amount - absorbed)).clamp(0.0, self.max_hp);
        if self.hp <= 0.0 {
            self.down = true;
            self.thp = 0.0;
            self.riders.clear();
            self.pending.clear();
            return true;
        }
        false
    }

    /// Temporary HP does not stack; the larger pool wins.
    pub fn grant_thp(&mut self, amount: f64) {
        if self.is_alive() && amount > self.thp {
            self.thp = amount;
        }
    }

    /// Queue a rider landed this round. A repeat of the same kind refreshes
    /// the queued one instead of stacking.
    pub fn queue_rider(&mut self, rider: Rider) {
        if self.down || rider.duration == 0 {
            return;
        }
        match self.pending.iter_mut().find(|r| r.kind == rider.kind) {
            Some(existing) => existing.remaining = existing.remaining.max(rider.duration),
            None => self.pending.push(ActiveRider {
                kind: rider.kind,
                remaining: rider.duration,
            }),
        }
    }

    pub fn grants_advantage(&self) -> bool {
        self.riders
            .iter()
            .any(|r| r.kind == RiderKind::GrantAdvantage)
    }

    /// AC after the strongest active reduction, floored at 1. Reductions
    /// never raise an AC that is already below the floor.
    pub fn effective_ac(&self, base_ac: i32) -> i32 {
        let reduction = self
            .riders
            .iter()
            .filter_map(|r| match r.kind {
                RiderKind::ReduceAc { amount } => Some(amount),
                RiderKind::GrantAdvantage => None,
            })
            .max()
            .unwrap_or(0);
        if reduction <= 0 {
            return base_ac;
        }
        (base_ac - reduction).max(MIN_EFFECTIVE_AC).min(base_ac)
    }

    /// End of round: spend one round of every active rider, then promote the
    /// riders landed this round.
    pub fn tick_riders(&mut self) {
        for rider in &mut self.riders {
            rider.remaining = rider.remaining.saturating_sub(1);
        }
        self.riders.retain(|r| r.remaining > 0);

        for queued in self.pending.drain(..) {
            match self.riders.iter_mut().find(|r| r.kind == queued.kind) {
                Some(existing) => existing.remaining = existing.remaining.max(queued.remaining),
                None => self.riders.push(queued),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossState {
    pub hp: f64,
    pub max_hp: f64,
    pub recharge_charged: bool,
}

impl BossState {
    pub fn new(max_hp: f64) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            recharge_charged: true,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0.0
    }

    pub fn take_damage(&mut self, amount: f64) {
        self.hp = (self.hp - amount.max(0.0)).clamp(0.0, self.max_hp);
    }

    /// Regenerate if still standing, never past max HP.
    pub fn regenerate(&mut self, amount: f64) {
        if !self.is_dead() {
            self.hp = (self.hp + amount).min(self.max_hp);
        }
    }
}

/// Everything that changes during one trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialState {
    pub pcs: Vec<PcState>,
    pub boss: BossState,
}

impl TrialState {
    pub fn new(encounter: &Encounter) -> Self {
        Self {
            pcs: encounter.party.iter().map(|pc| PcState::new(pc.max_hp)).collect(),
            boss: BossState::new(encounter.boss.max_hp),
        }
    }

    /// Indices of PCs still standing.
    pub fn living(&self) -> Vec<usize> {
        self.pcs
            .iter()
            .enumerate()
            .filter(|(_, pc)| pc.is_alive())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn pcs_down(&self) -> usize {
        self.pcs.iter().filter(|pc| pc.down).count()
    }

    pub fn party_wiped(&self) -> bool {
        self.pcs.iter().all(|pc| pc.down)
    }
}
