//! Shared combat math for the round resolver and the estimators.
//!
//! These are pure functions over d20 odds, plus the few randomness
//! primitives the engine needs (d20 rolls, Gamma damage draws, uniform
//! target selection). Every random function takes the generator explicitly.

use rand::seq::index;
use rand::Rng;
use rand_distr::Gamma;
use serde::{Deserialize, Serialize};

/// How a d20 is rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    #[default]
    Normal,
    #[serde(alias = "adv")]
    Advantage,
    #[serde(alias = "dis")]
    Disadvantage,
}

impl RollMode {
    /// Apply a granted advantage. Advantage and disadvantage cancel out.
    pub fn with_advantage(self) -> Self {
        match self {
            RollMode::Normal | RollMode::Advantage => RollMode::Advantage,
            RollMode::Disadvantage => RollMode::Normal,
        }
    }
}

/// Outcome of a single attack roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackRoll {
    Miss,
    Hit,
    Crit,
}

impl AttackRoll {
    pub fn landed(self) -> bool {
        !matches!(self, AttackRoll::Miss)
    }
}

/// Roll a d20 under the given mode.
pub fn roll_d20(mode: RollMode, rng: &mut impl Rng) -> u32 {
    let first = rng.gen_range(1..=20);
    match mode {
        RollMode::Normal => first,
        RollMode::Advantage => first.max(rng.gen_range(1..=20)),
        RollMode::Disadvantage => first.min(rng.gen_range(1..=20)),
    }
}

/// Classify a natural d20 against a target AC.
///
/// A natural 1 always misses and a natural 20 always hits as a crit.
pub fn classify_attack_roll(natural: u32, to_hit: i32, ac: i32) -> AttackRoll {
    match natural {
        1 => AttackRoll::Miss,
        20 => AttackRoll::Crit,
        n if n as i32 + to_hit >= ac => AttackRoll::Hit,
        _ => AttackRoll::Miss,
    }
}

/// Probability split of an attack roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitChance {
    pub noncrit: f64,
    pub crit: f64,
}

impl HitChance {
    pub fn any(&self) -> f64 {
        self.noncrit + self.crit
    }
}

/// Exact hit/crit odds for an attack roll, enumerating every d20 outcome.
pub fn hit_chance(ac: i32, to_hit: i32, mode: RollMode) -> HitChance {
    let mut noncrit = 0.0;
    let mut crit = 0.0;
    let mut tally = |natural: u32, weight: f64| match classify_attack_roll(natural, to_hit, ac) {
        AttackRoll::Hit => noncrit += weight,
        AttackRoll::Crit => crit += weight,
        AttackRoll::Miss => {}
    };

    match mode {
        RollMode::Normal => {
            for r in 1..=20 {
                tally(r, 1.0 / 20.0);
            }
        }
        RollMode::Advantage | RollMode::Disadvantage => {
            for r1 in 1..=20u32 {
                for r2 in 1..=20u32 {
                    let r = if mode == RollMode::Advantage {
                        r1.max(r2)
                    } else {
                        r1.min(r2)
                    };
                    tally(r, 1.0 / 400.0);
                }
            }
        }
    }

    HitChance { noncrit, crit }
}

/// Chance a target fails a save: the d20 plus bonus lands below the DC.
///
/// Natural 1s and 20s are not special for saves.
pub fn save_fail_chance(dc: i32, save_bonus: i32) -> f64 {
    let failing_faces = (dc - save_bonus - 1).clamp(0, 20);
    failing_faces as f64 / 20.0
}

/// Save-for-half damage: full on a failure, half on a success, in expectation.
pub fn save_for_half_damage(average: f64, fail_chance: f64) -> f64 {
    average * (0.5 + 0.5 * fail_chance)
}

/// Factor turning nova damage into effective per-round damage.
pub fn nova_factor(chance: HitChance, crit_ratio: f64, uptime: f64) -> f64 {
    (chance.noncrit + crit_ratio * chance.crit) * uptime
}

/// Parse recharge notation: `"5-6"` recharges on a 5 or 6, `"6"` only on a 6.
pub fn parse_recharge(text: &str) -> Option<f64> {
    let t = text.trim().replace(['–', '—'], "-");
    if t.is_empty() {
        return None;
    }

    if let Some((lo, hi)) = t.split_once('-') {
        let lo: u32 = lo.trim().parse().ok()?;
        let hi: u32 = hi.trim().parse().ok()?;
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        if lo < 1 || hi > 6 {
            return None;
        }
        return Some((hi - lo + 1) as f64 / 6.0);
    }

    let k: u32 = t.parse().ok()?;
    if !(2..=6).contains(&k) {
        return None;
    }
    Some((7 - k) as f64 / 6.0)
}

/// Gamma distribution with the given mean and coefficient of variation.
///
/// shape = 1/CV², scale = mean/shape. Returns `None` when the mean is not
/// positive; such a source always deals zero.
pub fn damage_distribution(mean: f64, cv: f64) -> Option<Gamma<f64>> {
    if mean.is_nan() || mean <= 0.0 || cv.is_nan() || cv <= 0.0 {
        return None;
    }
    let shape = 1.0 / (cv * cv);
    Gamma::new(shape, mean / shape).ok()
}

/// Pick `n` distinct entries of `pool` uniformly, or all of them if `n`
/// covers the pool.
pub fn choose_targets(pool: &[usize], n: usize, rng: &mut impl Rng) -> Vec<usize> {
    if n >= pool.len() {
        return pool.to_vec();
    }
    index::sample(rng, pool.len(), n)
        .into_iter()
        .map(|i| pool[i])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rand_distr::Distribution;

    #[test]
    fn test_classify_natural_extremes() {
        assert_eq!(classify_attack_roll(1, 100, 10), AttackRoll::Miss);
        assert_eq!(classify_attack_roll(20, -100, 30), AttackRoll::Crit);
        assert_eq!(classify_attack_roll(9, 6, 15), AttackRoll::Hit);
        assert_eq!(classify_attack_roll(8, 6, 15), AttackRoll::Miss);
    }

    #[test]
    fn test_hit_chance_normal() {
        // +6 vs AC 15 hits on 9..=19 (11 faces) plus crit on 20
        let c = hit_chance(15, 6, RollMode::Normal);
        assert!((c.noncrit - 11.0 / 20.0).abs() < 1e-9);
        assert!((c.crit - 1.0 / 20.0).abs() < 1e-9);
        assert!((c.any() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_hit_chance_extremes_still_allow_nat_rolls() {
        let impossible = hit_chance(40, 0, RollMode::Normal);
        assert!((impossible.any() - 0.05).abs() < 1e-9);

        let trivial = hit_chance(2, 10, RollMode::Normal);
        assert!((trivial.any() - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_advantage_beats_normal_beats_disadvantage() {
        let adv = hit_chance(16, 5, RollMode::Advantage).any();
        let normal = hit_chance(16, 5, RollMode::Normal).any();
        let dis = hit_chance(16, 5, RollMode::Disadvantage).any();
        assert!(adv > normal && normal > dis);
        // crit with advantage is 1 - (19/20)^2
        let crit = hit_chance(16, 5, RollMode::Advantage).crit;
        assert!((crit - 0.0975).abs() < 1e-9);
    }

    #[test]
    fn test_roll_mode_cancel() {
        assert_eq!(RollMode::Normal.with_advantage(), RollMode::Advantage);
        assert_eq!(RollMode::Disadvantage.with_advantage(), RollMode::Normal);
        assert_eq!(RollMode::Advantage.with_advantage(), RollMode::Advantage);
    }

    #[test]
    fn test_save_fail_chance() {
        // DC 15 vs +2: fails on 1..=12
        assert!((save_fail_chance(15, 2) - 0.6).abs() < 1e-9);
        // No nat-1 floor and no nat-20 ceiling
        assert_eq!(save_fail_chance(5, 10), 0.0);
        assert_eq!(save_fail_chance(40, 0), 1.0);
    }

    #[test]
    fn test_save_for_half() {
        assert!((save_for_half_damage(28.0, 1.0) - 28.0).abs() < 1e-9);
        assert!((save_for_half_damage(28.0, 0.0) - 14.0).abs() < 1e-9);
        assert!((save_for_half_damage(28.0, 0.5) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_recharge() {
        assert!((parse_recharge("5-6").unwrap() - 2.0 / 6.0).abs() < 1e-9);
        assert!((parse_recharge("6").unwrap() - 1.0 / 6.0).abs() < 1e-9);
        assert!((parse_recharge("4–6").unwrap() - 0.5).abs() < 1e-9);
        assert!((parse_recharge("6-5").unwrap() - 2.0 / 6.0).abs() < 1e-9);
        assert!(parse_recharge("").is_none());
        assert!(parse_recharge("0-7").is_none());
        assert!(parse_recharge("1").is_none());
        assert!(parse_recharge("often").is_none());
    }

    #[test]
    fn test_nova_factor() {
        let chance = HitChance {
            noncrit: 0.6,
            crit: 0.05,
        };
        assert!((nova_factor(chance, 2.0, 0.5) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_damage_distribution_mean_and_cv() {
        let dist = damage_distribution(10.0, 0.6).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let n = 50_000;
        let draws: Vec<f64> = (0..n).map(|_| dist.sample(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.2, "mean {mean}");
        assert!((var.sqrt() / mean - 0.6).abs() < 0.03);
    }

    #[test]
    fn test_damage_distribution_degenerate() {
        assert!(damage_distribution(0.0, 0.6).is_none());
        assert!(damage_distribution(10.0, 0.0).is_none());
        assert!(damage_distribution(f64::NAN, 0.6).is_none());
    }

    #[test]
    fn test_choose_targets() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let pool = [0, 2, 3, 5];
        assert_eq!(choose_targets(&pool, 4, &mut rng), pool.to_vec());
        assert_eq!(choose_targets(&pool, 9, &mut rng), pool.to_vec());

        for _ in 0..100 {
            let mut picked = choose_targets(&pool, 2, &mut rng);
            assert_eq!(picked.len(), 2);
            assert!(picked.iter().all(|p| pool.contains(p)));
            picked.dedup();
            assert_eq!(picked.len(), 2);
        }
    }
}
