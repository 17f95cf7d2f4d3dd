//! Damage dice expressions such as `2d10+5` or `8d6`.
//!
//! Crits are "crunchy": one set of dice is taken at its maximum, a second set
//! is rolled, and the flat modifier is added once.

use crate::core::constants::MAX_DICE_PER_TERM;
use crate::error::ConfigError;
use rand::Rng;
use std::fmt;

/// One `NdS` term. A negative count subtracts the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceTerm {
    pub count: i32,
    pub sides: u32,
}

/// Parsed damage expression: dice terms plus a flat modifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DamageDice {
    pub terms: Vec<DiceTerm>,
    pub modifier: i32,
}

impl DamageDice {
    /// Flat damage with no dice.
    pub fn flat(modifier: i32) -> Self {
        Self {
            terms: Vec::new(),
            modifier,
        }
    }

    /// Parse an expression like `2d6+3`, `d8`, `1d10-1` or `7`.
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidDamageExpr {
            expr: expr.to_string(),
        };

        let compact: String = expr
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if compact.is_empty() {
            return Err(invalid());
        }

        let mut dice = DamageDice::default();
        let mut rest = compact.as_str();
        let mut first = true;

        while !rest.is_empty() {
            let (sign, body) = match rest.as_bytes()[0] {
                b'+' => (1, &rest[1..]),
                b'-' => (-1, &rest[1..]),
                _ if first => (1, rest),
                _ => return Err(invalid()),
            };
            first = false;

            let end = body.find(['+', '-']).unwrap_or(body.len());
            let token = &body[..end];
            rest = &body[end..];
            if token.is_empty() {
                return Err(invalid());
            }

            match token.split_once('d') {
                Some((count, sides)) => {
                    let count: i32 = if count.is_empty() {
                        1
                    } else {
                        count.parse().map_err(|_| invalid())?
                    };
                    let sides: u32 = sides.parse().map_err(|_| invalid())?;
                    if sides == 0 || count > MAX_DICE_PER_TERM {
                        return Err(invalid());
                    }
                    if count != 0 {
                        dice.terms.push(DiceTerm {
                            count: sign * count,
                            sides,
                        });
                    }
                }
                None => {
                    let value: i32 = token.parse().map_err(|_| invalid())?;
                    dice.modifier = dice
                        .modifier
                        .checked_add(sign * value)
                        .ok_or_else(invalid)?;
                }
            }
        }

        Ok(dice)
    }

    /// Expected damage of a normal hit.
    pub fn average(&self) -> f64 {
        let dice: f64 = self
            .terms
            .iter()
            .map(|t| t.count as f64 * (t.sides as f64 + 1.0) / 2.0)
            .sum();
        (dice + self.modifier as f64).max(0.0)
    }

    /// Expected damage of a crunchy crit: max dice + rolled dice + modifier.
    pub fn crit_average(&self) -> f64 {
        let dice: f64 = self
            .terms
            .iter()
            .map(|t| t.count as f64 * (t.sides as f64 + (t.sides as f64 + 1.0) / 2.0))
            .sum();
        (dice + self.modifier as f64).max(0.0)
    }

    /// Sum of all dice at their maximum face, modifier excluded.
    pub fn max_dice(&self) -> i64 {
        self.terms
            .iter()
            .map(|t| t.count as i64 * t.sides as i64)
            .sum()
    }

    /// Largest possible normal-hit result.
    pub fn max_damage(&self) -> f64 {
        (self.max_dice() + self.modifier as i64).max(0) as f64
    }

    fn roll_dice(&self, rng: &mut impl Rng) -> i64 {
        let mut total = 0i64;
        for term in &self.terms {
            let n = term.count.unsigned_abs();
            let rolled: i64 = (0..n).map(|_| rng.gen_range(1..=term.sides) as i64).sum();
            total += rolled * term.count.signum() as i64;
        }
        total
    }

    /// Roll a normal hit. Never negative.
    pub fn roll(&self, rng: &mut impl Rng) -> f64 {
        (self.roll_dice(rng) + self.modifier as i64).max(0) as f64
    }

    /// Roll a crunchy crit. Never below the maximum of a normal hit.
    pub fn roll_crit(&self, rng: &mut impl Rng) -> f64 {
        (self.max_dice() + self.roll_dice(rng) + self.modifier as i64).max(0) as f64
    }
}

impl fmt::Display for DamageDice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        for term in &self.terms {
            if wrote {
                write!(f, "{}", if term.count < 0 { "-" } else { "+" })?;
            } else if term.count < 0 {
                write!(f, "-")?;
            }
            write!(f, "{}d{}", term.count.abs(), term.sides)?;
            wrote = true;
        }
        if self.modifier != 0 || !wrote {
            if wrote && self.modifier >= 0 {
                write!(f, "+")?;
            }
            write!(f, "{}", self.modifier)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_common_expressions() {
        let d = DamageDice::parse("2d10+5").unwrap();
        assert_eq!(d.terms, vec![DiceTerm { count: 2, sides: 10 }]);
        assert_eq!(d.modifier, 5);

        let d = DamageDice::parse(" 1d8 + 1d6 - 2 ").unwrap();
        assert_eq!(d.terms.len(), 2);
        assert_eq!(d.modifier, -2);

        let d = DamageDice::parse("d12").unwrap();
        assert_eq!(d.terms, vec![DiceTerm { count: 1, sides: 12 }]);

        let d = DamageDice::parse("7").unwrap();
        assert!(d.terms.is_empty());
        assert_eq!(d.modifier, 7);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "abc", "2d", "2d0", "1d6++2", "3x4", "1d6+"] {
            assert!(DamageDice::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        for bad in ["2147483647+1", "-2147483647-2", "1d6+99999999999", "100000d6"] {
            assert!(
                matches!(DamageDice::parse(bad), Err(ConfigError::InvalidDamageExpr { .. })),
                "{bad:?} should not parse"
            );
        }
        assert_eq!(DamageDice::parse("2147483647").unwrap().modifier, i32::MAX);
    }

    #[test]
    fn test_averages() {
        let d = DamageDice::parse("2d6+5").unwrap();
        assert!((d.average() - 12.0).abs() < 1e-9);
        // 2 * (6 + 3.5) + 5
        assert!((d.crit_average() - 24.0).abs() < 1e-9);

        let d = DamageDice::parse("8d6").unwrap();
        assert!((d.average() - 28.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_floors_at_zero() {
        let d = DamageDice::parse("1d4-10").unwrap();
        assert_eq!(d.average(), 0.0);
    }

    #[test]
    fn test_roll_within_bounds() {
        let d = DamageDice::parse("3d6+2").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..500 {
            let v = d.roll(&mut rng);
            assert!((5.0..=20.0).contains(&v));
        }
    }

    #[test]
    fn test_crit_never_below_normal_max() {
        let d = DamageDice::parse("2d8+4").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..500 {
            let crit = d.roll_crit(&mut rng);
            assert!(crit >= d.max_damage());
            assert!(crit <= 2.0 * d.max_dice() as f64 + 4.0);
        }
    }

    #[test]
    fn test_display_round_trips_shape() {
        assert_eq!(DamageDice::parse("2d10+5").unwrap().to_string(), "2d10+5");
        assert_eq!(DamageDice::parse("1d6-1").unwrap().to_string(), "1d6-1");
        assert_eq!(DamageDice::flat(0).to_string(), "0");
    }
}
