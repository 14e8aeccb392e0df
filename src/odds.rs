//! Odds Math: pure, stateless numeric conversions and sizing formulas.
//!
//! Nothing here allocates implicitly or performs I/O. Out-of-range inputs
//! fail with [`EngineError::BadInput`].

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{EngineError, Result};
use crate::models::OrderSide;

/// American odds → implied probability.
pub fn american_to_implied(odds: i32) -> Decimal {
    if odds == 0 {
        return dec!(0.5);
    }
    let o = Decimal::from(odds.unsigned_abs());
    if odds < 0 {
        o / (o + dec!(100))
    } else {
        dec!(100) / (o + dec!(100))
    }
}

/// Implied probability → American odds (rounded to nearest integer).
pub fn implied_to_american(p: Decimal) -> Result<i32> {
    if p <= Decimal::ZERO || p >= Decimal::ONE {
        return Err(EngineError::BadInput(format!(
            "probability {p} out of (0,1)"
        )));
    }
    let odds = if p >= dec!(0.5) {
        -(p / (Decimal::ONE - p) * dec!(100))
    } else {
        (Decimal::ONE - p) / p * dec!(100)
    };
    Ok(odds.round().try_into().unwrap_or(0))
}

/// Cents (0-100) → probability (0-1), clamped.
pub fn cents_to_prob(cents: Decimal) -> Decimal {
    (cents / dec!(100)).clamp(Decimal::ZERO, Decimal::ONE)
}

pub enum ConsensusMethod {
    Mean,
    Median,
    Weighted,
}

/// Aggregate a set of probabilities via mean, median, or confidence-weighted
/// average (weight = `1 + |p - 0.5|`).
pub fn consensus(probs: &[Decimal], method: ConsensusMethod) -> Option<Decimal> {
    if probs.is_empty() {
        return None;
    }
    match method {
        ConsensusMethod::Mean => {
            Some(probs.iter().copied().sum::<Decimal>() / Decimal::from(probs.len()))
        }
        ConsensusMethod::Median => {
            let mut sorted: Vec<Decimal> = probs.to_vec();
            sorted.sort();
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Some((sorted[mid - 1] + sorted[mid]) / dec!(2))
            } else {
                Some(sorted[mid])
            }
        }
        ConsensusMethod::Weighted => {
            let mut weighted_sum = Decimal::ZERO;
            let mut weight_sum = Decimal::ZERO;
            for &p in probs {
                let weight = Decimal::ONE + (p - dec!(0.5)).abs();
                weighted_sum += p * weight;
                weight_sum += weight;
            }
            if weight_sum.is_zero() {
                None
            } else {
                Some(weighted_sum / weight_sum)
            }
        }
    }
}

/// Remove the vig from two complementary probabilities, normalizing them
/// to sum to 1. Guards a non-positive denominator by returning `(0.5, 0.5)`
/// (Open Question #4).
pub fn remove_vig(home: Decimal, away: Decimal) -> (Decimal, Decimal) {
    let total = home + away;
    if total <= Decimal::ZERO {
        return (dec!(0.5), dec!(0.5));
    }
    (home / total, away / total)
}

/// The raw vig a vendor is charging: how far the two implied probabilities
/// sum above 1.
pub fn vig(home: Decimal, away: Decimal) -> Decimal {
    home + away - Decimal::ONE
}

/// Expected value of buying `side` at `price_c` cents against a believed
/// true probability `true_p`.
pub fn ev(price_c: Decimal, true_p: Decimal, side: OrderSide) -> Decimal {
    let p = match side {
        OrderSide::Yes => true_p,
        OrderSide::No => Decimal::ONE - true_p,
    };
    let price_p = cents_to_prob(price_c);
    if price_p.is_zero() {
        return Decimal::ZERO;
    }
    (p - price_p) / price_p
}

/// Kelly fraction for a binary contract at `price_c` cents.
pub fn kelly(price_c: Decimal, true_p: Decimal, side: OrderSide, frac: Decimal) -> Decimal {
    let p = match side {
        OrderSide::Yes => true_p,
        OrderSide::No => Decimal::ONE - true_p,
    };
    let cost = price_c;
    let payout = dec!(100) - price_c;
    if cost <= Decimal::ZERO || payout <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let b = payout / cost;
    let q = Decimal::ONE - p;
    let f_star = (p * b - q) / b;
    (f_star * frac).clamp(Decimal::ZERO, Decimal::ONE).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn american_to_implied_boundaries() {
        assert_eq!(american_to_implied(0), dec!(0.5));
        assert_eq!(american_to_implied(100), dec!(0.5));
        assert_eq!(american_to_implied(-100), dec!(0.5));
    }

    #[test]
    fn implied_to_american_round_trips() {
        for odds in (-1000..=-100).step_by(50).chain((100..=1000).step_by(50)) {
            let p = american_to_implied(odds);
            let back = implied_to_american(p).unwrap();
            assert!((back - odds).abs() <= 1, "odds={odds} back={back}");
        }
    }

    #[test]
    fn remove_vig_sums_to_one() {
        let (h, a) = remove_vig(dec!(0.55), dec!(0.52));
        assert_eq!(h + a, Decimal::ONE);
    }

    #[test]
    fn remove_vig_guards_zero_denominator() {
        let (h, a) = remove_vig(Decimal::ZERO, Decimal::ZERO);
        assert_eq!(h, dec!(0.5));
        assert_eq!(a, dec!(0.5));
    }

    #[test]
    fn ev_sharp_line_scenario() {
        // Scenario 1: entry 46c, true_p=0.525, Yes side -> ev ~= 0.141
        let e = ev(dec!(46), dec!(0.525), OrderSide::Yes);
        assert!((e - dec!(0.1413)).abs() < dec!(0.001));
    }

    #[test]
    fn kelly_never_negative() {
        let f = kelly(dec!(90), dec!(0.5), OrderSide::Yes, dec!(0.25));
        assert_eq!(f, Decimal::ZERO);
    }
}
