//! Decimal helpers shared by fee, allocation and savings arithmetic.

use bigdecimal::BigDecimal;

/// Fees and savings are kept to cents.
pub const CURRENCY_SCALE: i64 = 2;

pub fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

pub fn hundred() -> BigDecimal {
    BigDecimal::from(100)
}

/// `base × pct / 100`, rounded to cents.
pub fn percent_of(base: &BigDecimal, pct: &BigDecimal) -> BigDecimal {
    (base * pct / hundred()).round(CURRENCY_SCALE)
}

/// `base × pct / 100`, truncated to cents. Deduction lines use this so their
/// sum never exceeds the exact total of the percentages.
pub fn percent_of_truncated(base: &BigDecimal, pct: &BigDecimal) -> BigDecimal {
    (base * pct / hundred()).with_scale(CURRENCY_SCALE)
}

/// Whole currency units of a non-negative amount (truncates the fraction).
pub fn whole_units(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale(0)
}

pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a BigDecimal>) -> BigDecimal {
    amounts.into_iter().fold(zero(), |acc, x| acc + x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn percent_of_rounds_to_cents() {
        let base = BigDecimal::from(200_000);
        assert_eq!(percent_of(&base, &BigDecimal::from(5)), BigDecimal::from(10_000));

        let base = BigDecimal::from_str("333.33").unwrap();
        assert_eq!(
            percent_of(&base, &BigDecimal::from(3)),
            BigDecimal::from_str("10.00").unwrap()
        );
    }

    #[test]
    fn truncated_percent_drops_fractions_of_a_cent() {
        let base = BigDecimal::from_str("333.33").unwrap();
        assert_eq!(
            percent_of_truncated(&base, &BigDecimal::from(3)),
            BigDecimal::from_str("9.99").unwrap()
        );
        assert_eq!(
            percent_of_truncated(&BigDecimal::from(100), &BigDecimal::from_str("99.999").unwrap()),
            BigDecimal::from_str("99.99").unwrap()
        );
    }

    #[test]
    fn whole_units_truncates() {
        let amount = BigDecimal::from_str("63085.714285").unwrap();
        assert_eq!(whole_units(&amount), BigDecimal::from(63_085));
    }

    #[test]
    fn sums_amounts() {
        let amounts = vec![BigDecimal::from(1), BigDecimal::from(2), BigDecimal::from(3)];
        assert_eq!(sum(&amounts), BigDecimal::from(6));
        assert_eq!(sum(&Vec::new()), zero());
    }
}
