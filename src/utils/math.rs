//! Conversions between decimal amounts and integer base units

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use crate::errors::ValidationError;

pub fn pow10(n: u32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        8 => dec!(100_000_000),
        _ => {
            let mut result = dec!(1);
            for _ in 0..n {
                result *= dec!(10);
            }
            result
        }
    }
}

/// Converts a positive decimal amount into integer base units, refusing
/// amounts finer than `decimals` allows.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u64, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedAmount {
        value: amount.to_string(),
        reason,
    };

    if amount <= Decimal::ZERO {
        return Err(malformed("must be greater than zero".to_string()));
    }
    if amount.normalize().scale() > decimals {
        return Err(malformed(format!("more than {} decimal places", decimals)));
    }
    amount
        .checked_mul(pow10(decimals))
        .and_then(|units| units.to_u64())
        .ok_or_else(|| malformed("exceeds the largest representable amount".to_string()))
}

pub fn from_base_units(units: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(units as i128, decimals).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_apt_to_octas() {
        assert_eq!(to_base_units(dec!(1.5), 8).unwrap(), 150_000_000);
        assert_eq!(to_base_units(dec!(0.00000001), 8).unwrap(), 1);
        assert_eq!(from_base_units(150_000_000, 8), dec!(1.5));
    }

    #[test]
    fn rejects_dust_and_non_positive_amounts() {
        assert!(to_base_units(dec!(0.000000001), 8).is_err());
        assert!(to_base_units(dec!(0), 8).is_err());
        assert!(to_base_units(dec!(-1), 8).is_err());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert_eq!(to_base_units(dec!(2.500000000000), 8).unwrap(), 250_000_000);
    }

    #[test]
    fn rejects_overflow() {
        assert!(to_base_units(dec!(1_000_000_000_000), 8).is_err());
    }
}
