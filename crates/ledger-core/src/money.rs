//! # Money Module
//!
//! Arbitrary precision decimal values: an integer magnitude paired with a
//! base-ten exponent, `value = magnitude × 10^exponent`.
//!
//! ## Why explicit exponents?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MISMATCHED SCALES                                                      │
//! │                                                                         │
//! │  balance (store):   100000000000 × 10^-10   = 10.0000000000            │
//! │  amount  (client):          1001 × 10^-2    = 10.01                    │
//! │                                                                         │
//! │  The magnitudes cannot be compared directly. The coarser operand is    │
//! │  rescaled to the finer exponent first:                                 │
//! │                                                                         │
//! │          1001 × 10^8  × 10^-10  = 100100000000 × 10^-10                │
//! │                                                                         │
//! │  Multiplying never loses digits. Dividing would, so normalization      │
//! │  only ever multiplies.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All arithmetic is exact integer arithmetic after alignment. There is no
//! floating point anywhere in this module.

use num_bigint::{BigInt, Sign};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Money Type
// =============================================================================

/// Whether a [`Money`] value carries a usable magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    /// A finite decimal value.
    Present,
    /// The store held SQL `NULL`.
    Null,
    /// The source text could not be read as a decimal (e.g. `NaN`).
    Invalid,
}

/// A decimal value with an explicit exponent.
///
/// Equality via `==` is structural: `10 × 10^0` and `100 × 10^-1` are not
/// `==`. Use [`compare`] to compare by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Money {
    magnitude: BigInt,
    exponent: i32,
    presence: Presence,
}

/// Failure to read decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("empty decimal text")]
    Empty,

    #[error("`{0}` is not a decimal number")]
    Malformed(String),
}

impl Money {
    /// Creates a present value `magnitude × 10^exponent`.
    pub fn new(magnitude: impl Into<BigInt>, exponent: i32) -> Self {
        Money {
            magnitude: magnitude.into(),
            exponent,
            presence: Presence::Present,
        }
    }

    /// A present zero at exponent 0.
    pub fn zero() -> Self {
        Money::new(BigInt::default(), 0)
    }

    /// The SQL `NULL` marker value.
    pub fn null() -> Self {
        Money {
            magnitude: BigInt::default(),
            exponent: 0,
            presence: Presence::Null,
        }
    }

    /// Marker for text that failed to parse.
    pub fn invalid() -> Self {
        Money {
            magnitude: BigInt::default(),
            exponent: 0,
            presence: Presence::Invalid,
        }
    }

    /// Reads a value coming back from the store as text.
    ///
    /// `None` becomes [`Presence::Null`], unparseable text (PostgreSQL renders
    /// `NaN` for the special numeric) becomes [`Presence::Invalid`].
    pub fn from_db(text: Option<&str>) -> Self {
        match text {
            None => Money::null(),
            Some(text) => text.parse().unwrap_or_else(|_| Money::invalid()),
        }
    }

    pub fn magnitude(&self) -> &BigInt {
        &self.magnitude
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }

    pub fn is_present(&self) -> bool {
        self.presence == Presence::Present
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.magnitude.sign() == Sign::Minus
    }

    /// Returns the same value expressed at `target` exponent.
    ///
    /// Moving to a smaller exponent multiplies and is exact. Moving to a
    /// larger exponent divides, truncating toward zero: digits finer than
    /// `10^target` are dropped.
    pub fn rescale(&self, target: i32) -> Money {
        let magnitude = match target.cmp(&self.exponent) {
            Ordering::Equal => self.magnitude.clone(),
            Ordering::Less => &self.magnitude * pow10(self.exponent - target),
            Ordering::Greater => &self.magnitude / pow10(target - self.exponent),
        };
        Money {
            magnitude,
            exponent: target,
            presence: self.presence,
        }
    }
}

impl<'a> Add for &'a Money {
    type Output = Money;

    fn add(self, other: &'a Money) -> Money {
        add(self, other)
    }
}

impl<'a> Sub for &'a Money {
    type Output = Money;

    fn sub(self, other: &'a Money) -> Money {
        subtract(self, other)
    }
}

fn pow10(exp: i32) -> BigInt {
    BigInt::from(10u8).pow(exp.unsigned_abs())
}

// =============================================================================
// Scale-normalizing arithmetic
// =============================================================================

/// Brings both magnitudes to the smaller of the two exponents.
///
/// The operand with the larger (coarser) exponent is multiplied by
/// `10^difference`; nothing is ever divided.
pub fn normalize_pair(left: &Money, right: &Money) -> (BigInt, BigInt, i32) {
    match left.exponent.cmp(&right.exponent) {
        Ordering::Equal => (left.magnitude.clone(), right.magnitude.clone(), left.exponent),
        Ordering::Less => (
            left.magnitude.clone(),
            &right.magnitude * pow10(right.exponent - left.exponent),
            left.exponent,
        ),
        Ordering::Greater => (
            &left.magnitude * pow10(left.exponent - right.exponent),
            right.magnitude.clone(),
            right.exponent,
        ),
    }
}

/// Compares two values by what they denote, regardless of exponent.
pub fn compare(left: &Money, right: &Money) -> Ordering {
    let (l, r, _) = normalize_pair(left, right);
    l.cmp(&r)
}

/// `left - right` at the shared (smaller) exponent.
///
/// Both operands must be present. The result is always present.
pub fn subtract(left: &Money, right: &Money) -> Money {
    debug_assert!(left.is_present() && right.is_present());
    let (l, r, exponent) = normalize_pair(left, right);
    Money::new(l - r, exponent)
}

/// `left + right` at the shared (smaller) exponent.
///
/// Both operands must be present. The result is always present.
pub fn add(left: &Money, right: &Money) -> Money {
    debug_assert!(left.is_present() && right.is_present());
    let (l, r, exponent) = normalize_pair(left, right);
    Money::new(l + r, exponent)
}

// =============================================================================
// Text conversions
// =============================================================================

/// Parses `[+-]digits` or `[+-]digits.digits`.
///
/// The fractional separator must be a period. Integer text has exponent 0 and
/// trailing fractional zeros are kept (`"1.50"` is `150 × 10^-2`).
impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Err(MoneyParseError::Empty);
        }
        let malformed = || MoneyParseError::Malformed(text.to_string());

        let (negative, unsigned) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (unsigned, ""),
        };
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(malformed());
        }
        if unsigned.contains('.') && frac_part.is_empty() {
            return Err(malformed());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(malformed)?;
        if negative {
            magnitude = -magnitude;
        }
        let exponent = -i32::try_from(frac_part.len()).map_err(|_| malformed())?;

        Ok(Money::new(magnitude, exponent))
    }
}

/// Canonical decimal text, as bound to the store's `NUMERIC` column.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.presence {
            Presence::Null => return write!(f, "NULL"),
            Presence::Invalid => return write!(f, "NaN"),
            Presence::Present => {}
        }

        let sign = if self.is_negative() { "-" } else { "" };
        let digits = self.magnitude.magnitude().to_string();

        if self.exponent >= 0 {
            let zeros = "0".repeat(self.exponent as usize);
            return write!(f, "{sign}{digits}{zeros}");
        }

        let scale = self.exponent.unsigned_abs() as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn m(text: &str) -> Money {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_integer_has_zero_exponent() {
        let value = m("100");
        assert_eq!(value.exponent(), 0);
        assert_eq!(value.magnitude(), &BigInt::from(100));
    }

    #[test]
    fn test_parse_keeps_fractional_digits() {
        let value = m("-12.50");
        assert_eq!(value.exponent(), -2);
        assert_eq!(value.magnitude(), &BigInt::from(-1250));
        assert!(value.is_present());
    }

    #[test]
    fn test_parse_rejects_other_separators() {
        assert!(matches!("12,50".parse::<Money>(), Err(MoneyParseError::Malformed(_))));
        assert!("1_000".parse::<Money>().is_err());
        assert!("1e5".parse::<Money>().is_err());
        assert!(" 1".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("5.".parse::<Money>().is_err());
        assert!("-".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
    }

    #[test]
    fn test_from_db_presence() {
        assert_eq!(Money::from_db(None).presence(), Presence::Null);
        assert_eq!(Money::from_db(Some("NaN")).presence(), Presence::Invalid);
        assert_eq!(Money::from_db(Some("3.14")).presence(), Presence::Present);
    }

    #[test]
    fn test_compare_across_exponents() {
        let hundred_tenths = Money::new(100, -1);
        let ten = Money::new(10, 0);
        assert_eq!(compare(&hundred_tenths, &ten), Ordering::Equal);
        assert_eq!(compare(&ten, &hundred_tenths), Ordering::Equal);
        assert_eq!(compare(&ten, &ten), Ordering::Equal);

        assert_eq!(compare(&m("10.00"), &m("10.01")), Ordering::Less);
        assert_eq!(compare(&m("10.01"), &m("10")), Ordering::Greater);
        assert_eq!(compare(&m("-1"), &m("0.0000001")), Ordering::Less);
    }

    #[test]
    fn test_normalize_pair_multiplies_coarser_operand() {
        let (l, r, exp) = normalize_pair(&m("1.5"), &m("0.001"));
        assert_eq!(exp, -3);
        assert_eq!(l, BigInt::from(1500));
        assert_eq!(r, BigInt::from(1));
    }

    #[test]
    fn test_subtract_and_add_use_finer_exponent() {
        let diff = subtract(&m("10"), &m("0.25"));
        assert_eq!(diff.exponent(), -2);
        assert_eq!(diff.to_string(), "9.75");

        let sum = add(&m("0.125"), &m("2"));
        assert_eq!(sum.exponent(), -3);
        assert_eq!(sum.to_string(), "2.125");

        assert_eq!(&m("1.5") + &m("1"), m("2.5"));
        assert_eq!(&m("1") - &m("1.5"), m("-0.5"));
    }

    #[test]
    fn test_rescale_toward_finer_is_lossless() {
        let value = m("10.01").rescale(-10);
        assert_eq!(value.magnitude(), &BigInt::from(100_100_000_000i64));
        assert_eq!(value.to_string(), "10.0100000000");
    }

    #[test]
    fn test_rescale_toward_coarser_truncates() {
        assert_eq!(m("1.23456789019").rescale(-10).to_string(), "1.2345678901");
        assert_eq!(m("-1.99").rescale(0).to_string(), "-1");
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(5, -3).to_string(), "0.005");
        assert_eq!(Money::new(-5, -3).to_string(), "-0.005");
        assert_eq!(Money::new(12, 2).to_string(), "1200");
        assert_eq!(Money::new(0, -10).to_string(), "0.0000000000");
        assert_eq!(Money::null().to_string(), "NULL");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for text in ["0.10", "-3", "123456789012345678901234567890.000000001"] {
            assert_eq!(m(text).to_string(), text);
        }
    }

    // -------------------------------------------------------------------------
    // Properties over generated values
    // -------------------------------------------------------------------------

    use proptest::prelude::*;

    /// Present values with magnitudes wider than 64 bits and mixed exponents.
    fn any_money() -> impl Strategy<Value = Money> {
        (any::<i64>(), any::<u64>(), -30i32..=12).prop_map(|(high, low, exponent)| {
            let magnitude = BigInt::from(high) * BigInt::from(u64::MAX) + BigInt::from(low);
            Money::new(magnitude, exponent)
        })
    }

    proptest! {
        #[test]
        fn prop_compare_is_reflexive(x in any_money()) {
            prop_assert_eq!(compare(&x, &x), Ordering::Equal);
        }

        #[test]
        fn prop_compare_ignores_lossless_rescale(x in any_money(), shift in 0i32..15) {
            let finer = x.rescale(x.exponent() - shift);
            prop_assert_eq!(compare(&x, &finer), Ordering::Equal);
            prop_assert_eq!(compare(&finer, &x), Ordering::Equal);
        }

        #[test]
        fn prop_compare_is_antisymmetric(a in any_money(), b in any_money()) {
            prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
        }

        #[test]
        fn prop_arithmetic_matches_hand_normalization(a in any_money(), b in any_money()) {
            let shared = a.exponent().min(b.exponent());
            // Hand conversion of both operands to an exponent finer than either.
            let fine = shared - 3;
            let (ha, hb) = (a.rescale(fine), b.rescale(fine));
            let sum_by_hand = Money::new(ha.magnitude() + hb.magnitude(), fine);
            let diff_by_hand = Money::new(ha.magnitude() - hb.magnitude(), fine);

            let (sum, diff) = (add(&a, &b), subtract(&a, &b));
            prop_assert_eq!(sum.exponent(), shared);
            prop_assert_eq!(diff.exponent(), shared);
            prop_assert_eq!(compare(&sum, &sum_by_hand), Ordering::Equal);
            prop_assert_eq!(compare(&diff, &diff_by_hand), Ordering::Equal);
            prop_assert_eq!(sum.rescale(fine), sum_by_hand);
            prop_assert_eq!(diff.rescale(fine), diff_by_hand);
        }

        #[test]
        fn prop_subtract_undoes_add(a in any_money(), b in any_money()) {
            let back = subtract(&add(&a, &b), &b);
            prop_assert_eq!(compare(&back, &a), Ordering::Equal);
            prop_assert_eq!(&(&a + &b) - &b, back);
        }

        #[test]
        fn prop_display_parses_to_equal_value(x in any_money()) {
            let parsed: Money = x.to_string().parse().unwrap();
            prop_assert_eq!(compare(&parsed, &x), Ordering::Equal);
        }
    }
}
