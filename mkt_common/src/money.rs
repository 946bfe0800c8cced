use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "INR";

const MINOR_UNITS_PER_MAJOR: i64 = 100;

//--------------------------------------        Money        ---------------------------------------------------------
/// An amount of money held in minor currency units (e.g. paise for INR).
///
/// The payment gateway expects amounts in minor units, so `Money::value` can be handed to it directly. In JSON, amounts
/// are written and read in major units (`395.5` is 395.50), and whole amounts are written as integers.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a currency amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / MINOR_UNITS_PER_MAJOR as u64;
        let minor = abs % MINOR_UNITS_PER_MAJOR as u64;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

/// Parses decimal strings such as `"395"`, `"395.5"` or `"-12.05"`. At most two decimal places are accepted.
impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut parts = digits.splitn(2, '.');
        let whole = parts
            .next()
            .filter(|w| !w.is_empty())
            .ok_or_else(|| MoneyConversionError(format!("Invalid amount: '{s}'")))?
            .parse::<i64>()
            .map_err(|e| MoneyConversionError(format!("Invalid amount: '{s}'. {e}")))?;
        let fraction = match parts.next() {
            None => 0,
            Some(f) if f.is_empty() || f.len() > 2 || !f.chars().all(|c| c.is_ascii_digit()) => {
                return Err(MoneyConversionError(format!("Invalid fractional amount: '{s}'")));
            },
            Some(f) if f.len() == 1 => f.parse::<i64>().map(|v| v * 10).unwrap_or_default(),
            Some(f) => f.parse::<i64>().unwrap_or_default(),
        };
        let value = whole
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(|| MoneyConversionError(format!("Amount is too large: '{s}'")))?;
        Ok(Self(if negative { -value } else { value }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % MINOR_UNITS_PER_MAJOR == 0 {
            serializer.serialize_i64(self.0 / MINOR_UNITS_PER_MAJOR)
        } else {
            #[allow(clippy::cast_precision_loss)]
            serializer.serialize_f64(self.0 as f64 / MINOR_UNITS_PER_MAJOR as f64)
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MajorUnits {
    Whole(i64),
    Decimal(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match MajorUnits::deserialize(deserializer)? {
            MajorUnits::Whole(units) => units
                .checked_mul(MINOR_UNITS_PER_MAJOR)
                .map(Self)
                .ok_or_else(|| de::Error::custom(format!("Amount is too large: {units}"))),
            MajorUnits::Decimal(units) => {
                let minor = (units * MINOR_UNITS_PER_MAJOR as f64).round();
                #[allow(clippy::cast_precision_loss)]
                let in_range = units.is_finite() && minor.abs() < i64::MAX as f64;
                if !in_range {
                    return Err(de::Error::custom(format!("Amount is out of range: {units}")));
                }
                if (units * MINOR_UNITS_PER_MAJOR as f64 - minor).abs() > 1e-6 {
                    return Err(de::Error::custom(format!("Amount has more than two decimal places: {units}")));
                }
                #[allow(clippy::cast_possible_truncation)]
                Ok(Self(minor as i64))
            },
            MajorUnits::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Creates an amount from whole currency units, e.g. `Money::from_major(100)` is 100.00.
    pub const fn from_major(units: i64) -> Self {
        Self(units * MINOR_UNITS_PER_MAJOR)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `numerator/denominator` of this amount, rounded half-up to a whole currency unit.
    pub fn fraction_rounded_to_major(&self, numerator: i64, denominator: i64) -> Self {
        let scale = denominator * MINOR_UNITS_PER_MAJOR;
        let scaled = self.0 * numerator;
        let units = if scaled >= 0 { (scaled + scale / 2) / scale } else { (scaled - scale / 2) / scale };
        Self(units * MINOR_UNITS_PER_MAJOR)
    }
}
