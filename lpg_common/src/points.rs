use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Number;
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of minor units (cents) in one whole loyalty point.
pub const MINOR_UNITS_PER_POINT: i64 = 100;

//--------------------------------------       Points        ---------------------------------------------------------
/// An amount of loyalty points, stored as an integer number of minor units (hundredths of a point).
///
/// All balance and accrual arithmetic happens on this integer representation. Conversion from the major units used by
/// the accrual system is exact; see [`Points::from_major_units`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Points(i64);

op!(Points => binary Add::add, Sub::sub; inplace AddAssign::add_assign, SubAssign::sub_assign; unary Neg::neg);

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in points: {0}")]
pub struct PointsConversionError(String);

impl From<i64> for Points {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = MINOR_UNITS_PER_POINT.unsigned_abs();
        write!(f, "{sign}{}.{:02}pts", abs / scale, abs % scale)
    }
}

impl FromStr for Points {
    type Err = PointsConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_decimal_str(s)
    }
}

impl Points {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whole points to minor units. Panics on overflow in debug builds, like any other integer multiplication.
    pub fn from_points(points: i64) -> Self {
        Self(points * MINOR_UNITS_PER_POINT)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Converts an amount expressed in major units (as sent over the wire in JSON) into minor units.
    ///
    /// Integer inputs are scaled with an overflow-checked multiplication. Decimal inputs are converted from their
    /// textual form, so no floating point rounding is ever applied to the result. Negative amounts and amounts with
    /// more precision than one minor unit are rejected. Whole numbers sent as large floats (`1e16` and up) are
    /// accepted.
    pub fn from_major_units(amount: &Number) -> Result<Self, PointsConversionError> {
        if let Some(whole) = amount.as_u64() {
            return i64::try_from(whole)
                .ok()
                .and_then(|w| w.checked_mul(MINOR_UNITS_PER_POINT))
                .map(Self)
                .ok_or_else(|| PointsConversionError(format!("{amount} is too large")));
        }
        if amount.is_i64() {
            return Err(PointsConversionError(format!("{amount} is negative")));
        }
        // Integral floats from 1e16 upwards print in exponent form. Every such f64 is a whole number, and converts
        // exactly as long as it fits.
        if let Some(f) = amount.as_f64().filter(|f| f.is_finite() && *f >= 1e16) {
            return (f < i64::MAX as f64)
                .then_some(f as i64)
                .and_then(|w| w.checked_mul(MINOR_UNITS_PER_POINT))
                .map(Self)
                .ok_or_else(|| PointsConversionError(format!("{amount} is too large")));
        }
        Self::from_decimal_str(&amount.to_string())
    }

    /// Parses a plain decimal string (e.g. `"729.98"`) in major units into minor units.
    pub fn from_decimal_str(s: &str) -> Result<Self, PointsConversionError> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(PointsConversionError(format!("{s} is negative")));
        }
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !is_digits(whole) || !is_digits(frac) {
            return Err(PointsConversionError(format!("{s} is not a plain decimal number")));
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > 2 {
            return Err(PointsConversionError(format!("{s} has more precision than one hundredth of a point")));
        }
        let whole = whole.parse::<i64>().map_err(|e| PointsConversionError(format!("{s}: {e}")))?;
        let minor = frac.bytes().zip([10i64, 1]).map(|(b, scale)| i64::from(b - b'0') * scale).sum::<i64>();
        whole
            .checked_mul(MINOR_UNITS_PER_POINT)
            .and_then(|w| w.checked_add(minor))
            .map(Self)
            .ok_or_else(|| PointsConversionError(format!("{s} is too large")))
    }
}
