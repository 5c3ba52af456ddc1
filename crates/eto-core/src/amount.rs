//! # Token Amounts and Decimal Fractions
//!
//! [`Amount`] is an unsigned 128-bit count of the smallest token unit.
//! [`DecimalFraction`] is a fixed-point value in `[0, 1]` scaled by
//! [`DECIMAL_SCALE`] (10^18), used for the unlock penalty.
//!
//! ## Serialization
//!
//! Both serialize as decimal strings. `u128` does not survive a trip
//! through JSON numbers in most consumers, and canonical payloads reject
//! anything that might be read back as a float.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Fixed-point scale of [`DecimalFraction`]: 1.0 == 10^18.
pub const DECIMAL_SCALE: u128 = 1_000_000_000_000_000_000;

/// A non-negative token quantity in base units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    /// Zero tokens.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw base-unit quantity.
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// The raw base-unit quantity.
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Whether the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Amount) -> Result<Amount, CoreError> {
        self.0
            .checked_add(rhs.0)
            .map(Amount)
            .ok_or(CoreError::Overflow { op: "amount add" })
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Amount) -> Result<Amount, CoreError> {
        self.0
            .checked_sub(rhs.0)
            .map(Amount)
            .ok_or(CoreError::Underflow { op: "amount sub" })
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|e| CoreError::InvalidAmount(format!("{s:?}: {e}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A fraction in `[0, 1]` with 18 decimal places of precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecimalFraction(u128);

impl DecimalFraction {
    /// 0.0
    pub const ZERO: DecimalFraction = DecimalFraction(0);
    /// 1.0
    pub const ONE: DecimalFraction = DecimalFraction(DECIMAL_SCALE);

    /// Construct from a raw scaled value (`1e18` == 1.0).
    pub fn new(scaled: u128) -> Result<Self, CoreError> {
        if scaled > DECIMAL_SCALE {
            return Err(CoreError::InvalidFraction(format!(
                "{scaled} exceeds scale {DECIMAL_SCALE}"
            )));
        }
        Ok(Self(scaled))
    }

    /// Construct from a whole percentage, `0..=100`.
    pub fn from_percent(percent: u8) -> Result<Self, CoreError> {
        Self::new(u128::from(percent) * (DECIMAL_SCALE / 100))
    }

    /// The raw scaled value.
    pub const fn scaled(&self) -> u128 {
        self.0
    }

    /// `floor(amount * self / 1e18)`, exact over the whole `u128` range.
    ///
    /// The amount is split as `q * 1e18 + r` so neither partial product can
    /// overflow: `q * f <= amount` and `r * f < 1e36`.
    pub fn apply_floor(&self, amount: Amount) -> Amount {
        let a = amount.value();
        let q = a / DECIMAL_SCALE;
        let r = a % DECIMAL_SCALE;
        Amount(q * self.0 + (r * self.0) / DECIMAL_SCALE)
    }
}

impl std::fmt::Display for DecimalFraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / DECIMAL_SCALE;
        let frac = self.0 % DECIMAL_SCALE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:018}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for DecimalFraction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |why: &str| CoreError::InvalidFraction(format!("{s:?}: {why}"));
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected digits before the decimal point"));
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected digits after the decimal point"));
        }
        if frac.len() > 18 {
            return Err(invalid("more than 18 decimal places"));
        }
        let whole: u128 = whole.parse().map_err(|_| invalid("integer part too large"))?;
        let frac_scaled = if frac.is_empty() {
            0
        } else {
            let raw: u128 = frac.parse().map_err(|_| invalid("bad fractional part"))?;
            raw * 10u128.pow(18 - frac.len() as u32)
        };
        let scaled = whole
            .checked_mul(DECIMAL_SCALE)
            .and_then(|w| w.checked_add(frac_scaled))
            .ok_or_else(|| invalid("value too large"))?;
        Self::new(scaled)
    }
}

impl Serialize for DecimalFraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DecimalFraction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
