use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_integer::Integer;

use crate::error::{Error, Result};

const MAX_PARSE_SCALE: u32 = 30;

fn pow10(scale: u32) -> u128 {
    10u128.pow(scale)
}

/// Unsigned fixed-point decimal: `units / 10^scale`.
///
/// Every derived metric is computed as an exact rational and rounded once
/// (half-up) into a `Fixed`, so results do not depend on float rounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fixed {
    units: u128,
    scale: u32,
}

impl Fixed {
    pub fn zero(scale: u32) -> Self {
        Fixed { units: 0, scale }
    }

    pub fn from_int(value: u128, scale: u32) -> Self {
        Fixed {
            units: value * pow10(scale),
            scale,
        }
    }

    /// `num / den` rounded half-up to `scale` digits. Zero when `den == 0`.
    pub fn ratio(num: u128, den: u128, scale: u32) -> Self {
        if den == 0 {
            return Self::zero(scale);
        }

        let one = pow10(scale);
        let (whole, rem) = num.div_rem(&den);
        // rem < den, split keeps the widening multiply small
        let (frac, frac_rem) = (rem * one).div_rem(&den);
        let round_up = frac_rem >= den - frac_rem;

        Fixed {
            units: whole * one + frac + u128::from(round_up),
            scale,
        }
    }

    pub fn rescale(self, scale: u32) -> Self {
        Self::ratio(self.units, pow10(self.scale), scale)
    }

    pub fn units(&self) -> u128 {
        self.units
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0
    }

    pub fn trunc(&self) -> u128 {
        self.units / pow10(self.scale)
    }

    pub fn to_f64(&self) -> f64 {
        self.units as f64 / pow10(self.scale) as f64
    }

    /// Exact test of `num / den >= self`. False when `den == 0`.
    pub fn is_reached_by(&self, num: u128, den: u128) -> bool {
        if den == 0 {
            return false;
        }
        num * pow10(self.scale) >= self.units * den
    }
}

impl PartialEq for Fixed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fixed {}

impl PartialOrd for Fixed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fixed {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        let lhs = self.units * pow10(scale - self.scale);
        let rhs = other.units * pow10(scale - other.scale);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let (whole, frac) = self.units.div_rem(&pow10(self.scale));
        write!(f, "{}.{:0width$}", whole, frac, width = self.scale as usize)
    }
}

impl FromStr for Fixed {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidDecimal(s.to_string());
        let trimmed = s.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
            return Err(invalid());
        }

        let scale = frac.len() as u32;
        if scale > MAX_PARSE_SCALE {
            return Err(invalid());
        }

        let parse = |part: &str| -> Result<u128> {
            if part.is_empty() {
                Ok(0)
            } else {
                part.parse::<u128>().map_err(|_| invalid())
            }
        };

        let units = parse(whole)?
            .checked_mul(pow10(scale))
            .and_then(|w| w.checked_add(parse(frac).ok()?))
            .ok_or_else(invalid)?;

        Ok(Fixed { units, scale })
    }
}
