//! Deterministic fixed-point decimals.
//!
//! `Dec` is an unsigned decimal with 18 fractional digits, stored as a
//! 256-bit integer count of 10^-18 units. Every operation that can lose
//! precision truncates toward zero, so a reward share computed with `Dec`
//! never exceeds the exact rational value. No floating point is involved;
//! every replica computes bit-identical results.

use crate::address::Denom;
use crate::amount::{Amount, Coins};
use crate::error::TypesError;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of fractional decimal digits carried by [`Dec`].
pub const PRECISION: usize = 18;

fn one_raw() -> U256 {
    U256::exp10(PRECISION)
}

/// Unsigned 18-decimal fixed-point number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec(U256);

impl Dec {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(one_raw())
    }

    /// Exact conversion from an integral amount.
    pub fn from_int(n: Amount) -> Self {
        // 2^128 * 10^18 < 2^256, cannot overflow.
        Self(U256::from(n) * one_raw())
    }

    /// `numerator / denominator`, truncated to 18 decimals.
    pub fn from_ratio(numerator: Amount, denominator: Amount) -> Result<Self, TypesError> {
        Self::from_int(numerator).checked_quo_int(denominator)
    }

    /// Build from a raw count of 10^-18 units.
    pub fn from_atomics(raw: u128) -> Self {
        Self(U256::from(raw))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: Self) -> Result<Self, TypesError> {
        self.0.checked_add(other.0).map(Self).ok_or(TypesError::Overflow)
    }

    pub fn checked_sub(self, other: Self) -> Result<Self, TypesError> {
        self.0.checked_sub(other.0).map(Self).ok_or(TypesError::Underflow)
    }

    /// Multiply by an integral amount. Exact when it does not overflow.
    pub fn checked_mul_int(self, n: Amount) -> Result<Self, TypesError> {
        self.0.checked_mul(U256::from(n)).map(Self).ok_or(TypesError::Overflow)
    }

    /// Divide by an integral amount, truncating toward zero.
    pub fn checked_quo_int(self, n: Amount) -> Result<Self, TypesError> {
        if n == 0 {
            return Err(TypesError::DivisionByZero);
        }
        Ok(Self(self.0 / U256::from(n)))
    }

    /// Integral part, discarding the fraction.
    pub fn truncate_int(self) -> Result<Amount, TypesError> {
        let int = self.0 / one_raw();
        if int.bits() > 128 {
            return Err(TypesError::Overflow);
        }
        Ok(int.low_u128())
    }

    /// Integral and fractional parts as raw 256-bit values.
    fn split(self) -> (U256, U256) {
        self.0.div_mod(one_raw())
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (int, frac) = self.split();
        write!(f, "{}.{:0>width$}", int, frac.to_string(), width = PRECISION)
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({self})")
    }
}

impl FromStr for Dec {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypesError::InvalidDecimal(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !digits_only(int_part) || !digits_only(frac_part) {
            return Err(invalid());
        }
        if frac_part.len() > PRECISION {
            return Err(invalid());
        }
        let int = U256::from_dec_str(int_part).map_err(|_| invalid())?;
        let frac = if frac_part.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{:0<width$}", frac_part, width = PRECISION);
            U256::from_dec_str(&padded).map_err(|_| invalid())?
        };
        int.checked_mul(one_raw())
            .and_then(|scaled| scaled.checked_add(frac))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl TryFrom<String> for Dec {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Dec> for String {
    fn from(dec: Dec) -> Self {
        dec.to_string()
    }
}

/// A multi-denomination decimal amount.
///
/// Used for reward bookkeeping where fractions must survive between
/// payouts. Sorted by denom; zero entries are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Denom, Dec>", into = "BTreeMap<Denom, Dec>")]
pub struct DecCoins(BTreeMap<Denom, Dec>);

impl DecCoins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Denom, Dec)>) -> Self {
        Self(pairs.into_iter().filter(|(_, d)| !d.is_zero()).collect())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn amount_of(&self, denom: &Denom) -> Dec {
        self.0.get(denom).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Denom, &Dec)> {
        self.0.iter()
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, TypesError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let sum = out.get(denom).copied().unwrap_or_default().checked_add(*amount)?;
            out.insert(denom.clone(), sum);
        }
        Ok(Self(out))
    }

    /// Component-wise subtraction; fails if any component would go negative.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, TypesError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let left = out.get(denom).copied().unwrap_or_default().checked_sub(*amount)?;
            if left.is_zero() {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), left);
            }
        }
        Ok(Self(out))
    }

    /// Multiply every component by an integral amount.
    pub fn checked_mul_int(&self, n: Amount) -> Result<Self, TypesError> {
        let mut out = BTreeMap::new();
        for (denom, amount) in &self.0 {
            let product = amount.checked_mul_int(n)?;
            if !product.is_zero() {
                out.insert(denom.clone(), product);
            }
        }
        Ok(Self(out))
    }

    /// Divide every component by an integral amount, truncating; components
    /// that truncate to zero are dropped.
    pub fn checked_quo_int(&self, n: Amount) -> Result<Self, TypesError> {
        let mut out = BTreeMap::new();
        for (denom, amount) in &self.0 {
            let quotient = amount.checked_quo_int(n)?;
            if !quotient.is_zero() {
                out.insert(denom.clone(), quotient);
            }
        }
        Ok(Self(out))
    }

    /// Split into the transferable integral part and the leftover fraction.
    pub fn truncate_decimal(&self) -> Result<(Coins, DecCoins), TypesError> {
        let mut whole = Vec::with_capacity(self.0.len());
        for (denom, amount) in &self.0 {
            whole.push((denom.clone(), amount.truncate_int()?));
        }
        let truncated = Coins::from_pairs(whole)?;
        let change = self.checked_sub(&truncated.to_dec_coins())?;
        Ok((truncated, change))
    }

    /// Whether every component of `self` is at least the matching one in `other`.
    pub fn is_all_gte(&self, other: &Self) -> bool {
        other.0.iter().all(|(denom, amount)| self.amount_of(denom) >= *amount)
    }
}

impl From<&Coins> for DecCoins {
    fn from(coins: &Coins) -> Self {
        coins.to_dec_coins()
    }
}

impl From<BTreeMap<Denom, Dec>> for DecCoins {
    fn from(map: BTreeMap<Denom, Dec>) -> Self {
        Self::from_pairs(map)
    }
}

impl From<DecCoins> for BTreeMap<Denom, Dec> {
    fn from(coins: DecCoins) -> Self {
        coins.0
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(d, a)| format!("{a}{d}")).collect();
        write!(f, "{}", parts.join(","))
    }
}
