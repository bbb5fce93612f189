//! Integral token amounts.
//!
//! Amounts are integral base units (u128) so transfers never involve fractions.
//! Fractional bookkeeping lives in [`crate::dec`].

use crate::address::Denom;
use crate::dec::{Dec, DecCoins};
use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An integral amount of a single denomination, in base units.
pub type Amount = u128;

/// A multi-denomination integral amount.
///
/// Always sorted by denom and never holds a zero entry, so two `Coins`
/// holding the same value compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Denom, Amount>", into = "BTreeMap<Denom, Amount>")]
pub struct Coins(BTreeMap<Denom, Amount>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// A single-denomination amount (empty if `amount` is zero).
    pub fn single(denom: Denom, amount: Amount) -> Self {
        let mut coins = Self::new();
        if amount > 0 {
            coins.0.insert(denom, amount);
        }
        coins
    }

    /// Build from `(denom, amount)` pairs, summing duplicates and dropping zeros.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Denom, Amount)>) -> Result<Self, TypesError> {
        let mut coins = Self::new();
        for (denom, amount) in pairs {
            coins = coins.checked_add(&Self::single(denom, amount))?;
        }
        Ok(coins)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Amount held of `denom` (zero when absent).
    pub fn amount_of(&self, denom: &Denom) -> Amount {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Denom, &Amount)> {
        self.0.iter()
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, TypesError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let entry = out.entry(denom.clone()).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or(TypesError::Overflow)?;
        }
        Ok(Self(out))
    }

    /// Component-wise subtraction; fails if any component would go negative.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, TypesError> {
        let mut out = self.0.clone();
        for (denom, amount) in &other.0 {
            let have = out.get(denom).copied().unwrap_or(0);
            let left = have.checked_sub(*amount).ok_or(TypesError::Underflow)?;
            if left == 0 {
                out.remove(denom);
            } else {
                out.insert(denom.clone(), left);
            }
        }
        Ok(Self(out))
    }

    /// Whether every component of `self` is at least the matching one in `other`.
    pub fn is_all_gte(&self, other: &Self) -> bool {
        other.0.iter().all(|(denom, amount)| self.amount_of(denom) >= *amount)
    }

    /// Lossless conversion into decimal coins.
    pub fn to_dec_coins(&self) -> DecCoins {
        DecCoins::from_pairs(self.0.iter().map(|(d, a)| (d.clone(), Dec::from_int(*a))))
    }
}

impl From<BTreeMap<Denom, Amount>> for Coins {
    fn from(mut map: BTreeMap<Denom, Amount>) -> Self {
        map.retain(|_, amount| *amount > 0);
        Self(map)
    }
}

impl From<Coins> for BTreeMap<Denom, Amount> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(d, a)| format!("{a}{d}")).collect();
        write!(f, "{}", parts.join(","))
    }
}
