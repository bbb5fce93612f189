//! Account addresses and asset denominations.

use crate::error::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An account on the underlying ledger: a staker, a per-asset staking
/// reserve, or the global reward reserve.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub(crate) String);

impl Address {
    /// Prefix of every derived staking reserve address.
    pub const STAKING_RESERVE_PREFIX: &'static str = "farm_reserve/";

    /// Longest address accepted.
    pub const MAX_LEN: usize = 255;

    /// Create an address from a raw string.
    ///
    /// The string must be non-empty, at most [`Self::MAX_LEN`] bytes, and
    /// contain only printable ASCII without whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let well_formed = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s.bytes().all(|b| b.is_ascii_graphic());
        if !well_formed {
            return Err(TypesError::InvalidAddress(s));
        }
        Ok(Self(s))
    }

    /// The reserve account holding every staker's principal for `asset`.
    pub fn staking_reserve(asset: &Denom) -> Self {
        Self(format!("{}{}", Self::STAKING_RESERVE_PREFIX, asset))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a derived staking reserve rather than a user account.
    pub fn is_staking_reserve(&self) -> bool {
        self.0.starts_with(Self::STAKING_RESERVE_PREFIX)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// An asset identifier: the denomination being staked into a pool, or a
/// reward token denomination.
///
/// Follows the usual bank-module shape: 3 to 128 characters, starting with a
/// letter, then letters, digits or one of `/ : . _ -`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Denom(String);

impl Denom {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 128;

    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if !Self::is_well_formed(&s) {
            return Err(TypesError::InvalidDenom(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_well_formed(s: &str) -> bool {
        let mut bytes = s.bytes();
        let starts_with_letter = matches!(bytes.next(), Some(b) if b.is_ascii_alphabetic());
        starts_with_letter
            && (Self::MIN_LEN..=Self::MAX_LEN).contains(&s.len())
            && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'))
    }
}

impl fmt::Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Denom {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Denom> for String {
    fn from(denom: Denom) -> Self {
        denom.0
    }
}
