//! The external ledger that moves balances.
//!
//! The engine never holds balances itself. Principal lives in a per-asset
//! staking reserve and emitted rewards in a global reward reserve; all
//! movement between those and stakers goes through [`Bank`].

use farm_types::{Address, Amount, Coins, Denom};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("insufficient funds in {address}: need {needed}{denom}, have {available}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: Denom,
        needed: Amount,
        available: Amount,
    },

    #[error("bank backend error: {0}")]
    Backend(String),
}

/// Atomic balance movement between accounts.
pub trait Bank {
    /// Move `coins` from `from` to `to`. All-or-nothing: on error no balance
    /// has changed.
    fn transfer(&self, from: &Address, to: &Address, coins: &Coins) -> Result<(), BankError>;

    /// Spendable balance of `denom` held by `address`.
    fn balance(&self, address: &Address, denom: &Denom) -> Result<Amount, BankError>;
}
