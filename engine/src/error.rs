//! Engine errors.
//!
//! Two classes: caller errors, which leave state untouched and are returned
//! to whoever submitted the operation, and invariant violations, which mean
//! consensus-critical state is already inconsistent. The latter must halt
//! the current operation; the engine logs them at `error` and returns them.

use farm_store::{BankError, StoreError};
use farm_types::{Address, Amount, Denom, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FarmError {
    #[error("no position of {staker} in {asset}")]
    PositionNotFound { staker: Address, asset: Denom },

    #[error("no pool for {0}")]
    PoolNotFound(Denom),

    #[error("insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake { requested: Amount, staked: Amount },

    #[error("insufficient funds in {address}: need {needed}{denom}, have {available}{denom}")]
    InsufficientFunds {
        address: Address,
        denom: Denom,
        needed: Amount,
        available: Amount,
    },

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("bank error: {0}")]
    Bank(String),

    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl FarmError {
    /// Whether state may already be inconsistent. Fatal errors must stop
    /// block processing; everything else is a rejected operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_) | Self::Storage(_))
    }
}

impl From<BankError> for FarmError {
    fn from(err: BankError) -> Self {
        match err {
            BankError::InsufficientFunds {
                address,
                denom,
                needed,
                available,
            } => Self::InsufficientFunds {
                address,
                denom,
                needed,
                available,
            },
            BankError::Backend(msg) => Self::Bank(msg),
        }
    }
}

/// A broken internal guarantee. Never expected in correct operation.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("snapshot {asset}/{period} is missing")]
    MissingSnapshot { asset: Denom, period: u64 },

    #[error("pool {0} is missing while a position references it")]
    MissingPool(Denom),

    #[error("snapshot {asset}/{period} already has {cap} references")]
    ReferenceOverflow { asset: Denom, period: u64, cap: u8 },

    #[error("snapshot {asset}/{period} has no reference left to release")]
    ReferenceUnderflow { asset: Denom, period: u64 },

    #[error("cumulative rewards of {asset} decrease from period {from} to {to}")]
    DecreasingCumulative { asset: Denom, from: u64, to: u64 },

    #[error("outstanding rewards of {0} are below the amount being paid")]
    OutstandingUnderflow(Denom),

    #[error("total stake of {0} would drop below zero")]
    StakeUnderflow(Denom),

    #[error("arithmetic failure in {asset}: {source}")]
    Arithmetic {
        asset: Denom,
        #[source]
        source: TypesError,
    },

    #[error("{count} invariant(s) broken, first: {first}")]
    Broken { count: usize, first: String },
}

impl InvariantViolation {
    pub(crate) fn arithmetic(asset: &Denom) -> impl FnOnce(TypesError) -> Self + '_ {
        move |source| Self::Arithmetic {
            asset: asset.clone(),
            source,
        }
    }
}
