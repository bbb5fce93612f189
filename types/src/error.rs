//! Errors raised while constructing or combining the fundamental types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid denom: {0}")]
    InvalidDenom(String),

    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),

    #[error("invalid farming parameters: {0}")]
    InvalidParams(String),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,
}
