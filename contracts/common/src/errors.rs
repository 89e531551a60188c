//! Error Types for the Flashix Pool
//!
//! Typed errors carrying the offending values, each with a stable code
//! so callers can branch on failures deterministically.

use core::fmt;

use crate::types::{Address, MintId};

/// Result type alias for Flashix operations
pub type FlashixResult<T> = Result<T, FlashixError>;

/// Main error enum for all Flashix pool errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlashixError {
    // ============ Lifecycle Errors ============
    /// A PoolConfig already exists at the derived location
    AlreadyInitialized { pool: Address },

    /// No PoolConfig exists yet
    NotInitialized,

    /// Fee rate above the basis-point denominator
    InvalidFeeRate { fee_basis_points: u16 },

    // ============ Amount Errors ============
    /// Invalid amount provided
    InvalidAmount { amount: u64, reason: AmountErrorReason },

    /// Source account cannot cover a transfer
    InsufficientBalance { available: u64, requested: u64 },

    /// Redeemer holds fewer shares than requested
    InsufficientShares { available: u64, requested: u64 },

    /// Custody cannot pay out a redemption right now
    InsufficientLiquidity { available: u64, requested: u64 },

    /// Custody cannot fund a loan, or a borrower cannot repay one
    NotEnoughFunds { available: u64, requested: u64 },

    // ============ Pairing Errors ============
    /// Borrow has no later Repay for the same borrower and asset
    MissingRepayIx { borrow_position: u32 },

    /// Repay has no earlier unsettled Borrow to settle
    MissingBorrowIx { repay_position: u32 },

    /// A second Borrow against the pool sits inside an open loan window
    NestedBorrow { outer_position: u32, inner_position: u32 },

    /// Operation references a mint the pool does not use
    InvalidMint { expected: MintId, actual: MintId },

    // ============ Math Errors ============
    /// Share computation does not fit the share supply
    MintOverflow,

    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,

    // ============ Batch Errors ============
    /// Custody ended the batch below netDeposits + collectedFees
    CustodyShortfall { custody: u64, required: u64 },

    /// Pool state changed since the batch was built
    BatchConflict { expected: u64, actual: u64 },

    /// Batch carries no operations
    EmptyBatch,

    /// Batch carries more operations than allowed
    BatchTooLarge { operations: usize, maximum: usize },

    /// Share supply on the ledger differs from the pool record
    SupplyMismatch { recorded: u64, observed: u64 },

    /// Witness or instruction payload could not be interpreted
    InvalidWitness { reason: &'static str },
}

/// Reasons for amount-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountErrorReason {
    /// Amount is zero when non-zero required
    Zero,
    /// Amount converts to zero shares or zero asset
    TooSmall,
    /// Amount exceeds what the pool can represent
    TooLarge,
}

impl FlashixError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInitialized { .. } => "E001_ALREADY_INITIALIZED",
            Self::NotInitialized => "E002_NOT_INITIALIZED",
            Self::InvalidFeeRate { .. } => "E003_INVALID_FEE_RATE",
            Self::InvalidAmount { .. } => "E010_INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "E011_INSUFFICIENT_BALANCE",
            Self::InsufficientShares { .. } => "E012_INSUFFICIENT_SHARES",
            Self::InsufficientLiquidity { .. } => "E013_INSUFFICIENT_LIQUIDITY",
            Self::NotEnoughFunds { .. } => "E014_NOT_ENOUGH_FUNDS",
            Self::MissingRepayIx { .. } => "E020_MISSING_REPAY_IX",
            Self::MissingBorrowIx { .. } => "E021_MISSING_BORROW_IX",
            Self::NestedBorrow { .. } => "E022_NESTED_BORROW",
            Self::InvalidMint { .. } => "E023_INVALID_MINT",
            Self::MintOverflow => "E030_MINT_OVERFLOW",
            Self::Overflow => "E031_OVERFLOW",
            Self::Underflow => "E032_UNDERFLOW",
            Self::DivisionByZero => "E033_DIV_ZERO",
            Self::CustodyShortfall { .. } => "E040_CUSTODY_SHORTFALL",
            Self::BatchConflict { .. } => "E041_BATCH_CONFLICT",
            Self::EmptyBatch => "E042_EMPTY_BATCH",
            Self::BatchTooLarge { .. } => "E043_BATCH_TOO_LARGE",
            Self::SupplyMismatch { .. } => "E044_SUPPLY_MISMATCH",
            Self::InvalidWitness { .. } => "E050_INVALID_WITNESS",
        }
    }

    /// Returns true if resubmitting a corrected batch can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::InsufficientShares { .. }
                | Self::InsufficientLiquidity { .. }
                | Self::NotEnoughFunds { .. }
                | Self::MissingRepayIx { .. }
                | Self::BatchConflict { .. }
        )
    }
}

impl fmt::Display for FlashixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAmount { amount, reason } => {
                write!(f, "{}: amount {} ({:?})", self.code(), amount, reason)
            }
            Self::InsufficientBalance { available, requested }
            | Self::InsufficientShares { available, requested }
            | Self::InsufficientLiquidity { available, requested }
            | Self::NotEnoughFunds { available, requested } => {
                write!(f, "{}: available {}, requested {}", self.code(), available, requested)
            }
            Self::MissingRepayIx { borrow_position } => {
                write!(f, "{}: borrow at position {}", self.code(), borrow_position)
            }
            Self::MissingBorrowIx { repay_position } => {
                write!(f, "{}: repay at position {}", self.code(), repay_position)
            }
            Self::NestedBorrow { outer_position, inner_position } => write!(
                f,
                "{}: borrow at {} opened inside loan window of {}",
                self.code(),
                inner_position,
                outer_position
            ),
            Self::CustodyShortfall { custody, required } => {
                write!(f, "{}: custody {}, required {}", self.code(), custody, required)
            }
            Self::BatchConflict { expected, actual } => {
                write!(f, "{}: expected version {}, found {}", self.code(), expected, actual)
            }
            Self::BatchTooLarge { operations, maximum } => {
                write!(f, "{}: {} operations, maximum {}", self.code(), operations, maximum)
            }
            Self::SupplyMismatch { recorded, observed } => {
                write!(f, "{}: recorded {}, observed {}", self.code(), recorded, observed)
            }
            Self::InvalidWitness { reason } => write!(f, "{}: {}", self.code(), reason),
            _ => f.write_str(self.code()),
        }
    }
}
