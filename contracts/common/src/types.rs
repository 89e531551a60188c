//! Core Types for the Flashix Pool
//!
//! The persistent pool record, the instructions a batch is made of and
//! the descriptors the pairing guard inspects.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{FlashixError, FlashixResult};

/// Type alias for account addresses (32-byte key)
pub type Address = [u8; 32];

/// Type alias for mint identifiers
pub type MintId = [u8; 32];

// ============ Pool State ============

/// Persistent state of a pool, one per pool at the derived config address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolConfig {
    /// Flash fee in basis points; fixed at initialization
    pub fee_basis_points: u16,
    /// Principal deposited by liquidity providers, excluding fees
    pub net_deposits: u64,
    /// Fees retained by the pool, redeemable pro-rata by share holders
    pub collected_fees: u64,
    /// Mint of the lent asset
    pub asset_mint: MintId,
    /// Mint of the claim shares (mint authority is the pool)
    pub share_mint: MintId,
    /// Key that created the pool and owns pool-derived accounts
    pub authority: Address,
    /// Derivation bump of the pool address
    pub authority_bump: u8,
}

impl PoolConfig {
    /// Borsh-encoded size in bytes
    pub const LEN: usize = 2 + 8 + 8 + 32 + 32 + 32 + 1;

    /// Fresh pool state with empty balances
    pub fn new(
        fee_basis_points: u16,
        asset_mint: MintId,
        share_mint: MintId,
        authority: Address,
        authority_bump: u8,
    ) -> Self {
        Self {
            fee_basis_points,
            net_deposits: 0,
            collected_fees: 0,
            asset_mint,
            share_mint,
            authority,
            authority_bump,
        }
    }

    /// netDeposits + collectedFees
    pub fn total_value(&self) -> FlashixResult<u64> {
        self.net_deposits
            .checked_add(self.collected_fees)
            .ok_or(FlashixError::Overflow)
    }

    /// Fails with `InvalidMint` unless `mint` is the pool's asset
    pub fn require_asset(&self, mint: &MintId) -> FlashixResult<()> {
        if *mint != self.asset_mint {
            return Err(FlashixError::InvalidMint {
                expected: self.asset_mint,
                actual: *mint,
            });
        }
        Ok(())
    }
}

// ============ Instructions ============

/// One operation inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum PoolInstruction {
    /// Create the pool record
    Initialize {
        authority: Address,
        fee_basis_points: u16,
        asset_mint: MintId,
        share_mint: MintId,
    },
    /// Add liquidity and receive shares
    Deposit {
        depositor: Address,
        asset_mint: MintId,
        amount: u64,
    },
    /// Burn shares for a proportional slice of the pool
    Withdraw {
        owner: Address,
        asset_mint: MintId,
        share_amount: u64,
    },
    /// Take a flash loan out of custody
    Borrow {
        borrower: Address,
        asset_mint: MintId,
        amount: u64,
    },
    /// Return the paired loan plus fee
    Repay {
        borrower: Address,
        asset_mint: MintId,
    },
    /// Transfer between non-pool accounts (what a borrower does with the funds)
    External {
        from: Address,
        to: Address,
        mint: MintId,
        amount: u64,
    },
}

impl PoolInstruction {
    /// Kind of this instruction
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Initialize { .. } => OperationKind::Initialize,
            Self::Deposit { .. } => OperationKind::Deposit,
            Self::Withdraw { .. } => OperationKind::Withdraw,
            Self::Borrow { .. } => OperationKind::Borrow,
            Self::Repay { .. } => OperationKind::Repay,
            Self::External { .. } => OperationKind::External,
        }
    }

    /// Describe this instruction at `position`; pool operations are tagged with `pool`
    pub fn describe(&self, position: u32, pool: Address) -> OperationDescriptor {
        let (actor, asset, amount) = match self {
            Self::Initialize { authority, asset_mint, .. } => (*authority, *asset_mint, None),
            Self::Deposit { depositor, asset_mint, amount } => {
                (*depositor, *asset_mint, Some(*amount))
            }
            Self::Withdraw { owner, asset_mint, share_amount } => {
                (*owner, *asset_mint, Some(*share_amount))
            }
            Self::Borrow { borrower, asset_mint, amount } => {
                (*borrower, *asset_mint, Some(*amount))
            }
            Self::Repay { borrower, asset_mint } => (*borrower, *asset_mint, None),
            Self::External { from, mint, amount, .. } => (*from, *mint, Some(*amount)),
        };

        let pool = match self {
            Self::External { .. } => None,
            _ => Some(pool),
        };

        OperationDescriptor {
            position,
            kind: self.kind(),
            pool,
            actor,
            asset,
            amount,
        }
    }
}

// ============ Batch Introspection ============

/// Kind of a batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum OperationKind {
    Initialize = 0x00,
    Deposit = 0x01,
    Withdraw = 0x02,
    Borrow = 0x03,
    Repay = 0x04,
    External = 0x0F,
}

/// What the pairing guard sees of each operation in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OperationDescriptor {
    /// Index in the batch
    pub position: u32,
    /// Operation kind
    pub kind: OperationKind,
    /// Pool the operation targets (`None` for external operations)
    pub pool: Option<Address>,
    /// Signer of the operation
    pub actor: Address,
    /// Asset the operation moves
    pub asset: MintId,
    /// Amount carried by the operation, if it names one
    pub amount: Option<u64>,
}

impl OperationDescriptor {
    /// True if this is a `kind` operation against `pool`
    pub fn targets(&self, kind: OperationKind, pool: &Address) -> bool {
        self.kind == kind && self.pool.as_ref() == Some(pool)
    }
}
