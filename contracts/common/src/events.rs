//! Pool Events
//!
//! Typed events emitted by every pool transition and by the batch executor.
//! Indexers consume them off-chain; tests use them to observe what a batch
//! actually did.

use crate::{String, Vec};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use crate::types::{Address, MintId};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Pool Events (0x01 - 0x1F)
    PoolInitialized = 0x01,
    Deposited = 0x02,
    Withdrawn = 0x03,

    // Flash Loan Events (0x20 - 0x3F)
    Borrowed = 0x20,
    Repaid = 0x21,

    // Batch Events (0x40 - 0x5F)
    BatchCommitted = 0x40,
    BatchDiscarded = 0x41,
}

/// Main event enum containing all pool events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum FlashixEvent {
    // ============ Pool Events ============

    /// Emitted once when the pool record is created
    PoolInitialized {
        pool: Address,
        authority: Address,
        asset_mint: MintId,
        share_mint: MintId,
        fee_basis_points: u16,
        slot: u64,
    },

    /// Emitted when liquidity is added
    Deposited {
        depositor: Address,
        amount: u64,
        shares_minted: u64,
        net_deposits: u64,
        slot: u64,
    },

    /// Emitted when shares are redeemed
    Withdrawn {
        owner: Address,
        shares_burned: u64,
        asset_out: u64,
        principal_part: u64,
        fee_part: u64,
        slot: u64,
    },

    // ============ Flash Loan Events ============

    /// Emitted when custody funds a flash loan
    Borrowed {
        borrower: Address,
        amount: u64,
        position: u32,
        repay_position: u32,
        slot: u64,
    },

    /// Emitted when a flash loan is settled
    Repaid {
        borrower: Address,
        amount: u64,
        fee: u64,
        collected_fees: u64,
        slot: u64,
    },

    // ============ Batch Events ============

    /// Emitted when a batch commits its effects
    BatchCommitted {
        operations: u32,
        version: u64,
        slot: u64,
    },

    /// Emitted when a batch is discarded; no other event of that batch survives
    ///
    /// `failed_position` is `None` when a batch-level check failed.
    BatchDiscarded {
        failed_position: Option<u32>,
        error_code: String,
        slot: u64,
    },
}

impl FlashixEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::PoolInitialized { .. } => EventType::PoolInitialized,
            Self::Deposited { .. } => EventType::Deposited,
            Self::Withdrawn { .. } => EventType::Withdrawn,
            Self::Borrowed { .. } => EventType::Borrowed,
            Self::Repaid { .. } => EventType::Repaid,
            Self::BatchCommitted { .. } => EventType::BatchCommitted,
            Self::BatchDiscarded { .. } => EventType::BatchDiscarded,
        }
    }

    /// Slot of the batch that emitted the event
    pub fn slot(&self) -> u64 {
        match self {
            Self::PoolInitialized { slot, .. }
            | Self::Deposited { slot, .. }
            | Self::Withdrawn { slot, .. }
            | Self::Borrowed { slot, .. }
            | Self::Repaid { slot, .. }
            | Self::BatchCommitted { slot, .. }
            | Self::BatchDiscarded { slot, .. } => *slot,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<FlashixEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: FlashixEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[FlashixEvent] {
        &self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&FlashixEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
