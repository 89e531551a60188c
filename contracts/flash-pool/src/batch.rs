//! Atomic Batch Execution
//!
//! A batch is the unit of atomicity: its instructions run strictly in order
//! against staged copies of the pool record and the ledger, and the copies
//! replace the originals only if every instruction and the end-of-batch
//! checks succeed. A failed batch leaves no trace but its
//! `BatchDiscarded` event.
//!
//! Conflicting batches are detected through `PoolStore::version`: a batch
//! built against an older version is rejected, never retried.
//!
//! The record also carries the share supply it last committed. A ledger
//! reporting any other supply is rejected before the first instruction
//! runs, so share pricing never rests on balances the record did not see.

use serde::{Deserialize, Serialize};

use flashix_common::{
    constants::batch::MAX_OPERATIONS,
    errors::{FlashixError, FlashixResult},
    events::{EventLog, FlashixEvent},
    ledger::{CustodyLedger, ShareToken},
    types::{Address, OperationDescriptor, PoolInstruction},
};

use crate::{validate, OperationOutcome, PoolContext, PoolStore};

// ============ Batch ============

/// Ordered instructions that commit together or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicBatch {
    /// Slot the batch executes in
    pub slot: u64,
    /// `PoolStore::version` the batch was built against
    pub expected_version: u64,
    /// Instructions in execution order
    pub instructions: Vec<PoolInstruction>,
}

/// What a committed batch did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    pub slot: u64,
    /// Store version after the commit
    pub version: u64,
    /// One outcome per instruction, in order
    pub outcomes: Vec<OperationOutcome>,
    pub events: EventLog,
}

/// Why a batch was discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Instruction that failed; `None` for batch-level checks
    pub position: Option<u32>,
    pub error: FlashixError,
    /// Holds only the `BatchDiscarded` event
    pub events: EventLog,
}

impl AtomicBatch {
    /// Empty batch for `slot`, built against store version `expected_version`
    pub fn new(slot: u64, expected_version: u64) -> Self {
        Self {
            slot,
            expected_version,
            instructions: Vec::new(),
        }
    }

    /// Append an instruction
    pub fn with(mut self, instruction: PoolInstruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    /// The ordered operation list each instruction may inspect
    pub fn operations(&self, pool: Address) -> Vec<OperationDescriptor> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, ix)| ix.describe(i as u32, pool))
            .collect()
    }

    /// Execute all instructions atomically
    ///
    /// On success `store` and `ledger` hold the committed state and
    /// `store.version` has advanced by one. On failure both are untouched.
    pub fn execute<L>(
        &self,
        store: &mut PoolStore,
        ledger: &mut L,
    ) -> Result<BatchReceipt, BatchFailure>
    where
        L: CustodyLedger + ShareToken + Clone,
    {
        self.check_shape(store).map_err(|e| self.discard(None, e))?;
        check_supply(store, ledger).map_err(|e| self.discard(None, e))?;

        let mut staged_store = store.clone();
        let mut staged_ledger = ledger.clone();
        let operations = self.operations(store.address);

        let (outcomes, mut events) = {
            let mut ctx = PoolContext::new(&mut staged_store, &mut staged_ledger, &operations, self.slot);
            let mut outcomes = Vec::with_capacity(self.instructions.len());

            for (i, instruction) in self.instructions.iter().enumerate() {
                ctx.position = i as u32;
                let outcome = validate(&mut ctx, instruction)
                    .map_err(|e| self.discard(Some(i as u32), e))?;
                outcomes.push(outcome);
            }

            let events = ctx.finish().map_err(|e| self.discard(None, e))?;
            (outcomes, events)
        };

        if let Some(config) = staged_store.config.as_ref() {
            staged_store.share_supply = staged_ledger.total_supply(&config.share_mint);
        }
        staged_store.version = staged_store
            .version
            .checked_add(1)
            .ok_or_else(|| self.discard(None, FlashixError::Overflow))?;

        events.emit(FlashixEvent::BatchCommitted {
            operations: self.instructions.len() as u32,
            version: staged_store.version,
            slot: self.slot,
        });

        let version = staged_store.version;
        *store = staged_store;
        *ledger = staged_ledger;

        Ok(BatchReceipt {
            slot: self.slot,
            version,
            outcomes,
            events,
        })
    }

    fn check_shape(&self, store: &PoolStore) -> FlashixResult<()> {
        if self.instructions.is_empty() {
            return Err(FlashixError::EmptyBatch);
        }
        if self.instructions.len() > MAX_OPERATIONS {
            return Err(FlashixError::BatchTooLarge {
                operations: self.instructions.len(),
                maximum: MAX_OPERATIONS,
            });
        }
        if self.expected_version != store.version {
            return Err(FlashixError::BatchConflict {
                expected: self.expected_version,
                actual: store.version,
            });
        }
        Ok(())
    }

    fn discard(&self, position: Option<u32>, error: FlashixError) -> BatchFailure {
        let mut events = EventLog::new();
        events.emit(FlashixEvent::BatchDiscarded {
            failed_position: position,
            error_code: error.code().into(),
            slot: self.slot,
        });
        BatchFailure {
            position,
            error,
            events,
        }
    }
}

/// The ledger must report the share supply the record committed
fn check_supply<L: ShareToken>(store: &PoolStore, ledger: &L) -> FlashixResult<()> {
    let Some(config) = store.config.as_ref() else {
        return Ok(());
    };
    let observed = ledger.total_supply(&config.share_mint);
    if observed != store.share_supply {
        return Err(FlashixError::SupplyMismatch {
            recorded: store.share_supply,
            observed,
        });
    }
    Ok(())
}

// ============ Tests ============
