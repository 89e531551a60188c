//! Flashix Flash-Loan Pool
//!
//! Single-asset liquidity pool. Depositors receive shares priced at the
//! pool's current value; borrowers take any amount out of custody and
//! must return it, plus the fee, later in the same atomic batch.
//!
//! ## Execution Model
//!
//! Every transition here runs inside a batch (see [`batch`]):
//! - The batch's ordered operation list is visible to each operation
//! - A Borrow is only funded if the pairing guard finds its Repay
//! - Any failure discards every effect of the batch
//!
//! The pool record is passed in explicitly as a [`PoolStore`] handle, and
//! balances move through the `CustodyLedger`/`ShareToken` collaborators.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod batch;

// Charms SDK integration (conditional compilation)
#[cfg(feature = "charms")]
pub mod charms;


use flashix_common::{
    constants::{fees::MAX_FEE_BPS, network},
    derivation::{derive_custody_address, derive_pool_address},
    errors::{AmountErrorReason, FlashixError, FlashixResult},
    events::{EventLog, FlashixEvent},
    ledger::{CustodyLedger, ShareToken},
    math::{
        assets_for_shares, calculate_amount_owed, safe_add, safe_sub, shares_to_mint,
        split_redemption,
    },
    pairing::{find_paired_borrow, find_paired_repay},
    types::{Address, MintId, OperationDescriptor, PoolConfig, PoolInstruction},
};

// ============ Pool Store ============

/// Handle to the persistent pool record at its derived address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolStore {
    /// Program that namespaces the pool's derived accounts
    pub program_id: Address,
    /// Derived location of the pool record
    pub address: Address,
    /// Bump found while deriving `address`
    pub bump: u8,
    /// The record itself; `None` until Initialize
    pub config: Option<PoolConfig>,
    /// Outstanding shares as of the last committed batch
    pub share_supply: u64,
    /// Bumped on every committed batch
    pub version: u64,
}

impl PoolStore {
    /// Empty store at the pool location derived for `program_id`
    pub fn new(program_id: Address) -> Self {
        let (address, bump) = derive_pool_address(&program_id);
        Self {
            program_id,
            address,
            bump,
            config: None,
            share_supply: 0,
            version: 0,
        }
    }

    /// Empty store on the configured network
    pub fn for_network() -> Self {
        Self::new(network::PROGRAM_ID)
    }

    /// The pool record, if initialized
    pub fn config(&self) -> FlashixResult<&PoolConfig> {
        self.config.as_ref().ok_or(FlashixError::NotInitialized)
    }

    /// Account holding the pool's asset
    pub fn custody_address(&self) -> FlashixResult<Address> {
        let config = self.config()?;
        Ok(derive_custody_address(&self.address, &config.asset_mint, &self.program_id))
    }

    /// Asset currently held in custody
    pub fn custody_balance<L: CustodyLedger>(&self, ledger: &L) -> FlashixResult<u64> {
        let config = self.config()?;
        Ok(ledger.balance_of(&self.custody_address()?, &config.asset_mint))
    }
}

// ============ Validation Context ============

/// A loan funded in the current batch and not yet repaid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenLoan {
    pub borrower: Address,
    pub amount: u64,
    pub borrow_position: u32,
    pub repay_position: u32,
}

/// Result of one successful operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationOutcome {
    /// Pool record created at `pool`
    Initialized { pool: Address },
    /// Shares issued to the depositor
    SharesMinted(u64),
    /// Asset paid to the redeemer
    AssetsOut(u64),
    /// Loan funded, to be closed at `repay_position`
    Borrowed { amount: u64, repay_position: u32 },
    /// Loan closed
    Repaid { amount_owed: u64, fee: u64 },
    /// External transfer applied
    Transferred,
}

/// Context for executing pool operations inside one batch
pub struct PoolContext<'a, L: CustodyLedger + ShareToken> {
    /// Pool record being mutated
    pub store: &'a mut PoolStore,
    /// Balances of every account the batch touches
    pub ledger: &'a mut L,
    /// Ordered operations of the batch
    pub operations: &'a [OperationDescriptor],
    /// Index of the operation being executed
    pub position: u32,
    /// Slot the batch executes in
    pub slot: u64,
    /// Loan opened by an earlier Borrow and not yet repaid
    pub open_loan: Option<OpenLoan>,
    /// Event log
    pub events: EventLog,
}

impl<'a, L: CustodyLedger + ShareToken> PoolContext<'a, L> {
    /// Context positioned at the first operation
    pub fn new(
        store: &'a mut PoolStore,
        ledger: &'a mut L,
        operations: &'a [OperationDescriptor],
        slot: u64,
    ) -> Self {
        Self {
            store,
            ledger,
            operations,
            position: 0,
            slot,
            open_loan: None,
            events: EventLog::new(),
        }
    }

    /// Check the end-of-batch invariants and hand back the events
    ///
    /// # Errors
    /// * `MissingRepayIx` - a loan is still open
    /// * `CustodyShortfall` - custody below netDeposits + collectedFees
    pub fn finish(self) -> FlashixResult<EventLog> {
        if let Some(loan) = self.open_loan {
            return Err(FlashixError::MissingRepayIx {
                borrow_position: loan.borrow_position,
            });
        }

        if let Some(config) = self.store.config.as_ref() {
            let custody = self.store.custody_balance(&*self.ledger)?;
            let required = config.total_value()?;
            if custody < required {
                return Err(FlashixError::CustodyShortfall { custody, required });
            }
        }

        Ok(self.events)
    }
}

// ============ Validation Functions ============

/// Main validation entry point
pub fn validate<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    instruction: &PoolInstruction,
) -> FlashixResult<OperationOutcome> {
    match instruction {
        PoolInstruction::Initialize {
            authority,
            fee_basis_points,
            asset_mint,
            share_mint,
        } => validate_initialize(ctx, *authority, *fee_basis_points, *asset_mint, *share_mint),
        PoolInstruction::Deposit {
            depositor,
            asset_mint,
            amount,
        } => validate_deposit(ctx, *depositor, *asset_mint, *amount),
        PoolInstruction::Withdraw {
            owner,
            asset_mint,
            share_amount,
        } => validate_withdraw(ctx, *owner, *asset_mint, *share_amount),
        PoolInstruction::Borrow {
            borrower,
            asset_mint,
            amount,
        } => validate_borrow(ctx, *borrower, *asset_mint, *amount),
        PoolInstruction::Repay {
            borrower,
            asset_mint,
        } => validate_repay(ctx, *borrower, *asset_mint),
        PoolInstruction::External {
            from,
            to,
            mint,
            amount,
        } => validate_external(ctx, *from, *to, *mint, *amount),
    }
}

/// Create the pool record
fn validate_initialize<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    authority: Address,
    fee_basis_points: u16,
    asset_mint: MintId,
    share_mint: MintId,
) -> FlashixResult<OperationOutcome> {
    // 1. One pool per derived location
    if ctx.store.config.is_some() {
        return Err(FlashixError::AlreadyInitialized {
            pool: ctx.store.address,
        });
    }

    // 2. Fee rate within the denominator
    if fee_basis_points > MAX_FEE_BPS {
        return Err(FlashixError::InvalidFeeRate { fee_basis_points });
    }

    // 3. Shares must be a distinct mint
    if asset_mint == share_mint {
        return Err(FlashixError::InvalidMint {
            expected: asset_mint,
            actual: share_mint,
        });
    }

    ctx.store.config = Some(PoolConfig::new(
        fee_basis_points,
        asset_mint,
        share_mint,
        authority,
        ctx.store.bump,
    ));

    ctx.events.emit(FlashixEvent::PoolInitialized {
        pool: ctx.store.address,
        authority,
        asset_mint,
        share_mint,
        fee_basis_points,
        slot: ctx.slot,
    });

    Ok(OperationOutcome::Initialized {
        pool: ctx.store.address,
    })
}

/// Add liquidity and mint shares at the current per-share value
fn validate_deposit<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    depositor: Address,
    asset_mint: MintId,
    amount: u64,
) -> FlashixResult<OperationOutcome> {
    // 1. Amount must be positive
    if amount == 0 {
        return Err(FlashixError::InvalidAmount {
            amount,
            reason: AmountErrorReason::Zero,
        });
    }

    let custody = ctx.store.custody_address()?;
    let config = ctx.store.config.as_mut().ok_or(FlashixError::NotInitialized)?;

    // 2. Asset must be the pool's
    config.require_asset(&asset_mint)?;

    // 3. Price against the value before this deposit
    let total_shares = ctx.ledger.total_supply(&config.share_mint);
    let shares = shares_to_mint(amount, total_shares, config.total_value()?)?;
    if shares == 0 {
        return Err(FlashixError::InvalidAmount {
            amount,
            reason: AmountErrorReason::TooSmall,
        });
    }
    let net_deposits = safe_add(config.net_deposits, amount)?;

    // 4. Move the asset, then issue the shares
    ctx.ledger.transfer(&asset_mint, &depositor, &custody, amount)?;
    ctx.ledger.mint_to(&config.share_mint, &depositor, shares)?;
    config.net_deposits = net_deposits;

    ctx.events.emit(FlashixEvent::Deposited {
        depositor,
        amount,
        shares_minted: shares,
        net_deposits,
        slot: ctx.slot,
    });

    Ok(OperationOutcome::SharesMinted(shares))
}

/// Burn shares for a proportional slice of principal and fees
fn validate_withdraw<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    owner: Address,
    asset_mint: MintId,
    share_amount: u64,
) -> FlashixResult<OperationOutcome> {
    // 1. Amount must be positive
    if share_amount == 0 {
        return Err(FlashixError::InvalidAmount {
            amount: share_amount,
            reason: AmountErrorReason::Zero,
        });
    }

    let custody = ctx.store.custody_address()?;
    let config = ctx.store.config.as_mut().ok_or(FlashixError::NotInitialized)?;

    // 2. Asset must be the pool's
    config.require_asset(&asset_mint)?;

    // 3. Redeemer must hold the shares
    let held = ctx.ledger.balance_of(&owner, &config.share_mint);
    if held < share_amount {
        return Err(FlashixError::InsufficientShares {
            available: held,
            requested: share_amount,
        });
    }

    // 4. Value the shares before burning
    let total_shares = ctx.ledger.total_supply(&config.share_mint);
    let asset_out = assets_for_shares(share_amount, total_shares, config.total_value()?)?;
    if asset_out == 0 {
        return Err(FlashixError::InvalidAmount {
            amount: share_amount,
            reason: AmountErrorReason::TooSmall,
        });
    }

    // 5. Custody must be able to pay right now
    let available = ctx.ledger.balance_of(&custody, &asset_mint);
    if available < asset_out {
        return Err(FlashixError::InsufficientLiquidity {
            available,
            requested: asset_out,
        });
    }

    // 6. Draw from principal and fees in proportion
    let (principal_part, fee_part) =
        split_redemption(asset_out, config.net_deposits, config.collected_fees)?;
    let net_deposits = safe_sub(config.net_deposits, principal_part)?;
    let collected_fees = safe_sub(config.collected_fees, fee_part)?;

    ctx.ledger.burn(&config.share_mint, &owner, share_amount)?;
    ctx.ledger.transfer(&asset_mint, &custody, &owner, asset_out)?;
    config.net_deposits = net_deposits;
    config.collected_fees = collected_fees;

    ctx.events.emit(FlashixEvent::Withdrawn {
        owner,
        shares_burned: share_amount,
        asset_out,
        principal_part,
        fee_part,
        slot: ctx.slot,
    });

    Ok(OperationOutcome::AssetsOut(asset_out))
}

/// Fund a flash loan whose Repay is already scheduled in the batch
fn validate_borrow<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    borrower: Address,
    asset_mint: MintId,
    amount: u64,
) -> FlashixResult<OperationOutcome> {
    // 1. Amount must be positive
    if amount == 0 {
        return Err(FlashixError::InvalidAmount {
            amount,
            reason: AmountErrorReason::Zero,
        });
    }

    let custody = ctx.store.custody_address()?;
    let config = ctx.store.config()?;

    // 2. Asset must be the pool's
    config.require_asset(&asset_mint)?;

    // 3. Custody must cover the loan
    let available = ctx.ledger.balance_of(&custody, &asset_mint);
    if available < amount {
        return Err(FlashixError::NotEnoughFunds {
            available,
            requested: amount,
        });
    }

    // 4. The batch must close the loan
    let repay_position = find_paired_repay(ctx.operations, ctx.position)?;
    if let Some(open) = ctx.open_loan {
        return Err(FlashixError::NestedBorrow {
            outer_position: open.borrow_position,
            inner_position: ctx.position,
        });
    }

    ctx.ledger.transfer(&asset_mint, &custody, &borrower, amount)?;
    ctx.open_loan = Some(OpenLoan {
        borrower,
        amount,
        borrow_position: ctx.position,
        repay_position,
    });

    ctx.events.emit(FlashixEvent::Borrowed {
        borrower,
        amount,
        position: ctx.position,
        repay_position,
        slot: ctx.slot,
    });

    Ok(OperationOutcome::Borrowed {
        amount,
        repay_position,
    })
}

/// Settle the paired loan plus fee
fn validate_repay<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    borrower: Address,
    asset_mint: MintId,
) -> FlashixResult<OperationOutcome> {
    let custody = ctx.store.custody_address()?;
    let config = ctx.store.config.as_mut().ok_or(FlashixError::NotInitialized)?;

    // 1. Asset must be the pool's
    config.require_asset(&asset_mint)?;

    // 2. Correlate with the Borrow this Repay closes
    let (borrow_position, amount) = find_paired_borrow(ctx.operations, ctx.position)?;
    let settles_open_loan = ctx.open_loan.is_some_and(|open| {
        open.borrow_position == borrow_position
            && open.repay_position == ctx.position
            && open.borrower == borrower
            && open.amount == amount
    });
    if !settles_open_loan {
        return Err(FlashixError::MissingBorrowIx {
            repay_position: ctx.position,
        });
    }

    // 3. Borrower must cover principal plus fee
    let (fee, amount_owed) = calculate_amount_owed(amount, config.fee_basis_points)?;
    let available = ctx.ledger.balance_of(&borrower, &asset_mint);
    if available < amount_owed {
        return Err(FlashixError::NotEnoughFunds {
            available,
            requested: amount_owed,
        });
    }
    let collected_fees = safe_add(config.collected_fees, fee)?;

    ctx.ledger.transfer(&asset_mint, &borrower, &custody, amount_owed)?;
    config.collected_fees = collected_fees;
    ctx.open_loan = None;

    ctx.events.emit(FlashixEvent::Repaid {
        borrower,
        amount,
        fee,
        collected_fees,
        slot: ctx.slot,
    });

    Ok(OperationOutcome::Repaid { amount_owed, fee })
}

/// Transfer between accounts outside the pool
fn validate_external<L: CustodyLedger + ShareToken>(
    ctx: &mut PoolContext<'_, L>,
    from: Address,
    to: Address,
    mint: MintId,
    amount: u64,
) -> FlashixResult<OperationOutcome> {
    // Pool accounts only move through pool operations
    if from == ctx.store.address {
        return Err(FlashixError::InvalidWitness {
            reason: "external transfer out of pool account",
        });
    }
    if ctx.store.config.is_some() && from == ctx.store.custody_address()? {
        return Err(FlashixError::InvalidWitness {
            reason: "external transfer out of pool custody",
        });
    }

    ctx.ledger.transfer(&mint, &from, &to, amount)?;
    Ok(OperationOutcome::Transferred)
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use flashix_common::{events::EventType, ledger::InMemoryLedger};

    const ONE_USDT: u64 = 1_000_000;
    const USDT: MintId = [1u8; 32];
    const SHARES: MintId = [2u8; 32];
    const AUTHORITY: Address = [3u8; 32];
    const ALICE: Address = [10u8; 32];
    const BOB: Address = [11u8; 32];

    fn create_test_store() -> PoolStore {
        let mut store = PoolStore::for_network();
        store.config = Some(PoolConfig::new(500, USDT, SHARES, AUTHORITY, store.bump));
        store
    }

    fn create_test_ledger() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new();
        ledger.fund(&ALICE, &USDT, 1_000 * ONE_USDT).unwrap();
        ledger.fund(&BOB, &USDT, 10 * ONE_USDT).unwrap();
        ledger
    }

    fn describe(store: &PoolStore, instructions: &[PoolInstruction]) -> Vec<OperationDescriptor> {
        instructions
            .iter()
            .enumerate()
            .map(|(i, ix)| ix.describe(i as u32, store.address))
            .collect()
    }

    /// Run `instructions` in order against `store`/`ledger` without batch rollback
    fn run(
        store: &mut PoolStore,
        ledger: &mut InMemoryLedger,
        instructions: &[PoolInstruction],
    ) -> (Vec<FlashixResult<OperationOutcome>>, EventLog) {
        let ops = describe(store, instructions);
        let mut ctx = PoolContext::new(store, ledger, &ops, 100);
        let mut results = Vec::new();
        for (i, ix) in instructions.iter().enumerate() {
            ctx.position = i as u32;
            results.push(validate(&mut ctx, ix));
        }
        (results, ctx.events)
    }

    fn deposit(depositor: Address, amount: u64) -> PoolInstruction {
        PoolInstruction::Deposit {
            depositor,
            asset_mint: USDT,
            amount,
        }
    }

    #[test]
    fn test_initialize_success() {
        let mut store = PoolStore::for_network();
        let mut ledger = InMemoryLedger::new();
        let (results, events) = run(
            &mut store,
            &mut ledger,
            &[PoolInstruction::Initialize {
                authority: AUTHORITY,
                fee_basis_points: 500,
                asset_mint: USDT,
                share_mint: SHARES,
            }],
        );

        assert!(matches!(results[0], Ok(OperationOutcome::Initialized { .. })));
        let config = store.config().unwrap();
        assert_eq!(config.fee_basis_points, 500);
        assert_eq!(config.net_deposits, 0);
        assert_eq!(config.collected_fees, 0);
        assert_eq!(config.authority_bump, store.bump);
        assert_eq!(events.filter_by_type(EventType::PoolInitialized).len(), 1);
    }

    #[test]
    fn test_initialize_twice_fails() {
        let mut store = create_test_store();
        let mut ledger = InMemoryLedger::new();
        let (results, _) = run(
            &mut store,
            &mut ledger,
            &[PoolInstruction::Initialize {
                authority: AUTHORITY,
                fee_basis_points: 100,
                asset_mint: USDT,
                share_mint: SHARES,
            }],
        );

        assert!(matches!(results[0], Err(FlashixError::AlreadyInitialized { .. })));
        assert_eq!(store.config().unwrap().fee_basis_points, 500);
    }

    #[test]
    fn test_initialize_fee_bounds() {
        for (fee, ok) in [(0u16, true), (10_000, true), (10_001, false)] {
            let mut store = PoolStore::for_network();
            let mut ledger = InMemoryLedger::new();
            let (results, _) = run(
                &mut store,
                &mut ledger,
                &[PoolInstruction::Initialize {
                    authority: AUTHORITY,
                    fee_basis_points: fee,
                    asset_mint: USDT,
                    share_mint: SHARES,
                }],
            );
            assert_eq!(results[0].is_ok(), ok, "fee {}", fee);
        }
    }

    #[test]
    fn test_operations_require_initialized_pool() {
        let mut store = PoolStore::for_network();
        let mut ledger = create_test_ledger();
        let (results, _) = run(&mut store, &mut ledger, &[deposit(ALICE, ONE_USDT)]);
        assert_eq!(results[0], Err(FlashixError::NotInitialized));
    }

    #[test]
    fn test_first_deposit_mints_one_to_one() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(&mut store, &mut ledger, &[deposit(ALICE, 100 * ONE_USDT)]);

        assert_eq!(results[0], Ok(OperationOutcome::SharesMinted(100 * ONE_USDT)));
        assert_eq!(store.config().unwrap().net_deposits, 100 * ONE_USDT);
        assert_eq!(store.custody_balance(&ledger).unwrap(), 100 * ONE_USDT);
        assert_eq!(ledger.balance_of(&ALICE, &SHARES), 100 * ONE_USDT);
    }

    #[test]
    fn test_deposit_zero_amount() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(&mut store, &mut ledger, &[deposit(ALICE, 0)]);
        assert!(matches!(
            results[0],
            Err(FlashixError::InvalidAmount { reason: AmountErrorReason::Zero, .. })
        ));
    }

    #[test]
    fn test_deposit_wrong_mint() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(
            &mut store,
            &mut ledger,
            &[PoolInstruction::Deposit {
                depositor: ALICE,
                asset_mint: SHARES,
                amount: ONE_USDT,
            }],
        );
        assert!(matches!(results[0], Err(FlashixError::InvalidMint { .. })));
    }

    #[test]
    fn test_deposit_exceeding_balance() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(&mut store, &mut ledger, &[deposit(BOB, 11 * ONE_USDT)]);

        assert!(matches!(results[0], Err(FlashixError::InsufficientBalance { .. })));
        assert_eq!(store.config().unwrap().net_deposits, 0);
        assert_eq!(ledger.total_supply(&SHARES), 0);
    }

    #[test]
    fn test_dust_deposit_rejected() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        ledger.mint_to(&SHARES, &ALICE, 10).unwrap();
        store.config.as_mut().unwrap().net_deposits = 100;
        // 100 value backs 10 shares: 9 units buys 0 shares
        let (results, _) = run(&mut store, &mut ledger, &[deposit(BOB, 9)]);
        assert!(matches!(
            results[0],
            Err(FlashixError::InvalidAmount { reason: AmountErrorReason::TooSmall, .. })
        ));
    }

    #[test]
    fn test_withdraw_more_shares_than_held() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(
            &mut store,
            &mut ledger,
            &[
                deposit(ALICE, 100 * ONE_USDT),
                PoolInstruction::Withdraw {
                    owner: ALICE,
                    asset_mint: USDT,
                    share_amount: 100 * ONE_USDT + 1,
                },
            ],
        );
        assert!(matches!(results[1], Err(FlashixError::InsufficientShares { .. })));
    }

    #[test]
    fn test_withdraw_with_funds_on_loan() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let instructions = [
            deposit(ALICE, 100 * ONE_USDT),
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 90 * ONE_USDT,
            },
            PoolInstruction::Withdraw {
                owner: ALICE,
                asset_mint: USDT,
                share_amount: 50 * ONE_USDT,
            },
            PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            },
        ];
        let (results, _) = run(&mut store, &mut ledger, &instructions);

        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(FlashixError::InsufficientLiquidity { available, requested })
                if available == 10 * ONE_USDT && requested == 50 * ONE_USDT
        ));
    }

    #[test]
    fn test_borrow_and_repay_collects_fee() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let instructions = [
            deposit(ALICE, 100 * ONE_USDT),
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 50 * ONE_USDT,
            },
            PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            },
        ];
        let (results, events) = run(&mut store, &mut ledger, &instructions);

        assert_eq!(
            results[1],
            Ok(OperationOutcome::Borrowed {
                amount: 50 * ONE_USDT,
                repay_position: 2
            })
        );
        assert_eq!(
            results[2],
            Ok(OperationOutcome::Repaid {
                amount_owed: 52_500_000,
                fee: 2_500_000
            })
        );
        let config = store.config().unwrap();
        assert_eq!(config.collected_fees, 2_500_000);
        assert_eq!(config.net_deposits, 100 * ONE_USDT);
        assert_eq!(ledger.balance_of(&BOB, &USDT), 10 * ONE_USDT - 2_500_000);
        assert_eq!(events.filter_by_type(EventType::Repaid).len(), 1);
    }

    #[test]
    fn test_borrow_more_than_custody() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let instructions = [
            deposit(ALICE, 100 * ONE_USDT),
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 200 * ONE_USDT,
            },
            PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            },
        ];
        let (results, _) = run(&mut store, &mut ledger, &instructions);
        assert!(matches!(results[1], Err(FlashixError::NotEnoughFunds { .. })));
        assert_eq!(store.custody_balance(&ledger).unwrap(), 100 * ONE_USDT);
    }

    #[test]
    fn test_borrow_without_repay() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let instructions = [
            deposit(ALICE, 100 * ONE_USDT),
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 50 * ONE_USDT,
            },
        ];
        let (results, _) = run(&mut store, &mut ledger, &instructions);
        assert!(matches!(
            results[1],
            Err(FlashixError::MissingRepayIx { borrow_position: 1 })
        ));
        assert_eq!(store.custody_balance(&ledger).unwrap(), 100 * ONE_USDT);
    }

    #[test]
    fn test_repay_short_of_fee() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        // Bob sends the loan away and keeps too little to cover the fee
        let instructions = [
            deposit(ALICE, 100 * ONE_USDT),
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 50 * ONE_USDT,
            },
            PoolInstruction::External {
                from: BOB,
                to: ALICE,
                mint: USDT,
                amount: 8 * ONE_USDT,
            },
            PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            },
        ];
        let (results, _) = run(&mut store, &mut ledger, &instructions);
        assert!(matches!(
            results[3],
            Err(FlashixError::NotEnoughFunds { available, requested })
                if available == 52 * ONE_USDT && requested == 52_500_000
        ));
    }

    #[test]
    fn test_repay_without_borrow() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let (results, _) = run(
            &mut store,
            &mut ledger,
            &[PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            }],
        );
        assert!(matches!(
            results[0],
            Err(FlashixError::MissingBorrowIx { repay_position: 0 })
        ));
    }

    #[test]
    fn test_repay_must_match_open_loan() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let instructions = [
            PoolInstruction::Borrow {
                borrower: BOB,
                asset_mint: USDT,
                amount: 10,
            },
            PoolInstruction::Repay {
                borrower: BOB,
                asset_mint: USDT,
            },
        ];
        let ops = describe(&store, &instructions);
        let mut ctx = PoolContext::new(&mut store, &mut ledger, &ops, 1);
        ctx.position = 1;

        // Loan recorded for a different amount than the paired Borrow
        ctx.open_loan = Some(OpenLoan {
            borrower: BOB,
            amount: 7,
            borrow_position: 0,
            repay_position: 1,
        });
        assert!(matches!(
            validate(&mut ctx, &instructions[1]),
            Err(FlashixError::MissingBorrowIx { repay_position: 1 })
        ));

        // Loan scheduled to close at a later Repay
        ctx.open_loan = Some(OpenLoan {
            borrower: BOB,
            amount: 10,
            borrow_position: 0,
            repay_position: 3,
        });
        assert!(matches!(
            validate(&mut ctx, &instructions[1]),
            Err(FlashixError::MissingBorrowIx { repay_position: 1 })
        ));
        assert!(ctx.open_loan.is_some());
    }

    #[test]
    fn test_external_cannot_drain_custody() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let custody = store.custody_address().unwrap();
        let (results, _) = run(
            &mut store,
            &mut ledger,
            &[
                deposit(ALICE, 100 * ONE_USDT),
                PoolInstruction::External {
                    from: custody,
                    to: BOB,
                    mint: USDT,
                    amount: ONE_USDT,
                },
            ],
        );
        assert!(matches!(results[1], Err(FlashixError::InvalidWitness { .. })));
    }

    #[test]
    fn test_finish_reports_open_loan() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        let ops: Vec<OperationDescriptor> = Vec::new();
        let mut ctx = PoolContext::new(&mut store, &mut ledger, &ops, 1);
        ctx.open_loan = Some(OpenLoan {
            borrower: BOB,
            amount: 1,
            borrow_position: 4,
            repay_position: 5,
        });
        assert!(matches!(
            ctx.finish(),
            Err(FlashixError::MissingRepayIx { borrow_position: 4 })
        ));
    }

    #[test]
    fn test_finish_reports_custody_shortfall() {
        let mut store = create_test_store();
        let mut ledger = create_test_ledger();
        store.config.as_mut().unwrap().net_deposits = 5;
        let ops: Vec<OperationDescriptor> = Vec::new();
        let ctx = PoolContext::new(&mut store, &mut ledger, &ops, 1);
        assert!(matches!(
            ctx.finish(),
            Err(FlashixError::CustodyShortfall { custody: 0, required: 5 })
        ));
    }
}
