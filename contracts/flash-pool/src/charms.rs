//! Charms SDK Integration for the Flashix Pool
//!
//! Bridges a Charms transaction to a batch replay. The spell carries the
//! pool record as a charm and every balance as a token charm; the witness
//! carries only the batch. Validation rebuilds the ledger from the token
//! charms the transaction spends, replays the batch against the input
//! record, and accepts the spell only if it commits and reproduces both the
//! output record and the token charms the transaction creates.
//!
//! ```text
//! Deploy (Initialize first):
//!   IN:  [token charms of depositors, if any]
//!   OUT: [PoolStore charm (version 1)] + [resulting token charms]
//!
//! Any other batch:
//!   IN:  [PoolStore charm (version n)] + [token charms touched]
//!   OUT: [PoolStore charm (version n + 1)] + [resulting token charms]
//! ```
//!
//! Token charms use tag `'t'`; their identity is the mint and their data a
//! [`TokenHolding`]. Custody is whatever the pool's derived custody address
//! holds. The share supply comes from the pool record, never the witness.
//!
//! The app verification key doubles as the program id. Deploy spells carry a
//! zero identity while later spells carry the real one, so records are
//! matched by tag and VK and the derived addresses stay put across the
//! transition.

use charms_data::{App, Charms, Data, Transaction};
use crate::{batch::AtomicBatch, PoolStore};
use flashix_common::{
    errors::FlashixResult,
    ledger::InMemoryLedger,
    types::{Address, MintId, PoolInstruction},
};

// ============ Operation Codes ============

/// Operation codes for pool instructions (encoded in witness)
pub mod op {
    /// Create the pool record
    pub const INITIALIZE: u8 = 0x00;
    /// Add liquidity
    pub const DEPOSIT: u8 = 0x01;
    /// Redeem shares
    pub const WITHDRAW: u8 = 0x02;
    /// Open a flash loan
    pub const BORROW: u8 = 0x03;
    /// Close a flash loan
    pub const REPAY: u8 = 0x04;
    /// Transfer between non-pool accounts
    pub const EXTERNAL: u8 = 0x0F;
}

/// Tag of fungible token charms
pub const TOKEN_TAG: char = 't';

// ============ Charm Payloads ============

/// Balance held by one owner, carried by a token charm
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenHolding {
    pub owner: Address,
    pub amount: u64,
}

// ============ Witness Structures ============

/// One instruction as encoded in the witness
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OpWitness {
    /// Operation type (see `op` module)
    pub op: u8,
    /// Authority, depositor, owner, borrower or transfer source
    pub actor: Address,
    /// Mint the operation moves
    pub mint: MintId,
    /// Amount for deposit/withdraw/borrow/external
    pub amount: Option<u64>,
    /// Transfer destination for external operations
    pub to: Option<Address>,
    /// Fee rate for initialize
    pub fee_basis_points: Option<u16>,
    /// Share mint for initialize
    pub share_mint: Option<MintId>,
}

impl OpWitness {
    fn base(op: u8, actor: Address, mint: MintId) -> Self {
        Self {
            op,
            actor,
            mint,
            amount: None,
            to: None,
            fee_basis_points: None,
            share_mint: None,
        }
    }

    /// Create witness for initialize operation
    pub fn initialize(authority: Address, fee_basis_points: u16, asset_mint: MintId, share_mint: MintId) -> Self {
        Self {
            fee_basis_points: Some(fee_basis_points),
            share_mint: Some(share_mint),
            ..Self::base(op::INITIALIZE, authority, asset_mint)
        }
    }

    /// Create witness for deposit operation
    pub fn deposit(depositor: Address, asset_mint: MintId, amount: u64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::base(op::DEPOSIT, depositor, asset_mint)
        }
    }

    /// Create witness for withdraw operation
    pub fn withdraw(owner: Address, asset_mint: MintId, share_amount: u64) -> Self {
        Self {
            amount: Some(share_amount),
            ..Self::base(op::WITHDRAW, owner, asset_mint)
        }
    }

    /// Create witness for borrow operation
    pub fn borrow(borrower: Address, asset_mint: MintId, amount: u64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::base(op::BORROW, borrower, asset_mint)
        }
    }

    /// Create witness for repay operation
    pub fn repay(borrower: Address, asset_mint: MintId) -> Self {
        Self::base(op::REPAY, borrower, asset_mint)
    }

    /// Create witness for external transfer
    pub fn external(from: Address, to: Address, mint: MintId, amount: u64) -> Self {
        Self {
            amount: Some(amount),
            to: Some(to),
            ..Self::base(op::EXTERNAL, from, mint)
        }
    }
}

/// Witness data for a pool spell
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BatchWitness {
    /// Slot the batch executes in
    pub slot: u64,
    /// Instructions in execution order
    pub ops: Vec<OpWitness>,
}

// ============ Main Validation Function ============

/// Validates a pool spell within a Charms transaction.
///
/// Replays the witnessed batch against the input pool record and the token
/// charms the transaction spends. The spell is valid only if the batch
/// commits, the resulting record equals the output charm and the resulting
/// balances equal the token charms the transaction creates.
///
/// # Arguments
/// * `app` - The pool app definition
/// * `tx` - The transaction being validated
/// * `_x` - Public inputs (unused)
/// * `w` - Witness data (the batch)
///
/// # Returns
/// `true` if the spell is valid, `false` otherwise
pub fn validate_pool_operation(app: &App, tx: &Transaction, _x: &Data, w: &Data) -> bool {
    // 1. Parse witness
    let witness = match parse_witness(w) {
        Some(w) => w,
        None => return false,
    };

    // 2. Convert to instructions
    let instructions = match witness
        .ops
        .iter()
        .map(witness_to_instruction)
        .collect::<Option<Vec<_>>>()
    {
        Some(ix) => ix,
        None => return false,
    };

    // 3. Input record; a fresh one only when the deploy spell opens the pool
    let program_id = app.vk.0;
    let mut store = match extract_input_store(app, tx) {
        Some(store) if store.program_id == program_id => store,
        Some(_) => return false,
        None if opens_pool(app, &instructions) => PoolStore::new(program_id),
        None => return false,
    };

    // 4. Output record
    let output_store = match extract_output_store(app, tx) {
        Some(s) => s,
        None => return false,
    };

    // 5. Balances spent and created by the transaction
    let spent = tx.ins.iter().map(|(_, charms)| charms);
    let mut ledger = match holdings_ledger(spent, &store) {
        Ok(ledger) => ledger,
        Err(_) => return false,
    };
    let created = match holdings_ledger(tx.outs.iter(), &output_store) {
        Ok(ledger) => ledger,
        Err(_) => return false,
    };

    // 6. Replay
    let batch = AtomicBatch {
        slot: witness.slot,
        expected_version: store.version,
        instructions,
    };
    if batch.execute(&mut store, &mut ledger).is_err() {
        return false;
    }

    store == output_store && ledger == created
}

// ============ Parsing Functions ============

/// Parse witness data into BatchWitness
fn parse_witness(w: &Data) -> Option<BatchWitness> {
    w.value::<BatchWitness>().ok()
}

/// Convert witness to internal instruction type
fn witness_to_instruction(w: &OpWitness) -> Option<PoolInstruction> {
    match w.op {
        op::INITIALIZE => Some(PoolInstruction::Initialize {
            authority: w.actor,
            fee_basis_points: w.fee_basis_points?,
            asset_mint: w.mint,
            share_mint: w.share_mint?,
        }),
        op::DEPOSIT => Some(PoolInstruction::Deposit {
            depositor: w.actor,
            asset_mint: w.mint,
            amount: w.amount?,
        }),
        op::WITHDRAW => Some(PoolInstruction::Withdraw {
            owner: w.actor,
            asset_mint: w.mint,
            share_amount: w.amount?,
        }),
        op::BORROW => Some(PoolInstruction::Borrow {
            borrower: w.actor,
            asset_mint: w.mint,
            amount: w.amount?,
        }),
        op::REPAY => Some(PoolInstruction::Repay {
            borrower: w.actor,
            asset_mint: w.mint,
        }),
        op::EXTERNAL => Some(PoolInstruction::External {
            from: w.actor,
            to: w.to?,
            mint: w.mint,
            amount: w.amount?,
        }),
        _ => None,
    }
}

// ============ App Matching ============

/// Match a charm's app by tag and VK.
///
/// Deploy spells create UTXOs with zero identity because the app id isn't
/// known when the spell is built; later spells use the real identity. The
/// VK is the same on both sides of that transition.
fn matches_app(charm_app: &App, target_app: &App) -> bool {
    charm_app.tag == target_app.tag && charm_app.vk == target_app.vk
}

/// Deploy spells carry the zero identity
fn is_deploy_spell(app: &App) -> bool {
    app.identity.0 == [0u8; 32]
}

/// A record may only be created by the deploy spell, with a batch that
/// opens with the pool's one Initialize
fn opens_pool(app: &App, instructions: &[PoolInstruction]) -> bool {
    let is_initialize = |ix: &&PoolInstruction| matches!(ix, PoolInstruction::Initialize { .. });

    is_deploy_spell(app)
        && instructions.first().is_some_and(|ix| is_initialize(&ix))
        && instructions.iter().filter(is_initialize).count() == 1
}

// ============ State Extraction ============

/// Pool record spent by the transaction
fn extract_input_store(app: &App, tx: &Transaction) -> Option<PoolStore> {
    tx.ins.iter().find_map(|(_, charms)| find_store(app, charms))
}

/// Pool record created by the transaction
fn extract_output_store(app: &App, tx: &Transaction) -> Option<PoolStore> {
    tx.outs.iter().find_map(|charms| find_store(app, charms))
}

fn find_store(app: &App, charms: &Charms) -> Option<PoolStore> {
    charms
        .iter()
        .filter(|(charm_app, _)| matches_app(charm_app, app))
        .find_map(|(_, data)| data.value::<PoolStore>().ok())
}

/// Ledger holding every token charm in `charms`
///
/// The pool's share mint is credited with the supply `store` recorded, of
/// which the charms may show only part.
fn holdings_ledger<'a>(
    charms: impl Iterator<Item = &'a Charms>,
    store: &PoolStore,
) -> FlashixResult<InMemoryLedger> {
    let mut ledger = InMemoryLedger::new();
    for charms in charms {
        for (charm_app, data) in charms.iter() {
            if charm_app.tag != TOKEN_TAG {
                continue;
            }
            if let Ok(holding) = data.value::<TokenHolding>() {
                ledger.fund(&holding.owner, &charm_app.identity.0, holding.amount)?;
            }
        }
    }

    if let Some(config) = store.config.as_ref() {
        ledger.track_supply(&config.share_mint, store.share_supply)?;
    }
    Ok(ledger)
}

// ============ Tests ============
