//! Custody Ledger and Share Token
//!
//! The pool never owns balances itself. It moves the asset through a
//! [`CustodyLedger`] and issues claims through a [`ShareToken`]; both are
//! traits so a host environment can back them with real token programs.
//! [`InMemoryLedger`] backs both with plain maps; the Charms bridge fills
//! one from the token charms a transaction spends.

use crate::BTreeMap;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{FlashixError, FlashixResult};
use crate::types::{Address, MintId};

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Moves fungible balances between accounts
pub trait CustodyLedger {
    /// Balance of `owner` in `mint` (0 for unknown accounts)
    fn balance_of(&self, owner: &Address, mint: &MintId) -> u64;

    /// Move `amount` of `mint` from `from` to `to`
    ///
    /// Fails with `InsufficientBalance` if `from` holds less than `amount`.
    fn transfer(
        &mut self,
        mint: &MintId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> FlashixResult<()>;
}

/// Creates and destroys claim shares
pub trait ShareToken {
    /// Outstanding supply of `mint`
    fn total_supply(&self, mint: &MintId) -> u64;

    /// Issue `amount` new shares to `to`
    fn mint_to(&mut self, mint: &MintId, to: &Address, amount: u64) -> FlashixResult<()>;

    /// Destroy `amount` shares held by `from`
    fn burn(&mut self, mint: &MintId, from: &Address, amount: u64) -> FlashixResult<()>;
}

// ============================================================================
// In-Memory Ledger
// ============================================================================

/// Key of one token account
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct AccountKey {
    pub owner: Address,
    pub mint: MintId,
}

/// Map-backed ledger for every mint a pool touches
///
/// Zero balances are never stored, so two ledgers holding the same
/// balances compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct InMemoryLedger {
    balances: BTreeMap<AccountKey, u64>,
    supplies: BTreeMap<MintId, u64>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `mint` to `owner` from outside the pool
    ///
    /// Stands in for assets that arrive from elsewhere (test funding,
    /// token charms spent by a transaction).
    pub fn fund(&mut self, owner: &Address, mint: &MintId, amount: u64) -> FlashixResult<()> {
        let supply = self
            .total_supply(mint)
            .checked_add(amount)
            .ok_or(FlashixError::Overflow)?;
        let balance = self
            .balance_of(owner, mint)
            .checked_add(amount)
            .ok_or(FlashixError::Overflow)?;

        self.set_supply(mint, supply);
        self.set_balance(owner, mint, balance);
        Ok(())
    }

    /// Record the full outstanding supply of `mint`
    ///
    /// The ledger may see only some holders of `mint`, but the supply must
    /// still cover every balance it does hold.
    pub fn track_supply(&mut self, mint: &MintId, supply: u64) -> FlashixResult<()> {
        let held = self
            .balances
            .iter()
            .filter(|(key, _)| key.mint == *mint)
            .try_fold(0u64, |total, (_, amount)| total.checked_add(*amount))
            .ok_or(FlashixError::Overflow)?;
        if supply < held {
            return Err(FlashixError::SupplyMismatch {
                recorded: supply,
                observed: held,
            });
        }

        self.set_supply(mint, supply);
        Ok(())
    }

    fn set_balance(&mut self, owner: &Address, mint: &MintId, amount: u64) {
        let key = AccountKey {
            owner: *owner,
            mint: *mint,
        };
        if amount == 0 {
            self.balances.remove(&key);
        } else {
            self.balances.insert(key, amount);
        }
    }

    fn set_supply(&mut self, mint: &MintId, amount: u64) {
        if amount == 0 {
            self.supplies.remove(mint);
        } else {
            self.supplies.insert(*mint, amount);
        }
    }
}

impl CustodyLedger for InMemoryLedger {
    fn balance_of(&self, owner: &Address, mint: &MintId) -> u64 {
        let key = AccountKey {
            owner: *owner,
            mint: *mint,
        };
        self.balances.get(&key).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        mint: &MintId,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> FlashixResult<()> {
        let from_balance = self.balance_of(from, mint);
        if from_balance < amount {
            return Err(FlashixError::InsufficientBalance {
                available: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(to, mint)
            .checked_add(amount)
            .ok_or(FlashixError::Overflow)?;

        self.set_balance(from, mint, from_balance - amount);
        self.set_balance(to, mint, to_balance);
        Ok(())
    }
}

impl ShareToken for InMemoryLedger {
    fn total_supply(&self, mint: &MintId) -> u64 {
        self.supplies.get(mint).copied().unwrap_or(0)
    }

    fn mint_to(&mut self, mint: &MintId, to: &Address, amount: u64) -> FlashixResult<()> {
        let supply = self
            .total_supply(mint)
            .checked_add(amount)
            .ok_or(FlashixError::MintOverflow)?;
        let balance = self
            .balance_of(to, mint)
            .checked_add(amount)
            .ok_or(FlashixError::MintOverflow)?;

        self.set_supply(mint, supply);
        self.set_balance(to, mint, balance);
        Ok(())
    }

    fn burn(&mut self, mint: &MintId, from: &Address, amount: u64) -> FlashixResult<()> {
        let balance = self.balance_of(from, mint);
        if balance < amount {
            return Err(FlashixError::InsufficientBalance {
                available: balance,
                requested: amount,
            });
        }
        let supply = self
            .total_supply(mint)
            .checked_sub(amount)
            .ok_or(FlashixError::Underflow)?;

        self.set_supply(mint, supply);
        self.set_balance(from, mint, balance - amount);
        Ok(())
    }
}
