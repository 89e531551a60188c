//! Flashix Pool - Charms App Entry Point
//!
//! Validates pool spells on Bitcoin using client-side validation.
//!
//! ## What This App Validates
//!
//! - **Initialize**: Creates the pool record bound to this app's identity
//! - **Deposit / Withdraw**: Share accounting against the pool's value
//! - **Borrow / Repay**: Flash loans that must close in the same spell
//!
//! A spell is one atomic batch. The pool charm is spent and recreated by
//! every spell, and the replayed batch must reproduce the new charm
//! exactly.

use charms_sdk::data::{App, Data, Transaction};

/// Main validation function for pool spells.
///
/// # Arguments
/// * `app` - The pool app definition
/// * `tx` - The transaction being validated
/// * `x` - Public inputs
/// * `w` - Witness data (the batch)
///
/// # Returns
/// `true` if the spell is valid, `false` otherwise
pub fn app_contract(app: &App, tx: &Transaction, x: &Data, w: &Data) -> bool {
    flashix_pool::charms::validate_pool_operation(app, tx, x, w)
}

// Use the Charms SDK main macro to generate the entry point
charms_sdk::main!(app_contract);
