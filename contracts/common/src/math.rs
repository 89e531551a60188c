//! Fixed-Point Ledger Arithmetic
//!
//! Share/amount conversions and fee computation. All conversions widen to
//! u128 and floor, so rounding loss always stays in the pool.

use crate::constants::fees;
use crate::errors::{FlashixError, FlashixResult};

/// Flash fee on a borrowed amount
///
/// fee = floor(amount * fee_basis_points / 10_000)
pub fn calculate_fee(amount: u64, fee_basis_points: u16) -> FlashixResult<u64> {
    let fee = (amount as u128)
        .checked_mul(fee_basis_points as u128)
        .ok_or(FlashixError::Overflow)?
        .checked_div(fees::BPS_DENOMINATOR as u128)
        .ok_or(FlashixError::DivisionByZero)?;

    u64::try_from(fee).map_err(|_| FlashixError::Overflow)
}

/// Amount a borrower owes back for a loan of `amount`
///
/// # Returns
/// (fee, amount + fee)
pub fn calculate_amount_owed(amount: u64, fee_basis_points: u16) -> FlashixResult<(u64, u64)> {
    let fee = calculate_fee(amount, fee_basis_points)?;
    let owed = safe_add(amount, fee)?;
    Ok((fee, owed))
}

/// Shares to mint for a deposit
///
/// The first deposit mints 1:1. Later deposits buy in at the current
/// per-share value: floor(amount * total_shares / total_value), with
/// `total_value` observed before the deposit.
///
/// # Arguments
/// * `amount` - Asset deposited
/// * `total_shares` - Share supply before minting
/// * `total_value` - netDeposits + collectedFees before the deposit
pub fn shares_to_mint(amount: u64, total_shares: u64, total_value: u64) -> FlashixResult<u64> {
    if total_shares == 0 {
        return Ok(amount);
    }
    if total_value == 0 {
        return Err(FlashixError::DivisionByZero);
    }

    let shares = (amount as u128)
        .checked_mul(total_shares as u128)
        .ok_or(FlashixError::MintOverflow)?
        / total_value as u128;

    u64::try_from(shares).map_err(|_| FlashixError::MintOverflow)
}

/// Asset paid out for redeeming `share_amount` shares
///
/// floor(share_amount * total_value / total_shares), evaluated before burning.
pub fn assets_for_shares(share_amount: u64, total_shares: u64, total_value: u64) -> FlashixResult<u64> {
    if total_shares == 0 {
        return Err(FlashixError::DivisionByZero);
    }

    let assets = (share_amount as u128)
        .checked_mul(total_value as u128)
        .ok_or(FlashixError::Overflow)?
        / total_shares as u128;

    u64::try_from(assets).map_err(|_| FlashixError::Overflow)
}

/// Split a redemption between principal and fees
///
/// principal = floor(asset_out * net_deposits / total_value), fee part is the
/// remainder. The fee part never exceeds `collected_fees` because it equals
/// ceil(asset_out * collected_fees / total_value).
///
/// # Returns
/// (principal_part, fee_part)
pub fn split_redemption(
    asset_out: u64,
    net_deposits: u64,
    collected_fees: u64,
) -> FlashixResult<(u64, u64)> {
    let total_value = safe_add(net_deposits, collected_fees)?;
    if asset_out > total_value {
        return Err(FlashixError::Underflow);
    }
    if total_value == 0 {
        return Ok((0, 0));
    }

    let principal = (asset_out as u128)
        .checked_mul(net_deposits as u128)
        .ok_or(FlashixError::Overflow)?
        / total_value as u128;
    // principal <= asset_out, so this fits
    let principal = u64::try_from(principal).map_err(|_| FlashixError::Overflow)?;
    let fee_part = safe_sub(asset_out, principal)?;

    Ok((principal, fee_part))
}

/// Safe addition with overflow check
pub fn safe_add(a: u64, b: u64) -> FlashixResult<u64> {
    a.checked_add(b).ok_or(FlashixError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u64, b: u64) -> FlashixResult<u64> {
    a.checked_sub(b).ok_or(FlashixError::Underflow)
}
