//! Atomic Pairing Guard
//!
//! A flash loan is only sound if the batch that opens it also closes it.
//! These checks run over the ordered operation list of the batch being
//! executed, before any Borrow or Repay effect is applied.
//!
//! ## Rules
//!
//! - A Borrow needs a later Repay from the same borrower, for the same
//!   asset, against the same pool.
//! - No second Borrow against that pool may sit between the two.
//! - A Repay settles the nearest earlier Borrow on its pool, which must
//!   belong to the same borrower and asset.

use crate::errors::{FlashixError, FlashixResult};
use crate::types::{OperationDescriptor, OperationKind};

/// Position of the Repay that closes the Borrow at `borrow_position`
///
/// # Errors
/// * `MissingRepayIx` - no matching later Repay
/// * `NestedBorrow` - another Borrow on the pool opens before the Repay
pub fn find_paired_repay(ops: &[OperationDescriptor], borrow_position: u32) -> FlashixResult<u32> {
    let borrow = descriptor_at(ops, borrow_position, OperationKind::Borrow)?;
    let pool = borrow.pool.ok_or(FlashixError::InvalidWitness {
        reason: "borrow without pool",
    })?;

    for op in ops.iter().skip(borrow_position as usize + 1) {
        if op.targets(OperationKind::Repay, &pool)
            && op.actor == borrow.actor
            && op.asset == borrow.asset
        {
            return Ok(op.position);
        }
        if op.targets(OperationKind::Borrow, &pool) {
            return Err(FlashixError::NestedBorrow {
                outer_position: borrow_position,
                inner_position: op.position,
            });
        }
    }

    Err(FlashixError::MissingRepayIx { borrow_position })
}

/// Borrow settled by the Repay at `repay_position`
///
/// # Returns
/// (borrow_position, borrowed_amount)
///
/// # Errors
/// * `MissingBorrowIx` - the nearest earlier pool loan is already settled,
///   belongs to someone else, or does not exist
pub fn find_paired_borrow(
    ops: &[OperationDescriptor],
    repay_position: u32,
) -> FlashixResult<(u32, u64)> {
    let repay = descriptor_at(ops, repay_position, OperationKind::Repay)?;
    let pool = repay.pool.ok_or(FlashixError::InvalidWitness {
        reason: "repay without pool",
    })?;
    let missing = FlashixError::MissingBorrowIx { repay_position };

    for op in ops[..repay_position as usize].iter().rev() {
        if op.targets(OperationKind::Repay, &pool) {
            return Err(missing);
        }
        if op.targets(OperationKind::Borrow, &pool) {
            if op.actor != repay.actor || op.asset != repay.asset {
                return Err(missing);
            }
            let amount = op.amount.ok_or(FlashixError::InvalidWitness {
                reason: "borrow without amount",
            })?;
            return Ok((op.position, amount));
        }
    }

    Err(missing)
}

fn descriptor_at(
    ops: &[OperationDescriptor],
    position: u32,
    kind: OperationKind,
) -> FlashixResult<&OperationDescriptor> {
    match ops.get(position as usize) {
        Some(op) if op.position == position && op.kind == kind => Ok(op),
        _ => Err(FlashixError::InvalidWitness {
            reason: "descriptor does not match position",
        }),
    }
}
