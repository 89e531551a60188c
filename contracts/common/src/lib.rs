//! Flashix Common Library
//!
//! Shared types, constants, and utilities for the Flashix flash-loan pool.
//!
//! ## Model
//!
//! A single-asset pool lends its custody balance to borrowers who must
//! return it, plus a fee, inside the same atomic batch. Liquidity providers
//! hold shares whose value grows with the collected fees.
//!
//! - **Fixed-point ledger** (`math`): floor-rounded share and fee math
//! - **Pool record** (`types`): `PoolConfig` and the batch instruction set
//! - **Pairing guard** (`pairing`): Borrow/Repay correlation over a batch
//! - **Collaborators** (`ledger`): custody transfers and share mint/burn
//! - **Derivation** (`derivation`): deterministic pool and custody addresses
//! - **Events** (`events`): typed records of every transition
//!
//! This crate is `no_std` compatible when built without the default
//! `std` feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, string::String, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, string::String, vec::Vec};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod ledger;
pub mod pairing;
pub mod derivation;


// Re-exports for convenience
pub use constants::*;
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use ledger::*;
pub use pairing::*;
pub use derivation::*;
