//! Address Derivation
//!
//! Pool accounts live at addresses derived from fixed seeds and the program
//! id, so every party computes the same location without a registry.
//!
//! address = sha256(seed_0 || .. || seed_n || bump || program_id || domain)
//!
//! Bumps are tried from 255 downward; the first digest whose top bit is
//! clear is accepted. Bump 0 is accepted unconditionally so derivation
//! always terminates.

use sha2::{Digest, Sha256};

use crate::constants::{network, seeds};
use crate::types::{Address, MintId};

/// Hash seeds, bump and program id into an address
pub fn create_program_address(seed_parts: &[&[u8]], bump: u8, program_id: &Address) -> Address {
    let mut hasher = Sha256::new();
    for seed in seed_parts {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id);
    hasher.update(seeds::DERIVATION_DOMAIN);
    let result = hasher.finalize();

    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

/// True if `address` may be used as a derived account
pub fn is_viable(address: &Address) -> bool {
    address[0] & 0x80 == 0
}

/// Find the canonical derived address and its bump
pub fn find_program_address(seed_parts: &[&[u8]], program_id: &Address) -> (Address, u8) {
    for bump in (1..=u8::MAX).rev() {
        let address = create_program_address(seed_parts, bump, program_id);
        if is_viable(&address) {
            return (address, bump);
        }
    }
    (create_program_address(seed_parts, 0, program_id), 0)
}

/// Location of the singleton pool record for `program_id`
pub fn derive_pool_address(program_id: &Address) -> (Address, u8) {
    find_program_address(&[seeds::POOL_CONFIG], program_id)
}

/// Pool record location on the configured network
pub fn default_pool_address() -> (Address, u8) {
    derive_pool_address(&network::PROGRAM_ID)
}

/// Custody account holding `asset_mint` on behalf of `pool`
pub fn derive_custody_address(pool: &Address, asset_mint: &MintId, program_id: &Address) -> Address {
    find_program_address(&[seeds::CUSTODY, pool, asset_mint], program_id).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_address_is_deterministic() {
        let (first, bump) = default_pool_address();
        let (second, bump_again) = default_pool_address();
        assert_eq!(first, second);
        assert_eq!(bump, bump_again);
        assert_eq!(first, create_program_address(&[seeds::POOL_CONFIG], bump, &network::PROGRAM_ID));
    }

    #[test]
    fn test_found_address_is_viable_or_last_resort() {
        let (address, bump) = default_pool_address();
        assert!(is_viable(&address) || bump == 0);
    }

    #[test]
    fn test_bump_is_highest_viable() {
        let program_id = [7u8; 32];
        let (_, bump) = derive_pool_address(&program_id);
        for higher in (bump as u16 + 1)..=255 {
            let candidate = create_program_address(&[seeds::POOL_CONFIG], higher as u8, &program_id);
            assert!(!is_viable(&candidate));
        }
    }

    #[test]
    fn test_program_id_namespaces_addresses() {
        let (a, _) = derive_pool_address(&[1u8; 32]);
        let (b, _) = derive_pool_address(&[2u8; 32]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_custody_depends_on_pool_and_mint() {
        let program_id = network::PROGRAM_ID;
        let (pool, _) = derive_pool_address(&program_id);

        let usdt = derive_custody_address(&pool, &[1u8; 32], &program_id);
        let usdc = derive_custody_address(&pool, &[2u8; 32], &program_id);
        assert_ne!(usdt, usdc);
        assert_ne!(usdt, pool);
        assert_eq!(usdt, derive_custody_address(&pool, &[1u8; 32], &program_id));
    }
}
