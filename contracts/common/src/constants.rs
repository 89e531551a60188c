//! Protocol Constants
//!
//! All magic numbers and configuration values for the Flashix pool.
//!
//! # Network Configuration
//!
//! Use feature flags to compile for different networks:
//! - `mainnet` - Production program id and tighter batch limits
//! - Default (no feature) - Test network values
//!
//! ```toml
//! # For mainnet deployment:
//! flashix-common = { path = "...", features = ["mainnet"] }
//! ```

/// Fee Configuration (in basis points, 100 = 1%)
pub mod fees {
    /// Basis points denominator
    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Highest accepted flash fee (100%)
    pub const MAX_FEE_BPS: u16 = 10_000;

    /// Fee used by deployment tooling when none is given (5%)
    pub const DEFAULT_FEE_BPS: u16 = 500;
}

/// Derivation seeds
pub mod seeds {
    /// Namespace of the singleton pool config record
    pub const POOL_CONFIG: &[u8] = b"config";

    /// Namespace of the pool's custody account for a given asset
    pub const CUSTODY: &[u8] = b"custody";

    /// Domain separator appended to every derivation
    pub const DERIVATION_DOMAIN: &[u8] = b"ProgramDerivedAddress";
}

/// Batch limits
///
/// Values differ between mainnet and test network.
pub mod batch {
    /// Maximum operations in a single atomic batch
    /// - Mainnet: 64 (matches a realistic transaction size)
    /// - Testnet: 256 (lets stress tests build long batches)
    #[cfg(feature = "mainnet")]
    pub const MAX_OPERATIONS: usize = 64;
    #[cfg(not(feature = "mainnet"))]
    pub const MAX_OPERATIONS: usize = 256;
}

/// Network identity
pub mod network {
    /// Program id that namespaces every derived address
    #[cfg(feature = "mainnet")]
    pub const PROGRAM_ID: [u8; 32] = *b"flashix:mainnet:pool-program:v01";
    #[cfg(not(feature = "mainnet"))]
    pub const PROGRAM_ID: [u8; 32] = *b"flashix:testnet:pool-program:v01";
}
