//! # Predicate Address Deriver
//!
//! Maps source addresses to predicate addresses for one predicate version.
//!
//! ## Key Properties
//!
//! - **Deterministic**: the same `(address, version)` pair always yields the
//!   same predicate address; nothing is cached between calls
//! - **Content-addressed**: the address is a BLAKE3 digest of the configured
//!   bytecode, so different versions give unrelated addresses
//! - **Ordered**: batches are derived in parallel with Rayon and collected
//!   by input index, never by completion order
//!
//! ## Example
//!
//! ```rust
//! use predicate_addresses::adapter::EthereumWalletAdapter;
//! use predicate_addresses::derive::PredicateDeriver;
//! use predicate_addresses::registry::{NetworkSelector, PredicateRegistry};
//!
//! let registry = PredicateRegistry::builtin().unwrap();
//! let version = registry.resolve(NetworkSelector::Testnet).unwrap();
//! let deriver = PredicateDeriver::new(&EthereumWalletAdapter, version, NetworkSelector::Testnet);
//!
//! let a = deriver.derive("0x52d7792d70E15dC6eDDb8Dc907c06D3b8247aEbe").unwrap();
//! let b = deriver.derive("0x52d7792d70E15dC6eDDb8Dc907c06D3b8247aEbe").unwrap();
//! assert_eq!(a, b);
//! ```

use crate::adapter::{ChainWalletAdapter, DerivationError};
use crate::registry::{NetworkSelector, PredicateVersion};
use blake3::Hasher;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Domain separator prepended to configured bytecode before hashing.
const ADDRESS_SEED: &[u8] = b"FUEL";

/// Destination address of a configured predicate (`0x`-prefixed hex).
pub fn predicate_address(configured_bytecode: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(ADDRESS_SEED);
    hasher.update(configured_bytecode);
    let digest = hasher.finalize();
    format!("0x{}", hex::encode(digest.as_bytes()))
}

/// One source address and the predicate address derived for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMapping {
    /// Source address exactly as it was supplied
    pub source_address: String,
    pub predicate_address: String,
    pub network: NetworkSelector,
}

/// A row whose address could not be derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Position of the address in the input batch
    pub index: usize,
    pub source_address: String,
    pub error: DerivationError,
}

/// Per-address result of a batch derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivationOutcome {
    Derived(DerivedMapping),
    Failed(RowFailure),
}

impl DerivationOutcome {
    pub fn mapping(&self) -> Option<&DerivedMapping> {
        match self {
            DerivationOutcome::Derived(m) => Some(m),
            DerivationOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RowFailure> {
        match self {
            DerivationOutcome::Derived(_) => None,
            DerivationOutcome::Failed(f) => Some(f),
        }
    }
}

pub struct PredicateDeriver<'a> {
    adapter: &'a dyn ChainWalletAdapter,
    version: &'a PredicateVersion,
    network: NetworkSelector,
}

impl<'a> PredicateDeriver<'a> {
    pub fn new(
        adapter: &'a dyn ChainWalletAdapter,
        version: &'a PredicateVersion,
        network: NetworkSelector,
    ) -> Self {
        Self {
            adapter,
            version,
            network,
        }
    }

    /// Predicate address for a single source address.
    pub fn derive(&self, address: &str) -> Result<String, DerivationError> {
        self.adapter.derive_address(self.version, address)
    }

    pub fn mapping(&self, address: &str) -> Result<DerivedMapping, DerivationError> {
        let predicate_address = self.derive(address)?;
        debug!(
            chain = self.adapter.chain(),
            source = address,
            predicate = %predicate_address,
            "derived predicate address"
        );
        Ok(DerivedMapping {
            source_address: address.to_string(),
            predicate_address,
            network: self.network,
        })
    }

    /// Derive every address, one outcome per input in input order.
    ///
    /// Duplicates are kept; each produces its own outcome.
    pub fn derive_batch(&self, addresses: &[String]) -> Vec<DerivationOutcome> {
        addresses
            .par_iter()
            .enumerate()
            .map(|(index, address)| match self.mapping(address) {
                Ok(mapping) => DerivationOutcome::Derived(mapping),
                Err(error) => DerivationOutcome::Failed(RowFailure {
                    index,
                    source_address: address.clone(),
                    error,
                }),
            })
            .collect()
    }
}
