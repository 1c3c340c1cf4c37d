//! Chain wallet adapters.
//!
//! An adapter knows how a wallet address of one source chain is bound into a
//! predicate as its signer. The pipeline only sees the [`ChainWalletAdapter`]
//! trait, so adding a chain means adding an implementation here and a
//! [`SourceChain`] variant.

use crate::derive::predicate_address;
use crate::registry::PredicateVersion;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the configurable that holds the owner's address.
pub const SIGNER_CONFIGURABLE: &str = "SIGNER";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("malformed {chain} address {address:?}: {reason}")]
    MalformedAddress {
        chain: &'static str,
        address: String,
        reason: String,
    },
    #[error("predicate {predicate_id} has no configurable {name}")]
    MissingConfigurable { predicate_id: String, name: String },
    #[error("configurable {name} at offset {offset} exceeds bytecode of predicate {predicate_id}")]
    ConfigurableOutOfRange {
        predicate_id: String,
        name: String,
        offset: usize,
    },
}

/// Derives destination-chain predicate addresses for one source chain.
pub trait ChainWalletAdapter: Send + Sync {
    /// Short chain name used in diagnostics.
    fn chain(&self) -> &'static str;

    /// Bind `chain_address` into `predicate` and return the predicate's
    /// destination address.
    fn derive_address(
        &self,
        predicate: &PredicateVersion,
        chain_address: &str,
    ) -> Result<String, DerivationError>;
}

/// Adapter for Ethereum (and EVM-compatible) accounts.
///
/// The 20-byte account is left-padded to 32 bytes and written into the
/// `SIGNER` configurable. Hex digits are accepted in any case, so the
/// checksum casing of the input never changes the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthereumWalletAdapter;

impl EthereumWalletAdapter {
    pub fn signer_bytes(&self, address: &str) -> Result<[u8; 32], DerivationError> {
        let malformed = |reason: &str| DerivationError::MalformedAddress {
            chain: self.chain(),
            address: address.to_string(),
            reason: reason.to_string(),
        };
        let digits = address
            .strip_prefix("0x")
            .or_else(|| address.strip_prefix("0X"))
            .ok_or_else(|| malformed("missing 0x prefix"))?;
        if digits.len() != 40 {
            return Err(malformed("expected 40 hex digits"));
        }
        let raw = hex::decode(digits).map_err(|_| malformed("non-hex digit"))?;
        let mut out = [0u8; 32];
        out[12..].copy_from_slice(&raw);
        Ok(out)
    }
}

impl ChainWalletAdapter for EthereumWalletAdapter {
    fn chain(&self) -> &'static str {
        "ethereum"
    }

    fn derive_address(
        &self,
        predicate: &PredicateVersion,
        chain_address: &str,
    ) -> Result<String, DerivationError> {
        let signer = self.signer_bytes(chain_address)?;
        let configured = predicate.configure(SIGNER_CONFIGURABLE, &signer)?;
        Ok(predicate_address(&configured))
    }
}

/// Source chain whose addresses are being mapped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChain {
    #[default]
    Ethereum,
}

impl SourceChain {
    pub fn from_str(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ethereum" | "evm" => Some(SourceChain::Ethereum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceChain::Ethereum => "ethereum",
        }
    }

    pub fn adapter(&self) -> Box<dyn ChainWalletAdapter> {
        match self {
            SourceChain::Ethereum => Box::new(EthereumWalletAdapter),
        }
    }
}
