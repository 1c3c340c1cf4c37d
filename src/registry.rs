//! # Predicate Version Registry
//!
//! Holds the predicate artifacts known to this build, one per destination
//! network, and resolves the active one from a [`NetworkSelector`].
//!
//! Artifacts are produced by the predicate compiler and checked in under
//! `artifacts/predicates/<id>.json`. Each document carries the ABI, the
//! hex-encoded bytecode and a generation timestamp. The file name is the
//! artifact id, which must equal `0x || sha256(bytecode)`.
//!
//! ## Example
//!
//! ```rust
//! use predicate_addresses::registry::{NetworkSelector, PredicateRegistry, MAINNET_PREDICATE_ID};
//!
//! let registry = PredicateRegistry::builtin().unwrap();
//! let version = registry.resolve(NetworkSelector::from_arg(Some("MAINNET"))).unwrap();
//! assert_eq!(version.id, MAINNET_PREDICATE_ID);
//! ```

use crate::adapter::DerivationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Artifact id of the predicate deployed for testnet.
pub const TESTNET_PREDICATE_ID: &str =
    "0x7dc0573d413d55c74fc984af7d6942d5df70fcf4fafb6d20558cda41f7c12b35";

/// Artifact id of the predicate deployed for mainnet.
pub const MAINNET_PREDICATE_ID: &str =
    "0x7e2370bbc514fa5942642fb90379e6b720669fde78673556a0f91aef2acb1f83";

const TESTNET_ARTIFACT: &str = include_str!(
    "../artifacts/predicates/0x7dc0573d413d55c74fc984af7d6942d5df70fcf4fafb6d20558cda41f7c12b35.json"
);
const MAINNET_ARTIFACT: &str = include_str!(
    "../artifacts/predicates/0x7e2370bbc514fa5942642fb90379e6b720669fde78673556a0f91aef2acb1f83.json"
);

/// Destination network a batch is derived for.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum NetworkSelector {
    #[default]
    Testnet,
    Mainnet,
}

impl NetworkSelector {
    /// Parse a user-supplied selector. Only `mainnet` (any case) selects
    /// mainnet; everything else, including no argument, selects testnet.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(|a| a.to_ascii_lowercase()).as_deref() {
            Some("mainnet") => NetworkSelector::Mainnet,
            _ => NetworkSelector::Testnet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkSelector::Testnet => "testnet",
            NetworkSelector::Mainnet => "mainnet",
        }
    }
}

impl From<String> for NetworkSelector {
    fn from(arg: String) -> Self {
        NetworkSelector::from_arg(Some(&arg))
    }
}

impl fmt::Display for NetworkSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while assembling or querying the registry.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No artifact registered for the resolved network
    #[error("no predicate artifact registered for network {network}")]
    MissingArtifact { network: NetworkSelector },
    /// Artifact document could not be decoded
    #[error("invalid predicate artifact {id}: {reason}")]
    InvalidArtifact { id: String, reason: String },
    /// Artifact id does not match the hash of its bytecode
    #[error("predicate artifact id mismatch: declared {declared}, computed {computed}")]
    IdMismatch { declared: String, computed: String },
    /// Pipeline configuration file could not be read or parsed
    #[error("invalid configuration file {path}: {reason}")]
    ConfigFile { path: String, reason: String },
}

/// An immutable compiled predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateVersion {
    /// Content hash of the bytecode (`0x`-prefixed sha256)
    pub id: String,
    /// ABI descriptor as emitted by the compiler
    pub abi: Value,
    /// Unconfigured bytecode
    pub bytecode: Vec<u8>,
    /// Generation time in milliseconds since the Unix epoch
    pub generated_at: u64,
}

#[derive(Deserialize)]
struct ArtifactDoc {
    abi: Value,
    bytecode: String,
    #[serde(rename = "generatedAt")]
    generated_at: u64,
}

/// Compute the artifact id for a bytecode blob.
pub fn artifact_id(bytecode: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(bytecode)))
}

impl PredicateVersion {
    /// Decode an artifact document and check that `id` matches its bytecode.
    pub fn from_artifact_json(id: &str, text: &str) -> Result<Self, ConfigurationError> {
        let doc: ArtifactDoc =
            serde_json::from_str(text).map_err(|e| ConfigurationError::InvalidArtifact {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        let raw = doc.bytecode.strip_prefix("0x").unwrap_or(&doc.bytecode);
        let bytecode = hex::decode(raw).map_err(|e| ConfigurationError::InvalidArtifact {
            id: id.to_string(),
            reason: format!("bytecode: {e}"),
        })?;
        let version = PredicateVersion {
            id: id.to_string(),
            abi: doc.abi,
            bytecode,
            generated_at: doc.generated_at,
        };
        version.verify_id()?;
        Ok(version)
    }

    pub fn verify_id(&self) -> Result<(), ConfigurationError> {
        let computed = artifact_id(&self.bytecode);
        if !computed.eq_ignore_ascii_case(&self.id) {
            return Err(ConfigurationError::IdMismatch {
                declared: self.id.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Byte offset of a named configurable, as declared by the ABI.
    pub fn configurable_offset(&self, name: &str) -> Option<usize> {
        self.abi
            .get("configurables")?
            .as_array()?
            .iter()
            .find(|c| c.get("name").and_then(|n| n.as_str()) == Some(name))?
            .get("offset")?
            .as_u64()
            .and_then(|o| usize::try_from(o).ok())
    }

    /// Copy of the bytecode with `value` written over the named configurable.
    pub fn configure(&self, name: &str, value: &[u8]) -> Result<Vec<u8>, DerivationError> {
        let offset = self
            .configurable_offset(name)
            .ok_or_else(|| DerivationError::MissingConfigurable {
                predicate_id: self.id.clone(),
                name: name.to_string(),
            })?;
        let end = offset
            .checked_add(value.len())
            .filter(|end| *end <= self.bytecode.len())
            .ok_or_else(|| DerivationError::ConfigurableOutOfRange {
                predicate_id: self.id.clone(),
                name: name.to_string(),
                offset,
            })?;
        let mut configured = self.bytecode.clone();
        configured[offset..end].copy_from_slice(value);
        Ok(configured)
    }
}

/// The set of predicate versions available to a run, keyed by network.
#[derive(Debug, Clone, Default)]
pub struct PredicateRegistry {
    versions: BTreeMap<NetworkSelector, PredicateVersion>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated from the artifacts embedded in this build.
    pub fn builtin() -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        registry.register(
            NetworkSelector::Testnet,
            PredicateVersion::from_artifact_json(TESTNET_PREDICATE_ID, TESTNET_ARTIFACT)?,
        )?;
        registry.register(
            NetworkSelector::Mainnet,
            PredicateVersion::from_artifact_json(MAINNET_PREDICATE_ID, MAINNET_ARTIFACT)?,
        )?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        network: NetworkSelector,
        version: PredicateVersion,
    ) -> Result<(), ConfigurationError> {
        version.verify_id()?;
        self.versions.insert(network, version);
        Ok(())
    }

    pub fn resolve(&self, network: NetworkSelector) -> Result<&PredicateVersion, ConfigurationError> {
        self.versions
            .get(&network)
            .ok_or(ConfigurationError::MissingArtifact { network })
    }

    pub fn networks(&self) -> impl Iterator<Item = NetworkSelector> + '_ {
        self.versions.keys().copied()
    }
}
