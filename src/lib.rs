//! # predicate_addresses
//!
//! **Predicate wallets for EVM accounts, derived offline.**
//!
//! Every Ethereum account owns a predicate on the destination chain: the
//! compiled predicate bytecode with the account written into its `SIGNER`
//! configurable. The predicate's address is a content hash of that configured
//! bytecode, so it can be computed without touching either chain.
//!
//! This crate derives those addresses for a batch of accounts and writes
//! them back into a spreadsheet-friendly table.
//!
//! ## Quick Start
//!
//! ```rust
//! use predicate_addresses::{EthereumWalletAdapter, NetworkSelector, PredicateDeriver, PredicateRegistry};
//!
//! let registry = PredicateRegistry::builtin().unwrap();
//! let version = registry.resolve(NetworkSelector::Testnet).unwrap();
//! let deriver = PredicateDeriver::new(&EthereumWalletAdapter, version, NetworkSelector::Testnet);
//!
//! let predicate = deriver.derive("0x52d7792d70E15dC6eDDb8Dc907c06D3b8247aEbe").unwrap();
//! println!("predicate address: {}", predicate);
//! ```
//!
//! ## Key Concepts
//!
//! - **Predicate version**: an immutable compiled artifact, one per network
//! - **Chain wallet adapter**: binds a source-chain address into a predicate
//! - **Pipeline**: load → derive → reconcile → write, in one ordered pass
//!
//! ## Outputs
//!
//! - `generated/predicate-addresses.json` — `{sourceAddress, predicateAddress, network}` per address
//! - `generated/predicate-addresses.csv` — the input table with `predicateAddress` filled in

pub mod adapter;
pub mod derive;
pub mod loader;
pub mod pipeline;
pub mod reconcile;
pub mod registry;
pub mod writer;

pub use adapter::{ChainWalletAdapter, DerivationError, EthereumWalletAdapter, SourceChain};
pub use derive::{DerivationOutcome, DerivedMapping, PredicateDeriver, RowFailure};
pub use loader::{ColumnNames, SourceRecord};
pub use pipeline::{EnrichmentMode, FailurePolicy, Pipeline, PipelineConfig, PipelineError, RunReport};
pub use registry::{ConfigurationError, NetworkSelector, PredicateRegistry, PredicateVersion};
