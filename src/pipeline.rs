//! # Derivation Pipeline
//!
//! One linear pass over a batch of source addresses:
//!
//! 1. resolve the predicate version for the selected network
//! 2. load addresses (and table rows when enriching)
//! 3. derive one mapping per address, in input order
//! 4. reconcile mappings into the table rows
//! 5. write the mapping JSON and the enriched table
//!
//! Configuration errors surface before any file is touched. Derivation
//! failures either abort the run before anything is written
//! ([`FailurePolicy::Abort`]) or are collected into the [`RunReport`]
//! ([`FailurePolicy::Skip`]).
//!
//! ## Example
//!
//! ```no_run
//! use predicate_addresses::pipeline::{Pipeline, PipelineConfig};
//! use predicate_addresses::registry::{NetworkSelector, PredicateRegistry};
//!
//! let config = PipelineConfig {
//!     network: NetworkSelector::Mainnet,
//!     ..PipelineConfig::default()
//! };
//! let report = Pipeline::new(config, PredicateRegistry::builtin()?).run()?;
//! println!("derived={}", report.derived);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::adapter::{DerivationError, SourceChain};
use crate::derive::{DerivationOutcome, DerivedMapping, PredicateDeriver, RowFailure};
use crate::loader::{self, ColumnNames, FallbackReason, LoadedSource};
use crate::reconcile::reconcile;
use crate::registry::{ConfigurationError, NetworkSelector, PredicateRegistry};
use crate::writer::{write_mappings_json, write_records_table, OutputWriteError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Address used when no table is available.
pub const DEFAULT_FALLBACK_ADDRESS: &str = "0x52d7792d70E15dC6eDDb8Dc907c06D3b8247aEbe";

/// Whether the run reads and writes the address table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    /// Load the table, reconcile it and write the enriched copy
    #[default]
    Table,
    /// Derive the fallback list only and write just the JSON
    JsonOnly,
}

impl EnrichmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentMode::Table => "table",
            EnrichmentMode::JsonOnly => "json_only",
        }
    }
}

/// What to do with an address the wallet adapter rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the whole run; nothing is written
    #[default]
    Abort,
    /// Leave the row out and report it
    Skip,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Skip => "skip",
        }
    }
}

/// Everything a run needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub network: NetworkSelector,
    pub mode: EnrichmentMode,
    pub source_chain: SourceChain,
    pub failure_policy: FailurePolicy,
    /// Address table to read
    pub input_table: PathBuf,
    /// Mapping JSON destination
    pub json_output: PathBuf,
    /// Enriched table destination
    pub table_output: PathBuf,
    /// Addresses used when the table is missing, unreadable or empty
    pub fallback_addresses: Vec<String>,
    pub columns: ColumnNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            network: NetworkSelector::default(),
            mode: EnrichmentMode::default(),
            source_chain: SourceChain::default(),
            failure_policy: FailurePolicy::default(),
            input_table: PathBuf::from("data/addresses.csv"),
            json_output: PathBuf::from("generated/predicate-addresses.json"),
            table_output: PathBuf::from("generated/predicate-addresses.csv"),
            fallback_addresses: vec![DEFAULT_FALLBACK_ADDRESS.to_string()],
            columns: ColumnNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let config_err = |reason: String| ConfigurationError::ConfigFile {
            path: path.display().to_string(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| config_err(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| config_err(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("derivation failed at row {index} ({source_address}): {error}")]
    Derivation {
        index: usize,
        source_address: String,
        #[source]
        error: DerivationError,
    },
    #[error(transparent)]
    Output(#[from] OutputWriteError),
}

impl From<RowFailure> for PipelineError {
    fn from(f: RowFailure) -> Self {
        PipelineError::Derivation {
            index: f.index,
            source_address: f.source_address,
            error: f.error,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub network: NetworkSelector,
    pub predicate_id: String,
    /// Addresses submitted for derivation
    pub total: usize,
    pub derived: usize,
    /// Rows skipped under [`FailurePolicy::Skip`]
    pub failures: Vec<RowFailure>,
    pub fallback: Option<FallbackReason>,
    pub mappings: Vec<DerivedMapping>,
    pub json_output: PathBuf,
    /// Set when the enriched table was written
    pub table_output: Option<PathBuf>,
}

pub struct Pipeline {
    config: PipelineConfig,
    registry: PredicateRegistry,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: PredicateRegistry) -> Self {
        Self { config, registry }
    }

    fn load(&self) -> LoadedSource {
        match self.config.mode {
            EnrichmentMode::Table => loader::load(
                &self.config.input_table,
                &self.config.fallback_addresses,
                &self.config.columns,
            ),
            EnrichmentMode::JsonOnly => LoadedSource {
                addresses: self.config.fallback_addresses.clone(),
                rows: Vec::new(),
                fallback: None,
            },
        }
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let cfg = &self.config;
        let version = self.registry.resolve(cfg.network)?;
        info!(
            network = %cfg.network,
            predicate = %version.id,
            chain = cfg.source_chain.as_str(),
            mode = cfg.mode.as_str(),
            on_invalid = cfg.failure_policy.as_str(),
            "resolved predicate version"
        );

        let source = self.load();
        let adapter = cfg.source_chain.adapter();
        let deriver = PredicateDeriver::new(&*adapter, version, cfg.network);
        let outcomes = deriver.derive_batch(&source.addresses);

        let mut mappings = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                DerivationOutcome::Derived(m) => mappings.push(m),
                DerivationOutcome::Failed(f) => match cfg.failure_policy {
                    FailurePolicy::Abort => return Err(f.into()),
                    FailurePolicy::Skip => {
                        warn!(
                            index = f.index,
                            source = %f.source_address,
                            error = %f.error,
                            "skipping address"
                        );
                        failures.push(f);
                    }
                },
            }
        }

        write_mappings_json(&cfg.json_output, &mappings)?;
        let table_output = match cfg.mode {
            EnrichmentMode::Table => {
                let enriched = reconcile(source.rows, &mappings, &cfg.columns);
                write_records_table(&cfg.table_output, &enriched)?;
                Some(cfg.table_output.clone())
            }
            EnrichmentMode::JsonOnly => None,
        };
        info!(
            derived = mappings.len(),
            skipped = failures.len(),
            json = %cfg.json_output.display(),
            "wrote outputs"
        );

        Ok(RunReport {
            network: cfg.network,
            predicate_id: version.id.clone(),
            total: source.addresses.len(),
            derived: mappings.len(),
            failures,
            fallback: source.fallback,
            mappings,
            json_output: cfg.json_output.clone(),
            table_output,
        })
    }
}
