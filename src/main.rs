use anyhow::{anyhow, Result};
use clap::Parser;
use predicate_addresses::loader::FallbackReason;
use predicate_addresses::pipeline::{
    EnrichmentMode, FailurePolicy, Pipeline, PipelineConfig, RunReport,
};
use predicate_addresses::registry::{NetworkSelector, PredicateRegistry};
use predicate_addresses::SourceChain;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "predicate-addresses",
    version,
    about = "Derive predicate addresses for EVM accounts and enrich an address table"
)]
struct Cli {
    /// Destination network: mainnet, anything else means testnet
    network: Option<String>,
    /// JSON file with a pipeline configuration; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address table to read
    #[arg(long)]
    input: Option<PathBuf>,
    /// Where to write the mapping JSON
    #[arg(long)]
    json_out: Option<PathBuf>,
    /// Where to write the enriched table
    #[arg(long)]
    table_out: Option<PathBuf>,
    /// Fallback address (repeatable); replaces the configured list
    #[arg(long = "address")]
    addresses: Vec<String>,
    /// Column holding the source-chain address
    #[arg(long)]
    source_column: Option<String>,
    /// Column to fill with the predicate address
    #[arg(long)]
    destination_column: Option<String>,
    /// Source chain of the input addresses (default: ethereum)
    #[arg(long)]
    chain: Option<String>,
    /// Derive the fallback addresses only and write just the JSON
    #[arg(long, default_value_t = false)]
    json_only: bool,
    /// Report malformed addresses instead of failing the run
    #[arg(long, default_value_t = false)]
    skip_invalid: bool,
    /// Log every derived address
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut cfg = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if cli.network.is_some() {
        cfg.network = NetworkSelector::from_arg(cli.network.as_deref());
    }
    if let Some(chain) = &cli.chain {
        cfg.source_chain =
            SourceChain::from_str(chain).ok_or_else(|| anyhow!("unknown chain {chain}"))?;
    }
    if let Some(p) = &cli.input {
        cfg.input_table = p.clone();
    }
    if let Some(p) = &cli.json_out {
        cfg.json_output = p.clone();
    }
    if let Some(p) = &cli.table_out {
        cfg.table_output = p.clone();
    }
    if !cli.addresses.is_empty() {
        cfg.fallback_addresses = cli.addresses.clone();
    }
    if let Some(c) = &cli.source_column {
        cfg.columns.source = c.clone();
    }
    if let Some(c) = &cli.destination_column {
        cfg.columns.destination = c.clone();
    }
    if cli.json_only {
        cfg.mode = EnrichmentMode::JsonOnly;
    }
    if cli.skip_invalid {
        cfg.failure_policy = FailurePolicy::Skip;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let cfg = build_config(&cli)?;
    let registry = PredicateRegistry::builtin()?;
    let report = Pipeline::new(cfg, registry).run()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("EVM to Predicate Address Mappings:");
    for m in &report.mappings {
        println!("EVM: {} -> Predicate: {}", m.source_address, m.predicate_address);
    }
    for f in &report.failures {
        println!("SKIPPED row={} address={} error={}", f.index, f.source_address, f.error);
    }
    let fallback = match &report.fallback {
        None => "none",
        Some(FallbackReason::Unreadable(_)) => "unreadable_table",
        Some(FallbackReason::NoAddresses) => "no_addresses",
    };
    println!();
    println!(
        "network={} predicate={} total={} derived={} skipped={} fallback={}",
        report.network,
        report.predicate_id,
        report.total,
        report.derived,
        report.failures.len(),
        fallback
    );
    println!("json written to {}", report.json_output.display());
    if let Some(table) = &report.table_output {
        println!("table written to {}", table.display());
    }
}
