//! # Address Source Loader
//!
//! Reads the address table and decides which addresses a run derives.
//! Problems with the table never escape this module: a missing or
//! unparsable file, or one without any usable address, falls back to the
//! configured address list and is reported through [`FallbackReason`].

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Column names the pipeline reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Column holding the source-chain address
    pub source: String,
    /// Column overwritten with the derived predicate address
    pub destination: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            source: "evmAddress".into(),
            destination: "predicateAddress".into(),
        }
    }
}

/// One table row: column name to value, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    fields: Vec<(String, String)>,
}

impl SourceRecord {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite `column` in place, or append it if the row lacks it.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum InputReadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },
    #[error("{path}:{line}: expected {expected} fields, found {found}")]
    RaggedRow {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },
}

/// Why the loader used the fallback address list.
#[derive(Debug)]
pub enum FallbackReason {
    /// The table could not be read; rows are synthetic
    Unreadable(InputReadError),
    /// The table parsed but no row had a source address; rows are the parsed set
    NoAddresses,
}

#[derive(Debug)]
pub struct LoadedSource {
    /// Addresses to derive, in order, duplicates kept
    pub addresses: Vec<String>,
    /// Rows to reconcile
    pub rows: Vec<SourceRecord>,
    pub fallback: Option<FallbackReason>,
}

/// Parse a table with a mandatory header row. Fields are trimmed and lines
/// with nothing but whitespace are skipped; any other row must have as many
/// fields as the header.
pub fn read_table(path: &Path) -> Result<Vec<SourceRecord>, InputReadError> {
    let file = File::open(path).map_err(|source| InputReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| InputReadError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);
    let headers = reader.headers().map_err(parse_err)?.clone();
    if headers.is_empty() {
        return Err(InputReadError::MissingHeader {
            path: path.to_path_buf(),
        });
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != headers.len() {
            return Err(InputReadError::RaggedRow {
                path: path.to_path_buf(),
                line: record.position().map_or(0, |p| p.line()),
                expected: headers.len(),
                found: record.len(),
            });
        }
        rows.push(SourceRecord::from_pairs(headers.iter().zip(record.iter())));
    }
    Ok(rows)
}

/// Rows standing in for a table that could not be read.
pub fn synthetic_rows(addresses: &[String], columns: &ColumnNames) -> Vec<SourceRecord> {
    addresses
        .iter()
        .map(|a| {
            SourceRecord::from_pairs([
                (columns.source.as_str(), a.as_str()),
                (columns.destination.as_str(), ""),
            ])
        })
        .collect()
}

pub fn load(table_path: &Path, fallback: &[String], columns: &ColumnNames) -> LoadedSource {
    let rows = match read_table(table_path) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(
                path = %table_path.display(),
                error = %e,
                fallback = fallback.len(),
                "address table unavailable, using fallback addresses"
            );
            return LoadedSource {
                addresses: fallback.to_vec(),
                rows: synthetic_rows(fallback, columns),
                fallback: Some(FallbackReason::Unreadable(e)),
            };
        }
    };

    let addresses: Vec<String> = rows
        .iter()
        .filter_map(|r| r.get(&columns.source))
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    if addresses.is_empty() {
        warn!(
            path = %table_path.display(),
            column = %columns.source,
            rows = rows.len(),
            "address table has no addresses, using fallback addresses"
        );
        return LoadedSource {
            addresses: fallback.to_vec(),
            rows,
            fallback: Some(FallbackReason::NoAddresses),
        };
    }

    info!(
        path = %table_path.display(),
        rows = rows.len(),
        addresses = addresses.len(),
        "loaded address table"
    );
    LoadedSource {
        addresses,
        rows,
        fallback: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fallback() -> Vec<String> {
        vec![
            "0x52d7792d70E15dC6eDDb8Dc907c06D3b8247aEbe".to_string(),
            "0x000000000000000000000000000000000000dEaD".to_string(),
        ]
    }

    #[test]
    fn missing_file_uses_synthetic_rows() {
        let dir = tempdir().unwrap();
        let cols = ColumnNames::default();
        let loaded = load(&dir.path().join("nope.csv"), &fallback(), &cols);
        assert_eq!(loaded.addresses, fallback());
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[0].get("evmAddress"), Some(fallback()[0].as_str()));
        assert_eq!(loaded.rows[0].get("predicateAddress"), Some(""));
        assert!(matches!(
            loaded.fallback,
            Some(FallbackReason::Unreadable(InputReadError::Open { .. }))
        ));
    }

    #[test]
    fn ragged_table_is_a_parse_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "evmAddress,predicateAddress\n0xabc,,extra,cols\n").unwrap();
        let loaded = load(&path, &fallback(), &ColumnNames::default());
        assert_eq!(loaded.addresses, fallback());
        assert!(matches!(
            loaded.fallback,
            Some(FallbackReason::Unreadable(InputReadError::RaggedRow {
                line: 2,
                expected: 2,
                found: 4,
                ..
            }))
        ));
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(
            &path,
            "name,evmAddress,predicateAddress\n\
             alice,0xAAA,\n   \n\
             bob,0xBBB,\n\t \n",
        )
        .unwrap();
        let loaded = load(&path, &fallback(), &ColumnNames::default());
        assert!(loaded.fallback.is_none());
        assert_eq!(loaded.addresses, vec!["0xAAA", "0xBBB"]);
        assert_eq!(loaded.rows.len(), 2);
        assert_eq!(loaded.rows[1].get("name"), Some("bob"));
    }

    #[test]
    fn empty_file_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();
        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, InputReadError::MissingHeader { .. }));
    }

    #[test]
    fn parsed_rows_are_trimmed_and_filtered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(
            &path,
            "name, evmAddress ,predicateAddress\n\
             alice, 0xAAA ,\n\
             \n\
             bob,,0xkeep\n\
             carol,0xCCC,stale\n\
             dave,0xAAA,\n",
        )
        .unwrap();
        let loaded = load(&path, &fallback(), &ColumnNames::default());
        assert!(loaded.fallback.is_none());
        assert_eq!(loaded.addresses, vec!["0xAAA", "0xCCC", "0xAAA"]);
        assert_eq!(loaded.rows.len(), 4);
        assert_eq!(
            loaded.rows[0].columns().collect::<Vec<_>>(),
            vec!["name", "evmAddress", "predicateAddress"]
        );
        assert_eq!(loaded.rows[1].get("predicateAddress"), Some("0xkeep"));
    }

    #[test]
    fn table_without_addresses_keeps_parsed_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, "name,evmAddress,predicateAddress\nbob,,x\n").unwrap();
        let loaded = load(&path, &fallback(), &ColumnNames::default());
        assert_eq!(loaded.addresses, fallback());
        assert_eq!(loaded.rows.len(), 1);
        assert_eq!(loaded.rows[0].get("name"), Some("bob"));
        assert!(matches!(loaded.fallback, Some(FallbackReason::NoAddresses)));
    }

    #[test]
    fn set_overwrites_or_appends() {
        let mut row = SourceRecord::from_pairs([("a", "1"), ("b", "2")]);
        row.set("a", "9");
        row.set("c", "3");
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(row.get("a"), Some("9"));
        assert_eq!(row.len(), 3);
    }
}
