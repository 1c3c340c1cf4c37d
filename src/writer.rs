//! Output writer for the mapping JSON and the enriched table.
//!
//! Both files are rewritten in full on every run. Output is a pure function
//! of the inputs, so rerunning with the same inputs gives identical bytes.

use crate::derive::DerivedMapping;
use crate::loader::SourceRecord;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputWriteError {
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize mappings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot write table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

fn ensure_parent(path: &Path) -> Result<(), OutputWriteError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| OutputWriteError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Write `mappings` as a pretty-printed JSON array, in order.
pub fn write_mappings_json(path: &Path, mappings: &[DerivedMapping]) -> Result<(), OutputWriteError> {
    ensure_parent(path)?;
    let mut text = serde_json::to_string_pretty(mappings)?;
    text.push('\n');
    fs::write(path, text).map_err(|source| OutputWriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Columns of all rows, in first-seen order.
fn table_header(rows: &[SourceRecord]) -> Vec<&str> {
    let mut header: Vec<&str> = Vec::new();
    for col in rows.iter().flat_map(|r| r.columns()) {
        if !header.contains(&col) {
            header.push(col);
        }
    }
    header
}

/// Write `rows` as a table. The header starts with the first row's column
/// order; missing cells are written empty. An empty row set produces an
/// empty file.
pub fn write_records_table(path: &Path, rows: &[SourceRecord]) -> Result<(), OutputWriteError> {
    ensure_parent(path)?;
    let table_err = |source| OutputWriteError::Table {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(table_err)?;
    if !rows.is_empty() {
        let header = table_header(rows);
        writer.write_record(&header).map_err(table_err)?;
        for row in rows {
            writer
                .write_record(header.iter().map(|col| row.get(col).unwrap_or_default()))
                .map_err(table_err)?;
        }
    }
    writer.flush().map_err(|source| OutputWriteError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_table;
    use crate::registry::NetworkSelector;
    use tempfile::tempdir;

    #[test]
    fn json_is_ordered_and_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.json");
        let mappings = vec![
            DerivedMapping {
                source_address: "0xB".into(),
                predicate_address: "0x2".into(),
                network: NetworkSelector::Mainnet,
            },
            DerivedMapping {
                source_address: "0xA".into(),
                predicate_address: "0x1".into(),
                network: NetworkSelector::Mainnet,
            },
        ];
        write_mappings_json(&path, &mappings).unwrap();
        let back: Vec<DerivedMapping> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, mappings);
    }

    #[test]
    fn json_overwrites_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        fs::write(&path, "[{\"old\":true},{\"old\":true},{\"old\":true}]").unwrap();
        write_mappings_json(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]\n");
    }

    #[test]
    fn table_header_follows_first_row_and_quotes_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t/out.csv");
        let rows = vec![
            SourceRecord::from_pairs([
                ("name", "alice"),
                ("evmAddress", "0xaaa"),
                ("note", "vip, \"gold\""),
            ]),
            SourceRecord::from_pairs([("evmAddress", "0xbbb"), ("name", "bob")]),
        ];
        write_records_table(&path, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().next(), Some("name,evmAddress,note"));

        let back = read_table(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].get("note"), Some("vip, \"gold\""));
        assert_eq!(back[1].get("name"), Some("bob"));
        assert_eq!(back[1].get("note"), Some(""));
    }

    #[test]
    fn column_missing_from_first_row_is_still_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            SourceRecord::from_pairs([("name", "placeholder"), ("evmAddress", "")]),
            SourceRecord::from_pairs([
                ("name", "alice"),
                ("evmAddress", "0xaaa"),
                ("predicateAddress", "0xpa"),
            ]),
        ];
        write_records_table(&path, &rows).unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(
            back[0].columns().collect::<Vec<_>>(),
            vec!["name", "evmAddress", "predicateAddress"]
        );
        assert_eq!(back[0].get("predicateAddress"), Some(""));
        assert_eq!(back[1].get("predicateAddress"), Some("0xpa"));
    }

    #[test]
    fn empty_table_writes_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "stale\n").unwrap();
        write_records_table(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn directory_in_the_way_is_a_write_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file").unwrap();
        let err = write_mappings_json(&blocker.join("out.json"), &[]).unwrap_err();
        assert!(matches!(err, OutputWriteError::CreateDir { .. }));
    }
}
