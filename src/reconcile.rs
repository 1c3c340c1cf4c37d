//! Record reconciliation: writes derived predicate addresses back into
//! table rows, matching on the source address without regard to case.

use crate::derive::DerivedMapping;
use crate::loader::{ColumnNames, SourceRecord};
use std::collections::HashMap;

/// Lower-cased source address to predicate address. When two mappings share
/// a key, the later one wins.
pub fn lookup_table(mappings: &[DerivedMapping]) -> HashMap<String, &str> {
    let mut table = HashMap::with_capacity(mappings.len());
    for m in mappings {
        table.insert(m.source_address.to_lowercase(), m.predicate_address.as_str());
    }
    table
}

/// Fill the destination column of every row that has a source address.
///
/// Rows without a source address keep their destination value, or get an
/// empty one if the table had no destination column. A source address with
/// no mapping gets an empty destination. Row order and every other column
/// are left as they were.
pub fn reconcile(
    rows: Vec<SourceRecord>,
    mappings: &[DerivedMapping],
    columns: &ColumnNames,
) -> Vec<SourceRecord> {
    let table = lookup_table(mappings);
    rows.into_iter()
        .map(|mut row| {
            let key = match row.get(&columns.source) {
                Some(address) if !address.is_empty() => address.to_lowercase(),
                _ => {
                    if row.get(&columns.destination).is_none() {
                        row.set(&columns.destination, "");
                    }
                    return row;
                }
            };
            let predicate = table.get(&key).copied().unwrap_or_default();
            row.set(&columns.destination, predicate);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NetworkSelector;

    fn mapping(source: &str, predicate: &str) -> DerivedMapping {
        DerivedMapping {
            source_address: source.into(),
            predicate_address: predicate.into(),
            network: NetworkSelector::Testnet,
        }
    }

    #[test]
    fn matches_case_insensitively() {
        let rows = vec![SourceRecord::from_pairs([
            ("evmAddress", "0xABCdef"),
            ("predicateAddress", ""),
        ])];
        let out = reconcile(rows, &[mapping("0xabcDEF", "0xp1")], &ColumnNames::default());
        assert_eq!(out[0].get("predicateAddress"), Some("0xp1"));
        assert_eq!(out[0].get("evmAddress"), Some("0xABCdef"));
    }

    #[test]
    fn empty_source_keeps_destination() {
        let rows = vec![SourceRecord::from_pairs([
            ("evmAddress", ""),
            ("predicateAddress", "0xmanual"),
        ])];
        let out = reconcile(rows, &[mapping("0xaaa", "0xp1")], &ColumnNames::default());
        assert_eq!(out[0].get("predicateAddress"), Some("0xmanual"));
    }

    #[test]
    fn destination_column_is_added_to_every_row() {
        let rows = vec![
            SourceRecord::from_pairs([("name", "placeholder"), ("evmAddress", "")]),
            SourceRecord::from_pairs([("name", "alice"), ("evmAddress", "0xaaa")]),
        ];
        let out = reconcile(rows, &[mapping("0xaaa", "0xpa")], &ColumnNames::default());
        assert_eq!(out[0].get("predicateAddress"), Some(""));
        assert_eq!(out[1].get("predicateAddress"), Some("0xpa"));
        assert_eq!(
            out[0].columns().collect::<Vec<_>>(),
            vec!["name", "evmAddress", "predicateAddress"]
        );
    }

    #[test]
    fn unmapped_source_clears_destination() {
        let rows = vec![SourceRecord::from_pairs([
            ("evmAddress", "0xbbb"),
            ("predicateAddress", "stale"),
        ])];
        let out = reconcile(rows, &[mapping("0xaaa", "0xp1")], &ColumnNames::default());
        assert_eq!(out[0].get("predicateAddress"), Some(""));
    }

    #[test]
    fn later_mapping_wins_on_key_collision() {
        let rows = vec![SourceRecord::from_pairs([("evmAddress", "0xAAA")])];
        let maps = [mapping("0xaaa", "0xfirst"), mapping("0xAaA", "0xsecond")];
        let out = reconcile(rows, &maps, &ColumnNames::default());
        assert_eq!(out[0].get("predicateAddress"), Some("0xsecond"));
    }

    #[test]
    fn other_columns_and_order_pass_through() {
        let rows = vec![
            SourceRecord::from_pairs([
                ("name", "alice"),
                ("evmAddress", "0xaaa"),
                ("predicateAddress", ""),
                ("note", "vip, \"gold\""),
            ]),
            SourceRecord::from_pairs([
                ("name", "bob"),
                ("evmAddress", "0xbbb"),
                ("predicateAddress", ""),
                ("note", ""),
            ]),
        ];
        let maps = [mapping("0xbbb", "0xpb"), mapping("0xaaa", "0xpa")];
        let out = reconcile(rows, &maps, &ColumnNames::default());
        assert_eq!(out[0].get("name"), Some("alice"));
        assert_eq!(out[0].get("predicateAddress"), Some("0xpa"));
        assert_eq!(out[0].get("note"), Some("vip, \"gold\""));
        assert_eq!(out[1].get("predicateAddress"), Some("0xpb"));
        assert_eq!(
            out[0].columns().collect::<Vec<_>>(),
            vec!["name", "evmAddress", "predicateAddress", "note"]
        );
    }

    #[test]
    fn custom_columns() {
        let cols = ColumnNames {
            source: "wallet".into(),
            destination: "fuel".into(),
        };
        let rows = vec![SourceRecord::from_pairs([("wallet", "0xaaa"), ("fuel", "")])];
        let out = reconcile(rows, &[mapping("0xaaa", "0xpa")], &cols);
        assert_eq!(out[0].get("fuel"), Some("0xpa"));
    }
}
