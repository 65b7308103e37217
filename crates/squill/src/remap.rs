//! Index remapping across table rebuilds.
//!
//! When a table is rebuilt, every index covering it must be re-derived
//! through the same rename map used for the data copy: surviving columns
//! may carry new names, dropped columns have no mapping at all.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Index;

/// Rewrites the given indexes through a rebuild's column rename map.
///
/// Returns the surviving indexes with their columns rewritten, and the
/// names of indexes that covered a dropped column and therefore no longer
/// exist (the engine drops them physically with the original table; the
/// model must drop them too so no orphaned index remains).
///
/// A partial index's `where_clause` is not rewritten. If it references a
/// renamed or dropped column, recreating the index fails at execution time;
/// this is a documented limitation, not silently repaired.
pub(crate) fn remap_indexes(
    indexes: &[Index],
    renames: &BTreeMap<String, String>,
    dropped: &BTreeSet<String>,
) -> (Vec<Index>, Vec<String>) {
    let mut surviving = Vec::new();
    let mut dropped_names = Vec::new();

    for index in indexes {
        if index.columns.iter().any(|c| dropped.contains(c)) {
            dropped_names.push(index.name.clone());
            continue;
        }

        let mut rewritten = index.clone();
        for column in &mut rewritten.columns {
            if let Some(new_name) = renames.get(column) {
                *column = new_name.clone();
            }
        }
        surviving.push(rewritten);
    }

    (surviving, dropped_names)
}
