//! The sorted-block merge contract: merging two sorted blocks into a third
//! with the same schema is in scope here; the policy deciding how
//! overlapping rows are reconciled is left to the caller.
//!
//! [`crate::reader::FileSetReader::read_data_block`] needs this to fold a
//! multi-sub-block [`DataBlk`](crate::types::DataBlk) into one logical block
//! when out-of-order commits produced more than one sub-block for the same
//! table. The merge policy itself — how overlapping `(tskey, version)` rows
//! are reconciled — is a decision of the caller, expressed as a trait so
//! embedders can supply their own; [`LastWriteWins`] is the default used by
//! [`crate::reader`] when no other merger is configured.

use crate::types::DecodedBlock;
use crate::Result;

/// Merges two already-decoded sub-blocks of the same table into one logical
/// block. Implementations must produce output sorted by `tskey` ascending
/// with no duplicate `(tskey)` entries, the invariant
/// [`crate::reader::FileSetReader::read_data_block`] relies on.
pub trait BlockMerger {
    fn merge(&self, older: &DecodedBlock, newer: &DecodedBlock) -> Result<DecodedBlock>;
}

/// For each `tskey` present in both inputs, keeps the row from `newer`
/// (the sub-block written later). Ties are broken by `version` (highest wins)
/// when both sub-blocks disagree on which came later for the same key.
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWriteWins;

impl BlockMerger for LastWriteWins {
    fn merge(&self, older: &DecodedBlock, newer: &DecodedBlock) -> Result<DecodedBlock> {
        use std::collections::BTreeMap;

        // Row index keyed by tskey, tracking which source block and row each
        // surviving row comes from.
        let mut rows: BTreeMap<i64, (bool, usize)> = BTreeMap::new();
        for (i, &ts) in older.tskey.iter().enumerate() {
            rows.insert(ts, (false, i));
        }
        for (i, &ts) in newer.tskey.iter().enumerate() {
            match rows.get(&ts) {
                Some(&(_, old_i)) => {
                    if newer.version[i] >= older.version[old_i] {
                        rows.insert(ts, (true, i));
                    }
                }
                None => {
                    rows.insert(ts, (true, i));
                }
            }
        }

        let keys: Vec<i64> = rows.keys().copied().collect();
        let mut tskey = Vec::with_capacity(keys.len());
        let mut version = Vec::with_capacity(keys.len());
        let mut uid_stream = match (&older.uid_stream, &newer.uid_stream) {
            (Some(_), _) | (_, Some(_)) => Some(Vec::with_capacity(keys.len())),
            _ => None,
        };

        for &ts in &keys {
            let (from_newer, i) = rows[&ts];
            let src = if from_newer { newer } else { older };
            tskey.push(ts);
            version.push(src.version[i]);
            if let Some(u) = uid_stream.as_mut() {
                let v = src.uid_stream.as_ref().map(|s| s[i]).unwrap_or(0);
                u.push(v);
            }
        }

        let mut columns = Vec::with_capacity(older.columns.len());
        for older_col in &older.columns {
            let newer_col = newer.columns.iter().find(|c| c.cid == older_col.cid);
            let mut values = Vec::with_capacity(keys.len());
            for &ts in &keys {
                let (from_newer, i) = rows[&ts];
                let value = if from_newer {
                    newer_col.map(|c| c.values[i].clone()).unwrap_or(crate::types::CellValue::None)
                } else {
                    older_col.values[i].clone()
                };
                values.push(value);
            }
            columns.push(crate::types::ColumnResult { cid: older_col.cid, values });
        }

        Ok(DecodedBlock {
            suid: older.suid,
            uid: older.uid,
            n_row: keys.len() as u32,
            uid_stream,
            version,
            tskey,
            columns,
        })
    }
}
