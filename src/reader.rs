//! The file-set reader.
//!
//! Opens the four files of a [`SFileSet`] read-only and provides the inverse
//! of every [`crate::writer::FileSetWriter`] operation: index decode,
//! block-payload decode with selective column reads, and sma/sst random
//! access. The header area is trusted — callers supply an `SFileSet` whose
//! descriptors were already loaded from a committed footer.

use crate::bytefile::OpenFlags;
use crate::compress::{self, CompressionAlgorithm};
use crate::merge::{BlockMerger, LastWriteWins};
use crate::naming::{self, FileKind};
use crate::paged::PagedFD;
use crate::types::{
    BlockIdx, BlockInfo, CellValue, ColDirEntry, ColumnAgg, ColumnResult, DataBlk, DecodedBlock,
    DiskDataHdr, MapData, SFileSet, SmaInfo,
};
use crate::{Result, TsFileError};

/// Programmatic configuration for a reader, mirroring [`crate::writer::WriterConfig`].
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    pub page_size: u32,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig { page_size: crate::paged::DEFAULT_PAGE_SIZE }
    }
}

pub struct FileSetReader {
    set: SFileSet,
    head: PagedFD,
    data: PagedFD,
    sma: PagedFD,
    sst: Vec<PagedFD>,
}

impl FileSetReader {
    /// Open every file of `set` read-only.
    pub fn open(set: SFileSet, config: ReaderConfig) -> Result<Self> {
        let page_size = config.page_size;
        let head_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.head.commit_id, FileKind::Head);
        let head = PagedFD::open(&head_path, OpenFlags::READ, page_size)?;

        let data_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.data.commit_id, FileKind::Data);
        let data = PagedFD::open(&data_path, OpenFlags::READ, page_size)?;

        let sma_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.sma.commit_id, FileKind::Sma);
        let sma = PagedFD::open(&sma_path, OpenFlags::READ, page_size)?;

        let mut sst = Vec::with_capacity(set.sst.len());
        for descriptor in &set.sst {
            let path =
                naming::file_path(&set.tsdb_root, set.disk_id, set.fid, descriptor.commit_id, FileKind::Sst);
            sst.push(PagedFD::open(&path, OpenFlags::READ, page_size)?);
        }

        Ok(FileSetReader { set, head, data, sma, sst })
    }

    /// The file set this reader was opened against.
    pub fn file_set(&self) -> &SFileSet {
        &self.set
    }

    /// Read and decode the head file's block-index region.
    pub fn read_block_idx(&mut self) -> Result<Vec<BlockIdx>> {
        read_index_region(&mut self.head, self.set.head.offset, self.set.head.size, BlockIdx::decode)
    }

    /// Read and decode sst file `i`'s sst-block-index region.
    pub fn read_sst_blk(&mut self, i: usize) -> Result<Vec<BlockIdx>> {
        let descriptor = *self
            .set
            .sst
            .get(i)
            .ok_or_else(|| TsFileError::Argument(format!("no sst file at index {i}")))?;
        let pfd = self
            .sst
            .get_mut(i)
            .ok_or_else(|| TsFileError::Argument(format!("no sst file at index {i}")))?;
        read_index_region(pfd, descriptor.offset, descriptor.size, BlockIdx::decode)
    }

    /// Read `[block_idx.offset, +block_idx.size)` from the head file and
    /// decode a [`MapData`].
    pub fn read_block(&mut self, block_idx: &BlockIdx) -> Result<MapData> {
        let mut buf = crate::try_zeroed(block_idx.size as usize)?;
        self.head.read(block_idx.offset, &mut buf)?;
        let (map, consumed) = MapData::decode(&buf)?;
        if consumed != buf.len() {
            return Err(TsFileError::Corrupted(format!(
                "block map decode consumed {consumed} of {} bytes",
                buf.len()
            )));
        }
        Ok(map)
    }

    /// Read one sub-block's payload directly, given `blockInfo` and which
    /// file it targets.
    pub fn read_block_data_impl(
        &mut self,
        block_info: &BlockInfo,
        from_last: bool,
        expected_suid: u64,
        expected_uid: u64,
        columns: &[u32],
    ) -> Result<DecodedBlock> {
        let source: &mut PagedFD = if from_last {
            self.sst.last_mut().ok_or_else(|| TsFileError::Argument("no sst file opened".into()))?
        } else {
            &mut self.data
        };

        let mut region = crate::try_zeroed(block_info.sz_key as usize)?;
        source.read(block_info.offset, &mut region)?;

        // aBuf[3]: header + uid/version/tskey streams.
        let (hdr, hdr_len) = DiskDataHdr::decode(&region)?;
        debug_assert!(hdr.suid == expected_suid && hdr.uid == expected_uid);
        if hdr.suid != expected_suid || hdr.uid != expected_uid {
            return Err(TsFileError::Corrupted(format!(
                "block identity mismatch: header ({}, {}) vs expected ({expected_suid}, {expected_uid})",
                hdr.suid, hdr.uid
            )));
        }
        let cmpr = CompressionAlgorithm::from_tag(hdr.cmpr_alg)?;

        let n3 = hdr_len + hdr.sz_uid as usize + hdr.sz_ver as usize + hdr.sz_key as usize
            + crate::checksum::CHECKSUM_SIZE;
        if region.len() < n3 || !crate::checksum::verify(&region, n3) {
            return Err(TsFileError::Corrupted("disk-data header region checksum mismatch".into()));
        }

        let mut cursor = hdr_len;
        let uid_stream = if hdr.uid == 0 && hdr.sz_uid > 0 {
            let raw = compress::decompress(
                cmpr,
                &region[cursor..cursor + hdr.sz_uid as usize],
                hdr.n_row as usize * 8,
            )?;
            cursor += hdr.sz_uid as usize;
            Some(bytes_to_i64_vec(&raw))
        } else {
            cursor += hdr.sz_uid as usize;
            None
        };

        let ver_raw = compress::decompress(
            cmpr,
            &region[cursor..cursor + hdr.sz_ver as usize],
            hdr.n_row as usize * 8,
        )?;
        cursor += hdr.sz_ver as usize;
        let version = bytes_to_i64_vec(&ver_raw);

        let key_raw = compress::decompress(
            cmpr,
            &region[cursor..cursor + hdr.sz_key as usize],
            hdr.n_row as usize * 8,
        )?;
        let tskey = bytes_to_i64_vec(&key_raw);

        let mut columns_out = Vec::with_capacity(columns.len());
        if !columns.is_empty() {
            // aBuf[2]: column directory, immediately following aBuf[3].
            let dir_start = n3;
            let dir_region_len = hdr.sz_blk_col as usize + crate::checksum::CHECKSUM_SIZE;
            if region.len() < dir_start + dir_region_len {
                return Err(TsFileError::Corrupted("truncated column directory region".into()));
            }
            if !crate::checksum::verify(&region[dir_start..], dir_region_len) {
                return Err(TsFileError::Corrupted("column directory checksum mismatch".into()));
            }
            let (dir, _) = crate::types::BlockColDir::decode(&region[dir_start..dir_start + hdr.sz_blk_col as usize])?;

            for &cid in columns {
                let entry = dir.entries.iter().find(|e| e.cid == cid);
                let values = match entry {
                    None => vec![CellValue::None; hdr.n_row as usize],
                    Some(e) if e.has_null() => vec![CellValue::Null; hdr.n_row as usize],
                    Some(e) => self.read_column_payload(from_last, block_info, e, cmpr)?,
                };
                columns_out.push(ColumnResult { cid, values });
            }
        }

        Ok(DecodedBlock {
            suid: hdr.suid,
            uid: hdr.uid,
            n_row: hdr.n_row,
            uid_stream,
            version,
            tskey,
            columns: columns_out,
        })
    }

    fn read_column_payload(
        &mut self,
        from_last: bool,
        block_info: &BlockInfo,
        entry: &ColDirEntry,
        cmpr: CompressionAlgorithm,
    ) -> Result<Vec<CellValue>> {
        let source: &mut PagedFD = if from_last {
            self.sst.last_mut().ok_or_else(|| TsFileError::Argument("no sst file opened".into()))?
        } else {
            &mut self.data
        };
        let payload_off = block_info.offset + block_info.sz_key as u64 + entry.offset as u64;
        let mut buf = crate::try_zeroed(entry.payload_len as usize)?;
        source.read(payload_off, &mut buf)?;
        if !crate::checksum::verify(&buf, buf.len()) {
            return Err(TsFileError::Corrupted(format!("column {} payload checksum mismatch", entry.cid)));
        }
        let compressed_len = buf.len() - crate::checksum::CHECKSUM_SIZE;
        let uncompressed_len = (entry.sz_bitmap + entry.sz_offset + entry.sz_value) as usize;
        let raw = compress::decompress(cmpr, &buf[..compressed_len], uncompressed_len)?;

        // bitmap/offsets are layout metadata above this crate's scope; expose
        // the value region per row as opaque bytes so higher layers can type it.
        let values_start = entry.sz_bitmap as usize + entry.sz_offset as usize;
        Ok(vec![CellValue::Bytes(raw[values_start..].to_vec())])
    }

    /// Read a sub-table-merged `DataBlk`'s logical rows.
    ///
    /// Reads sub-block 0 directly; for every additional sub-block, reads it
    /// and folds it into the running result with `merger`.
    pub fn read_data_block(
        &mut self,
        data_blk: &DataBlk,
        expected_suid: u64,
        expected_uid: u64,
        columns: &[u32],
        from_last: bool,
    ) -> Result<DecodedBlock> {
        self.read_data_block_with(data_blk, expected_suid, expected_uid, columns, from_last, &LastWriteWins)
    }

    /// As [`Self::read_data_block`] but with a caller-supplied [`BlockMerger`].
    pub fn read_data_block_with(
        &mut self,
        data_blk: &DataBlk,
        expected_suid: u64,
        expected_uid: u64,
        columns: &[u32],
        from_last: bool,
        merger: &dyn BlockMerger,
    ) -> Result<DecodedBlock> {
        let mut sub_blocks = data_blk.sub_blocks.iter();
        let first = sub_blocks
            .next()
            .ok_or_else(|| TsFileError::Argument("data block has no sub-blocks".into()))?;
        let mut result =
            self.read_block_data_impl(&first.info, from_last, expected_suid, expected_uid, columns)?;

        for sub in sub_blocks {
            let next =
                self.read_block_data_impl(&sub.info, from_last, expected_suid, expected_uid, columns)?;
            result = merger.merge(&result, &next)?;
        }
        Ok(result)
    }

    /// Direct random-read and decode of a block's sma aggregates.
    pub fn read_block_sma(&mut self, sma_info: &SmaInfo) -> Result<Vec<ColumnAgg>> {
        let mut buf = crate::try_zeroed(sma_info.size as usize)?;
        self.sma.read(sma_info.offset, &mut buf)?;
        let mut aggs = Vec::new();
        let mut off = 0;
        while off < buf.len() {
            let (agg, n) = ColumnAgg::decode(&buf[off..])?;
            off += n;
            aggs.push(agg);
        }
        Ok(aggs)
    }

    /// Direct random-read and decode of one sub-block's payload from the
    /// current tail file (the sst-file counterpart of [`Self::read_block`]).
    pub fn read_sst_block(
        &mut self,
        block_info: &BlockInfo,
        expected_suid: u64,
        expected_uid: u64,
        columns: &[u32],
    ) -> Result<DecodedBlock> {
        self.read_block_data_impl(block_info, true, expected_suid, expected_uid, columns)
    }
}

fn read_index_region<T>(
    pfd: &mut PagedFD,
    offset: u64,
    size: u64,
    decode: impl Fn(&[u8]) -> Result<(T, usize)>,
) -> Result<Vec<T>> {
    if size < offset {
        return Err(TsFileError::Argument("index region offset exceeds file size".into()));
    }
    let region_len = (size - offset) as usize;
    let mut buf = crate::try_zeroed(region_len)?;
    if region_len > 0 {
        pfd.read(offset, &mut buf)?;
    }
    let mut out = Vec::new();
    let mut consumed = 0;
    while consumed < buf.len() {
        let (item, n) = decode(&buf[consumed..])?;
        consumed += n;
        out.push(item);
    }
    if consumed != buf.len() {
        return Err(TsFileError::Corrupted(format!(
            "index region decode consumed {consumed} of {} bytes",
            buf.len()
        )));
    }
    Ok(out)
}

fn bytes_to_i64_vec(raw: &[u8]) -> Vec<i64> {
    raw.chunks_exact(8).map(|c| i64::from_le_bytes(c.try_into().unwrap())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{BlockWrite, ColumnInput, FileSetWriter, WriterConfig};
    use tempfile::tempdir;

    fn sample_block(n_row: u32, val_base: i64) -> BlockWrite {
        let tskey: Vec<i64> = (0..n_row as i64).collect();
        let version: Vec<i64> = vec![1; n_row as usize];
        let values: Vec<u8> = tskey.iter().flat_map(|k| (val_base + k).to_le_bytes()).collect();
        BlockWrite {
            suid: 1,
            uid: 42,
            n_row,
            cmpr_alg: CompressionAlgorithm::Lz4,
            uid_stream: None,
            version,
            tskey,
            columns: vec![ColumnInput {
                cid: 1,
                sma_on: true,
                var_length: false,
                all_null: false,
                bitmap: vec![0u8; (n_row as usize).div_ceil(8)],
                offsets: Vec::new(),
                values,
            }],
            aux: Vec::new(),
        }
    }

    #[test]
    fn write_then_read_one_block_round_trips_rows_and_columns() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let (info, sma) = writer.write_block_data(&sample_block(100, 1000), true, false).unwrap();
        writer
            .write_block_idx(&[BlockIdx { suid: 1, uid: 42, offset: 0, size: 0 }])
            .unwrap();
        writer.update_header().unwrap();
        let set = writer.close(true).unwrap();

        let mut reader = FileSetReader::open(set, ReaderConfig::default()).unwrap();
        let decoded = reader
            .read_block_data_impl(&info, false, 1, 42, &[1])
            .unwrap();
        assert_eq!(decoded.n_row, 100);
        assert_eq!(decoded.tskey, (0..100i64).collect::<Vec<_>>());
        assert_eq!(decoded.columns.len(), 1);
        if let CellValue::Bytes(raw) = &decoded.columns[0].values[0] {
            let v = i64::from_le_bytes(raw[..8].try_into().unwrap());
            assert_eq!(v, 1000);
        } else {
            panic!("expected decoded column bytes");
        }

        let agg = reader.read_block_sma(&sma.unwrap()).unwrap();
        assert_eq!(agg.len(), 1);
        assert_eq!(agg[0].count, 100);
    }

    #[test]
    fn missing_column_yields_none_and_null_flag_yields_null() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let mut block = sample_block(10, 0);
        block.columns.push(ColumnInput {
            cid: 2,
            sma_on: false,
            var_length: false,
            all_null: true,
            bitmap: Vec::new(),
            offsets: Vec::new(),
            values: Vec::new(),
        });
        let (info, _) = writer.write_block_data(&block, false, false).unwrap();
        writer.write_block_idx(&[]).unwrap();
        writer.update_header().unwrap();
        let set = writer.close(true).unwrap();

        let mut reader = FileSetReader::open(set, ReaderConfig::default()).unwrap();
        let decoded = reader.read_block_data_impl(&info, false, 1, 42, &[2, 99]).unwrap();
        assert!(matches!(decoded.columns[0].values[0], CellValue::Null));
        assert!(matches!(decoded.columns[1].values[0], CellValue::None));
    }

    #[test]
    fn tampered_block_region_is_corrupted() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let (info, _) = writer.write_block_data(&sample_block(10, 0), false, false).unwrap();
        writer.write_block_idx(&[]).unwrap();
        writer.update_header().unwrap();
        let set = writer.close(true).unwrap();

        let data_path = naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.data.commit_id, FileKind::Data);
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut f = std::fs::OpenOptions::new().write(true).open(&data_path).unwrap();
            f.seek(SeekFrom::Start(set.data.size - 2)).unwrap();
            f.write_all(&[0xFF]).unwrap();
        }

        let mut reader = FileSetReader::open(set, ReaderConfig::default()).unwrap();
        assert!(reader.read_block_data_impl(&info, false, 1, 42, &[]).is_err());
    }
}
