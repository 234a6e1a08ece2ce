//! The file-set writer.
//!
//! Coordinates up to four [`PagedFD`]s — head, data, sma, and the current
//! tail (`sst[last]`) — during one commit: block payloads and sma aggregates
//! land first, then the block/sst index regions, then the per-file footers
//! at `UpdateDFileSetHeader`, which is the durability linearization point.
//! State machine: `open -> [write_block_data | write_sst_blk | write_block_idx]*
//! -> update_header -> close(sync=true)`. Skipping `update_header` leaves an
//! unrecoverable file set whose footers still point at stale data.

use crate::bytefile::OpenFlags;
use crate::compress::{self, CompressionAlgorithm};
use crate::naming::{self, FileKind};
use crate::paged::PagedFD;
use crate::types::{
    BlockColDir, BlockIdx, BlockInfo, ColDirEntry, DiskDataHdr, FileDescriptor, SFileSet, SmaInfo,
    COL_FLAG_HAS_NULL,
};
use crate::{Result, TsFileError};

/// Programmatic configuration for a writer, taking the place of a config
/// file at this layer (see module docs on why there isn't one).
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub page_size: u32,
    pub default_cmpr_alg: CompressionAlgorithm,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            page_size: crate::paged::DEFAULT_PAGE_SIZE,
            default_cmpr_alg: CompressionAlgorithm::Lz4,
        }
    }
}

/// One column's uncompressed payload, as supplied by the caller (the
/// columnar encoding itself — row-to-bitmap/offset/value layout — is a
/// concern above this crate; `tsfile` only compresses, checksums, and
/// places the already-packed bytes).
pub struct ColumnInput {
    pub cid: u32,
    pub sma_on: bool,
    pub var_length: bool,
    pub all_null: bool,
    pub bitmap: Vec<u8>,
    pub offsets: Vec<u8>,
    pub values: Vec<u8>,
}

/// A full block ready to be written by [`FileSetWriter::write_block_data`].
pub struct BlockWrite {
    pub suid: u64,
    pub uid: u64,
    pub n_row: u32,
    pub cmpr_alg: CompressionAlgorithm,
    /// Per-row sub-table uid stream; present only when writing a super-table
    /// block (`uid == 0` at the header level).
    pub uid_stream: Option<Vec<i64>>,
    pub version: Vec<i64>,
    pub tskey: Vec<i64>,
    pub columns: Vec<ColumnInput>,
    pub aux: Vec<u8>,
}

fn i64_stream_bytes(values: &[i64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for &v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

pub struct FileSetWriter {
    set: SFileSet,
    page_size: u32,
    head: PagedFD,
    data: PagedFD,
    sma: PagedFD,
    sst: PagedFD,
}

impl FileSetWriter {
    /// Open a writer for `set` under `config`.
    ///
    /// `head` and `sst[last]` are always freshly truncated (a commit creates
    /// a fresh head/sst per file set); `data` and `sma` are opened for
    /// append if they already carry content, or freshly truncated otherwise.
    pub fn open(mut set: SFileSet, config: WriterConfig) -> Result<Self> {
        let page_size = config.page_size;
        let fhdr = naming::fhdr_size(page_size) as u64;

        let head_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.head.commit_id, FileKind::Head);
        let mut head = PagedFD::open(
            &head_path,
            OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
            page_size,
        )?;
        set.head = FileDescriptor { commit_id: set.head.commit_id, size: 0, offset: 0 };
        reserve_header(&mut head, &mut set.head, fhdr)?;

        let data_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.data.commit_id, FileKind::Data);
        let data_fresh = set.data.size == 0;
        let mut data = if data_fresh {
            let mut data = PagedFD::open(
                &data_path,
                OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
                page_size,
            )?;
            reserve_header(&mut data, &mut set.data, fhdr)?;
            data
        } else {
            PagedFD::open_for_append(
                &data_path,
                OpenFlags::READ | OpenFlags::WRITE,
                page_size,
                set.data.size,
            )?
        };

        let sma_path =
            naming::file_path(&set.tsdb_root, set.disk_id, set.fid, set.sma.commit_id, FileKind::Sma);
        let sma_fresh = set.sma.size == 0;
        let mut sma = if sma_fresh {
            let mut sma = PagedFD::open(
                &sma_path,
                OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
                page_size,
            )?;
            reserve_header(&mut sma, &mut set.sma, fhdr)?;
            sma
        } else {
            PagedFD::open_for_append(
                &sma_path,
                OpenFlags::READ | OpenFlags::WRITE,
                page_size,
                set.sma.size,
            )?
        };

        let sst_commit_id = set.sst.last().map(|d| d.commit_id).unwrap_or(0);
        let sst_path = naming::file_path(&set.tsdb_root, set.disk_id, set.fid, sst_commit_id, FileKind::Sst);
        let mut sst = PagedFD::open(
            &sst_path,
            OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC,
            page_size,
        )?;
        let mut sst_descriptor = FileDescriptor { commit_id: sst_commit_id, size: 0, offset: 0 };
        reserve_header(&mut sst, &mut sst_descriptor, fhdr)?;
        if let Some(last) = set.sst.last_mut() {
            *last = sst_descriptor;
        } else {
            set.sst.push(sst_descriptor);
        }

        Ok(FileSetWriter { set, page_size, head, data, sma, sst })
    }

    /// Write one block's compressed regions and, if requested, its sma
    /// aggregates. Returns the [`BlockInfo`] (and [`SmaInfo`] if computed)
    /// the caller must fold into the table's [`crate::types::DataBlk`].
    pub fn write_block_data(
        &mut self,
        block: &BlockWrite,
        compute_sma: bool,
        to_last: bool,
    ) -> Result<(BlockInfo, Option<SmaInfo>)> {
        let cmpr = block.cmpr_alg;

        let compressed_uid = match &block.uid_stream {
            Some(u) => compress::compress(cmpr, &i64_stream_bytes(u))?,
            None => Vec::new(),
        };
        let compressed_ver = compress::compress(cmpr, &i64_stream_bytes(&block.version))?;
        let compressed_tskey = compress::compress(cmpr, &i64_stream_bytes(&block.tskey))?;

        let hdr = DiskDataHdr {
            suid: block.suid,
            uid: block.uid,
            n_row: block.n_row,
            cmpr_alg: cmpr.tag(),
            sz_uid: compressed_uid.len() as u32,
            sz_ver: compressed_ver.len() as u32,
            sz_key: compressed_tskey.len() as u32,
            sz_blk_col: 0, // filled in below once the directory is built
        };

        // aBuf[2] + aBuf[1]: column directory and packed column payloads.
        let mut col_payload = Vec::new();
        let mut entries = Vec::with_capacity(block.columns.len());
        for col in &block.columns {
            if col.all_null {
                entries.push(ColDirEntry {
                    cid: col.cid,
                    flags: COL_FLAG_HAS_NULL,
                    offset: col_payload.len() as u32,
                    payload_len: 0,
                    sz_bitmap: 0,
                    sz_offset: 0,
                    sz_value: 0,
                });
                continue;
            }
            let mut raw = Vec::with_capacity(col.bitmap.len() + col.offsets.len() + col.values.len());
            raw.extend_from_slice(&col.bitmap);
            raw.extend_from_slice(&col.offsets);
            raw.extend_from_slice(&col.values);
            let compressed = compress::compress(cmpr, &raw)?;

            let offset = col_payload.len() as u32;
            let region_len = compressed.len() + crate::checksum::CHECKSUM_SIZE;
            let payload_len = region_len as u32;
            crate::try_reserve_for(&mut col_payload, region_len)?;
            col_payload.extend_from_slice(&compressed);
            col_payload.resize(offset as usize + region_len, 0);
            crate::checksum::append(&mut col_payload[offset as usize..], region_len);

            entries.push(ColDirEntry {
                cid: col.cid,
                flags: 0,
                offset,
                payload_len,
                sz_bitmap: col.bitmap.len() as u32,
                sz_offset: col.offsets.len() as u32,
                sz_value: col.values.len() as u32,
            });
        }

        let dir = BlockColDir { entries };
        let mut dir_bytes = Vec::new();
        crate::try_reserve_for(&mut dir_bytes, dir.encoded_len())?;
        dir.encode_into(&mut dir_bytes);
        let sz_blk_col = dir_bytes.len() as u32;

        let hdr = DiskDataHdr { sz_blk_col, ..hdr };

        // aBuf[3]: header + uid/version/tskey streams, self-checksummed.
        let mut a_buf3 = Vec::new();
        let a_buf3_len =
            hdr.encoded_len() + compressed_uid.len() + compressed_ver.len() + compressed_tskey.len();
        crate::try_reserve_for(&mut a_buf3, a_buf3_len)?;
        hdr.encode_into(&mut a_buf3);
        a_buf3.extend_from_slice(&compressed_uid);
        a_buf3.extend_from_slice(&compressed_ver);
        a_buf3.extend_from_slice(&compressed_tskey);
        let n3 = a_buf3.len() + crate::checksum::CHECKSUM_SIZE;
        crate::try_resize(&mut a_buf3, n3)?;
        crate::checksum::append(&mut a_buf3, n3);

        // aBuf[2]: column directory, self-checksummed.
        let n2 = dir_bytes.len() + crate::checksum::CHECKSUM_SIZE;
        crate::try_resize(&mut dir_bytes, n2)?;
        crate::checksum::append(&mut dir_bytes, n2);

        let n1 = col_payload.len();
        let n0 = if block.aux.is_empty() {
            0
        } else {
            block.aux.len() + crate::checksum::CHECKSUM_SIZE
        };

        let target_offset = if to_last {
            self.set
                .sst
                .last()
                .ok_or_else(|| TsFileError::Argument("file set has no sst descriptor to write against".into()))?
                .size
        } else {
            self.set.data.size
        };
        let sz_key = (n3 + n2) as u32;
        let sz_block = (n0 + n1 + n2 + n3) as u32;

        // Write order: 3, 2, 1, 0 (skip empty).
        let target = if to_last { &mut self.sst } else { &mut self.data };
        target.write(&a_buf3)?;
        target.write(&dir_bytes)?;
        if !col_payload.is_empty() {
            target.write(&col_payload)?;
        }
        if n0 > 0 {
            let mut aux = block.aux.clone();
            aux.resize(n0, 0);
            crate::checksum::append(&mut aux, n0);
            target.write(&aux)?;
        }

        if to_last {
            self.set
                .sst
                .last_mut()
                .ok_or_else(|| TsFileError::Argument("file set has no sst descriptor to write against".into()))?
                .size += sz_block as u64;
        } else {
            self.set.data.size += sz_block as u64;
        }

        let block_info = BlockInfo { offset: target_offset, sz_key, sz_block };

        let sma_info = if compute_sma {
            Some(self.write_sma(block)?)
        } else {
            None
        };

        Ok((block_info, sma_info))
    }

    fn write_sma(&mut self, block: &BlockWrite) -> Result<SmaInfo> {
        let mut buf = Vec::new();
        for col in &block.columns {
            if !col.sma_on || col.var_length || col.all_null {
                continue;
            }
            let values: Vec<i64> = col
                .values
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            if values.is_empty() {
                continue;
            }
            let count = values.len() as u64;
            let sum: i64 = values.iter().sum();
            let min = *values.iter().min().unwrap();
            let max = *values.iter().max().unwrap();
            let agg = crate::types::ColumnAgg { cid: col.cid, count, sum, min, max };
            crate::try_reserve_for(&mut buf, agg.encoded_len())?;
            agg.encode_into(&mut buf);
        }

        let offset = self.set.sma.size;
        self.sma.write(&buf)?;
        self.set.sma.size += buf.len() as u64;
        Ok(SmaInfo { offset, size: buf.len() as u32 })
    }

    /// Write the block-index region for the head file.
    pub fn write_block_idx(&mut self, entries: &[BlockIdx]) -> Result<()> {
        if entries.is_empty() {
            self.set.head.offset = self.set.head.size;
            return Ok(());
        }
        let mut buf = Vec::new();
        for e in entries {
            e.encode_into(&mut buf);
        }
        let offset_before = self.set.head.size;
        self.head.write(&buf)?;
        self.set.head.offset = offset_before;
        self.set.head.size += buf.len() as u64;
        Ok(())
    }

    /// Write the sst-block region for the current tail file.
    pub fn write_sst_blk(&mut self, entries: &[BlockIdx]) -> Result<()> {
        let last = self.set.sst.last_mut().ok_or_else(|| {
            TsFileError::Argument("file set has no sst descriptor to write against".into())
        })?;
        if entries.is_empty() {
            last.offset = last.size;
            return Ok(());
        }
        let mut buf = Vec::new();
        for e in entries {
            e.encode_into(&mut buf);
        }
        let offset_before = last.size;
        self.sst.write(&buf)?;
        let last = self.set.sst.last_mut().unwrap();
        last.offset = offset_before;
        last.size += buf.len() as u64;
        Ok(())
    }

    /// Serialize and rewrite every file descriptor's footer. The commit
    /// point: only after this returns and [`Self::close`] syncs are the
    /// written blocks and indices durable.
    ///
    /// Pads and flushes each file's partial tail page first rather than
    /// leaving it unflushed — see [`crate::paged::PagedFD::open_for_append`]
    /// for how a later writer resumes inside that padded page.
    pub fn update_header(&mut self) -> Result<()> {
        self.head.pad_and_flush()?;
        self.data.pad_and_flush()?;
        self.sma.pad_and_flush()?;
        self.sst.pad_and_flush()?;

        self.head.rewrite_page(1, &self.set.head.encode_fixed())?;
        self.data.rewrite_page(1, &self.set.data.encode_fixed())?;
        self.sma.rewrite_page(1, &self.set.sma.encode_fixed())?;
        let sst_descriptor = *self.set.sst.last().ok_or_else(|| {
            TsFileError::Argument("file set has no sst descriptor to commit".into())
        })?;
        self.sst.rewrite_page(1, &sst_descriptor.encode_fixed())?;
        Ok(())
    }

    /// Close the writer. If `sync`, fsyncs all four files before releasing
    /// them. Returns the updated file set so the caller can persist its
    /// descriptors for a future reader or writer.
    pub fn close(self, sync: bool) -> Result<SFileSet> {
        if sync {
            self.head.fsync()?;
            self.data.fsync()?;
            self.sma.fsync()?;
            self.sst.fsync()?;
        }
        self.head.close()?;
        self.data.close()?;
        self.sma.close()?;
        self.sst.close()?;
        Ok(self.set)
    }

    /// The page size this writer was opened with.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

fn reserve_header(pfd: &mut PagedFD, descriptor: &mut FileDescriptor, fhdr: u64) -> Result<()> {
    let zeros = vec![0u8; fhdr as usize];
    pfd.write(&zeros)?;
    descriptor.size += fhdr;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_block(n_row: u32) -> BlockWrite {
        let tskey: Vec<i64> = (0..n_row as i64).collect();
        let version: Vec<i64> = vec![1; n_row as usize];
        let values: Vec<u8> = tskey.iter().flat_map(|k| (k * 10).to_le_bytes()).collect();
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
    fn write_block_data_advances_data_size_by_exactly_sz_block() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let before = writer.set.data.size;

        let (info, sma) = writer.write_block_data(&sample_block(100), true, false).unwrap();
        assert_eq!(writer.set.data.size, before + info.sz_block as u64);
        assert_eq!(info.offset, before);
        assert!(sma.is_some());
        assert!(sma.unwrap().size > 0);
    }

    #[test]
    fn empty_block_idx_records_offset_equal_to_size_without_writing() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let before = writer.set.head.size;
        writer.write_block_idx(&[]).unwrap();
        assert_eq!(writer.set.head.offset, writer.set.head.size);
        assert_eq!(writer.set.head.size, before);
    }

    #[test]
    fn full_commit_cycle_updates_header_and_closes() {
        let dir = tempdir().unwrap();
        let set = SFileSet::new(1, 0, dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let (info, _) = writer.write_block_data(&sample_block(10), false, false).unwrap();
        writer
            .write_block_idx(&[BlockIdx { suid: 1, uid: 42, offset: info.offset, size: info.sz_block as u64 }])
            .unwrap();
        writer.update_header().unwrap();
        let set = writer.close(true).unwrap();
        assert!(set.head.offset > 0 || set.head.size > 0);
    }
}
