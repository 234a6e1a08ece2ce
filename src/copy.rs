//! Byte-exact file-set copy via the kernel zero-copy path.
//!
//! Every file of a committed [`SFileSet`] is copied into a new disk location
//! with [`crate::bytefile::sendfile`]: page trailers travel verbatim, so the
//! destination is identical to the source over its whole length and no
//! checksum is ever recomputed.
//!
//! Copies every `sst[i]` of the file set, not just `sst[0]` — a file set
//! with more than one committed tail segment must not silently lose data
//! across a copy.

use crate::bytefile::{self, ByteFile, OpenFlags};
use crate::naming::{self, FileKind};
use crate::types::SFileSet;
use crate::Result;
use std::path::Path;

/// Copy every file of `src` into a file set rooted at `dest_root`, keeping
/// the same `fid`, `disk_id`, and per-file commit ids (and therefore the
/// same file names) as the source — this is a location change, not a new
/// commit, so the returned [`SFileSet`] carries the same descriptors.
pub fn copy_file_set(src: &SFileSet, dest_root: impl AsRef<Path>) -> Result<SFileSet> {
    let dest_root = dest_root.as_ref().to_path_buf();
    let dest = SFileSet {
        fid: src.fid,
        disk_id: src.disk_id,
        tsdb_root: dest_root,
        head: src.head,
        data: src.data,
        sma: src.sma,
        sst: src.sst.clone(),
    };

    copy_one(src, &dest, src.head.commit_id, FileKind::Head)?;
    copy_one(src, &dest, src.data.commit_id, FileKind::Data)?;
    copy_one(src, &dest, src.sma.commit_id, FileKind::Sma)?;
    for descriptor in &src.sst {
        copy_one(src, &dest, descriptor.commit_id, FileKind::Sst)?;
    }

    Ok(dest)
}

fn copy_one(src: &SFileSet, dest: &SFileSet, commit_id: u64, kind: FileKind) -> Result<()> {
    let src_path = naming::file_path(&src.tsdb_root, src.disk_id, src.fid, commit_id, kind);
    let dest_path = naming::file_path(&dest.tsdb_root, dest.disk_id, dest.fid, commit_id, kind);
    if let Some(parent) = dest_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let src_file = ByteFile::open(&src_path, OpenFlags::READ)?;
    let len = src_file.size()?;
    let dest_file = ByteFile::open(&dest_path, OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC)?;
    let copied = bytefile::sendfile(&dest_file, &src_file, 0, len)?;
    if copied != len {
        return Err(crate::TsFileError::Io(format!(
            "short copy of {}: copied {copied} of {len} bytes",
            src_path.display()
        )));
    }
    dest_file.fsync()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{FileSetReader, ReaderConfig};
    use crate::writer::{BlockWrite, ColumnInput, FileSetWriter, WriterConfig};
    use crate::compress::CompressionAlgorithm;
    use crate::types::BlockIdx;
    use tempfile::tempdir;

    fn sample_block(n_row: u32) -> BlockWrite {
        let tskey: Vec<i64> = (0..n_row as i64).collect();
        let version: Vec<i64> = vec![1; n_row as usize];
        let values: Vec<u8> = tskey.iter().flat_map(|k| (k * 3).to_le_bytes()).collect();
        BlockWrite {
            suid: 1,
            uid: 7,
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
    fn copy_produces_a_readable_independent_file_set() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();

        let set = SFileSet::new(1, 0, src_dir.path());
        let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
        let (info, _) = writer.write_block_data(&sample_block(50), false, false).unwrap();
        writer
            .write_block_idx(&[BlockIdx { suid: 1, uid: 7, offset: 0, size: 0 }])
            .unwrap();
        writer.update_header().unwrap();
        let set = writer.close(true).unwrap();

        let copied = copy_file_set(&set, dst_dir.path()).unwrap();
        assert_eq!(copied.fid, set.fid);
        assert_eq!(copied.head, set.head);
        assert_eq!(copied.data, set.data);

        let mut reader = FileSetReader::open(copied, ReaderConfig::default()).unwrap();
        let idx = reader.read_block_idx().unwrap();
        assert_eq!(idx.len(), 1);
        let decoded = reader.read_block_data_impl(&info, false, 1, 7, &[1]).unwrap();
        assert_eq!(decoded.n_row, 50);
    }

    #[test]
    fn copy_carries_every_sst_segment_not_only_the_first() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();

        let mut set = SFileSet::new(2, 0, src_dir.path());
        {
            let mut writer = FileSetWriter::open(set.clone(), WriterConfig::default()).unwrap();
            writer.write_block_data(&sample_block(5), false, true).unwrap();
            writer.write_sst_blk(&[]).unwrap();
            writer.update_header().unwrap();
            set = writer.close(true).unwrap();
        }
        set.sst.push(crate::types::FileDescriptor { commit_id: set.sst.last().unwrap().commit_id + 1, size: 0, offset: 0 });
        {
            let mut writer = FileSetWriter::open(set.clone(), WriterConfig::default()).unwrap();
            writer.write_block_data(&sample_block(5), false, true).unwrap();
            writer.write_sst_blk(&[]).unwrap();
            writer.update_header().unwrap();
            set = writer.close(true).unwrap();
        }
        assert_eq!(set.sst.len(), 2);

        copy_file_set(&set, dst_dir.path()).unwrap();
        for descriptor in &set.sst {
            let dest_path = naming::file_path(dst_dir.path(), set.disk_id, set.fid, descriptor.commit_id, FileKind::Sst);
            assert!(dest_path.exists(), "missing copied sst file for commit {}", descriptor.commit_id);
        }
    }
}
