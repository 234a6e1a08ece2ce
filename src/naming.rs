//! Deterministic on-disk path derivation.
//!
//! `<root>/vnode<vgId>/tsdb/v<vgId>f<fid>ver<commitId>.<ext>`, stable across
//! runs so a reader given only `(tsdb_root, disk_id, fid)` and the committed
//! descriptors can reconstruct every path a writer used.

use crate::checksum::CHECKSUM_SIZE;
use std::path::{Path, PathBuf};

/// The four path extensions this format defines, `sst` being ordered and
/// possibly repeated (one path per `sst[i]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Head,
    Data,
    Sma,
    Sst,
}

impl FileKind {
    fn ext(self) -> &'static str {
        match self {
            FileKind::Head => "head",
            FileKind::Data => "data",
            FileKind::Sma => "sma",
            FileKind::Sst => "sst",
        }
    }
}

/// Build the path for one file of a file set.
///
/// `vg_id` plays the role of `diskId` in the directory component; `fid` is
/// the time-aligned file-set identifier; `commit_id` is that file's own
/// descriptor commit id (sst files advance their commit id independently of
/// head/data/sma as new tail segments are appended).
pub fn file_path<P: AsRef<Path>>(tsdb_root: P, vg_id: u32, fid: i64, commit_id: u64, kind: FileKind) -> PathBuf {
    tsdb_root
        .as_ref()
        .join(format!("vnode{vg_id}"))
        .join("tsdb")
        .join(format!("v{vg_id}f{fid}ver{commit_id}.{}", kind.ext()))
}

/// The fixed footer size for a given page size: exactly one page's content
/// capacity (`S = page_size - C`).
///
/// Choosing `FHDR_SIZE == S` means the footer always occupies page 1 in its
/// entirety, so a header update's "seek to logical offset 0 and write" is a
/// single whole-page rewrite ([`crate::paged::PagedFD::rewrite_page`]) that
/// never shares a page with body content.
pub fn fhdr_size(page_size: u32) -> usize {
    page_size as usize - CHECKSUM_SIZE
}
