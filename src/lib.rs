//! Paged, checksummed on-disk file I/O core for a time-series storage engine.
//!
//! `tsfile` implements the durability layer of a columnar time-series store:
//! a page-checksummed logical byte stream ([`paged`]) built on raw file I/O
//! ([`bytefile`]), the binary record codecs for block indices, columnar
//! block payloads, and per-column aggregates ([`types`]), and the
//! readers/writers that coordinate four such files (head/index, data,
//! sma/stats, tail) into one time-aligned *file set* ([`writer`],
//! [`reader`]), plus the append-only delete log ([`dellog`]) and a
//! byte-exact file-set copy ([`copy`]).
//!
//! # Library API
//!
//! ```no_run
//! use tsfile::types::SFileSet;
//! use tsfile::writer::{FileSetWriter, WriterConfig};
//! use tsfile::reader::{FileSetReader, ReaderConfig};
//!
//! let set = SFileSet::new(1, 0, "/var/lib/tsdb/vnode2");
//! let mut writer = FileSetWriter::open(set, WriterConfig::default()).unwrap();
//! // ... write_block_data / write_block_idx / write_sst_blk ...
//! writer.update_header().unwrap();
//! let set = writer.close(true).unwrap();
//!
//! let mut reader = FileSetReader::open(set, ReaderConfig::default()).unwrap();
//! let idx = reader.read_block_idx().unwrap();
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`checksum`] | Whole-page CRC append/verify |
//! | [`bytefile`] | Thin OS file wrapper: open/read/write/seek/fsync/sendfile |
//! | [`paged`] | `PagedFD`, the page-checksummed logical stream |
//! | [`varint`] | Little-endian variable-length integer put/get primitives |
//! | [`types`] | On-disk record types and their `encode_into`/`decode` codecs |
//! | [`compress`] | `cmprAlg` compression/decompression (zlib, LZ4, none) |
//! | [`merge`] | The external sorted-block merge contract |
//! | [`naming`] | Deterministic path derivation |
//! | [`writer`] | `FileSetWriter`, coordinates head/data/sma/sst during a commit |
//! | [`reader`] | `FileSetReader`, the read path |
//! | [`dellog`] | Delete-log writer/reader |
//! | [`copy`] | Byte-exact file-set copy via kernel `sendfile` |
//!
//! ## Feature flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | on | Builds the `tskit` binary (`inspect`, `verify`, `copy`, `corrupt` subcommands). |

pub mod bytefile;
pub mod checksum;
pub mod compress;
pub mod copy;
pub mod dellog;
pub mod merge;
pub mod naming;
pub mod paged;
pub mod reader;
pub mod types;
pub mod varint;
pub mod writer;

#[cfg(feature = "cli")]
pub mod cli;

use thiserror::Error;

/// Errors returned by `tsfile` operations.
///
/// Mirrors the error taxonomy of the format this crate implements:
/// `Io` is a `SystemError(errno)`-class OS failure, `Corrupted` is
/// `FileCorrupted` (short read, bad page/region checksum, bad delimiter, or
/// a release-mode invariant violation), `OutOfMemory` is a fallible
/// allocation failure, and `Argument` covers invalid caller input that has
/// no on-disk cause (an out-of-range page number, a malformed path).
#[derive(Error, Debug)]
pub enum TsFileError {
    /// An I/O error occurred (open/read/write/seek/fsync/sendfile failure).
    #[error("I/O error: {0}")]
    Io(String),

    /// A corruption was detected (short read, bad checksum, bad delimiter,
    /// or a release-mode invariant violation).
    #[error("file corrupted: {0}")]
    Corrupted(String),

    /// A buffer allocation failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// An invalid argument was supplied.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl From<std::io::Error> for TsFileError {
    fn from(e: std::io::Error) -> Self {
        TsFileError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TsFileError>;

/// Fallibly allocate a `len`-byte zero-filled buffer, returning
/// [`TsFileError::OutOfMemory`] instead of aborting the process on
/// allocation failure. Used for every buffer sized directly off an
/// on-disk field (an index region length, a block's `szKey`, a column's
/// `payload_len`, an sma region's size) — the same `try_reserve` shape
/// [`paged::PagedFD::open`] uses for its scratch page.
pub(crate) fn try_zeroed(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| TsFileError::OutOfMemory(format!("buffer allocation failed ({len} bytes): {e}")))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Reserve capacity for `additional` more bytes in `buf` before growing it,
/// so the growth can fail with [`TsFileError::OutOfMemory`] instead of
/// aborting. Pairs with a following `extend_from_slice`/`push`/`encode_into`
/// call that is itself infallible once the capacity is in place.
pub(crate) fn try_reserve_for(buf: &mut Vec<u8>, additional: usize) -> Result<()> {
    buf.try_reserve(additional).map_err(|e| {
        TsFileError::OutOfMemory(format!("buffer growth failed ({additional} bytes): {e}"))
    })
}

/// As [`try_reserve_for`], but reserves and resizes `buf` up to `new_len`
/// in one step.
pub(crate) fn try_resize(buf: &mut Vec<u8>, new_len: usize) -> Result<()> {
    if new_len > buf.len() {
        try_reserve_for(buf, new_len - buf.len())?;
    }
    buf.resize(new_len, 0);
    Ok(())
}
