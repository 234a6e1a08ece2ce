//! Thin OS-level byte file wrapper.
//!
//! No buffering, no checksumming — just `open`/`read`/`write`/`seek`/`fsync`
//! and the kernel zero-copy `sendfile` primitive used by [`crate::copy`].
//! Every failure becomes [`TsFileError::Io`] via a `.map_err(|e| ...)?` at
//! the call site rather than a structured error variant.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::{Result, TsFileError};

/// Open-mode flags, combined with bitwise OR (e.g. `OpenFlags::READ | OpenFlags::WRITE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(u8);

impl OpenFlags {
    pub const READ: OpenFlags = OpenFlags(1 << 0);
    pub const WRITE: OpenFlags = OpenFlags(1 << 1);
    pub const CREATE: OpenFlags = OpenFlags(1 << 2);
    pub const TRUNC: OpenFlags = OpenFlags(1 << 3);

    fn contains(self, flag: OpenFlags) -> bool {
        self.0 & flag.0 != 0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = OpenFlags;
    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

/// An open OS file with no internal buffering or checksumming.
pub struct ByteFile {
    file: File,
    path: PathBuf,
}

impl ByteFile {
    /// Open `path` under `flags`. Fails with [`TsFileError::Io`].
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut opts = OpenOptions::new();
        opts.read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .create(flags.contains(OpenFlags::CREATE))
            .truncate(flags.contains(OpenFlags::TRUNC));

        let file = opts
            .open(&path)
            .map_err(|e| TsFileError::Io(format!("cannot open {}: {e}", path.display())))?;

        Ok(ByteFile { file, path })
    }

    /// The path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes.
    pub fn size(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| TsFileError::Io(format!("cannot stat {}: {e}", self.path.display())))
    }

    /// Read exactly `buf.len()` bytes at the file's current position.
    ///
    /// A short read is a caller error at this layer (no checksum semantics
    /// live here); callers that need "short read means corruption" wrap this
    /// with their own `UnexpectedEof` handling (see [`crate::paged`]).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TsFileError::Io(format!(
                        "read failed on {}: {e}",
                        self.path.display()
                    )))
                }
            }
        }
        Ok(total)
    }

    /// Write all of `buf` at the file's current position.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.file
            .write_all(buf)
            .map_err(|e| TsFileError::Io(format!("write failed on {}: {e}", self.path.display())))?;
        Ok(buf.len())
    }

    /// Seek to an absolute byte offset from the start of the file.
    pub fn seek(&mut self, offset: u64) -> Result<u64> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| TsFileError::Io(format!("seek failed on {}: {e}", self.path.display())))
    }

    /// Flush any OS buffering to stable storage.
    pub fn fsync(&self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| TsFileError::Io(format!("fsync failed on {}: {e}", self.path.display())))
    }

    pub(crate) fn raw_fd(&self) -> i32 {
        self.file.as_raw_fd()
    }
}

/// Copy `len` bytes from `src` at `src_offset` to `dst`'s current position
/// using the kernel zero-copy `sendfile(2)` path. Used by [`crate::copy`] for
/// a byte-exact file-set copy that never re-checksums page trailers.
pub fn sendfile(dst: &ByteFile, src: &ByteFile, src_offset: u64, len: u64) -> Result<u64> {
    let mut off = src_offset as libc::off_t;
    let mut remaining = len;
    let mut total = 0u64;

    while remaining > 0 {
        let chunk = remaining.min(i32::MAX as u64) as libc::size_t;
        let n = unsafe { libc::sendfile(dst.raw_fd(), src.raw_fd(), &mut off, chunk) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            return Err(TsFileError::Io(format!(
                "sendfile {} -> {} failed: {err}",
                src.path.display(),
                dst.path.display()
            )));
        }
        if n == 0 {
            break;
        }
        total += n as u64;
        remaining -= n as u64;
    }

    Ok(total)
}
