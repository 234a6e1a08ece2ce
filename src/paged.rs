//! The page-checksummed logical stream.
//!
//! `PagedFD` sits on top of [`crate::bytefile::ByteFile`]: every `P`-byte page
//! on disk holds `S = P - C` content bytes followed by a `C`-byte checksum
//! trailer, so a logical offset and its file offset diverge by one trailer's
//! width per page crossed. `PagedFD` owns exactly one scratch page and one
//! byte-file handle and is not re-entrant — exclusively one reader or one
//! writer at a time, single-owner over the underlying file handle.

use crate::bytefile::{ByteFile, OpenFlags};
use crate::checksum;
use crate::{Result, TsFileError};
use std::path::Path;

/// Default page size in bytes, matching the source format's `TSDB_DEFAULT_PAGE_SIZE`.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Translate a logical stream offset to its file offset under `page_size`.
pub fn file_off(logical_off: u64, page_size: u32) -> u64 {
    let s = (page_size as u64) - checksum::CHECKSUM_SIZE as u64;
    (logical_off / s) * page_size as u64 + (logical_off % s)
}

/// The 1-indexed page number containing file offset `off`.
pub fn page_of(off: u64, page_size: u32) -> u64 {
    off / page_size as u64 + 1
}

/// A page-checksummed logical byte stream over one on-disk file.
pub struct PagedFD {
    byte_file: ByteFile,
    page_size: u32,
    buf: Vec<u8>,
    n_buf: usize,
    pgno: u64,
}

impl PagedFD {
    /// Open `path` for continuing an already-committed logical stream of
    /// `logical_size` bytes, reconstructing the in-flight scratch buffer from
    /// the previously flushed (and possibly zero-padded) tail page so the
    /// next write resumes inside it instead of starting a fresh page and
    /// wasting the gap.
    ///
    /// Every commit pads and flushes the tail page (see [`Self::pad_and_flush`]
    /// and `FileSetWriter::update_header`), and this recovers that padding
    /// transparently here on the next append.
    pub fn open_for_append<P: AsRef<Path>>(
        path: P,
        flags: OpenFlags,
        page_size: u32,
        logical_size: u64,
    ) -> Result<Self> {
        let mut pfd = Self::open(path, flags, page_size)?;
        if logical_size == 0 {
            return Ok(pfd);
        }
        let s = pfd.content_size() as u64;
        let intra = (logical_size % s) as usize;
        let foff = file_off(logical_size, page_size);
        if intra == 0 {
            pfd.byte_file.seek(foff)?;
            return Ok(pfd);
        }
        let pgno = page_of(foff, page_size);
        pfd.read_page(pgno)?;
        pfd.pgno = 0;
        pfd.n_buf = intra;
        let page_start = (pgno - 1) * page_size as u64;
        pfd.byte_file.seek(page_start)?;
        Ok(pfd)
    }

    /// Open `path` under `flags` with the given page size.
    ///
    /// `page_size` must be strictly greater than the checksum trailer width.
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags, page_size: u32) -> Result<Self> {
        if page_size as usize <= checksum::CHECKSUM_SIZE {
            return Err(TsFileError::Argument(format!(
                "page size {page_size} too small for a {}-byte checksum trailer",
                checksum::CHECKSUM_SIZE
            )));
        }
        let byte_file = ByteFile::open(path, flags)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(page_size as usize)
            .map_err(|e| TsFileError::OutOfMemory(format!("scratch page allocation failed: {e}")))?;
        buf.resize(page_size as usize, 0);

        Ok(PagedFD {
            byte_file,
            page_size,
            buf,
            n_buf: 0,
            pgno: 0,
        })
    }

    /// The page size this stream was opened with.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Content bytes per page (`S = P - C`).
    pub fn content_size(&self) -> usize {
        self.page_size as usize - checksum::CHECKSUM_SIZE
    }

    /// The underlying path, for diagnostics.
    pub fn path(&self) -> &Path {
        self.byte_file.path()
    }

    /// Raw on-disk size in bytes (includes checksum trailers).
    pub fn file_size(&self) -> Result<u64> {
        self.byte_file.size()
    }

    /// Append `src` to the logical stream.
    ///
    /// Buffers into the scratch page; whenever the buffer fills a page's
    /// content area, appends the checksum and flushes the whole page.
    /// Partial tail bytes stay in the scratch buffer until the next write
    /// fills the page or the caller explicitly pads and flushes on close.
    pub fn write(&mut self, src: &[u8]) -> Result<usize> {
        let s = self.content_size();
        let mut written = 0;
        while written < src.len() {
            let space = s - self.n_buf;
            let take = space.min(src.len() - written);
            self.buf[self.n_buf..self.n_buf + take].copy_from_slice(&src[written..written + take]);
            self.n_buf += take;
            written += take;

            if self.n_buf == s {
                self.flush_full_page()?;
            }
        }
        Ok(written)
    }

    fn flush_full_page(&mut self) -> Result<()> {
        let p = self.page_size as usize;
        checksum::append(&mut self.buf, p);
        self.byte_file.write(&self.buf[..p])?;
        self.n_buf = 0;
        Ok(())
    }

    /// Zero-pad the current partial page to a full page and flush it.
    ///
    /// A no-op if there is no partial tail buffered. Used by writers that
    /// need their final page durable before syncing — the format itself
    /// does not pad automatically on close (see module docs on `Close`).
    pub fn pad_and_flush(&mut self) -> Result<()> {
        if self.n_buf == 0 {
            return Ok(());
        }
        let s = self.content_size();
        for b in &mut self.buf[self.n_buf..s] {
            *b = 0;
        }
        self.n_buf = s;
        self.flush_full_page()
    }

    /// Seek the byte file and read page `pgno` (1-indexed) into the scratch
    /// buffer, verifying its checksum.
    ///
    /// `FileCorrupted` on a short read or a bad checksum.
    pub fn read_page(&mut self, pgno: u64) -> Result<()> {
        if pgno == 0 {
            return Err(TsFileError::Argument("page numbers are 1-indexed".into()));
        }
        let p = self.page_size as usize;
        let off = (pgno - 1) * self.page_size as u64;
        self.byte_file.seek(off)?;
        let n = self.byte_file.read(&mut self.buf[..p])?;
        if n != p {
            self.pgno = 0;
            return Err(TsFileError::Corrupted(format!(
                "short read on page {pgno} of {}: got {n} of {p} bytes",
                self.byte_file.path().display()
            )));
        }
        if !checksum::verify(&self.buf, p) {
            self.pgno = 0;
            return Err(TsFileError::Corrupted(format!(
                "checksum mismatch on page {pgno} of {}",
                self.byte_file.path().display()
            )));
        }
        self.pgno = pgno;
        Ok(())
    }

    /// Read `dst.len()` bytes starting at logical offset `off`.
    ///
    /// Reuses the cached page when possible; otherwise calls [`Self::read_page`]
    /// for each page crossed. A logical read never exposes a checksum trailer
    /// to the caller.
    pub fn read(&mut self, off: u64, dst: &mut [u8]) -> Result<usize> {
        let p = self.page_size as u64;
        let s = self.content_size() as u64;
        let mut logical_off = off;
        let mut done = 0usize;

        while done < dst.len() {
            let foff = file_off(logical_off, self.page_size);
            let pgno = page_of(foff, self.page_size);
            if self.pgno != pgno {
                self.read_page(pgno)?;
            }
            let intra = (foff % p) as usize;
            debug_assert!(intra < s as usize, "bOff < S invariant violated");
            if intra >= s as usize {
                return Err(TsFileError::Corrupted(
                    "intra-page offset landed inside checksum trailer".into(),
                ));
            }
            let avail = s as usize - intra;
            let take = avail.min(dst.len() - done);
            dst[done..done + take].copy_from_slice(&self.buf[intra..intra + take]);
            done += take;
            logical_off += take as u64;
        }
        Ok(done)
    }

    /// Overwrite an already-written page's content in place (used for footer
    /// rewrites at commit time). `content` must be at most `content_size()`
    /// bytes; the remainder is zero-padded before the checksum is appended.
    pub fn rewrite_page(&mut self, pgno: u64, content: &[u8]) -> Result<()> {
        let s = self.content_size();
        if content.len() > s {
            return Err(TsFileError::Argument(format!(
                "page content {} exceeds page capacity {s}",
                content.len()
            )));
        }
        let p = self.page_size as usize;
        self.buf[..content.len()].copy_from_slice(content);
        for b in &mut self.buf[content.len()..s] {
            *b = 0;
        }
        checksum::append(&mut self.buf, p);
        let off = (pgno - 1) * self.page_size as u64;
        self.byte_file.seek(off)?;
        self.byte_file.write(&self.buf[..p])?;
        self.pgno = pgno;
        Ok(())
    }

    /// Read and decode the fixed-size [`crate::types::FileDescriptor`] footer
    /// from logical offset 0 (page 1's content). A convenience for readers
    /// and CLI tooling that must discover a committed descriptor from disk
    /// rather than being handed one by a caller.
    pub fn read_footer(&mut self) -> Result<crate::types::FileDescriptor> {
        let mut buf = [0u8; crate::types::FOOTER_LEN];
        self.read(0, &mut buf)?;
        crate::types::FileDescriptor::decode_fixed(&buf)
    }

    /// Fsync the underlying file.
    pub fn fsync(&self) -> Result<()> {
        self.byte_file.fsync()
    }

    /// Close the stream. Never flushes a buffered partial page on its own —
    /// callers that need the tail durable call [`Self::pad_and_flush`] first.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}
