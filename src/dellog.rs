//! The delete-log writer/reader.
//!
//! Unlike the four file-set members, the delete log is *not* paged: every
//! record region is its own self-checksummed unit over the raw byte file.
//! Layout: `[FHDR_SIZE header][ (DLMT + del-data + checksum) x N ][DLMT +
//! del-idx + checksum][header rewrite]`.

use crate::bytefile::{ByteFile, OpenFlags};
use crate::checksum;
use crate::types::{DelData, DelIdx, FileDescriptor, TSDB_FILE_DLMT};
use crate::{Result, TsFileError};
use byteorder::{ByteOrder, LittleEndian};
use std::path::Path;

/// Fixed header size for the delete log, independent of any paged-file page
/// size since this file is never paged.
pub const DEL_FHDR_SIZE: usize = 4096;

fn build_region(body: &[u8]) -> Vec<u8> {
    let mut region = Vec::with_capacity(4 + body.len() + checksum::CHECKSUM_SIZE);
    let mut dlmt = [0u8; 4];
    LittleEndian::write_u32(&mut dlmt, TSDB_FILE_DLMT);
    region.extend_from_slice(&dlmt);
    region.extend_from_slice(body);
    region.resize(region.len() + checksum::CHECKSUM_SIZE, 0);
    let len = region.len();
    checksum::append(&mut region, len);
    region
}

fn parse_region(buf: &[u8]) -> Result<&[u8]> {
    if buf.len() < 4 + checksum::CHECKSUM_SIZE {
        return Err(TsFileError::Corrupted("delete-log region too short".into()));
    }
    if !checksum::verify(buf, buf.len()) {
        return Err(TsFileError::Corrupted("delete-log region checksum mismatch".into()));
    }
    let delimiter = LittleEndian::read_u32(&buf[..4]);
    if delimiter != TSDB_FILE_DLMT {
        return Err(TsFileError::Corrupted(format!(
            "bad delete-log region delimiter: {delimiter:#010x}"
        )));
    }
    Ok(&buf[4..buf.len() - checksum::CHECKSUM_SIZE])
}

/// Writer over the append-only delete log.
pub struct DelLogWriter {
    file: ByteFile,
    descriptor: FileDescriptor,
}

impl DelLogWriter {
    /// Open (creating if necessary) the delete log at `path`.
    pub fn open<P: AsRef<Path>>(path: P, mut descriptor: FileDescriptor) -> Result<Self> {
        let fresh = descriptor.size == 0;
        let flags = if fresh {
            OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNC
        } else {
            OpenFlags::READ | OpenFlags::WRITE
        };
        let mut file = ByteFile::open(path, flags)?;
        if fresh {
            file.write(&vec![0u8; DEL_FHDR_SIZE])?;
            descriptor.size = DEL_FHDR_SIZE as u64;
        }
        Ok(DelLogWriter { file, descriptor })
    }

    /// Append one table's delete ranges as a self-checksummed region.
    /// Returns the `DelIdx` pointer to fold into the next [`Self::write_del_idx`] call.
    pub fn write_del_data(&mut self, entry: &DelData) -> Result<DelIdx> {
        let mut body = Vec::new();
        entry.encode_into(&mut body);
        let region = build_region(&body);

        self.file.seek(self.descriptor.size)?;
        let written = self.file.write(&region)?;
        let idx = DelIdx {
            suid: entry.suid,
            uid: entry.uid,
            offset: self.descriptor.size,
            size: written as u64,
        };
        self.descriptor.size += written as u64;
        Ok(idx)
    }

    /// Append the global delete-index region listing every table written so
    /// far in this commit.
    pub fn write_del_idx(&mut self, entries: &[DelIdx]) -> Result<()> {
        let mut body = Vec::new();
        for e in entries {
            e.encode_into(&mut body);
        }
        let region = build_region(&body);
        let offset_before = self.descriptor.size;

        self.file.seek(self.descriptor.size)?;
        let written = self.file.write(&region)?;
        self.descriptor.offset = offset_before;
        self.descriptor.size += written as u64;
        Ok(())
    }

    /// Rewrite the checksummed fixed-size header at offset 0. The commit
    /// point of the delete log.
    pub fn update_header(&mut self) -> Result<()> {
        let mut header = self.descriptor.encode_fixed().to_vec();
        header.resize(DEL_FHDR_SIZE - checksum::CHECKSUM_SIZE, 0);
        header.resize(DEL_FHDR_SIZE, 0);
        checksum::append(&mut header, DEL_FHDR_SIZE);
        self.file.seek(0)?;
        self.file.write(&header)?;
        Ok(())
    }

    pub fn fsync(&self) -> Result<()> {
        self.file.fsync()
    }

    pub fn close(self) -> Result<FileDescriptor> {
        Ok(self.descriptor)
    }
}

/// Reader over a committed delete log.
pub struct DelLogReader {
    file: ByteFile,
    descriptor: FileDescriptor,
}

impl DelLogReader {
    /// Open `path` and verify + decode its header, trusting the caller's
    /// descriptor is not required here since the delete log is self-describing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = ByteFile::open(path, OpenFlags::READ)?;
        let mut header = vec![0u8; DEL_FHDR_SIZE];
        file.seek(0)?;
        let n = file.read(&mut header)?;
        if n != DEL_FHDR_SIZE {
            return Err(TsFileError::Corrupted("short read on delete-log header".into()));
        }
        if !checksum::verify(&header, DEL_FHDR_SIZE) {
            return Err(TsFileError::Corrupted("delete-log header checksum mismatch".into()));
        }
        let descriptor = FileDescriptor::decode_fixed(&header)?;
        Ok(DelLogReader { file, descriptor })
    }

    pub fn descriptor(&self) -> FileDescriptor {
        self.descriptor
    }

    /// Read and decode the global delete-index region.
    pub fn read_del_idx(&mut self) -> Result<Vec<DelIdx>> {
        let body = self.read_region(self.descriptor.offset, self.descriptor.size - self.descriptor.offset)?;
        let mut out = Vec::new();
        let mut off = 0;
        while off < body.len() {
            let (idx, n) = DelIdx::decode(&body[off..])?;
            off += n;
            out.push(idx);
        }
        if off != body.len() {
            return Err(TsFileError::Corrupted("delete-index region had trailing bytes".into()));
        }
        Ok(out)
    }

    /// Read and decode one table's delete-data region at a `DelIdx` pointer.
    pub fn read_del_data(&mut self, idx: &DelIdx) -> Result<DelData> {
        let body = self.read_region(idx.offset, idx.size)?;
        let (data, consumed) = DelData::decode(&body)?;
        if consumed != body.len() {
            return Err(TsFileError::Corrupted(format!(
                "delete-data region decode consumed {consumed} of {} bytes",
                body.len()
            )));
        }
        Ok(data)
    }

    fn read_region(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size as usize];
        self.file.seek(offset)?;
        let n = self.file.read(&mut buf)?;
        if n != buf.len() {
            return Err(TsFileError::Corrupted("short read on delete-log region".into()));
        }
        parse_region(&buf).map(|b| b.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DelRange;
    use tempfile::NamedTempFile;

    fn temp_path() -> std::path::PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        path
    }

    #[test]
    fn empty_delete_log_round_trips() {
        let path = temp_path();
        {
            let mut w = DelLogWriter::open(&path, FileDescriptor::default()).unwrap();
            w.write_del_idx(&[]).unwrap();
            w.update_header().unwrap();
            w.fsync().unwrap();
        }
        let mut r = DelLogReader::open(&path).unwrap();
        assert!(r.read_del_idx().unwrap().is_empty());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_read_round_trips_delete_ranges() {
        let path = temp_path();
        let entry = DelData {
            suid: 1,
            uid: 7,
            ranges: vec![DelRange { skey: 0, ekey: 100, version: 3 }, DelRange { skey: 200, ekey: 300, version: 4 }],
        };
        {
            let mut w = DelLogWriter::open(&path, FileDescriptor::default()).unwrap();
            let idx = w.write_del_data(&entry).unwrap();
            w.write_del_idx(&[idx]).unwrap();
            w.update_header().unwrap();
            w.fsync().unwrap();
        }
        let mut r = DelLogReader::open(&path).unwrap();
        let idx_list = r.read_del_idx().unwrap();
        assert_eq!(idx_list.len(), 1);
        let got = r.read_del_data(&idx_list[0]).unwrap();
        assert_eq!(got, entry);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn every_region_begins_with_delimiter() {
        let path = temp_path();
        let entry = DelData { suid: 1, uid: 1, ranges: vec![] };
        let region_offset;
        {
            let mut w = DelLogWriter::open(&path, FileDescriptor::default()).unwrap();
            region_offset = w.descriptor.size;
            w.write_del_data(&entry).unwrap();
            w.update_header().unwrap();
        }
        let mut f = ByteFile::open(&path, OpenFlags::READ).unwrap();
        f.seek(region_offset).unwrap();
        let mut buf = [0u8; 4];
        f.read(&mut buf).unwrap();
        assert_eq!(LittleEndian::read_u32(&buf), TSDB_FILE_DLMT);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn tampered_region_fails_checksum() {
        let path = temp_path();
        let entry = DelData { suid: 1, uid: 1, ranges: vec![DelRange { skey: 1, ekey: 2, version: 1 }] };
        let region_offset;
        {
            let mut w = DelLogWriter::open(&path, FileDescriptor::default()).unwrap();
            region_offset = w.descriptor.size;
            let idx = w.write_del_data(&entry).unwrap();
            w.write_del_idx(&[idx]).unwrap();
            w.update_header().unwrap();
        }
        {
            use std::io::{Seek, SeekFrom, Write};
            let mut f = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
            f.seek(SeekFrom::Start(region_offset + 4)).unwrap();
            f.write_all(&[0xFF]).unwrap();
        }
        let mut r = DelLogReader::open(&path).unwrap();
        let idx_list = r.read_del_idx().unwrap();
        assert!(r.read_del_data(&idx_list[0]).is_err());
        std::fs::remove_file(&path).ok();
    }
}
