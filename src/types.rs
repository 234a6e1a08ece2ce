//! On-disk record types and their binary codecs.
//!
//! Every record type here provides `encoded_len`, `encode_into`, and
//! `decode`: a `(Self, bytes_consumed)`-style decode contract with the
//! caller checking consumption, and `encoded_len` computed directly instead
//! of writing into a null buffer to pre-size. Integers are little-endian;
//! variable-length fields go through [`crate::varint`].

use crate::varint;
use crate::{Result, TsFileError};
use byteorder::{ByteOrder, LittleEndian};
use std::path::PathBuf;

/// Region delimiter sentinel, written little-endian at the start of every
/// self-checksummed region (delete log entries, and conceptually the
/// boundary between a block's sub-regions).
pub const TSDB_FILE_DLMT: u32 = 0xF00A_FFFF;

/// Column directory entry flag: the column is entirely null for this block.
pub const COL_FLAG_HAS_NULL: u8 = 0x01;

/// One (suid, uid) table's pointer into the head file's block-map region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIdx {
    pub suid: u64,
    pub uid: u64,
    pub offset: u64,
    pub size: u64,
}

impl BlockIdx {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.suid)
            + varint::encoded_len(self.uid)
            + varint::encoded_len(self.offset)
            + varint::encoded_len(self.size)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.suid);
        varint::put_u64(buf, self.uid);
        varint::put_u64(buf, self.offset);
        varint::put_u64(buf, self.size);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (suid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (uid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (offset, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (size, n) = varint::get_u64(&buf[off..])?;
        off += n;
        Ok((BlockIdx { suid, uid, offset, size }, off))
    }
}

/// A sub-block's location: `{offset, szKey, szBlock}` into the data or sst file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset: u64,
    pub sz_key: u32,
    pub sz_block: u32,
}

impl BlockInfo {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.offset) + varint::encoded_len(self.sz_key as u64)
            + varint::encoded_len(self.sz_block as u64)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.offset);
        varint::put_u32(buf, self.sz_key);
        varint::put_u32(buf, self.sz_block);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (offset, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (sz_key, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_block, n) = varint::get_u32(&buf[off..])?;
        off += n;
        Ok((BlockInfo { offset, sz_key, sz_block }, off))
    }
}

/// A sub-block's embedded SMA pointer into the sma file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaInfo {
    pub offset: u64,
    pub size: u32,
}

impl SmaInfo {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.offset) + varint::encoded_len(self.size as u64)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.offset);
        varint::put_u32(buf, self.size);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (offset, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (size, n) = varint::get_u32(&buf[off..])?;
        off += n;
        Ok((SmaInfo { offset, size }, off))
    }
}

/// One physical sub-block: its data/sst location plus its sma location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBlock {
    pub info: BlockInfo,
    pub sma: SmaInfo,
}

impl SubBlock {
    pub fn encoded_len(&self) -> usize {
        self.info.encoded_len() + self.sma.encoded_len()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        self.info.encode_into(buf);
        self.sma.encode_into(buf);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let (info, n1) = BlockInfo::decode(buf)?;
        let (sma, n2) = SmaInfo::decode(&buf[n1..])?;
        Ok((SubBlock { info, sma }, n1 + n2))
    }
}

/// One logical block for a table, possibly split across multiple sub-blocks
/// because of out-of-order commits that must be merged on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataBlk {
    pub sub_blocks: Vec<SubBlock>,
}

impl DataBlk {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.sub_blocks.len() as u64)
            + self.sub_blocks.iter().map(SubBlock::encoded_len).sum::<usize>()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.sub_blocks.len() as u64);
        for sb in &self.sub_blocks {
            sb.encode_into(buf);
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (count, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let mut sub_blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (sb, n) = SubBlock::decode(&buf[off..])?;
            off += n;
            sub_blocks.push(sb);
        }
        Ok((DataBlk { sub_blocks }, off))
    }
}

/// The block map for one table: every [`DataBlk`] committed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapData {
    pub blocks: Vec<DataBlk>,
}

impl MapData {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.blocks.len() as u64)
            + self.blocks.iter().map(DataBlk::encoded_len).sum::<usize>()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.blocks.len() as u64);
        for b in &self.blocks {
            b.encode_into(buf);
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (count, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let mut blocks = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (b, n) = DataBlk::decode(&buf[off..])?;
            off += n;
            blocks.push(b);
        }
        Ok((MapData { blocks }, off))
    }
}

/// Per-block disk-data header: identity, row count, compression, and the
/// sizes of the uid/version/tskey streams packed alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskDataHdr {
    pub suid: u64,
    pub uid: u64,
    pub n_row: u32,
    pub cmpr_alg: u8,
    pub sz_uid: u32,
    pub sz_ver: u32,
    pub sz_key: u32,
    pub sz_blk_col: u32,
}

impl DiskDataHdr {
    pub fn encoded_len(&self) -> usize {
        4 // delimiter
            + varint::encoded_len(self.suid)
            + varint::encoded_len(self.uid)
            + varint::encoded_len(self.n_row as u64)
            + 1 // cmpr_alg
            + varint::encoded_len(self.sz_uid as u64)
            + varint::encoded_len(self.sz_ver as u64)
            + varint::encoded_len(self.sz_key as u64)
            + varint::encoded_len(self.sz_blk_col as u64)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut tmp = [0u8; 4];
        LittleEndian::write_u32(&mut tmp, TSDB_FILE_DLMT);
        buf.extend_from_slice(&tmp);
        varint::put_u64(buf, self.suid);
        varint::put_u64(buf, self.uid);
        varint::put_u32(buf, self.n_row);
        buf.push(self.cmpr_alg);
        varint::put_u32(buf, self.sz_uid);
        varint::put_u32(buf, self.sz_ver);
        varint::put_u32(buf, self.sz_key);
        varint::put_u32(buf, self.sz_blk_col);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 4 {
            return Err(TsFileError::Corrupted("truncated disk-data header".into()));
        }
        let delimiter = LittleEndian::read_u32(&buf[..4]);
        if delimiter != TSDB_FILE_DLMT {
            return Err(TsFileError::Corrupted(format!(
                "bad disk-data header delimiter: {delimiter:#010x}"
            )));
        }
        let mut off = 4;
        let (suid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (uid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (n_row, n) = varint::get_u32(&buf[off..])?;
        off += n;
        if buf.len() <= off {
            return Err(TsFileError::Corrupted("truncated disk-data header".into()));
        }
        let cmpr_alg = buf[off];
        off += 1;
        let (sz_uid, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_ver, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_key, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_blk_col, n) = varint::get_u32(&buf[off..])?;
        off += n;
        Ok((
            DiskDataHdr { suid, uid, n_row, cmpr_alg, sz_uid, sz_ver, sz_key, sz_blk_col },
            off,
        ))
    }
}

/// One entry of a block's column directory (`aBuf[2]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColDirEntry {
    pub cid: u32,
    pub flags: u8,
    /// Byte offset of this column's region within `aBuf[1]`.
    pub offset: u32,
    /// On-disk length of this column's region, including its checksum
    /// trailer (`compressed_len + C`). Zero when `HAS_NULL` is set.
    pub payload_len: u32,
    /// Decompressed size of the bitmap sub-stream.
    pub sz_bitmap: u32,
    /// Decompressed size of the offsets sub-stream (0 for fixed-width types).
    pub sz_offset: u32,
    /// Decompressed size of the values sub-stream.
    pub sz_value: u32,
}

impl ColDirEntry {
    pub fn has_null(&self) -> bool {
        self.flags & COL_FLAG_HAS_NULL != 0
    }

    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.cid as u64)
            + 1
            + varint::encoded_len(self.offset as u64)
            + varint::encoded_len(self.payload_len as u64)
            + varint::encoded_len(self.sz_bitmap as u64)
            + varint::encoded_len(self.sz_offset as u64)
            + varint::encoded_len(self.sz_value as u64)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u32(buf, self.cid);
        buf.push(self.flags);
        varint::put_u32(buf, self.offset);
        varint::put_u32(buf, self.payload_len);
        varint::put_u32(buf, self.sz_bitmap);
        varint::put_u32(buf, self.sz_offset);
        varint::put_u32(buf, self.sz_value);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (cid, n) = varint::get_u32(&buf[off..])?;
        off += n;
        if buf.len() <= off {
            return Err(TsFileError::Corrupted("truncated column directory entry".into()));
        }
        let flags = buf[off];
        off += 1;
        let (offset, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (payload_len, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_bitmap, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_offset, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (sz_value, n) = varint::get_u32(&buf[off..])?;
        off += n;
        Ok((
            ColDirEntry { cid, flags, offset, payload_len, sz_bitmap, sz_offset, sz_value },
            off,
        ))
    }
}

/// A block's full column directory, sorted by ascending `cid` (required for
/// the reader's forward-advancing cursor lookup in `ReadBlockDataImpl`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockColDir {
    pub entries: Vec<ColDirEntry>,
}

impl BlockColDir {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.entries.len() as u64)
            + self.entries.iter().map(ColDirEntry::encoded_len).sum::<usize>()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.entries.len() as u64);
        for e in &self.entries {
            e.encode_into(buf);
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (count, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (e, n) = ColDirEntry::decode(&buf[off..])?;
            off += n;
            entries.push(e);
        }
        Ok((BlockColDir { entries }, off))
    }
}

/// One per-column pre-aggregated statistic block, written contiguously to
/// the sma file. Variable-length and `smaOn = false` columns never appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAgg {
    pub cid: u32,
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
}

impl ColumnAgg {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.cid as u64)
            + varint::encoded_len(self.count)
            + 24 // sum, min, max as fixed i64
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u32(buf, self.cid);
        varint::put_u64(buf, self.count);
        let mut tmp = [0u8; 8];
        LittleEndian::write_i64(&mut tmp, self.sum);
        buf.extend_from_slice(&tmp);
        LittleEndian::write_i64(&mut tmp, self.min);
        buf.extend_from_slice(&tmp);
        LittleEndian::write_i64(&mut tmp, self.max);
        buf.extend_from_slice(&tmp);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (cid, n) = varint::get_u32(&buf[off..])?;
        off += n;
        let (count, n) = varint::get_u64(&buf[off..])?;
        off += n;
        if buf.len() < off + 24 {
            return Err(TsFileError::Corrupted("truncated column aggregate".into()));
        }
        let sum = LittleEndian::read_i64(&buf[off..off + 8]);
        let min = LittleEndian::read_i64(&buf[off + 8..off + 16]);
        let max = LittleEndian::read_i64(&buf[off + 16..off + 24]);
        off += 24;
        Ok((ColumnAgg { cid, count, sum, min, max }, off))
    }
}

/// One (suid, uid) table's pointer into the tail file's sst-block region.
///
/// Structurally identical to [`BlockIdx`]; kept distinct because the two
/// live in different files and evolve independently.
pub type SstBlk = BlockIdx;

/// A decoded column's per-row values after directory lookup and decompression.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// No directory entry for this column in this block (legacy/narrow block).
    None,
    /// Directory entry present but flagged all-null.
    Null,
    /// An actual decoded value, opaque at this layer (typed decode is a
    /// higher-level concern than the file I/O core).
    Bytes(Vec<u8>),
}

/// One requested column's reconstructed values for a block.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnResult {
    pub cid: u32,
    pub values: Vec<CellValue>,
}

/// The fully decoded contents of one physical sub-block.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub suid: u64,
    pub uid: u64,
    pub n_row: u32,
    /// Present only for super-table rows (`hdr.uid == 0` at write time).
    pub uid_stream: Option<Vec<i64>>,
    pub version: Vec<i64>,
    pub tskey: Vec<i64>,
    pub columns: Vec<ColumnResult>,
}

/// One delete range for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelRange {
    pub skey: i64,
    pub ekey: i64,
    pub version: i64,
}

impl DelRange {
    pub fn encoded_len(&self) -> usize {
        24
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let mut tmp = [0u8; 8];
        LittleEndian::write_i64(&mut tmp, self.skey);
        buf.extend_from_slice(&tmp);
        LittleEndian::write_i64(&mut tmp, self.ekey);
        buf.extend_from_slice(&tmp);
        LittleEndian::write_i64(&mut tmp, self.version);
        buf.extend_from_slice(&tmp);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < 24 {
            return Err(TsFileError::Corrupted("truncated delete range".into()));
        }
        let skey = LittleEndian::read_i64(&buf[0..8]);
        let ekey = LittleEndian::read_i64(&buf[8..16]);
        let version = LittleEndian::read_i64(&buf[16..24]);
        Ok((DelRange { skey, ekey, version }, 24))
    }
}

/// One table's delete ranges, as appended to the delete log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelData {
    pub suid: u64,
    pub uid: u64,
    pub ranges: Vec<DelRange>,
}

impl DelData {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.suid)
            + varint::encoded_len(self.uid)
            + varint::encoded_len(self.ranges.len() as u64)
            + self.ranges.iter().map(DelRange::encoded_len).sum::<usize>()
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.suid);
        varint::put_u64(buf, self.uid);
        varint::put_u64(buf, self.ranges.len() as u64);
        for r in &self.ranges {
            r.encode_into(buf);
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (suid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (uid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (count, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let mut ranges = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (r, n) = DelRange::decode(&buf[off..])?;
            off += n;
            ranges.push(r);
        }
        Ok((DelData { suid, uid, ranges }, off))
    }
}

/// The global delete-log index: one pointer per table into the delete-data
/// regions written so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelIdx {
    pub suid: u64,
    pub uid: u64,
    pub offset: u64,
    pub size: u64,
}

impl DelIdx {
    pub fn encoded_len(&self) -> usize {
        varint::encoded_len(self.suid)
            + varint::encoded_len(self.uid)
            + varint::encoded_len(self.offset)
            + varint::encoded_len(self.size)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        varint::put_u64(buf, self.suid);
        varint::put_u64(buf, self.uid);
        varint::put_u64(buf, self.offset);
        varint::put_u64(buf, self.size);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let mut off = 0;
        let (suid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (uid, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (offset, n) = varint::get_u64(&buf[off..])?;
        off += n;
        let (size, n) = varint::get_u64(&buf[off..])?;
        off += n;
        Ok((DelIdx { suid, uid, offset, size }, off))
    }
}

/// A file's descriptor: commit id, logical size, and the logical start of
/// its index footer region. Round-trips through the fixed-size per-file
/// footer written at offset 0 ([`Self::encode_fixed`] / [`Self::decode_fixed`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileDescriptor {
    pub commit_id: u64,
    pub size: u64,
    pub offset: u64,
}

/// Fixed wire width of an encoded [`FileDescriptor`] footer (three `u64`s).
pub const FOOTER_LEN: usize = 24;

impl FileDescriptor {
    pub fn encode_fixed(&self) -> [u8; FOOTER_LEN] {
        let mut buf = [0u8; FOOTER_LEN];
        LittleEndian::write_u64(&mut buf[0..8], self.commit_id);
        LittleEndian::write_u64(&mut buf[8..16], self.size);
        LittleEndian::write_u64(&mut buf[16..24], self.offset);
        buf
    }

    pub fn decode_fixed(buf: &[u8]) -> Result<Self> {
        if buf.len() < FOOTER_LEN {
            return Err(TsFileError::Corrupted("truncated file footer".into()));
        }
        Ok(FileDescriptor {
            commit_id: LittleEndian::read_u64(&buf[0..8]),
            size: LittleEndian::read_u64(&buf[8..16]),
            offset: LittleEndian::read_u64(&buf[16..24]),
        })
    }
}

/// The four file descriptors making up one time-aligned commit.
#[derive(Debug, Clone)]
pub struct SFileSet {
    pub fid: i64,
    pub disk_id: u32,
    pub tsdb_root: PathBuf,
    pub head: FileDescriptor,
    pub data: FileDescriptor,
    pub sma: FileDescriptor,
    pub sst: Vec<FileDescriptor>,
}

impl SFileSet {
    /// A freshly minted, empty file set at commit 0 with a single sst file.
    pub fn new<P: Into<PathBuf>>(fid: i64, disk_id: u32, tsdb_root: P) -> Self {
        SFileSet {
            fid,
            disk_id,
            tsdb_root: tsdb_root.into(),
            head: FileDescriptor::default(),
            data: FileDescriptor::default(),
            sma: FileDescriptor::default(),
            sst: vec![FileDescriptor::default()],
        }
    }
}
