//! Block stream compression (`cmprAlg`).
//!
//! Covers exactly the algorithms this format round-trips on both ends —
//! no detect-only support for algorithms it never writes itself, since
//! every stream this crate writes it also reads back.

use crate::{Result, TsFileError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// The compression algorithm tag stored in [`crate::types::DiskDataHdr::cmpr_alg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    None = 0,
    Zlib = 1,
    Lz4 = 2,
}

impl CompressionAlgorithm {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(CompressionAlgorithm::None),
            1 => Ok(CompressionAlgorithm::Zlib),
            2 => Ok(CompressionAlgorithm::Lz4),
            other => Err(TsFileError::Corrupted(format!("unknown compression tag {other}"))),
        }
    }
}

/// Compress `data` under `alg`.
pub fn compress(alg: CompressionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    match alg {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(|e| TsFileError::Io(format!("zlib compress failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| TsFileError::Io(format!("zlib compress failed: {e}")))
        }
        CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress(data)),
    }
}

/// Decompress `data` under `alg`, given the expected decompressed length.
pub fn decompress(alg: CompressionAlgorithm, data: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
    match alg {
        CompressionAlgorithm::None => {
            if data.len() != uncompressed_len {
                return Err(TsFileError::Corrupted(format!(
                    "uncompressed stream length mismatch: got {} expected {uncompressed_len}",
                    data.len()
                )));
            }
            Ok(data.to_vec())
        }
        CompressionAlgorithm::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(uncompressed_len);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| TsFileError::Corrupted(format!("zlib decompress failed: {e}")))?;
            Ok(out)
        }
        CompressionAlgorithm::Lz4 => lz4_flex::decompress(data, uncompressed_len)
            .map_err(|e| TsFileError::Corrupted(format!("lz4 decompress failed: {e}"))),
    }
}
