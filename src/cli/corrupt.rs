//! CLI implementation for the `tskit corrupt` subcommand.
//!
//! Writes random bytes directly onto the raw file, bypassing `PagedFD`'s
//! checksum-append path entirely, so a subsequent `tskit verify` run will
//! observe the corruption it would in the field: pick a page (or a random
//! one), pick an offset within it, overwrite, report what was written.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};

use rand::Rng;
use serde::Serialize;

use crate::bytefile::OpenFlags;
use crate::checksum::CHECKSUM_SIZE;
use crate::cli::wprintln;
use crate::paged::PagedFD;
use crate::Result;

pub struct CorruptOptions {
    pub file: String,
    pub page: Option<u64>,
    pub bytes: usize,
    pub trailer: bool,
    pub page_size: Option<u32>,
    pub json: bool,
}

#[derive(Serialize)]
struct CorruptReport {
    file: String,
    page: u64,
    offset: u64,
    bytes_written: usize,
}

pub fn execute(opts: &CorruptOptions, writer: &mut dyn Write) -> Result<()> {
    let page_size = opts.page_size.unwrap_or(crate::paged::DEFAULT_PAGE_SIZE);
    let page_count = {
        let pfd = PagedFD::open(&opts.file, OpenFlags::READ, page_size)?;
        let file_size = pfd.file_size()?;
        file_size / page_size as u64
    };
    if page_count == 0 {
        return Err(crate::TsFileError::Argument(format!("{} has no pages", opts.file)));
    }

    let mut rng = rand::rng();
    let page_num = match opts.page {
        Some(p) => {
            if p == 0 || p > page_count {
                return Err(crate::TsFileError::Argument(format!(
                    "page {p} out of range ({page_count} pages)"
                )));
            }
            p
        }
        None => {
            let p = rng.random_range(1..=page_count);
            wprintln!(writer, "No page specified. Choosing random page {p}.")?;
            p
        }
    };

    let content_size = page_size as usize - CHECKSUM_SIZE;
    let page_start = (page_num - 1) * page_size as u64;
    let corrupt_offset = if opts.trailer {
        let within = rng.random_range(0..CHECKSUM_SIZE as u64);
        page_start + content_size as u64 + within
    } else {
        let within = rng.random_range(0..content_size as u64);
        page_start + within
    };

    let random_data: Vec<u8> = (0..opts.bytes).map(|_| rng.random::<u8>()).collect();

    let mut file = OpenOptions::new()
        .write(true)
        .open(&opts.file)
        .map_err(|e| crate::TsFileError::Io(format!("cannot open {} for writing: {e}", opts.file)))?;
    file.seek(SeekFrom::Start(corrupt_offset))
        .map_err(|e| crate::TsFileError::Io(format!("cannot seek to offset {corrupt_offset}: {e}")))?;
    file.write_all(&random_data)
        .map_err(|e| crate::TsFileError::Io(format!("cannot write corruption data: {e}")))?;

    if opts.json {
        let report = CorruptReport {
            file: opts.file.clone(),
            page: page_num,
            offset: corrupt_offset,
            bytes_written: random_data.len(),
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| crate::TsFileError::Argument(format!("cannot serialize report: {e}")))?;
        wprintln!(writer, "{rendered}")?;
        return Ok(());
    }

    wprintln!(
        writer,
        "Wrote {} bytes of random data to {} at offset {corrupt_offset} (page {page_num}).",
        random_data.len(),
        opts.file,
    )?;
    Ok(())
}
