//! CLI implementation for the `tskit inspect` subcommand.
//!
//! Decodes the committed [`tsfile::types::FileDescriptor`] footer of a single
//! paged file without requiring the caller to already know its commit id or
//! logical size — useful when a file set's in-memory descriptors have been
//! lost and only the on-disk files remain.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::bytefile::OpenFlags;
use crate::cli::wprintln;
use crate::paged::PagedFD;
use crate::Result;

pub struct InspectOptions {
    pub file: String,
    pub page_size: Option<u32>,
    pub json: bool,
}

#[derive(Serialize)]
struct InspectReport {
    file: String,
    page_size: u32,
    file_size: u64,
    commit_id: u64,
    size: u64,
    offset: u64,
}

pub fn execute(opts: &InspectOptions, writer: &mut dyn Write) -> Result<()> {
    let page_size = opts.page_size.unwrap_or(crate::paged::DEFAULT_PAGE_SIZE);
    let mut pfd = PagedFD::open(&opts.file, OpenFlags::READ, page_size)?;
    let file_size = pfd.file_size()?;
    let footer = pfd.read_footer()?;

    if opts.json {
        let report = InspectReport {
            file: opts.file.clone(),
            page_size,
            file_size,
            commit_id: footer.commit_id,
            size: footer.size,
            offset: footer.offset,
        };
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| crate::TsFileError::Argument(format!("cannot serialize report: {e}")))?;
        wprintln!(writer, "{rendered}")?;
        return Ok(());
    }

    wprintln!(writer, "{}", opts.file.bold())?;
    wprintln!(writer, "  page size:  {page_size}")?;
    wprintln!(writer, "  file size:  {file_size} bytes")?;
    wprintln!(writer, "  commit id:  {}", footer.commit_id)?;
    wprintln!(writer, "  size:       {}", footer.size)?;
    wprintln!(writer, "  offset:     {}", footer.offset)?;
    Ok(())
}
