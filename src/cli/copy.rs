//! CLI implementation for the `tskit copy` subcommand.
//!
//! Reconstructs an [`tsfile::types::SFileSet`] from commit ids and sizes
//! supplied on the command line (the CLI has no directory index to read
//! them from) and hands it to [`crate::copy::copy_file_set`].

use std::io::Write;

use crate::cli::wprintln;
use crate::types::{FileDescriptor, SFileSet};
use crate::{Result, TsFileError};

pub struct CopyOptions {
    pub src_root: String,
    pub dest_root: String,
    pub disk_id: u32,
    pub fid: i64,
    pub head_commit: u64,
    pub head_size: u64,
    pub data_commit: u64,
    pub data_size: u64,
    pub sma_commit: u64,
    pub sma_size: u64,
    pub sst: Vec<String>,
}

fn parse_sst(raw: &[String]) -> Result<Vec<FileDescriptor>> {
    if raw.is_empty() {
        return Err(TsFileError::Argument(
            "at least one --sst commit:size pair is required".into(),
        ));
    }
    raw.iter()
        .map(|entry| {
            let (commit, size) = entry.split_once(':').ok_or_else(|| {
                TsFileError::Argument(format!("invalid --sst entry {entry:?}, expected commit:size"))
            })?;
            let commit_id: u64 = commit
                .parse()
                .map_err(|_| TsFileError::Argument(format!("invalid sst commit id in {entry:?}")))?;
            let size: u64 = size
                .parse()
                .map_err(|_| TsFileError::Argument(format!("invalid sst size in {entry:?}")))?;
            Ok(FileDescriptor { commit_id, size, offset: 0 })
        })
        .collect()
}

pub fn execute(opts: &CopyOptions, writer: &mut dyn Write) -> Result<()> {
    let set = SFileSet {
        fid: opts.fid,
        disk_id: opts.disk_id,
        tsdb_root: opts.src_root.clone().into(),
        head: FileDescriptor { commit_id: opts.head_commit, size: opts.head_size, offset: 0 },
        data: FileDescriptor { commit_id: opts.data_commit, size: opts.data_size, offset: 0 },
        sma: FileDescriptor { commit_id: opts.sma_commit, size: opts.sma_size, offset: 0 },
        sst: parse_sst(&opts.sst)?,
    };

    let copied = crate::copy::copy_file_set(&set, &opts.dest_root)?;

    wprintln!(
        writer,
        "Copied file set fid={} disk_id={} into {} ({} sst file(s)).",
        copied.fid,
        copied.disk_id,
        opts.dest_root,
        copied.sst.len(),
    )?;
    Ok(())
}
