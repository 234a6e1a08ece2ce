use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tskit")]
#[command(about = "Inspect, verify, and copy tsfile-format time-series file sets")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode and print a single paged file's footer descriptor
    Inspect {
        /// Path to a .head/.data/.sma/.sst file
        #[arg(short, long)]
        file: String,

        /// Override page size (default: 4096)
        #[arg(long = "page-size")]
        page_size: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate every page checksum in a paged file
    Verify {
        /// Path to a .head/.data/.sma/.sst file
        #[arg(short, long)]
        file: String,

        /// Show per-page status
        #[arg(short, long)]
        verbose: bool,

        /// Override page size (default: 4096)
        #[arg(long = "page-size")]
        page_size: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Copy a committed file set (head/data/sma/every sst) to a new root
    Copy {
        /// Source tsdb root directory
        #[arg(long = "src-root")]
        src_root: String,

        /// Destination tsdb root directory
        #[arg(long = "dest-root")]
        dest_root: String,

        /// Virtual-node/disk id
        #[arg(long = "disk-id")]
        disk_id: u32,

        /// File-set id
        #[arg(long)]
        fid: i64,

        /// Head file commit id
        #[arg(long = "head-commit")]
        head_commit: u64,

        /// Head file size (logical bytes)
        #[arg(long = "head-size")]
        head_size: u64,

        /// Data file commit id
        #[arg(long = "data-commit")]
        data_commit: u64,

        /// Data file size (logical bytes)
        #[arg(long = "data-size")]
        data_size: u64,

        /// Sma file commit id
        #[arg(long = "sma-commit")]
        sma_commit: u64,

        /// Sma file size (logical bytes)
        #[arg(long = "sma-size")]
        sma_size: u64,

        /// Sst commit ids, one per `--sst commit:size` pair
        #[arg(long = "sst")]
        sst: Vec<String>,
    },

    /// Intentionally corrupt a page for testing recovery/verification paths
    Corrupt {
        /// Path to a .head/.data/.sma/.sst file
        #[arg(short, long)]
        file: String,

        /// Page number to corrupt (1-indexed; random if not specified)
        #[arg(short, long)]
        page: Option<u64>,

        /// Number of bytes to corrupt
        #[arg(short, long, default_value = "1")]
        bytes: usize,

        /// Corrupt the checksum trailer instead of the content area
        #[arg(long)]
        trailer: bool,

        /// Override page size (default: 4096)
        #[arg(long = "page-size")]
        page_size: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}
