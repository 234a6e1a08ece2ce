//! CLI subcommand implementations for the `tskit` binary.
//!
//! The `tskit` binary provides four subcommands for working directly with
//! `tsfile`-format file sets. Argument parsing uses clap derive macros, with
//! the top-level [`app::Cli`] struct and [`app::Commands`] enum defined in
//! [`app`] and shared between `main.rs` and `build.rs` (for man page
//! generation) via `include!()`.
//!
//! Each subcommand module follows the same pattern: an `Options` struct
//! holding the parsed arguments and a `pub fn execute(opts, writer) ->
//! tsfile::Result<()>` entry point. The `writer: &mut dyn Write` parameter
//! allows output to be captured in tests or redirected to a file via the
//! global `--output` flag.
//!
//! # Subcommands
//!
//! | Command | Module | Purpose |
//! |---------|--------|---------|
//! | `tskit inspect` | [`inspect`] | Decode and print one paged file's footer descriptor |
//! | `tskit verify` | [`verify`] | Validate every page checksum in a paged file |
//! | `tskit copy` | [`copy`] | Copy a committed file set to a new root via `sendfile` |
//! | `tskit corrupt` | [`corrupt`] | Inject bytes into a page for testing recovery/verification |
//!
//! # Common patterns
//!
//! - **`--json`** — Every subcommand supports structured JSON output via
//!   `#[derive(Serialize)]` structs and `serde_json`.
//! - **`--page-size`** — Override the page size (default 4096).
//! - **`--color`** (global) — Control colored terminal output (`auto`, `always`, `never`).
//! - **`--output` / `-o`** (global) — Redirect output to a file instead of stdout.

pub mod app;
pub mod copy;
pub mod corrupt;
pub mod inspect;
pub mod verify;

/// Write a line to the given writer, converting io::Error to TsFileError.
macro_rules! wprintln {
    ($w:expr) => {
        writeln!($w).map_err(|e| $crate::TsFileError::Io(e.to_string()))
    };
    ($w:expr, $($arg:tt)*) => {
        writeln!($w, $($arg)*).map_err(|e| $crate::TsFileError::Io(e.to_string()))
    };
}

pub(crate) use wprintln;
