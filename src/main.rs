#[cfg(not(feature = "cli"))]
compile_error!("The `tskit` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use tsfile::cli;
use tsfile::cli::app::{Cli, ColorMode, Commands};
use tsfile::TsFileError;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }

    let writer_result: Result<Box<dyn Write>, TsFileError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| TsFileError::Io(format!("cannot create {path}: {e}"))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Inspect { file, page_size, json } => cli::inspect::execute(
            &cli::inspect::InspectOptions { file, page_size, json },
            &mut writer,
        ),

        Commands::Verify { file, verbose, page_size, json } => cli::verify::execute(
            &cli::verify::VerifyOptions { file, verbose, page_size, json },
            &mut writer,
        ),

        Commands::Copy {
            src_root,
            dest_root,
            disk_id,
            fid,
            head_commit,
            head_size,
            data_commit,
            data_size,
            sma_commit,
            sma_size,
            sst,
        } => cli::copy::execute(
            &cli::copy::CopyOptions {
                src_root,
                dest_root,
                disk_id,
                fid,
                head_commit,
                head_size,
                data_commit,
                data_size,
                sma_commit,
                sma_size,
                sst,
            },
            &mut writer,
        ),

        Commands::Corrupt { file, page, bytes, trailer, page_size, json } => cli::corrupt::execute(
            &cli::corrupt::CorruptOptions { file, page, bytes, trailer, page_size, json },
            &mut writer,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
