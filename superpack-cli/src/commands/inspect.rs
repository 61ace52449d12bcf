//! Print the footer and file table of a superpack.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use superpack::format::PackArchive;
use superpack::hash::Sha256Hasher;

use super::format_size;
use crate::error::{io_error, CliError};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Archive to inspect
    pub archive: PathBuf,

    /// Skip the content hash check
    #[arg(long)]
    pub no_verify: bool,
}

pub fn run(args: InspectArgs) -> Result<(), CliError> {
    let data = fs::read(&args.archive).map_err(io_error(&args.archive))?;
    let archive = PackArchive::parse(data.into())?;
    let footer = archive.footer();

    println!("{}", style(args.archive.display()).bold());
    println!("  Format version:  {}", footer.version);
    println!("  Archive size:    {}", format_size(footer.archive_size()));
    println!("  Files:           {}", footer.file_count);
    println!(
        "  Stored size:     {} ({} uncompressed)",
        format_size(footer.compressed_size),
        format_size(footer.uncompressed_size)
    );
    println!("  Content hash:    {}", footer.content_hash);

    if args.no_verify {
        println!("  Integrity:       {}", style("not checked").yellow());
    } else {
        match archive.verify(&Sha256Hasher) {
            Ok(()) => println!("  Integrity:       {}", style("ok").green()),
            Err(e) => {
                println!("  Integrity:       {}", style("FAILED").red().bold());
                return Err(e.into());
            }
        }
    }

    println!();
    for entry in archive.entries() {
        println!(
            "  {:>10}  {:>10}  {:<8} {}",
            format_size(entry.original_size),
            format_size(entry.stored_size),
            entry.compression.name(),
            entry.path
        );
    }
    Ok(())
}
