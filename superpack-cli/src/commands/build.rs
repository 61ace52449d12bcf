//! Build a superpack from a directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use console::style;
use superpack::format::{Compression, PackWriter, PACK_EXTENSION};
use superpack::hash::Sha256Hasher;

use super::format_size;
use crate::error::{io_error, CliError};

/// Compression applied to every file in the archive.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionArg {
    /// Store files as they are
    None,
    /// Deflate each file
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Compression::None,
            CompressionArg::Deflate => Compression::Deflate,
        }
    }
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory whose contents become the pack
    pub source: PathBuf,

    /// Output archive (defaults to <source>.spak)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Per-file compression
    #[arg(short, long, value_enum, default_value_t = CompressionArg::Deflate)]
    pub compression: CompressionArg,
}

pub fn run(args: BuildArgs) -> Result<(), CliError> {
    if !args.source.is_dir() {
        return Err(CliError::Config(format!(
            "{} is not a directory",
            args.source.display()
        )));
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.source.with_extension(PACK_EXTENSION));

    let mut files = Vec::new();
    collect_files(&args.source, &mut files)?;
    files.sort();

    let mut writer = PackWriter::new();
    let mut original = 0u64;
    for path in &files {
        let relative = relative_path(&args.source, path)?;
        let data = fs::read(path).map_err(io_error(path))?;
        original += data.len() as u64;
        writer.add_file(&relative, data, args.compression.into())?;
    }

    let archive = writer.finish(&Sha256Hasher)?;
    fs::write(&output, &archive).map_err(io_error(&output))?;

    tracing::info!(
        source = %args.source.display(),
        output = %output.display(),
        files = files.len(),
        "Built superpack"
    );
    println!(
        "{} {} ({} files, {} → {})",
        style("Built").green().bold(),
        output.display(),
        files.len(),
        format_size(original),
        format_size(archive.len() as u64)
    );
    Ok(())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), CliError> {
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// `path` relative to `root`, with `/` separators.
fn relative_path(root: &Path, path: &Path) -> Result<String, CliError> {
    let relative = path.strip_prefix(root).map_err(|_| {
        CliError::Config(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}
