//! Show the acquisition order for a pack.

use std::path::PathBuf;

use clap::Args;
use console::style;
use superpack::resolve::collect_downloadable_dependencies;
use superpack::PackIndex;

use super::format_size;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct DepsArgs {
    /// Pack manifest (JSON)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Pack to resolve
    pub pack: String,
}

pub fn run(args: DepsArgs) -> Result<(), CliError> {
    let index = PackIndex::load(&args.manifest)?;
    if !index.contains(&args.pack) {
        return Err(CliError::Config(format!(
            "pack {} is not in {}",
            args.pack,
            args.manifest.display()
        )));
    }

    let mut order = collect_downloadable_dependencies(&index, &args.pack)?;
    order.push(args.pack.clone());

    let mut total = 0;
    for (position, name) in order.iter().enumerate() {
        let size = index.get(name).map(|p| p.size).unwrap_or(0);
        total += size;
        let label = if *name == args.pack {
            style(name.as_str()).bold()
        } else {
            style(name.as_str())
        };
        println!("{:>3}. {} ({})", position + 1, label, format_size(size));
    }
    println!("Total: {}", format_size(total));
    Ok(())
}
