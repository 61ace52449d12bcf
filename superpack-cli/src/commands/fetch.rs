//! Download and mount packs from a pack server.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use superpack::mount::VirtualFileSystem;
use superpack::{PackIndex, PackManager, PackManagerConfig, RequestHandle};

use crate::error::CliError;

/// How often the scheduler is driven.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Packs to fetch
    #[arg(required = true)]
    pub packs: Vec<String>,

    /// Pack manifest (JSON)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// INI configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pack server base URL (overrides config)
    #[arg(long)]
    pub server: Option<String>,

    /// Directory for downloaded packs (overrides config)
    #[arg(long)]
    pub packs_dir: Option<PathBuf>,

    /// Do not keep downloaded packs on disk
    #[arg(long, conflicts_with = "packs_dir")]
    pub no_store: bool,

    /// Requests allowed to download at the same time
    #[arg(long)]
    pub max_requests: Option<usize>,
}

/// Merge the config file with command-line overrides.
fn resolve_config(args: &FetchArgs) -> Result<PackManagerConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => PackManagerConfig::from_ini_file(path)?,
        None => PackManagerConfig::default(),
    };

    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    if let Some(dir) = &args.packs_dir {
        config = config.with_local_packs_dir(dir);
    }
    if args.no_store {
        config = config.without_local_storage();
    }
    if let Some(max) = args.max_requests {
        config = config.with_max_concurrent_requests(max);
    }

    if config.server_url.is_empty() {
        return Err(CliError::Config(
            "No server URL specified. Use --server or set url in the [server] section of the config file."
                .to_string(),
        ));
    }
    Ok(config)
}

pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let config = resolve_config(&args)?;
    let index = PackIndex::load(&args.manifest)?;
    let vfs = Arc::new(VirtualFileSystem::new());
    let manager = PackManager::with_http(config, index, vfs.clone())?;

    let restored = manager.initialize()?;
    if restored > 0 {
        println!("Restored {} pack(s) from local storage", restored);
    }

    let requests = args
        .packs
        .iter()
        .map(|name| manager.request_pack(name))
        .collect::<Result<Vec<_>, _>>()?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        if let Err(e) = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst)) {
            tracing::warn!(error = %e, "Failed to install interrupt handler");
        }
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );

    while !manager.is_idle() {
        if interrupted.load(Ordering::SeqCst) {
            for name in &args.packs {
                manager.cancel(name);
            }
            bar.abandon_with_message("interrupted");
            return Err(CliError::Interrupted);
        }

        manager.update();

        let (downloaded, total) = progress(&requests);
        bar.set_length(total);
        bar.set_position(downloaded);
        if let Some(sub) = requests.iter().find_map(|r| {
            (!r.is_done() && !r.is_error())
                .then(|| r.current_sub_request())
                .flatten()
        }) {
            bar.set_message(format!("{} ({})", sub.pack, sub.status));
        }

        thread::sleep(POLL_INTERVAL);
    }
    bar.finish_and_clear();

    let mut failed = 0;
    for request in &requests {
        let name = request.root_pack();
        if request.is_done() {
            println!("{} {}", style("✓").green(), name);
        } else {
            failed += 1;
            let culprit = request
                .error_pack()
                .map(|p| p.name)
                .unwrap_or_else(|| name.clone());
            println!(
                "{} {} (failed at {}): {}",
                style("✗").red(),
                name,
                culprit,
                request.error_message()
            );
        }
    }
    println!(
        "{} files available from {} mounted pack(s)",
        vfs.files().len(),
        vfs.mounted_packs().len()
    );

    if failed > 0 {
        return Err(CliError::FetchFailed(failed));
    }
    Ok(())
}

fn progress(requests: &[RequestHandle]) -> (u64, u64) {
    requests.iter().fold((0, 0), |(done, total), request| {
        (
            done + request.downloaded_size(),
            total + request.full_size_with_dependencies(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> FetchArgs {
        FetchArgs {
            packs: vec!["core".to_string()],
            manifest: PathBuf::from("packs.json"),
            config: None,
            server: None,
            packs_dir: None,
            no_store: false,
            max_requests: None,
        }
    }

    #[test]
    fn test_server_required() {
        assert!(matches!(resolve_config(&args()), Err(CliError::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let mut args = args();
        args.server = Some("http://localhost:8000".to_string());
        args.no_store = true;
        args.max_requests = Some(3);

        let config = resolve_config(&args).unwrap();
        assert_eq!(config.server_url, "http://localhost:8000");
        assert!(config.local_packs_dir.is_none());
        assert_eq!(config.max_concurrent_requests, 3);
    }

    #[test]
    fn test_config_file_with_override() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("superpack.ini");
        std::fs::write(&path, "[server]\nurl = http://from-file\n").unwrap();

        let mut args = args();
        args.config = Some(path);
        assert_eq!(
            resolve_config(&args).unwrap().server_url,
            "http://from-file"
        );

        args.server = Some("http://from-cli".to_string());
        assert_eq!(resolve_config(&args).unwrap().server_url, "http://from-cli");
    }
}
