pub mod cli;
pub mod error;
pub mod render;
pub mod server;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cpm_core::{Engine, load_cib, load_pib, repository};

use crate::cli::{Cli, Command};
use crate::error::CliError;

fn main() {
    install_sigpipe_default();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(&cli) {
        eprintln!("{}", e.message());
        std::process::exit(e.exit_code());
    }
}

/// Dispatches the parsed CLI arguments to the appropriate command handler.
fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let engine = load_engine(cli)?;

    match &cli.command {
        Command::Serve { socket } => {
            let socket_path = match socket {
                Some(path) => path.clone(),
                None => default_socket_path()?,
            };
            server::install_shutdown_handlers();
            server::run(&engine, &socket_path)
        }
        Command::Dump { all } => {
            print!("{}", render::dump(&engine, *all));
            Ok(())
        }
    }
}

/// Loads all three repositories, logging every load warning.
///
/// A directory that simply does not exist is treated as an empty
/// repository (with a warning) so that a partially configured daemon still
/// starts; a directory that exists but cannot be read is fatal.
fn load_engine(cli: &Cli) -> Result<Engine, CliError> {
    let (cib, warnings) = if cli.cib.is_dir() {
        load_cib(&cli.cib).map_err(|e| CliError::RepositoryUnreadable {
            path: cli.cib.clone(),
            detail: e.to_string(),
        })?
    } else {
        warn!("CIB directory {} not found", cli.cib.display());
        Default::default()
    };
    for warning in &warnings {
        warn!("{warning}");
    }

    let profiles = load_pib_dir(&cli.profiles, repository::PROFILE_EXTENSION)?;
    let policies = load_pib_dir(&cli.policies, repository::POLICY_EXTENSION)?;

    info!(
        "loaded {} CIB sources, {} profiles, {} policies",
        cib.len(),
        profiles.len(),
        policies.len()
    );
    Ok(Engine::new(cib, profiles, policies))
}

fn load_pib_dir(dir: &Path, extension: &str) -> Result<cpm_core::Pib, CliError> {
    if !dir.is_dir() {
        warn!("PIB directory {} not found", dir.display());
        return Ok(cpm_core::Pib::new());
    }
    let (pib, warnings) = load_pib(dir, extension).map_err(|e| CliError::RepositoryUnreadable {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    for warning in &warnings {
        warn!("{warning}");
    }
    Ok(pib)
}

/// Computes the default socket path, `$HOME/.cpm/cpmd.sock`.
fn default_socket_path() -> Result<PathBuf, CliError> {
    let home = std::env::var_os("HOME").ok_or(CliError::NoSocketPath)?;
    Ok(PathBuf::from(home).join(".cpm").join("cpmd.sock"))
}

/// Initialises the tracing subscriber: CPMD_LOG wins when set, otherwise
/// the verbosity flags pick the default level.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("CPMD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resets `SIGPIPE` to its default disposition (`SIG_DFL`).
///
/// Rust's runtime ignores `SIGPIPE` by default, which would surface as
/// `Err(BrokenPipe)` from writes to a closed pipe (e.g. `cpmd dump | head`)
/// rather than the conventional silent termination.
fn install_sigpipe_default() {
    // SAFETY: signal() is safe to call during single-threaded program
    // initialization before any other threads are spawned. SIG_DFL is a
    // valid handler for SIGPIPE. The return value (previous handler) is
    // discarded.
    //
    // The workspace denies `unsafe_code` globally; this is the minimal
    // unavoidable libc use for SIGPIPE handling on Unix, so the allow is
    // scoped to this block.
    #[allow(unsafe_code)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }
}
