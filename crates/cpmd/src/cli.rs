//! Clap CLI definition: root struct, subcommands, and defaults.
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// The Connection Policy Manager daemon.
///
/// Loads the CIB and PIB repositories, then either serves lookup requests
/// on a Unix-domain socket (`serve`) or prints the expanded repositories
/// (`dump`).
#[derive(Parser)]
#[command(name = "cpmd", version, about)]
pub struct Cli {
    /// Directory containing CIB source files (.cib, .local, .connection).
    #[arg(long, value_name = "DIR", default_value = "cib", env = "CPMD_CIB_DIR")]
    pub cib: PathBuf,

    /// Directory containing profile files (.profile), applied before the CIB.
    #[arg(
        long,
        value_name = "DIR",
        default_value = "pib/profiles",
        env = "CPMD_PROFILE_DIR"
    )]
    pub profiles: PathBuf,

    /// Directory containing policy files (.policy), applied after the CIB.
    #[arg(
        long,
        value_name = "DIR",
        default_value = "pib/policies",
        env = "CPMD_POLICY_DIR"
    )]
    pub policies: PathBuf,

    /// Increase log verbosity (-v = debug, -vv = trace). Overridden by
    /// CPMD_LOG when set.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// All top-level subcommands exposed by the `cpmd` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Bind the request socket and serve lookups until SIGINT/SIGTERM.
    Serve {
        /// Path of the Unix-domain socket to bind. Defaults to
        /// $HOME/.cpm/cpmd.sock.
        #[arg(long, value_name = "PATH", env = "CPMD_SOCKET")]
        socket: Option<PathBuf>,
    },

    /// Print the expanded CIB entries and the registered profiles/policies.
    Dump {
        /// Also expand non-root CIB sources.
        #[arg(long)]
        all: bool,
    },
}
