//! Daemon error types with associated exit codes.
//!
//! [`CliError`] is the top-level error type for the `cpmd` binary. Every
//! variant maps to a stable exit code via [`CliError::exit_code`]:
//!
//! - Exit code **2** — startup failure: a repository directory or the
//!   socket could not be used at all.
//! - Exit code **1** — runtime failure after a successful start.
use std::fmt;
use std::path::PathBuf;

/// All error conditions that terminate the `cpmd` binary.
#[derive(Debug)]
pub enum CliError {
    // --- Exit code 2: startup failures ---
    /// A repository directory exists but could not be read.
    RepositoryUnreadable {
        /// The directory that failed.
        path: PathBuf,
        /// The underlying I/O error message.
        detail: String,
    },

    /// No socket path was given and $HOME is not set, so the default
    /// location cannot be computed.
    NoSocketPath,

    /// The socket could not be created or bound.
    SocketBind {
        /// The socket path.
        path: PathBuf,
        /// The underlying I/O error message.
        detail: String,
    },

    // --- Exit code 1: runtime failures ---
    /// The accept loop died with an unrecoverable I/O error.
    Serve {
        /// The underlying I/O error message.
        detail: String,
    },
}

impl CliError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::RepositoryUnreadable { .. } | Self::NoSocketPath | Self::SocketBind { .. } => 2,
            Self::Serve { .. } => 1,
        }
    }

    /// Returns a human-readable error message suitable for printing to
    /// stderr.
    pub fn message(&self) -> String {
        match self {
            Self::RepositoryUnreadable { path, detail } => {
                format!(
                    "error: cannot read repository directory {}: {detail}",
                    path.display()
                )
            }
            Self::NoSocketPath => {
                "error: no socket path: pass --socket or set $HOME".to_owned()
            }
            Self::SocketBind { path, detail } => {
                format!("error: cannot bind socket {}: {detail}", path.display())
            }
            Self::Serve { detail } => format!("error: accept loop failed: {detail}"),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn startup_failures_are_exit_2() {
        let e = CliError::RepositoryUnreadable {
            path: PathBuf::from("cib"),
            detail: "permission denied".to_owned(),
        };
        assert_eq!(e.exit_code(), 2);
        assert_eq!(CliError::NoSocketPath.exit_code(), 2);
        let e = CliError::SocketBind {
            path: PathBuf::from("/run/cpmd.sock"),
            detail: "address in use".to_owned(),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn runtime_failures_are_exit_1() {
        let e = CliError::Serve {
            detail: "broken".to_owned(),
        };
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn messages_contain_the_path() {
        let e = CliError::SocketBind {
            path: PathBuf::from("/run/cpmd.sock"),
            detail: "address in use".to_owned(),
        };
        let msg = e.message();
        assert!(msg.contains("/run/cpmd.sock"), "message: {msg}");
        assert!(msg.contains("address in use"), "message: {msg}");
    }

    #[test]
    fn display_matches_message() {
        let e = CliError::NoSocketPath;
        assert_eq!(format!("{e}"), e.message());
    }
}
