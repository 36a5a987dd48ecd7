//! The request socket: accept loop, per-connection handling, and shutdown
//! signals.
//!
//! The daemon is deliberately single-threaded: one connection is accepted,
//! read to EOF, evaluated, answered, and closed before the next accept. The
//! entire pipeline runs synchronously between the two I/O boundaries, so
//! responses for a fixed repository are deterministic.
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use cpm_core::{DEFAULT_RESULTS, Engine, decode_request, encode_candidates};

use crate::error::CliError;

/// Set by the signal handler; checked once per accept-loop turn.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Installs SIGINT/SIGTERM handlers that flag the accept loop to stop.
///
/// `sigaction` is used without `SA_RESTART` so that a pending `accept` is
/// interrupted (returns `EINTR`) and the loop can observe the flag.
pub fn install_shutdown_handlers() {
    // SAFETY: sigaction with a zeroed struct, an async-signal-safe handler
    // that only stores to an AtomicBool, and an emptied signal mask is a
    // well-defined use of the libc API. Called once during single-threaded
    // startup.
    //
    // The workspace denies `unsafe_code` globally; this is the minimal
    // unavoidable libc use for signal handling on Unix, so the allow is
    // scoped to this block.
    let handler = request_shutdown as extern "C" fn(libc::c_int);
    #[allow(unsafe_code)]
    {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handler as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
            libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
        }
    }
}

/// Evaluates one request document and returns the response body (without
/// the trailing newline).
///
/// A malformed request yields the empty result `[]`; the daemon never
/// fails a connection because of request contents.
pub fn process_request(engine: &Engine, input: &str) -> String {
    let (request, warnings) = match decode_request(input) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("discarding request: {e}");
            return "[]".to_owned();
        }
    };
    for warning in &warnings {
        warn!("{warning}");
    }

    debug!("request: {request}");
    let candidates = engine.lookup(&request, DEFAULT_RESULTS);
    info!("{} candidates generated", candidates.len());
    for candidate in &candidates {
        debug!("candidate {candidate}");
    }
    encode_candidates(&candidates)
}

/// Serves one connection: read to EOF, evaluate, answer, close.
///
/// A client that disconnects before the response is written just loses the
/// response; nothing is retried and no partial write is left behind.
pub(crate) fn handle_client(engine: &Engine, mut stream: UnixStream) {
    let mut input = String::new();
    if let Err(e) = stream.read_to_string(&mut input) {
        warn!("dropping connection: {e}");
        return;
    }

    let mut response = process_request(engine, input.trim());
    response.push('\n');
    if let Err(e) = stream.write_all(response.as_bytes()) {
        warn!("client disconnected before the response was written: {e}");
    }
}

/// Binds the socket and serves until a shutdown signal arrives.
///
/// A stale socket file at `socket_path` is unlinked before binding; the
/// file is removed again on the way out.
///
/// # Errors
///
/// [`CliError::SocketBind`] when the socket cannot be created,
/// [`CliError::Serve`] when the accept loop dies.
pub fn run(engine: &Engine, socket_path: &Path) -> Result<(), CliError> {
    if let Some(parent) = socket_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CliError::SocketBind {
                path: socket_path.to_path_buf(),
                detail: e.to_string(),
            })?;
        }
    }
    if socket_path.exists() {
        debug!("removing stale socket {}", socket_path.display());
        if let Err(e) = fs::remove_file(socket_path) {
            warn!("cannot remove stale socket: {e}");
        }
    }

    let listener = UnixListener::bind(socket_path).map_err(|e| CliError::SocketBind {
        path: socket_path.to_path_buf(),
        detail: e.to_string(),
    })?;
    info!("listening on {}", socket_path.display());

    let result = accept_loop(engine, &listener);

    drop(listener);
    if let Err(e) = fs::remove_file(socket_path) {
        warn!("cannot remove socket on shutdown: {e}");
    }
    info!("socket closed");
    result
}

fn accept_loop(engine: &Engine, listener: &UnixListener) -> Result<(), CliError> {
    loop {
        if SHUTDOWN.load(Ordering::SeqCst) {
            info!("shutdown requested");
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                debug!("incoming connection");
                handle_client(engine, stream);
            }
            // a signal interrupted accept; the loop re-checks the flag
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(CliError::Serve {
                    detail: e.to_string(),
                });
            }
        }
    }
}
