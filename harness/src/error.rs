//! Error types for the harness lifecycle.
//!
//! Each phase of a run has its own error enum so callers can tell a broken
//! toolchain apart from a failing test suite. Cleanup problems are reported
//! through [`CleanupError`] but are never propagated: teardown is best-effort
//! and must not mask the failure that triggered it.

use std::io::Error as IoError;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Error type for node binary acquisition.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// I/O error while staging or installing the binary.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The release archive could not be downloaded.
    #[error("Failed to download {url}: {source}")]
    DownloadFailed {
        /// URL of the release archive.
        url: String,
        /// Underlying HTTP client error.
        source: reqwest::Error,
    },

    /// The release server answered with a non-success status.
    #[error("Download of {url} rejected with HTTP status {status}")]
    UnexpectedStatus {
        /// URL of the release archive.
        url: String,
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// An external command of the acquisition pipeline failed.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        /// Rendered command line.
        command: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// An external command of the acquisition pipeline could not be spawned.
    #[error("Failed to run `{command}`: {source}")]
    CommandSpawn {
        /// Rendered command line.
        command: String,
        /// Underlying spawn error.
        source: IoError,
    },

    /// The expected binary was not present after download or build.
    #[error("Node binary not found at {0} after acquisition")]
    BinaryMissing(PathBuf),

    /// A local source path does not exist.
    #[error("Local node binary {0} does not exist")]
    LocalSourceMissing(PathBuf),

    /// The node source selection is missing or ambiguous.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error type for network startup.
#[derive(Error, Debug)]
pub enum StartupError {
    /// I/O error while preparing node directories or spawning.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// A node process could not be spawned.
    #[error("Failed to spawn node {index}: {source}")]
    SpawnFailed {
        /// Zero-based node index.
        index: usize,
        /// Underlying spawn error.
        source: IoError,
    },

    /// A node exited during the startup grace period.
    #[error("Node {index} exited during startup with {status}")]
    NodeExited {
        /// Zero-based node index.
        index: usize,
        /// Exit status of the dead node.
        status: ExitStatus,
    },

    /// `start` was called on a session that already ran.
    #[error("Session already started (state: {0})")]
    AlreadyStarted(String),

    /// The requested topology cannot be spawned.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Error type for a test suite run.
#[derive(Error, Debug)]
pub enum TestFailure {
    /// The suite script could not be spawned.
    #[error("Failed to spawn suite `{name}`: {source}")]
    SpawnFailed {
        /// Suite name (file stem of the script).
        name: String,
        /// Underlying spawn error.
        source: IoError,
    },

    /// The suite exited with a non-zero code.
    #[error("Suite `{name}` failed with exit code {code}")]
    SuiteFailed {
        /// Suite name (file stem of the script).
        name: String,
        /// Exit code reported by the suite.
        code: i32,
    },

    /// The suite was killed by a signal before exiting.
    #[error("Suite `{name}` was terminated by a signal")]
    Terminated {
        /// Suite name (file stem of the script).
        name: String,
    },

    /// The suite exceeded its deadline and was killed.
    #[error("Suite `{name}` timed out after {timeout:?}")]
    TimedOut {
        /// Suite name (file stem of the script).
        name: String,
        /// Deadline that was exceeded.
        timeout: Duration,
    },

    /// A suite was requested while the network is not running.
    #[error("Network is not running (state: {0})")]
    NetworkNotRunning(String),

    /// I/O error while capturing suite output.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Error type for session teardown. Logged, never propagated.
#[derive(Error, Debug)]
pub enum CleanupError {
    /// A node process could not be killed.
    #[error("Failed to kill node {index}: {source}")]
    KillFailed {
        /// Zero-based node index.
        index: usize,
        /// Underlying kill error.
        source: IoError,
    },
}

/// Top-level error for a harness run.
///
/// [`CleanupError`] is deliberately absent: teardown failures are logged by
/// [`NetworkSession::stop`](crate::network::NetworkSession::stop) and
/// swallowed.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// Acquiring the node binary failed.
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Bringing the network up failed.
    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    /// A test suite failed, timed out, or could not be launched.
    #[error("Test run failed: {0}")]
    Tests(#[from] TestFailure),

    /// The run was interrupted (ctrl-c) before completion.
    #[error("Run interrupted")]
    Interrupted,
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
