//! Test suite execution.
//!
//! A suite is an external executable (usually a shell script driving the
//! CLI) run against a running network. The harness gives it the inherited
//! environment plus a PATH that resolves the node binary and any configured
//! tool directories first, captures its combined output to a file, and
//! enforces a hard deadline. Exit code 0 is a pass, anything else a failure;
//! there are no retries.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::SuiteConfig;
use crate::error::TestFailure;
use crate::network::NetworkSession;

/// Outcome of one suite script run against a running network.
///
/// Only produced for passing suites; every other outcome is a
/// [`TestFailure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Suite name (file stem of the script).
    pub name: String,
    /// Script path as configured.
    pub script: PathBuf,
    /// Exit code reported by the script.
    pub exit_code: i32,
    /// File the combined stdout/stderr was captured to.
    pub output_path: PathBuf,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Run one suite script against `session`.
///
/// The network must be running; [`TestFailure::NetworkNotRunning`] is
/// returned before anything is spawned otherwise. A suite that outlives
/// `config.suite_timeout` is killed and reported as
/// [`TestFailure::TimedOut`].
pub async fn run_suite(
    session: &NetworkSession,
    script: &Path,
    config: &SuiteConfig,
) -> Result<TestRun, TestFailure> {
    session.ensure_running()?;

    let name = suite_name(script);
    let output_dir = session.suites_dir();
    tokio::fs::create_dir_all(&output_dir).await?;
    let output_path = output_dir.join(format!("{}.log", name));

    let output_file = std::fs::File::create(&output_path)?;
    let stderr_file = output_file.try_clone()?;

    let path_env = suite_path_env(
        &session.bin_dir(),
        &config.tool_dirs,
        env::var_os("PATH").as_deref(),
    )
    .map_err(|e| TestFailure::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    info!("Running suite `{}` ({})", name, script.display());
    debug!("Suite output captured to {}", output_path.display());

    let mut command = Command::new(script);
    command
        // set on the child only, never on the harness process
        .env("PATH", path_env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::from(stderr_file))
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|source| TestFailure::SpawnFailed {
        name: name.clone(),
        source,
    })?;

    let status = match timeout(config.suite_timeout, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!(
                "Suite `{}` exceeded {}, killing it",
                name,
                humantime::format_duration(config.suite_timeout)
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to kill timed out suite `{}`: {}", name, e);
            }
            return Err(TestFailure::TimedOut {
                name,
                timeout: config.suite_timeout,
            });
        }
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match status.code() {
        Some(0) => {
            info!("Suite `{}` passed in {} ms", name, duration_ms);
            Ok(TestRun {
                name,
                script: script.to_path_buf(),
                exit_code: 0,
                output_path,
                duration_ms,
            })
        }
        Some(code) => Err(TestFailure::SuiteFailed { name, code }),
        None => Err(TestFailure::Terminated { name }),
    }
}

/// Build the PATH suite scripts run with.
///
/// Order matters: the harness bin directory first so the acquired node
/// binary shadows any system-wide install, then the configured tool
/// directories, then the inherited PATH.
pub fn suite_path_env(
    bin_dir: &Path,
    tool_dirs: &[String],
    inherited: Option<&OsStr>,
) -> Result<OsString, env::JoinPathsError> {
    let mut paths: Vec<PathBuf> = vec![bin_dir.to_path_buf()];
    paths.extend(tool_dirs.iter().map(PathBuf::from));
    if let Some(inherited) = inherited {
        paths.extend(env::split_paths(inherited));
    }
    env::join_paths(paths)
}

/// Suite name used in logs, reports and output file names.
pub fn suite_name(script: &Path) -> String {
    script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.to_string_lossy().into_owned())
}
