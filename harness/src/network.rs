//! Local network lifecycle.
//!
//! A [`NetworkSession`] owns every node process of one local test network.
//! Nodes are plain OS processes spawned from the acquired binary; the
//! harness never speaks their protocol, it only checks that they stay alive
//! and tears them down at the end of the run.
//!
//! Each node `i` is launched as
//! `<binary> --data-dir <network-dir>/nodes/node-NN --p2p-bind 127.0.0.1:<base_port+i>`
//! plus any configured extra arguments. The first node additionally gets
//! `--genesis`; every later node gets `--peer 127.0.0.1:<base_port>` so it
//! joins the network the first node formed. Node output (stdout and stderr)
//! goes to `node.log` inside the node's data directory.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::process::{Child, Command};

use crate::config::NetworkConfig;
use crate::error::{CleanupError, StartupError, TestFailure};
use crate::logs::{node_label, node_log_path};

/// Lifecycle state of a [`NetworkSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No node process has been spawned yet.
    NotStarted,
    /// All nodes are up and the network accepts test traffic.
    Running,
    /// Teardown ran; every node was asked to exit.
    Stopped,
    /// Startup failed; spawned nodes are torn down by the cleanup path.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "NotStarted",
            SessionState::Running => "Running",
            SessionState::Stopped => "Stopped",
            SessionState::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// One spawned node process.
struct NodeProcess {
    index: usize,
    child: Child,
    log_path: PathBuf,
}

/// A local test network of node processes.
///
/// At most one session is active per harness invocation. The session moves
/// through [`SessionState`] in one direction only; a stopped session cannot
/// be restarted.
pub struct NetworkSession {
    binary: PathBuf,
    config: NetworkConfig,
    nodes: Vec<NodeProcess>,
    state: SessionState,
}

impl NetworkSession {
    /// Create a session that will run `config.node_count` copies of `binary`.
    ///
    /// No process is spawned until [`start`](Self::start) is called.
    pub fn new(binary: PathBuf, config: NetworkConfig) -> Self {
        Self {
            binary,
            config,
            nodes: Vec::new(),
            state: SessionState::NotStarted,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bring the network up.
    ///
    /// Spawns the first node, waits for the genesis grace period, spawns the
    /// remaining nodes pointed at it, then waits for the startup grace period
    /// and verifies no node has exited. On success the session is `Running`.
    ///
    /// On failure the session is marked `Failed` and already-spawned nodes
    /// are left to the guaranteed [`stop`](Self::stop) call of the cleanup
    /// path, so their logs are still on disk for collection.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.state != SessionState::NotStarted {
            return Err(StartupError::AlreadyStarted(self.state.to_string()));
        }
        match self.bring_up().await {
            Ok(()) => {
                self.state = SessionState::Running;
                info!(
                    "Network up: {} node(s) listening from port {}",
                    self.nodes.len(),
                    self.config.base_port
                );
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Tear the network down, best-effort.
    ///
    /// Kills every node that is still alive and ignores the ones that
    /// already exited. Failures are logged and swallowed: this runs during
    /// failure cleanup and must not mask the original error. Calling it on
    /// an already stopped session is a no-op.
    pub async fn stop(&mut self) {
        match self.state {
            SessionState::Stopped => {
                debug!("Session already stopped");
                return;
            }
            SessionState::NotStarted => {
                self.state = SessionState::Stopped;
                return;
            }
            SessionState::Running | SessionState::Failed => {}
        }

        info!("Stopping network ({} node(s))", self.nodes.len());
        let kills = self.nodes.iter_mut().map(|node| async move {
            // a node that already exited is not an error during teardown
            if let Ok(Some(status)) = node.child.try_wait() {
                debug!("Node {} already exited with {}", node.index, status);
                return None;
            }
            match node.child.kill().await {
                Ok(()) => None,
                Err(source) => Some(CleanupError::KillFailed {
                    index: node.index,
                    source,
                }),
            }
        });
        for failure in join_all(kills).await.into_iter().flatten() {
            warn!("{}", failure);
        }
        self.state = SessionState::Stopped;
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when the network accepts test traffic.
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    /// `(label, log path)` of every spawned node, for log collection.
    pub fn log_sources(&self) -> Vec<(String, PathBuf)> {
        self.nodes
            .iter()
            .map(|node| (node_label(node.index), node.log_path.clone()))
            .collect()
    }

    /// Directory holding the node binary, prepended to suite PATHs.
    pub fn bin_dir(&self) -> PathBuf {
        self.config.bin_dir()
    }

    /// Directory suite output is captured into.
    pub fn suites_dir(&self) -> PathBuf {
        self.config.suites_dir()
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Ensure the network is running, return error if not.
    pub(crate) fn ensure_running(&self) -> Result<(), TestFailure> {
        if !self.is_running() {
            return Err(TestFailure::NetworkNotRunning(self.state.to_string()));
        }
        Ok(())
    }

    async fn bring_up(&mut self) -> Result<(), StartupError> {
        self.validate()?;
        info!(
            "Starting local network: {} node(s) from {}",
            self.config.node_count,
            self.binary.display()
        );

        // the first node forms the network on its own
        let first = self.spawn_node(0).await?;
        self.nodes.push(first);
        tokio::time::sleep(self.config.genesis_grace).await;
        self.check_alive()?;

        for index in 1..self.config.node_count {
            let node = self.spawn_node(index).await?;
            self.nodes.push(node);
        }

        // nodes that die right after exec are caught here instead of mid-suite
        tokio::time::sleep(self.config.startup_grace).await;
        self.check_alive()?;
        Ok(())
    }

    fn validate(&self) -> Result<(), StartupError> {
        if self.config.node_count == 0 {
            return Err(StartupError::Config(
                "node_count must be at least 1".to_owned(),
            ));
        }
        let max_port = self.config.base_port as usize + self.config.node_count - 1;
        if max_port > u16::MAX as usize {
            return Err(StartupError::Config(format!(
                "port range {}..={} exceeds 65535",
                self.config.base_port, max_port
            )));
        }
        Ok(())
    }

    async fn spawn_node(&self, index: usize) -> Result<NodeProcess, StartupError> {
        let node_dir = self.config.nodes_dir().join(node_label(index));
        // fresh data dir per run
        if let Err(e) = tokio::fs::remove_dir_all(&node_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }
        tokio::fs::create_dir_all(&node_dir).await?;

        let log_path = node_log_path(&node_dir);
        let log_file = std::fs::File::create(&log_path)?;
        let stderr_file = log_file.try_clone()?;

        let port = self.node_port(index);
        let mut command = Command::new(&self.binary);
        command
            .arg("--data-dir")
            .arg(&node_dir)
            .arg("--p2p-bind")
            .arg(format!("127.0.0.1:{}", port));
        if index == 0 {
            command.arg("--genesis");
        } else {
            command
                .arg("--peer")
                .arg(format!("127.0.0.1:{}", self.node_port(0)));
        }
        command
            .args(&self.config.node_args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            // don't leak nodes if the harness future itself is dropped
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|source| StartupError::SpawnFailed { index, source })?;
        debug!(
            "Spawned node {} (pid {:?}) on port {}",
            index,
            child.id(),
            port
        );
        Ok(NodeProcess {
            index,
            child,
            log_path,
        })
    }

    fn check_alive(&mut self) -> Result<(), StartupError> {
        for node in &mut self.nodes {
            if let Some(status) = node.child.try_wait()? {
                return Err(StartupError::NodeExited {
                    index: node.index,
                    status,
                });
            }
        }
        Ok(())
    }

    fn node_port(&self, index: usize) -> u16 {
        self.config.base_port + index as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn network_config(dir: &std::path::Path) -> NetworkConfig {
        NetworkConfig {
            node_count: 1,
            base_port: 46000,
            network_dir: dir.to_string_lossy().into_owned(),
            node_args: Vec::new(),
            genesis_grace: Duration::from_millis(10),
            startup_grace: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn fresh_session_is_not_started() {
        let dir = tempfile::tempdir().unwrap();
        let session = NetworkSession::new(PathBuf::from("/bin/true"), network_config(dir.path()));
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(!session.is_running());
        assert!(session.log_sources().is_empty());
    }

    #[tokio::test]
    async fn stop_before_start_is_a_noop_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            NetworkSession::new(PathBuf::from("/bin/true"), network_config(dir.path()));

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);

        // second stop must not do anything either
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn start_refuses_a_stopped_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            NetworkSession::new(PathBuf::from("/bin/true"), network_config(dir.path()));
        session.stop().await;

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, StartupError::AlreadyStarted(state) if state == "Stopped"));
    }

    #[tokio::test]
    async fn ensure_running_names_the_state() {
        let dir = tempfile::tempdir().unwrap();
        let session = NetworkSession::new(PathBuf::from("/bin/true"), network_config(dir.path()));

        let err = session.ensure_running().unwrap_err();
        assert!(err.to_string().contains("NotStarted"));
    }

    #[tokio::test]
    async fn zero_nodes_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = network_config(dir.path());
        config.node_count = 0;
        let mut session = NetworkSession::new(PathBuf::from("/bin/true"), config);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Config(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn port_range_overflow_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = network_config(dir.path());
        config.base_port = 65530;
        config.node_count = 10;
        let mut session = NetworkSession::new(PathBuf::from("/bin/true"), config);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, StartupError::Config(_)));
    }

    #[test]
    fn session_state_displays_plainly() {
        assert_eq!(SessionState::Running.to_string(), "Running");
        assert_eq!(SessionState::NotStarted.to_string(), "NotStarted");
    }
}
