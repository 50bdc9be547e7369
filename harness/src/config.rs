use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::VERSION;

/// Directory holding everything a run produces (binaries, node data, logs).
pub const DEFAULT_NETWORK_DIR: &str = "localnet/";
/// File name of the node binary inside release archives and on disk.
pub const DEFAULT_NODE_NAME: &str = "localnet-node";
/// Base URL release archives are downloaded from when none is given.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://releases.localnet.dev/node";
/// Number of node processes forming the network by default.
pub const DEFAULT_NODE_COUNT: usize = 3;
// node i listens on DEFAULT_BASE_PORT + i
/// P2P port of the first node.
pub const DEFAULT_BASE_PORT: u16 = 2125;
/// Number of log lines tailed from each node log on failure.
pub const DEFAULT_TAIL_LINES: usize = 100;
/// Grace period granted to the first node before peers are spawned.
pub const DEFAULT_GENESIS_GRACE: &str = "2s";
/// Grace period granted to the full network before it is declared up.
pub const DEFAULT_STARTUP_GRACE: &str = "3s";
/// Hard deadline for a single test suite script.
pub const DEFAULT_SUITE_TIMEOUT: &str = "30m";

// Functions Helpers
fn default_release_base_url() -> String {
    DEFAULT_RELEASE_BASE_URL.to_owned()
}

fn default_node_name() -> String {
    DEFAULT_NODE_NAME.to_owned()
}

fn default_network_dir() -> String {
    DEFAULT_NETWORK_DIR.to_owned()
}

fn default_node_count() -> usize {
    DEFAULT_NODE_COUNT
}

fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

fn default_tail_lines() -> usize {
    DEFAULT_TAIL_LINES
}

fn default_genesis_grace() -> Duration {
    Duration::from_secs(2)
}

fn default_startup_grace() -> Duration {
    Duration::from_secs(3)
}

fn default_suite_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_log_level() -> String {
    String::from("info")
}

/// Where the node binary comes from.
///
/// Exactly one of `release_version`, `repo_url` or `local_bin` must be set.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct NodeSourceConfig {
    /// Release version to download (e.g. "0.24.0")
    #[clap(long)]
    pub release_version: Option<String>,
    /// Base URL release archives are downloaded from
    ///
    /// The archive is expected at `<base-url>/<name>-<version>-<target>.tar.gz`.
    #[clap(long, default_value = DEFAULT_RELEASE_BASE_URL)]
    #[serde(default = "default_release_base_url")]
    pub release_base_url: String,
    /// Git repository to clone and build the node binary from
    #[clap(long)]
    pub repo_url: Option<String>,
    /// Branch or tag to check out when building from source
    /// By default the repository default branch is used
    #[clap(long)]
    pub repo_branch: Option<String>,
    /// Pre-built node binary to install as-is
    #[clap(long)]
    pub local_bin: Option<String>,
    /// File name the node binary is installed under
    ///
    /// Also the name expected inside release archives and in the
    /// `target/release/` directory of a source build.
    #[clap(long, default_value = DEFAULT_NODE_NAME)]
    #[serde(default = "default_node_name")]
    pub node_name: String,
}

/// Shape of the local network to spawn.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of node processes forming the network
    #[clap(long, default_value_t = DEFAULT_NODE_COUNT)]
    #[serde(default = "default_node_count")]
    pub node_count: usize,
    /// P2P port of the first node
    /// Node `i` listens on `base_port + i`
    #[clap(long, default_value_t = DEFAULT_BASE_PORT)]
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Directory holding binaries, node data and captured output
    ///
    /// By default it will be localnet/ of the current directory.
    #[clap(long, default_value_t = default_network_dir())]
    #[serde(default = "default_network_dir")]
    pub network_dir: String,
    /// Extra argument passed to every node process (repeatable)
    #[clap(long)]
    #[serde(default)]
    pub node_args: Vec<String>,
    /// Grace period granted to the first node before peers are spawned
    #[clap(long, value_parser = humantime::parse_duration, default_value = DEFAULT_GENESIS_GRACE)]
    #[serde(default = "default_genesis_grace")]
    pub genesis_grace: Duration,
    /// Grace period granted to the full network before it is checked
    /// for early exits and declared up
    #[clap(long, value_parser = humantime::parse_duration, default_value = DEFAULT_STARTUP_GRACE)]
    #[serde(default = "default_startup_grace")]
    pub startup_grace: Duration,
}

impl NetworkConfig {
    /// Directory the node binary is installed into.
    pub fn bin_dir(&self) -> PathBuf {
        Path::new(&self.network_dir).join("bin")
    }

    /// Directory holding per-node data directories and log files.
    pub fn nodes_dir(&self) -> PathBuf {
        Path::new(&self.network_dir).join("nodes")
    }

    /// Directory suite output is captured into.
    pub fn suites_dir(&self) -> PathBuf {
        Path::new(&self.network_dir).join("suites")
    }

    /// Directory failure reports are written into.
    pub fn artifacts_dir(&self) -> PathBuf {
        Path::new(&self.network_dir).join("artifacts")
    }

    /// Installed path of the node binary.
    pub fn node_bin_path(&self, name: &str) -> PathBuf {
        self.bin_dir().join(name)
    }
}

/// How test suite scripts are executed.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Hard deadline for a single suite script
    /// A suite exceeding it is killed and reported as timed out
    #[clap(long, value_parser = humantime::parse_duration, default_value = DEFAULT_SUITE_TIMEOUT)]
    #[serde(default = "default_suite_timeout")]
    pub suite_timeout: Duration,
    /// Extra directory prepended to PATH for suite scripts (repeatable)
    ///
    /// The directory holding the node binary is always prepended.
    #[clap(long)]
    #[serde(default)]
    pub tool_dirs: Vec<String>,
    /// Number of log lines tailed from each node log on failure
    #[clap(long, default_value_t = DEFAULT_TAIL_LINES)]
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

/// Harness configuration, from CLI flags or a JSON config file.
#[derive(Parser, Serialize, Deserialize, Clone)]
#[clap(
    version = VERSION,
    about = "Bring up a local test network, run test suites against it, tear it down"
)]
pub struct Config {
    /// Node binary source configuration
    #[clap(flatten)]
    pub source: NodeSourceConfig,
    /// Network topology configuration
    #[clap(flatten)]
    pub network: NetworkConfig,
    /// Suite execution configuration
    #[clap(flatten)]
    pub suite: SuiteConfig,
    /// Test suite scripts to run against the network, in order
    #[serde(default)]
    pub suites: Vec<String>,
    /// Set log level (off, error, warn, info, debug, trace)
    #[clap(long, default_value_t = default_log_level())]
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// JSON File to load the configuration from
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub config_file: Option<String>,
    /// Generate the template at the `config_file` path
    #[clap(long)]
    #[serde(skip)]
    #[serde(default)]
    pub generate_config_template: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse_from(["localnet-harness"]);
        assert_eq!(config.network.node_count, DEFAULT_NODE_COUNT);
        assert_eq!(config.network.base_port, DEFAULT_BASE_PORT);
        assert_eq!(config.network.network_dir, DEFAULT_NETWORK_DIR);
        assert_eq!(config.source.node_name, DEFAULT_NODE_NAME);
        assert_eq!(config.suite.tail_lines, DEFAULT_TAIL_LINES);
        assert!(config.suites.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn duration_flags_accept_humantime() {
        let config = Config::parse_from([
            "localnet-harness",
            "--suite-timeout",
            "90s",
            "--startup-grace",
            "500ms",
            "suites/smoke.sh",
        ]);
        assert_eq!(config.suite.suite_timeout, Duration::from_secs(90));
        assert_eq!(config.network.startup_grace, Duration::from_millis(500));
        assert_eq!(config.suites, vec!["suites/smoke.sh"]);
    }

    #[test]
    fn clap_defaults_match_serde_defaults() {
        // the string consts feed clap, the helper fns feed serde
        assert_eq!(
            humantime::parse_duration(DEFAULT_GENESIS_GRACE).unwrap(),
            default_genesis_grace()
        );
        assert_eq!(
            humantime::parse_duration(DEFAULT_STARTUP_GRACE).unwrap(),
            default_startup_grace()
        );
        assert_eq!(
            humantime::parse_duration(DEFAULT_SUITE_TIMEOUT).unwrap(),
            default_suite_timeout()
        );
    }

    #[test]
    fn config_file_fields_stay_out_of_templates() {
        let config = Config::parse_from(["localnet-harness", "--config-file", "cfg.json"]);
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(!json.contains("config_file"));
        assert!(!json.contains("generate_config_template"));
    }

    #[test]
    fn template_roundtrip() {
        let config = Config::parse_from(["localnet-harness", "--node-count", "5"]);
        let json = serde_json::to_string_pretty(&config).unwrap();
        let reloaded: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.network.node_count, 5);
        assert_eq!(reloaded.suite.suite_timeout, config.suite.suite_timeout);
        assert_eq!(reloaded.source.node_name, config.source.node_name);
        assert!(reloaded.config_file.is_none());
    }

    #[test]
    fn derived_directories_live_under_network_dir() {
        let config = Config::parse_from(["localnet-harness", "--network-dir", "/tmp/run1"]);
        assert_eq!(config.network.bin_dir(), Path::new("/tmp/run1/bin"));
        assert_eq!(config.network.nodes_dir(), Path::new("/tmp/run1/nodes"));
        assert_eq!(config.network.suites_dir(), Path::new("/tmp/run1/suites"));
        assert_eq!(
            config.network.node_bin_path("localnet-node"),
            Path::new("/tmp/run1/bin/localnet-node")
        );
    }
}
