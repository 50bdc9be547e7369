//! # Localnet Harness
//!
//! Lifecycle harness for running end-to-end test suites against a local
//! test network of node processes.
//!
//! ## What a run does
//!
//! 1. **Acquire** a node binary (release download, git + cargo build, or a
//!    local file) and install it under the network directory.
//! 2. **Start** a small local network from that binary and wait until every
//!    node survived its startup grace period.
//! 3. **Run** each configured suite script in order with a PATH that
//!    resolves the freshly installed binaries first. First failure ends the
//!    run.
//! 4. **Tear down** the network unconditionally, collecting node log tails
//!    and a JSON run report when anything failed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use localnet_harness::{config::Config, runner::Harness};
//! use clap::Parser;
//!
//! let config = Config::parse();
//! let report = Harness::new(config).run().await;
//! report.print();
//! std::process::exit(report.exit_code());
//! ```
//!
//! ## Design Principles
//!
//! 1. **Single pass**: no retries anywhere; CI reruns the whole job instead
//! 2. **Guaranteed teardown**: every exit path stops the network, ctrl-c
//!    included
//! 3. **No ambient state**: configuration is threaded through explicitly,
//!    PATH is set on child processes only
//! 4. **Opaque network**: nodes are black boxes, the harness only watches
//!    process liveness

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Node binary acquisition (release download, source build, local file)
pub mod acquire;

/// CLI and config-file configuration
pub mod config;

/// Error kinds, one per run phase
pub mod error;

/// Failure-time log collection
pub mod logs;

/// Network session lifecycle (spawn, liveness, teardown)
pub mod network;

/// Run reports and their persistence
pub mod report;

/// Run sequencing with guaranteed cleanup
pub mod runner;

/// Test suite execution
pub mod suite;

// Re-export commonly used types at crate root
pub use error::{AcquisitionError, CleanupError, HarnessError, StartupError, TestFailure};
pub use network::{NetworkSession, SessionState};
pub use report::{RunReport, RunStatus};
pub use runner::Harness;
pub use suite::TestRun;

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
