//! Run reports.
//!
//! Every harness invocation produces a [`RunReport`]: final status, the
//! suites that passed, the failure (if any) and the node log tails collected
//! for it. Failed runs additionally persist the report as pretty JSON under
//! `<network-dir>/artifacts/` so CI can keep it next to the captured logs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::logs::LogBundle;
use crate::suite::TestRun;

/// Metadata identifying one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Harness version that produced the report.
    pub harness_version: String,
    /// Timestamp when the run finished (RFC 3339).
    pub timestamp: String,
    /// Run duration (milliseconds), acquisition included.
    pub duration_ms: u64,
}

/// Final status of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every suite passed.
    Passed,
    /// The network came up but a suite failed, timed out or crashed.
    TestsFailed,
    /// Acquisition or startup failed, or the run was interrupted.
    Fatal,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Passed => "PASSED ✓",
            RunStatus::TestsFailed => "TESTS FAILED ✗",
            RunStatus::Fatal => "FATAL ✗",
        };
        write!(f, "{}", label)
    }
}

/// Complete record of one harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run metadata.
    pub metadata: ReportMetadata,
    /// Final status.
    pub status: RunStatus,
    /// Suites that passed, in execution order.
    pub passed_suites: Vec<TestRun>,
    /// Human-readable description of the failure, if the run failed.
    pub failure: Option<String>,
    /// Exit code of the failing suite, when the failure was a plain
    /// non-zero exit.
    pub failing_exit_code: Option<i32>,
    /// Node log tails collected on failure; empty on success.
    pub logs: LogBundle,
}

impl RunReport {
    /// Process exit code the harness binary should end with.
    ///
    /// A failing suite's own exit code is passed through so CI sees the
    /// same value the script produced; timeouts, signals and fatal errors
    /// map to 1.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::TestsFailed => self.failing_exit_code.unwrap_or(1),
            RunStatus::Fatal => 1,
        }
    }

    /// Save the report as pretty JSON under `output_dir`.
    ///
    /// The filename carries a timestamp for uniqueness. Returns the path of
    /// the written file.
    pub async fn save(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create artifact directory")?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filename = format!("run_{}.json", timestamp);
        let filepath = output_dir.join(filename);

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;

        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create report file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write report data")?;
        file.flush().await.context("Failed to flush report file")?;

        Ok(filepath)
    }

    /// Load a report from disk.
    pub async fn load(filepath: impl AsRef<Path>) -> Result<RunReport> {
        let filepath = filepath.as_ref();
        let content = fs::read_to_string(filepath)
            .await
            .context("Failed to read report file")?;

        let report: RunReport =
            serde_json::from_str(&content).context("Failed to parse report JSON")?;

        Ok(report)
    }

    /// Print the run summary (and any collected log tails) to stdout.
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║  Localnet Harness Run Report                               ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Status: {:<49} ║", self.status.to_string());
        println!("║  Suites passed: {:<42} ║", self.passed_suites.len());
        println!(
            "║  Duration: {:<47} ║",
            format!("{} ms", self.metadata.duration_ms)
        );
        println!("╚════════════════════════════════════════════════════════════╝");

        for run in &self.passed_suites {
            println!("  ✓ {} ({} ms)", run.name, run.duration_ms);
        }
        if let Some(failure) = &self.failure {
            println!("\nFailure: {}", failure);
        }
        if !self.logs.is_empty() {
            println!("\nNode log tails:");
            self.logs.print();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: RunStatus, failing_exit_code: Option<i32>) -> RunReport {
        RunReport {
            metadata: ReportMetadata {
                harness_version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_ms: 1234,
            },
            status,
            passed_suites: Vec::new(),
            failure: None,
            failing_exit_code,
            logs: LogBundle::default(),
        }
    }

    #[test]
    fn exit_codes_follow_the_run_status() {
        assert_eq!(report(RunStatus::Passed, None).exit_code(), 0);
        assert_eq!(report(RunStatus::TestsFailed, Some(3)).exit_code(), 3);
        // timeouts and signals have no script exit code
        assert_eq!(report(RunStatus::TestsFailed, None).exit_code(), 1);
        assert_eq!(report(RunStatus::Fatal, None).exit_code(), 1);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let mut saved = report(RunStatus::TestsFailed, Some(7));
        saved.failure = Some("Suite `wallet_smoke` failed with exit code 7".to_string());

        let filepath = saved.save(temp_dir.path()).await?;
        assert!(filepath.exists());
        assert!(filepath
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("run_"));

        let loaded = RunReport::load(&filepath).await?;
        assert_eq!(loaded.status, RunStatus::TestsFailed);
        assert_eq!(loaded.failing_exit_code, Some(7));
        assert_eq!(loaded.failure, saved.failure);
        assert_eq!(loaded.metadata.duration_ms, 1234);

        Ok(())
    }

    #[test]
    fn report_serializes_suite_results() {
        let mut run_report = report(RunStatus::Passed, None);
        run_report.passed_suites.push(TestRun {
            name: "wallet_smoke".to_string(),
            script: PathBuf::from("suites/wallet_smoke.sh"),
            exit_code: 0,
            output_path: PathBuf::from("localnet/suites/wallet_smoke.log"),
            duration_ms: 88,
        });

        let json = serde_json::to_string_pretty(&run_report).unwrap();
        assert!(json.contains("Passed"));
        assert!(json.contains("wallet_smoke"));

        let deserialized: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.passed_suites.len(), 1);
        assert_eq!(deserialized.passed_suites[0].duration_ms, 88);
    }
}
