//! Run sequencing.
//!
//! [`Harness::run`] drives one complete pass: acquire the node binary,
//! start the network, run every configured suite in order, then tear the
//! network down whatever happened before. Diagnostics (log tails, run
//! report) are gathered on failure before teardown finishes, and ctrl-c is
//! routed through the same cleanup path as any other failure.

use std::path::Path;
use std::time::Instant;

use log::{error, info, warn};

use crate::acquire::acquire_node_binary;
use crate::config::Config;
use crate::error::{HarnessError, HarnessResult, TestFailure};
use crate::logs::{collect_logs, LogBundle};
use crate::network::NetworkSession;
use crate::report::{ReportMetadata, RunReport, RunStatus};
use crate::suite::{run_suite, TestRun};

/// One harness invocation.
pub struct Harness {
    config: Config,
}

impl Harness {
    /// Create a harness for `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Drive one complete run and return its report.
    ///
    /// The sequencing is a single pass with no retries: acquisition and
    /// startup failures are fatal, the first failing suite ends the run.
    /// Teardown is guaranteed on every path, including ctrl-c. The report
    /// is persisted under the artifacts directory when the run did not
    /// pass.
    pub async fn run(&self) -> RunReport {
        let started = Instant::now();

        // session and results live outside the driven future so cleanup
        // still sees them when ctrl-c cancels it mid-flight
        let mut session: Option<NetworkSession> = None;
        let mut passed_suites: Vec<TestRun> = Vec::new();

        let result = tokio::select! {
            result = self.drive(&mut session, &mut passed_suites) => result,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cleaning up");
                Err(HarnessError::Interrupted)
            }
        };

        let (status, failure, failing_exit_code) = classify(&result);
        if let Some(reason) = &failure {
            error!("{}", reason);
        }

        // diagnostics first: tails must be read before teardown completes
        let logs = match (&result, session.as_ref()) {
            (Err(_), Some(network)) => {
                collect_logs(network, self.config.suite.tail_lines).await
            }
            _ => LogBundle::default(),
        };

        if let Some(network) = session.as_mut() {
            network.stop().await;
        }

        let report = RunReport {
            metadata: ReportMetadata {
                harness_version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            status,
            passed_suites,
            failure,
            failing_exit_code,
            logs,
        };

        if report.status == RunStatus::Passed {
            info!(
                "Run passed: {} suite(s) in {} ms",
                report.passed_suites.len(),
                report.metadata.duration_ms
            );
        } else {
            match report.save(self.config.network.artifacts_dir()).await {
                Ok(path) => info!("Run report saved to {}", path.display()),
                Err(e) => warn!("Failed to save run report: {:#}", e),
            }
        }

        report
    }

    async fn drive(
        &self,
        session: &mut Option<NetworkSession>,
        passed_suites: &mut Vec<TestRun>,
    ) -> HarnessResult<()> {
        let binary = acquire_node_binary(&self.config).await?;

        let network = session.insert(NetworkSession::new(
            binary,
            self.config.network.clone(),
        ));
        network.start().await?;

        if self.config.suites.is_empty() {
            warn!("No suites configured; the run only checks that the network comes up");
        }
        for script in &self.config.suites {
            let run = run_suite(network, Path::new(script), &self.config.suite).await?;
            passed_suites.push(run);
        }
        Ok(())
    }
}

/// Map a drive result onto the reported status, failure text and the
/// failing suite's exit code (when there is one).
fn classify(result: &HarnessResult<()>) -> (RunStatus, Option<String>, Option<i32>) {
    match result {
        Ok(()) => (RunStatus::Passed, None, None),
        Err(e @ HarnessError::Tests(TestFailure::SuiteFailed { code, .. })) => {
            (RunStatus::TestsFailed, Some(e.to_string()), Some(*code))
        }
        Err(e @ HarnessError::Tests(_)) => (RunStatus::TestsFailed, Some(e.to_string()), None),
        Err(e) => (RunStatus::Fatal, Some(e.to_string()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AcquisitionError, StartupError};
    use std::time::Duration;

    #[test]
    fn classify_passes_suite_exit_codes_through() {
        let result: HarnessResult<()> = Err(TestFailure::SuiteFailed {
            name: "wallet_smoke".to_string(),
            code: 5,
        }
        .into());
        let (status, failure, code) = classify(&result);
        assert_eq!(status, RunStatus::TestsFailed);
        assert_eq!(code, Some(5));
        assert!(failure.unwrap().contains("wallet_smoke"));
    }

    #[test]
    fn classify_treats_timeouts_as_test_failures_without_a_code() {
        let result: HarnessResult<()> = Err(TestFailure::TimedOut {
            name: "slow".to_string(),
            timeout: Duration::from_secs(1),
        }
        .into());
        let (status, _, code) = classify(&result);
        assert_eq!(status, RunStatus::TestsFailed);
        assert_eq!(code, None);
    }

    #[test]
    fn classify_marks_early_phases_fatal() {
        let acquisition: HarnessResult<()> =
            Err(AcquisitionError::Config("no source".to_owned()).into());
        assert_eq!(classify(&acquisition).0, RunStatus::Fatal);

        let startup: HarnessResult<()> =
            Err(StartupError::Config("node_count must be at least 1".to_owned()).into());
        assert_eq!(classify(&startup).0, RunStatus::Fatal);

        let interrupted: HarnessResult<()> = Err(HarnessError::Interrupted);
        let (status, failure, _) = classify(&interrupted);
        assert_eq!(status, RunStatus::Fatal);
        assert_eq!(failure.unwrap(), "Run interrupted");
    }

    #[test]
    fn classify_reports_success_with_no_failure_text() {
        let (status, failure, code) = classify(&Ok(()));
        assert_eq!(status, RunStatus::Passed);
        assert!(failure.is_none());
        assert!(code.is_none());
    }
}
