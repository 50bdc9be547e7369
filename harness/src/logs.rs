//! Failure-time log collection.
//!
//! When a run fails, the last lines of every node log are gathered into a
//! [`LogBundle`] so CI output carries the diagnostics without anyone having
//! to fish files out of the runner. Collection is best-effort: a node that
//! never produced a log is skipped silently.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::network::NetworkSession;

/// Tail of a single process log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogTail {
    /// Label of the process the log belongs to (e.g. "node-00").
    pub name: String,
    /// Path the lines were read from.
    pub path: PathBuf,
    /// Last lines of the file, oldest first.
    pub lines: Vec<String>,
}

/// Tails collected from every available process log of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogBundle {
    /// One tail per log file that could be read.
    pub tails: Vec<LogTail>,
}

impl LogBundle {
    /// Read the last `tail_lines` lines of every source that exists.
    ///
    /// Sources are `(label, path)` pairs. Unreadable files are skipped.
    pub async fn collect(sources: &[(String, PathBuf)], tail_lines: usize) -> Self {
        let mut tails = Vec::new();
        for (name, path) in sources {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    tails.push(LogTail {
                        name: name.clone(),
                        path: path.clone(),
                        lines: tail(&content, tail_lines),
                    });
                }
                Err(e) => {
                    debug!("Skipping log {}: {}", path.display(), e);
                }
            }
        }
        LogBundle { tails }
    }

    /// True when no log file could be read.
    pub fn is_empty(&self) -> bool {
        self.tails.is_empty()
    }

    /// Print every tail to stdout, one delimited section per process.
    pub fn print(&self) {
        for tail in &self.tails {
            println!();
            println!("========== {} ({}) ==========", tail.name, tail.path.display());
            for line in &tail.lines {
                println!("{}", line);
            }
            println!("========== end of {} ==========", tail.name);
        }
    }
}

/// Collect the tails of every node log of `session`.
///
/// Called on failure only. Never fails itself: a missing or unreadable log
/// file simply does not appear in the bundle.
pub async fn collect_logs(session: &NetworkSession, tail_lines: usize) -> LogBundle {
    let sources = session.log_sources();
    debug!("Collecting {} node logs", sources.len());
    LogBundle::collect(&sources, tail_lines).await
}

fn tail(content: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|s| s.to_string()).collect()
}

/// Label used for node `index` in log bundles and directory names.
pub(crate) fn node_label(index: usize) -> String {
    format!("node-{:02}", index)
}

/// Path of the log file of the node living in `node_dir`.
pub(crate) fn node_log_path(node_dir: &Path) -> PathBuf {
    node_dir.join("node.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_returns_last_lines_in_order() {
        let content = "one\ntwo\nthree\nfour\n";
        assert_eq!(tail(content, 2), vec!["three", "four"]);
        assert_eq!(tail(content, 10), vec!["one", "two", "three", "four"]);
        assert!(tail(content, 0).is_empty());
        assert!(tail("", 5).is_empty());
    }

    #[test]
    fn node_labels_are_zero_padded() {
        assert_eq!(node_label(0), "node-00");
        assert_eq!(node_label(12), "node-12");
    }

    #[tokio::test]
    async fn collect_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.log");
        tokio::fs::write(&present, "alpha\nbeta\n").await.unwrap();

        let sources = vec![
            ("node-00".to_string(), present),
            ("node-01".to_string(), dir.path().join("missing.log")),
        ];
        let bundle = LogBundle::collect(&sources, 10).await;

        assert_eq!(bundle.tails.len(), 1);
        assert_eq!(bundle.tails[0].name, "node-00");
        assert_eq!(bundle.tails[0].lines, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn collect_honors_tail_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.log");
        let content: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        tokio::fs::write(&path, content).await.unwrap();

        let sources = vec![("node-00".to_string(), path)];
        let bundle = LogBundle::collect(&sources, 3).await;

        assert_eq!(bundle.tails[0].lines, vec!["line 47", "line 48", "line 49"]);
    }
}
