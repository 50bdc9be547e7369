//! Node binary acquisition.
//!
//! A run needs an executable node binary before anything else can happen.
//! It can come from a versioned release archive, from a source checkout
//! built with cargo, or from a pre-built file on disk. Whatever the source,
//! the binary ends up at `<network-dir>/bin/<node-name>` with the exec bit
//! set, and every later phase only knows that path.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::{debug, info};
use tokio::process::Command;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::config::{Config, NodeSourceConfig};
use crate::error::AcquisitionError;

const NODE_BIN_PERMS: u32 = 0o755;

/// A resolved node binary source.
#[derive(Debug, Clone)]
pub enum NodeSource {
    /// Download a versioned release archive.
    Release {
        /// Base URL the archive lives under.
        base_url: String,
        /// Release version identifier.
        version: String,
    },
    /// Clone a git repository and build it with `cargo build --release`.
    Repo {
        /// Repository URL understood by `git clone`.
        url: String,
        /// Branch or tag to check out, if not the repository default.
        branch: Option<String>,
    },
    /// Install a binary that already exists on this machine.
    Local {
        /// Path of the pre-built binary.
        path: PathBuf,
    },
}

impl NodeSource {
    /// Resolve which source the run uses. Exactly one must be configured.
    pub fn from_config(config: &NodeSourceConfig) -> Result<Self, AcquisitionError> {
        match (
            &config.release_version,
            &config.repo_url,
            &config.local_bin,
        ) {
            (Some(version), None, None) => Ok(NodeSource::Release {
                base_url: config.release_base_url.clone(),
                version: version.clone(),
            }),
            (None, Some(url), None) => Ok(NodeSource::Repo {
                url: url.clone(),
                branch: config.repo_branch.clone(),
            }),
            (None, None, Some(path)) => Ok(NodeSource::Local {
                path: PathBuf::from(path),
            }),
            (None, None, None) => Err(AcquisitionError::Config(
                "one of --release-version, --repo-url or --local-bin is required".to_owned(),
            )),
            _ => Err(AcquisitionError::Config(
                "--release-version, --repo-url and --local-bin are mutually exclusive".to_owned(),
            )),
        }
    }
}

/// Produce an executable node binary at `<network-dir>/bin/<node-name>`.
///
/// Returns the installed path. Every failure along the way (download,
/// extraction, clone, build, missing file) surfaces as an
/// [`AcquisitionError`]; nothing is retried.
pub async fn acquire_node_binary(config: &Config) -> Result<PathBuf, AcquisitionError> {
    let source = NodeSource::from_config(&config.source)?;
    let bin_dir = config.network.bin_dir();
    tokio::fs::create_dir_all(&bin_dir).await?;
    let installed = config.network.node_bin_path(&config.source.node_name);

    match source {
        NodeSource::Release { base_url, version } => {
            download_release(&base_url, &version, &config.source.node_name, &bin_dir).await?;
        }
        NodeSource::Repo { url, branch } => {
            build_from_repo(
                &url,
                branch.as_deref(),
                &config.source.node_name,
                &bin_dir,
                Path::new(&config.network.network_dir),
            )
            .await?;
        }
        NodeSource::Local { path } => {
            install_local(&path, &installed).await?;
        }
    }

    if !installed.exists() {
        return Err(AcquisitionError::BinaryMissing(installed));
    }
    make_executable(&installed)?;
    info!("Node binary installed at {}", installed.display());
    Ok(installed)
}

async fn download_release(
    base_url: &str,
    version: &str,
    name: &str,
    bin_dir: &Path,
) -> Result<(), AcquisitionError> {
    let url = archive_url(base_url, name, version);
    info!("Downloading node release {} from {}", version, url);

    let response = reqwest::get(&url)
        .await
        .map_err(|source| AcquisitionError::DownloadFailed {
            url: url.clone(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(AcquisitionError::UnexpectedStatus {
            url,
            status: status.as_u16(),
        });
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|source| AcquisitionError::DownloadFailed {
            url: url.clone(),
            source,
        })?;

    let archive_path = bin_dir.join(format!("{}-{}.tar.gz", name, version));
    tokio::fs::write(&archive_path, &bytes).await?;
    debug!(
        "Fetched {} bytes to {}",
        bytes.len(),
        archive_path.display()
    );

    // archives are extracted with the system tar
    let mut extract = Command::new("tar");
    extract.arg("-xzf").arg(&archive_path).arg("-C").arg(bin_dir);
    run_checked(&mut extract).await?;
    tokio::fs::remove_file(&archive_path).await?;
    Ok(())
}

async fn build_from_repo(
    url: &str,
    branch: Option<&str>,
    name: &str,
    bin_dir: &Path,
    work_dir: &Path,
) -> Result<(), AcquisitionError> {
    // fresh checkout every run, stale build trees are not trusted
    let checkout = work_dir.join("node-src");
    if let Err(e) = tokio::fs::remove_dir_all(&checkout).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(e.into());
        }
    }

    let mut clone = Command::new("git");
    clone.arg("clone").arg("--depth").arg("1");
    if let Some(branch) = branch {
        clone.arg("--branch").arg(branch);
    }
    clone.arg(url).arg(&checkout);
    run_checked(&mut clone).await?;

    info!("Building node binary from {}", url);
    let mut build = Command::new("cargo");
    build.arg("build").arg("--release").current_dir(&checkout);
    run_checked(&mut build).await?;

    let built = checkout.join("target").join("release").join(name);
    if !built.exists() {
        return Err(AcquisitionError::BinaryMissing(built));
    }
    tokio::fs::copy(&built, bin_dir.join(name)).await?;
    Ok(())
}

async fn install_local(source: &Path, installed: &Path) -> Result<(), AcquisitionError> {
    if !source.exists() {
        return Err(AcquisitionError::LocalSourceMissing(source.to_path_buf()));
    }
    tokio::fs::copy(source, installed).await?;
    Ok(())
}

/// Run a command to completion, failing on spawn error or non-zero exit.
async fn run_checked(command: &mut Command) -> Result<(), AcquisitionError> {
    let rendered = render(command);
    debug!("Running `{}`", rendered);

    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| AcquisitionError::CommandSpawn {
            command: rendered.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(AcquisitionError::CommandFailed {
            command: rendered,
            status: output.status,
            stderr,
        });
    }
    Ok(())
}

fn render(command: &Command) -> String {
    let std_command = command.as_std();
    let mut parts = vec![std_command.get_program().to_string_lossy().into_owned()];
    parts.extend(
        std_command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned()),
    );
    parts.join(" ")
}

fn archive_url(base_url: &str, name: &str, version: &str) -> String {
    format!(
        "{}/{}-{}-{}.tar.gz",
        base_url.trim_end_matches('/'),
        name,
        version,
        release_target()
    )
}

fn release_target() -> &'static str {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        "x86_64-unknown-linux-gnu"
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        "aarch64-unknown-linux-gnu"
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        "x86_64-apple-darwin"
    } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        "aarch64-apple-darwin"
    } else if cfg!(target_os = "windows") {
        "x86_64-pc-windows-msvc"
    } else {
        "unknown"
    }
}

fn make_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(NODE_BIN_PERMS))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
