//! Run the commit gate against a baseline revision.

use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::error::Error;
use crate::gate::{Gate, GateReport, GitSnapshots, ProcessRunner};

/// Options for a gate run, resolved from the command line.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub project_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Force the secondary steps on or off, overriding config and host.
    pub secondary: Option<bool>,
}

/// Whether this host needs the secondary environment steps.
pub fn host_needs_secondary() -> bool {
    cfg!(windows)
}

/// Run the check command.
pub fn run(against: &str, options: &CheckOptions) -> Result<GateReport, Error> {
    let project_root = match &options.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    // Only the implicit bumpgate.toml may be absent.
    let (config_path, config) = match &options.config {
        Some(path) => (path.clone(), Config::load_required(path)?),
        None => {
            let path = Config::path(&project_root);
            let config = Config::load(&path)?;
            (path, config)
        }
    };

    let secondary = options
        .secondary
        .unwrap_or_else(|| config.secondary_enabled(host_needs_secondary()));
    let plan = config.plan(&project_root, &config_path, secondary)?;

    info!(
        against,
        project = %project_root.display(),
        secondary,
        "Checking version bump"
    );

    let snapshots = GitSnapshots::new(&project_root);
    let report = Gate::new(&snapshots, &ProcessRunner, &plan).run(against)?;
    info!(secondary = report.secondary_ran, "Version bump gate passed");
    Ok(report)
}
