//! Project configuration.
//!
//! Handles loading the optional `bumpgate.toml` and turning it into a
//! [`GatePlan`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::gate::process::{windows_to_mount_path, SecondaryEnv};
use crate::gate::{GatePlan, Invocation, Revision};

/// Config file name looked up in the project root.
pub const CONFIG_FILE: &str = "bumpgate.toml";

/// Project configuration stored in `bumpgate.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Manifest holding the `version = ` line.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Lockfile that must change along with the manifest.
    #[serde(default = "default_lockfile")]
    pub lockfile: String,

    /// Which state counts as the candidate.
    #[serde(default)]
    pub candidate: Candidate,

    /// Build check run against the project.
    #[serde(default = "default_check_command")]
    pub check_command: Vec<String>,

    /// Secondary execution environment.
    #[serde(default)]
    pub secondary: SecondaryConfig,
}

/// Candidate state compared with the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Candidate {
    /// Content staged for commit.
    #[default]
    Staged,
    /// Files as they sit on disk.
    WorkingTree,
}

impl From<Candidate> for Revision {
    fn from(candidate: Candidate) -> Self {
        match candidate {
            Candidate::Staged => Revision::Index,
            Candidate::WorkingTree => Revision::WorkingTree,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryConfig {
    /// Run the secondary steps. Unset means "only on Windows hosts".
    #[serde(default)]
    pub enabled: Option<bool>,

    #[serde(default = "default_launcher")]
    pub launcher: Vec<String>,

    /// Project tree as seen from the secondary environment.
    /// Defaults to the project root's `/mnt/<drive>/...` path.
    #[serde(default)]
    pub source_dir: Option<String>,

    /// Mirror location. Required when enabled.
    #[serde(default)]
    pub dest_dir: Option<String>,

    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,

    /// Defaults to the top-level `check_command`.
    #[serde(default)]
    pub check_command: Option<Vec<String>>,

    #[serde(default = "default_package_command")]
    pub package_command: Vec<String>,
}

// Default value functions
fn default_manifest() -> String {
    "Cargo.toml".to_string()
}

fn default_lockfile() -> String {
    "Cargo.lock".to_string()
}

fn default_check_command() -> Vec<String> {
    vec!["cargo".to_string(), "check".to_string()]
}

fn default_launcher() -> Vec<String> {
    vec!["wsl".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec!["target".to_string()]
}

fn default_package_command() -> Vec<String> {
    vec![
        "nix".to_string(),
        "build".to_string(),
        "--no-link".to_string(),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest: default_manifest(),
            lockfile: default_lockfile(),
            candidate: Candidate::default(),
            check_command: default_check_command(),
            secondary: SecondaryConfig::default(),
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            launcher: default_launcher(),
            source_dir: None,
            dest_dir: None,
            exclude: default_exclude(),
            check_command: None,
            package_command: default_package_command(),
        }
    }
}

impl Config {
    /// Get the config file path for a project.
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE)
    }

    /// Load config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Load config from an explicitly named file, which must exist.
    pub fn load_required(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::config(path, "file not found"));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, Error> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::config(path, e.message()))?;
        if config.check_command.is_empty() {
            return Err(Error::config(path, "check_command must not be empty"));
        }
        Ok(config)
    }

    /// Whether the secondary steps run, given whether the host is the
    /// platform that needs them.
    pub fn secondary_enabled(&self, host_needs_secondary: bool) -> bool {
        self.secondary.enabled.unwrap_or(host_needs_secondary)
    }

    /// Build the gate plan for `project_root`. `config_path` is the file
    /// this config came from and is only used in error messages.
    pub fn plan(
        &self,
        project_root: &Path,
        config_path: &Path,
        secondary_enabled: bool,
    ) -> Result<GatePlan, Error> {
        let check = Invocation::from_argv(self.check_command.iter().cloned())
            .ok_or_else(|| Error::config(config_path, "check_command must not be empty"))?
            .in_dir(project_root);

        let secondary = if secondary_enabled {
            Some(self.secondary_plan(project_root, config_path)?)
        } else {
            None
        };

        Ok(GatePlan {
            manifest: self.manifest.clone(),
            lockfile: self.lockfile.clone(),
            candidate: self.candidate.into(),
            check,
            secondary,
        })
    }

    fn secondary_plan(
        &self,
        project_root: &Path,
        config_path: &Path,
    ) -> Result<crate::gate::SecondaryPlan, Error> {
        let secondary = &self.secondary;

        let dest_dir = secondary
            .dest_dir
            .as_deref()
            .ok_or_else(|| Error::config(config_path, "secondary.dest_dir is required"))?;

        let source_dir = match &secondary.source_dir {
            Some(dir) => dir.clone(),
            None => windows_to_mount_path(&project_root.to_string_lossy()).ok_or_else(|| {
                Error::config(
                    config_path,
                    format!(
                        "secondary.source_dir is required for {}",
                        project_root.display()
                    ),
                )
            })?,
        };

        let check_command = secondary
            .check_command
            .as_deref()
            .unwrap_or(&self.check_command);
        if check_command.is_empty() || secondary.package_command.is_empty() {
            return Err(Error::config(
                config_path,
                "secondary commands must not be empty",
            ));
        }

        SecondaryEnv {
            launcher: &secondary.launcher,
            source_dir: &source_dir,
            dest_dir,
            exclude: &secondary.exclude,
            check_command,
            package_command: &secondary.package_command,
        }
        .plan(project_root)
    }
}
