//! Tool runner backed by real processes, plus the command lines used in the
//! secondary execution environment.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{Invocation, SecondaryPlan, ToolRunner};
use crate::error::Error;

/// Spawns each invocation with inherited stdio and waits for it to exit.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), Error> {
        debug!(command = %invocation, dir = ?invocation.current_dir, "Spawning");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|e| Error::ToolSpawn {
            command: invocation.to_string(),
            source: e,
        })?;

        if !status.success() {
            return Err(Error::ToolFailed {
                command: invocation.to_string(),
                code: status.code(),
            });
        }
        Ok(())
    }
}

/// Where and how the secondary environment is reached.
#[derive(Debug, Clone)]
pub struct SecondaryEnv<'a> {
    /// Prefix that runs a command inside the environment, e.g. `wsl -d ubuntu`.
    pub launcher: &'a [String],
    /// Project tree as seen from inside the environment.
    pub source_dir: &'a str,
    /// Mirror location inside the environment.
    pub dest_dir: &'a str,
    pub exclude: &'a [String],
    pub check_command: &'a [String],
    pub package_command: &'a [String],
}

impl SecondaryEnv<'_> {
    /// Build the sync, check and package invocations. All run from
    /// `project_dir` on the host.
    pub fn plan(&self, project_dir: &Path) -> Result<SecondaryPlan, Error> {
        let mut sync = vec![
            "rsync".to_string(),
            "--mkpath".to_string(),
            "--delete".to_string(),
            "-av".to_string(),
            with_trailing_slash(self.source_dir),
            with_trailing_slash(self.dest_dir),
        ];
        for pattern in self.exclude {
            sync.push("--exclude".to_string());
            sync.push(pattern.clone());
        }

        Ok(SecondaryPlan {
            sync: self.launch(sync, project_dir)?,
            check: self.launch(self.in_mirror(self.check_command), project_dir)?,
            package: self.launch(self.in_mirror(self.package_command), project_dir)?,
        })
    }

    fn in_mirror(&self, command: &[String]) -> Vec<String> {
        let mut argv = vec!["env".to_string(), "-C".to_string(), self.dest_dir.to_string()];
        argv.extend(command.iter().cloned());
        argv
    }

    fn launch(&self, command: Vec<String>, project_dir: &Path) -> Result<Invocation, Error> {
        let argv = self.launcher.iter().cloned().chain(command);
        Invocation::from_argv(argv)
            .map(|invocation| invocation.in_dir(project_dir))
            .ok_or_else(|| Error::other("empty secondary command"))
    }
}

fn with_trailing_slash(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{}/", dir)
    }
}

/// Translate a Windows path such as `C:\Users\me\repo` to its WSL mount
/// path `/mnt/c/Users/me/repo`. Returns `None` for paths without a drive.
pub fn windows_to_mount_path(path: &str) -> Option<String> {
    let path = path.strip_prefix(r"\\?\").unwrap_or(path);
    let mut chars = path.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    if chars.next() != Some(':') {
        return None;
    }

    let rest = chars.as_str().replace('\\', "/");
    let rest = rest.trim_end_matches('/');
    Some(format!("/mnt/{}{}", drive.to_ascii_lowercase(), rest))
}
