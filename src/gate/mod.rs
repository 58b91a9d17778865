//! Commit gate.
//!
//! Refuses a commit unless both the manifest's `version = ` line and the
//! lockfile changed against the baseline revision, then runs the build
//! check (and, when a secondary environment is planned, mirrors the tree
//! and repeats the check plus a package build there).
//!
//! All external effects go through [`SnapshotProvider`] and [`ToolRunner`],
//! so the gate itself never touches git or spawns processes.

pub mod git;
pub mod process;

use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::Error;

pub use git::GitSnapshots;
pub use process::ProcessRunner;

/// Literal prefix of the declared version line in a manifest.
pub const VERSION_MARKER: &str = "version = ";

/// Which state of a tracked file to read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Revision {
    /// A committed revision, e.g. the baseline passed to the hook.
    Commit(String),
    /// Content staged in the index.
    Index,
    /// The file as it currently sits in the working tree.
    WorkingTree,
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Commit(rev) => write!(f, "baseline {}", rev),
            Revision::Index => f.write_str("staged"),
            Revision::WorkingTree => f.write_str("working tree"),
        }
    }
}

/// Reads file content at a revision.
pub trait SnapshotProvider {
    fn show(&self, revision: &Revision, path: &str) -> Result<String, Error>;
}

/// Runs an external tool to completion.
///
/// A non-zero exit must be reported as [`Error::ToolFailed`].
pub trait ToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), Error>;
}

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    /// Build from an argv-style list. Returns `None` for an empty list.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next()?;
        Some(Self {
            program,
            args: argv.collect(),
            current_dir: None,
        })
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Steps run in the secondary execution environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryPlan {
    /// Mirror the project tree into the secondary environment.
    pub sync: Invocation,
    /// Build check inside the mirror.
    pub check: Invocation,
    /// Non-linking package build inside the mirror.
    pub package: Invocation,
}

/// Everything the gate needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePlan {
    pub manifest: String,
    pub lockfile: String,
    pub candidate: Revision,
    pub check: Invocation,
    pub secondary: Option<SecondaryPlan>,
}

/// Outcome of a passing gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateReport {
    pub secondary_ran: bool,
}

/// First line of `text` that starts with [`VERSION_MARKER`].
pub fn version_line(text: &str) -> Option<&str> {
    text.lines().find(|line| line.starts_with(VERSION_MARKER))
}

pub struct Gate<'a, S, R> {
    snapshots: &'a S,
    runner: &'a R,
    plan: &'a GatePlan,
}

impl<'a, S: SnapshotProvider, R: ToolRunner> Gate<'a, S, R> {
    pub fn new(snapshots: &'a S, runner: &'a R, plan: &'a GatePlan) -> Self {
        Self {
            snapshots,
            runner,
            plan,
        }
    }

    /// Run every check in order, stopping at the first failure.
    pub fn run(&self, against: &str) -> Result<GateReport, Error> {
        let baseline = Revision::Commit(against.to_string());

        self.check_manifest(&baseline)?;
        self.check_lockfile(&baseline)?;

        info!(command = %self.plan.check, "Running build check");
        self.runner.run(&self.plan.check)?;

        let Some(secondary) = &self.plan.secondary else {
            return Ok(GateReport {
                secondary_ran: false,
            });
        };

        info!(command = %secondary.sync, "Mirroring tree to secondary environment");
        self.runner.run(&secondary.sync)?;
        info!(command = %secondary.check, "Running build check in secondary environment");
        self.runner.run(&secondary.check)?;
        info!(command = %secondary.package, "Running package build in secondary environment");
        self.runner.run(&secondary.package)?;

        Ok(GateReport {
            secondary_ran: true,
        })
    }

    fn check_manifest(&self, baseline: &Revision) -> Result<(), Error> {
        let path = &self.plan.manifest;

        let old = self.snapshots.show(baseline, path)?;
        let old_line = version_line(&old).ok_or_else(|| missing_version(path, baseline))?;

        let new = self.snapshots.show(&self.plan.candidate, path)?;
        let new_line =
            version_line(&new).ok_or_else(|| missing_version(path, &self.plan.candidate))?;

        debug!(old = old_line.trim(), new = new_line.trim(), "Comparing version lines");
        if old_line.trim() == new_line.trim() {
            return Err(Error::NoVersionBump { path: path.clone() });
        }
        Ok(())
    }

    // Whole-file equality: any lockfile change passes, not only the version field.
    fn check_lockfile(&self, baseline: &Revision) -> Result<(), Error> {
        let path = &self.plan.lockfile;

        let old = self.snapshots.show(baseline, path)?;
        let new = self.snapshots.show(&self.plan.candidate, path)?;
        if old == new {
            return Err(Error::NoVersionBump { path: path.clone() });
        }
        Ok(())
    }
}

fn missing_version(path: &str, revision: &Revision) -> Error {
    Error::MissingVersion {
        path: path.to_string(),
        snapshot: revision.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const AGAINST: &str = "HEAD";

    #[derive(Default)]
    struct FakeSnapshots {
        files: HashMap<(Revision, String), String>,
        reads: RefCell<Vec<(Revision, String)>>,
    }

    impl FakeSnapshots {
        fn with(mut self, revision: Revision, path: &str, content: &str) -> Self {
            self.files
                .insert((revision, path.to_string()), content.to_string());
            self
        }

        fn read_paths(&self) -> Vec<String> {
            self.reads.borrow().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    impl SnapshotProvider for FakeSnapshots {
        fn show(&self, revision: &Revision, path: &str) -> Result<String, Error> {
            self.reads
                .borrow_mut()
                .push((revision.clone(), path.to_string()));
            self.files
                .get(&(revision.clone(), path.to_string()))
                .cloned()
                .ok_or_else(|| Error::Git(format!("path '{}' does not exist", path)))
        }
    }

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<Invocation>>,
        fail_on: Option<String>,
    }

    impl RecordingRunner {
        fn failing_on(program: &str) -> Self {
            Self {
                calls: RefCell::default(),
                fail_on: Some(program.to_string()),
            }
        }

        fn programs(&self) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .map(|c| c.program.clone())
                .collect()
        }
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<(), Error> {
            self.calls.borrow_mut().push(invocation.clone());
            if self.fail_on.as_deref() == Some(invocation.program.as_str()) {
                return Err(Error::ToolFailed {
                    command: invocation.to_string(),
                    code: Some(1),
                });
            }
            Ok(())
        }
    }

    fn manifest(version: &str) -> String {
        format!(
            "[package]\nname = \"demo\"\nversion = \"{}\"\nedition = \"2021\"\n",
            version
        )
    }

    fn lock(version: &str) -> String {
        format!(
            "version = 3\n\n[[package]]\nname = \"demo\"\nversion = \"{}\"\n",
            version
        )
    }

    fn plan(secondary: bool) -> GatePlan {
        GatePlan {
            manifest: "Cargo.toml".to_string(),
            lockfile: "Cargo.lock".to_string(),
            candidate: Revision::Index,
            check: Invocation::from_argv(["cargo", "check"]).unwrap(),
            secondary: secondary.then(|| SecondaryPlan {
                sync: Invocation::from_argv(["rsync", "-av"]).unwrap(),
                check: Invocation::from_argv(["wsl-cargo", "check"]).unwrap(),
                package: Invocation::from_argv(["nix", "build", "--no-link"]).unwrap(),
            }),
        }
    }

    fn bumped() -> FakeSnapshots {
        FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", &manifest("1.0.1"))
            .with(Revision::Commit(AGAINST.into()), "Cargo.lock", &lock("1.0.0"))
            .with(Revision::Index, "Cargo.lock", &lock("1.0.1"))
    }

    #[test]
    fn test_version_line_first_match() {
        let text = "[package]\nversion = \"1.2.3\"\n\n[workspace.package]\nversion = \"9.9.9\"\n";
        assert_eq!(version_line(text), Some("version = \"1.2.3\""));
    }

    #[test]
    fn test_version_line_ignores_indented_and_inline() {
        let text = "[dependencies]\nserde = { version = \"1\" }\n    version = \"2\"\n";
        assert_eq!(version_line(text), None);
    }

    #[test]
    fn test_version_line_requires_exact_marker() {
        assert_eq!(version_line("version=\"1.0.0\"\n"), None);
        assert_eq!(version_line("versions = [1]\n"), None);
        assert_eq!(version_line(""), None);
    }

    #[test]
    fn test_same_version_is_no_bump() {
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", &manifest("1.0.0"));
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        assert!(
            matches!(err, Error::NoVersionBump { ref path } if path == "Cargo.toml"),
            "{err:?}"
        );
        assert!(runner.programs().is_empty());
        assert!(!snapshots.read_paths().contains(&"Cargo.lock".to_string()));
    }

    #[test]
    fn test_version_lines_compared_after_trim() {
        let snapshots = FakeSnapshots::default()
            .with(
                Revision::Commit(AGAINST.into()),
                "Cargo.toml",
                "version = \"1.0.0\"\n",
            )
            .with(Revision::Index, "Cargo.toml", "version = \"1.0.0\"   \r\n");
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();
        assert!(matches!(err, Error::NoVersionBump { .. }), "{err:?}");
    }

    #[test]
    fn test_both_missing_version_fails_before_lockfile() {
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", "[workspace]\n")
            .with(Revision::Index, "Cargo.toml", "[workspace]\n")
            .with(Revision::Commit(AGAINST.into()), "Cargo.lock", &lock("1.0.0"))
            .with(Revision::Index, "Cargo.lock", &lock("1.0.1"));
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        match err {
            Error::MissingVersion { path, snapshot } => {
                assert_eq!(path, "Cargo.toml");
                assert_eq!(snapshot, "baseline HEAD");
            }
            other => panic!("expected MissingVersion, got {other:?}"),
        }
        assert_eq!(snapshots.read_paths(), vec!["Cargo.toml".to_string()]);
        assert!(runner.programs().is_empty());
    }

    #[test]
    fn test_missing_version_in_candidate_only() {
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", "[package]\nname = \"demo\"\n");
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        match err {
            Error::MissingVersion { snapshot, .. } => assert_eq!(snapshot, "staged"),
            other => panic!("expected MissingVersion, got {other:?}"),
        }
    }

    #[test]
    fn test_identical_lockfile_is_no_bump() {
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", &manifest("1.1.0"))
            .with(Revision::Commit(AGAINST.into()), "Cargo.lock", &lock("1.0.0"))
            .with(Revision::Index, "Cargo.lock", &lock("1.0.0"));
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        assert!(
            matches!(err, Error::NoVersionBump { ref path } if path == "Cargo.lock"),
            "{err:?}"
        );
        assert!(runner.programs().is_empty());
    }

    #[test]
    fn test_any_lockfile_change_passes() {
        // Only a dependency entry changed; the lockfile's own version did not.
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", &manifest("1.0.1"))
            .with(Revision::Commit(AGAINST.into()), "Cargo.lock", &lock("1.0.0"))
            .with(
                Revision::Index,
                "Cargo.lock",
                &format!("{}\n[[package]]\nname = \"serde\"\n", lock("1.0.0")),
            );
        let runner = RecordingRunner::default();
        let plan = plan(false);

        assert!(Gate::new(&snapshots, &runner, &plan).run(AGAINST).is_ok());
    }

    #[test]
    fn test_bump_runs_check_without_secondary() {
        let snapshots = bumped();
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let report = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap();

        assert!(!report.secondary_ran);
        assert_eq!(runner.programs(), vec!["cargo".to_string()]);
    }

    #[test]
    fn test_bump_runs_secondary_steps_in_order() {
        let snapshots = bumped();
        let runner = RecordingRunner::default();
        let plan = plan(true);

        let report = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap();

        assert!(report.secondary_ran);
        assert_eq!(runner.programs(), vec!["cargo", "rsync", "wsl-cargo", "nix"]);
    }

    #[test]
    fn test_check_failure_stops_gate() {
        let snapshots = bumped();
        let runner = RecordingRunner::failing_on("cargo");
        let plan = plan(true);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        assert!(matches!(err, Error::ToolFailed { .. }), "{err:?}");
        assert_eq!(runner.programs(), vec!["cargo".to_string()]);
    }

    #[test]
    fn test_sync_failure_stops_secondary() {
        let snapshots = bumped();
        let runner = RecordingRunner::failing_on("rsync");
        let plan = plan(true);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();

        assert!(matches!(err, Error::ToolFailed { .. }), "{err:?}");
        assert_eq!(runner.programs(), vec!["cargo", "rsync"]);
    }

    #[test]
    fn test_package_failure_fails_gate() {
        let snapshots = bumped();
        let runner = RecordingRunner::failing_on("nix");
        let plan = plan(true);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }), "{err:?}");
    }

    #[test]
    fn test_snapshot_error_propagates() {
        let snapshots = FakeSnapshots::default();
        let runner = RecordingRunner::default();
        let plan = plan(false);

        let err = Gate::new(&snapshots, &runner, &plan).run(AGAINST).unwrap_err();
        assert!(matches!(err, Error::Git(_)), "{err:?}");
    }

    #[test]
    fn test_working_tree_candidate() {
        let snapshots = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::WorkingTree, "Cargo.toml", &manifest("2.0.0"))
            .with(Revision::Commit(AGAINST.into()), "Cargo.lock", &lock("1.0.0"))
            .with(Revision::WorkingTree, "Cargo.lock", &lock("2.0.0"));
        let runner = RecordingRunner::default();
        let mut plan = plan(false);
        plan.candidate = Revision::WorkingTree;

        assert!(Gate::new(&snapshots, &runner, &plan).run(AGAINST).is_ok());
    }

    #[test]
    fn test_gate_is_repeatable() {
        let plan = plan(false);

        let passing = bumped();
        let runner = RecordingRunner::default();
        let gate = Gate::new(&passing, &runner, &plan);
        assert_eq!(gate.run(AGAINST).unwrap(), gate.run(AGAINST).unwrap());

        let failing = FakeSnapshots::default()
            .with(Revision::Commit(AGAINST.into()), "Cargo.toml", &manifest("1.0.0"))
            .with(Revision::Index, "Cargo.toml", &manifest("1.0.0"));
        let gate = Gate::new(&failing, &runner, &plan);
        let first = gate.run(AGAINST).unwrap_err().to_string();
        let second = gate.run(AGAINST).unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invocation_display_and_from_argv() {
        let invocation = Invocation::from_argv(["cargo", "check", "--all"]).unwrap();
        assert_eq!(invocation.to_string(), "cargo check --all");
        assert!(Invocation::from_argv(Vec::<String>::new()).is_none());
    }
}
