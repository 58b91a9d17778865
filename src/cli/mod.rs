//! CLI commands for bumpgate.

pub mod check;
pub mod hooks;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// bumpgate - refuse commits that don't bump the crate version
#[derive(Parser, Debug)]
#[command(name = "bumpgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Baseline revision to compare against (passed by the pre-commit hook)
    pub against: Option<String>,

    #[command(flatten)]
    pub check: CheckArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Config file (defaults to bumpgate.toml in the project directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run the secondary environment steps regardless of host
    #[arg(long, conflicts_with = "no_secondary")]
    pub secondary: bool,

    /// Skip the secondary environment steps regardless of host
    #[arg(long)]
    pub no_secondary: bool,
}

impl CheckArgs {
    pub fn options(&self) -> check::CheckOptions {
        let secondary = match (self.secondary, self.no_secondary) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        check::CheckOptions {
            project_dir: self.project_dir.clone(),
            config: self.config.clone(),
            secondary,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the git pre-commit hook
    Hook {
        #[command(subcommand)]
        action: HookAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum HookAction {
    /// Install the pre-commit hook
    Install,
    /// Remove the pre-commit hook
    Uninstall,
}
