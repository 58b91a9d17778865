//! bumpgate - pre-commit gate enforcing a version bump.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bumpgate::cli::{hooks, Cli, Commands, HookAction};
use bumpgate::Error;

fn main() -> ExitCode {
    // Initialize logging on stderr so git shows it alongside hook output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bumpgate=info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let options = cli.check.options();

    match (cli.command, cli.against) {
        (Some(Commands::Hook { action }), _) => {
            let project_root = match options.project_dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            match action {
                HookAction::Install => {
                    if hooks::install_hook(&project_root)? {
                        println!("Pre-commit hook installed.");
                    } else {
                        println!("Pre-commit hook already installed.");
                    }
                }
                HookAction::Uninstall => {
                    if hooks::uninstall_hook(&project_root)? {
                        println!("Pre-commit hook removed.");
                    } else {
                        println!("No bumpgate pre-commit hook found.");
                    }
                }
            }
        }
        (None, Some(against)) => {
            bumpgate::cli::check::run(&against, &options)?;
        }
        (None, None) => {
            // Show help when no revision provided
            Cli::command().print_help()?;
            println!();
            return Err(Error::other("missing baseline revision"));
        }
    }

    Ok(())
}
