//! bumpgate library.
//!
//! Pre-commit gate that refuses commits which don't bump the version in
//! both the manifest and the lockfile, then runs the build check.

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;

pub use error::Error;
