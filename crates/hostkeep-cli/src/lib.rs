//! # hostkeep-cli
//!
//! Command-line front end for the hostkeep automation token vault. Token
//! management only: minting, listing, revocation, sync transport and a
//! resolve dry-run. Running commands on hosts lives elsewhere.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, SyncCommand};
pub use commands::{run, Context};
