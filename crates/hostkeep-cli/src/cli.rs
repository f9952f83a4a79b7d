//! Argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hostkeep_core::settings::DATA_DIR_ENV;
use hostkeep_core::{HostGrant, HostId};

/// Manage hostkeep automation tokens
#[derive(Parser, Debug)]
#[command(name = "hostkeep-token")]
#[command(version)]
#[command(about = "Manage hostkeep automation tokens for scripted host access")]
pub struct Cli {
    /// Data directory holding the vault, settings and pepper fallback
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mint a new token; the raw token is printed once
    Create {
        /// Human-readable name
        #[arg(long)]
        name: String,

        /// Allowed host as ID=LABEL (repeatable)
        #[arg(long = "host", value_name = "ID=LABEL", value_parser = parse_grant, required = true)]
        hosts: Vec<HostGrant>,

        /// Bind the token to this device's pepper
        #[arg(long, conflicts_with = "portable")]
        bind_device: bool,

        /// Do not bind, even when settings say so
        #[arg(long)]
        portable: bool,

        /// Expire after this many hours
        #[arg(long, value_name = "HOURS")]
        expires_in_hours: Option<u32>,

        /// Usage limit (0 = unlimited; defaults to settings)
        #[arg(long)]
        max_uses: Option<u32>,

        /// Share the definition with other devices
        #[arg(long)]
        sync: bool,

        /// Host database unlock secret (prompted when absent)
        #[arg(long, env = "HOSTKEEP_UNLOCK_SECRET", hide_env_values = true)]
        unlock_secret: Option<String>,
    },

    /// List tokens
    List {
        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Revoke a token
    Revoke { token_id: String },

    /// Delete a revoked token
    Delete { token_id: String },

    /// Verify a token against a target without using it
    Check {
        /// Raw token
        #[arg(long, env = "HOSTKEEP_TOKEN", hide_env_values = true)]
        token: String,

        /// Host label to resolve
        #[arg(long)]
        target: String,
    },

    /// Mint local secret material for a token received through sync
    Activate {
        token_id: String,

        /// Bind the token to this device's pepper
        #[arg(long, conflicts_with = "portable")]
        bind_device: bool,

        /// Do not bind, even when settings say so
        #[arg(long)]
        portable: bool,

        /// Host database unlock secret (prompted when absent)
        #[arg(long, env = "HOSTKEEP_UNLOCK_SECRET", hide_env_values = true)]
        unlock_secret: Option<String>,
    },

    /// Refresh host display labels as ID=LABEL
    Relabel {
        #[arg(long = "host", value_name = "ID=LABEL", value_parser = parse_grant, required = true)]
        hosts: Vec<HostGrant>,
    },

    /// Exchange token definitions with other devices
    #[command(subcommand)]
    Sync(SyncCommand),
}

#[derive(Subcommand, Debug)]
pub enum SyncCommand {
    /// Write this vault's sync definitions
    Export {
        /// Output file (stdout when absent)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Merge definitions exported on another device
    Import { file: PathBuf },
}

/// Parse `ID=LABEL`
pub fn parse_grant(value: &str) -> Result<HostGrant, String> {
    let (id, label) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=LABEL, got '{}'", value))?;

    let host_id: HostId = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid host ID '{}'", id))?;
    if host_id <= 0 {
        return Err(format!("host ID must be positive, got {}", host_id));
    }

    let label = label.trim();
    if label.is_empty() {
        return Err(format!("empty label for host {}", host_id));
    }

    Ok(HostGrant::new(host_id, label))
}
