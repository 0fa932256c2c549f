//! Command-line grammar for lifecycle commands.

use clap::{Parser, Subcommand};

/// Lifecycle commands understood after the configuration flags.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "nostrap",
    about = "Bootstrap a Nomad cluster's ACL system and keep the management token in a secret store",
    after_help = "Configuration flags (--address, --ssm-prefix, --aws-region, --store, ...) \
                  must precede the command and may also be set through NOSTRAP_* variables \
                  or a configuration file.",
    disable_version_flag = true
)]
pub(crate) struct Cli {
    /// Include the secret in the printed state.
    #[arg(long, global = true)]
    pub(crate) show_secret: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Wait for the cluster, bootstrap ACLs, and store the minted token.
    Create,
    /// Load the stored token and verify it against the cluster.
    Read,
    /// Refresh the stored token; no field changes in place.
    Update,
    /// Forget the token. The stored secret is left in place.
    Delete,
}
