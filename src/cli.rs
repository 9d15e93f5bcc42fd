use crate::transfer::record::Action;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rc-transfers")]
#[command(about = "Start and follow remote copy/move transfers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/rc-transfers/config.toml)
    #[arg(long, global = true, env = "RC_TRANSFERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Transfer server base URL, overrides the config file
    #[arg(long, global = true, env = "RC_TRANSFERS_SERVER")]
    pub server: Option<String>,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a transfer on an agent and track it
    Start {
        /// Agent id on the server
        #[arg(long)]
        agent_id: u64,

        /// Agent host, used in the transfer title
        #[arg(long)]
        host: String,

        /// Agent port, used in the transfer title
        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[arg(long, value_enum, default_value_t = Action::Copy)]
        action: Action,

        /// Replace existing destination files
        #[arg(long)]
        overwrite: bool,

        /// Keep both files when the destination exists
        #[arg(long, conflicts_with = "overwrite")]
        keep: bool,

        /// Compress before uploading
        #[arg(long)]
        compress: bool,

        /// Follow the transfer until it ends
        #[arg(short, long)]
        watch: bool,

        /// Items as SOURCE=DESTINATION (trailing / marks a directory)
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Follow every tracked transfer until none is pending
    Watch {
        /// Stop tracking transfers once they finish
        #[arg(long)]
        clear_finished: bool,
    },

    /// Ask the agent to stop a transfer
    Cancel {
        #[arg(long)]
        agent_id: u64,

        transfer_id: String,
    },

    /// List tracked transfers
    List {
        /// Print snapshots as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop tracking a transfer
    Remove { transfer_id: String },
}

impl Cli {
    /// Log filter for the `-v` count, used when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        let cli = Cli::try_parse_from([
            "rc-transfers",
            "start",
            "--agent-id",
            "4",
            "--host",
            "nas",
            "--action",
            "move",
            "--compress",
            "/files/a=/b/a",
            "/files/dir/=/b/dir",
        ])
        .unwrap();

        match cli.command {
            Commands::Start {
                agent_id,
                port,
                action,
                compress,
                items,
                ..
            } => {
                assert_eq!(agent_id, 4);
                assert_eq!(port, 8080);
                assert_eq!(action, Action::Move);
                assert!(compress);
                assert_eq!(items.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_start_requires_items() {
        assert!(
            Cli::try_parse_from(["rc-transfers", "start", "--agent-id", "1", "--host", "h"])
                .is_err()
        );
    }

    #[test]
    fn test_overwrite_conflicts_with_keep() {
        assert!(Cli::try_parse_from([
            "rc-transfers",
            "start",
            "--agent-id",
            "1",
            "--host",
            "h",
            "--overwrite",
            "--keep",
            "a=b",
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_and_verbosity() {
        let cli = Cli::try_parse_from([
            "rc-transfers",
            "list",
            "--server",
            "http://x:1",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://x:1"));
        assert_eq!(cli.log_level(), "debug");
        assert!(matches!(cli.command, Commands::List { json: false }));
    }
}
