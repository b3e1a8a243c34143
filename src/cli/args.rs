//! CLI argument definitions using clap
//!
//! Commands:
//! - rxstorage --config <path> bulk-write
//! - rxstorage --config <path> bulk-write-local
//! - rxstorage --config <path> query [--count]
//! - rxstorage --config <path> changes --since N --order asc|desc --limit L
//! - rxstorage --config <path> get <id>...
//! - rxstorage --config <path> attachment <doc> <att>
//! - rxstorage --config <path> put-attachment <doc> <att> --content-type T
//! - rxstorage --config <path> history <id>

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::changes::ChangeOrder;

/// rxstorage - revisioned document storage with a resumable change stream
#[derive(Parser, Debug)]
#[command(name = "rxstorage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./rxstorage.json")]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply document writes read as JSON lines from stdin
    BulkWrite,

    /// Apply local document writes read as JSON lines from stdin
    BulkWriteLocal,

    /// Run a prepared query read from stdin
    Query {
        /// Print the number of matches instead of the documents
        #[arg(long)]
        count: bool,
    },

    /// Read the change log
    Changes {
        /// Exclusive start sequence
        #[arg(long, default_value_t = 0)]
        since: u64,

        #[arg(long, value_enum, default_value_t = OrderArg::Asc)]
        order: OrderArg,

        /// Maximum number of events
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Fetch documents by id
    Get {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Include tombstoned documents
        #[arg(long)]
        with_deleted: bool,
    },

    /// Write an attachment payload to stdout
    Attachment {
        document_id: String,
        attachment_id: String,
    },

    /// Store stdin as an attachment of a document
    PutAttachment {
        document_id: String,
        attachment_id: String,

        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },

    /// Show a document's revision lineage
    History { document_id: String },
}

/// Change log read direction
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for ChangeOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => ChangeOrder::Asc,
            OrderArg::Desc => ChangeOrder::Desc,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_changes() {
        let cli = Cli::parse_from([
            "rxstorage", "--config", "c.json", "changes", "--since", "3", "--order", "desc",
            "--limit", "2",
        ]);
        assert_eq!(cli.config, PathBuf::from("c.json"));
        match cli.command {
            Command::Changes { since, order, limit } => {
                assert_eq!(since, 3);
                assert_eq!(order, OrderArg::Desc);
                assert_eq!(limit, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_defaults() {
        let cli = Cli::parse_from(["rxstorage", "get", "a", "b"]);
        assert_eq!(cli.config, PathBuf::from("./rxstorage.json"));
        assert!(matches!(cli.command, Command::Get { ref ids, with_deleted: false } if ids.len() == 2));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
