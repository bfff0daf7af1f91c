use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::note_store::StoreKind;

#[derive(Debug, Parser)]
#[command(
    name = "notebert",
    about = "Jot down notes and recall the closest one by meaning"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Note store backend (overrides the stored setting)
    #[arg(long, value_enum, global = true)]
    pub store: Option<StoreKind>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a new note
    Add(AddArgs),
    /// List stored notes
    List(ListArgs),
    /// Print a single note by key
    Get(GetArgs),
    /// Find the stored note closest in meaning to a query
    Recall(RecallArgs),
    /// Reflow text read from stdin and print it
    Reflow,
    /// Append the notes of a JSON record file to the store
    Import(ImportArgs),
    /// Write every note as a JSON record
    Export(ExportArgs),
    /// Show or update the production-readiness checklist
    Checklist {
        #[command(subcommand)]
        action: ChecklistAction,
    },
    /// Manage the ColBERT model configuration
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Show system status and statistics
    Status(StatusArgs),
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Notes --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Note text; read from stdin when omitted
    pub text: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Print full note text instead of a one-line preview
    #[arg(long)]
    pub full: bool,
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Note key
    pub key: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Prefix each line with its line number
    #[arg(short = 'n', long)]
    pub line_numbers: bool,
}

#[derive(Debug, Parser)]
pub struct RecallArgs {
    /// What to look for
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Return the note as stored, without reflowing it
    #[arg(long)]
    pub raw: bool,
}

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// JSON record file mapping decimal keys to note text
    pub path: PathBuf,
}

#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// -- Checklist --

#[derive(Debug, Subcommand)]
pub enum ChecklistAction {
    /// Show every item with its check mark
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an item as done
    Check {
        /// Item name (case-insensitive)
        item: String,
    },
    /// Clear an item's check mark
    Uncheck {
        /// Item name (case-insensitive)
        item: String,
    },
}

// -- Model --

#[derive(Debug, Subcommand)]
pub enum ModelAction {
    /// Show the currently resolved model
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a default model ID or local path in config.redb
    Set {
        /// Model ID (HuggingFace) or local path
        model: String,
    },
    /// Clear the stored model setting (revert to default)
    Clear,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "notebert",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_recall_defaults() {
        let cli = Cli::parse_from(["notebert", "recall", "rust ownership"]);
        match cli.command {
            Command::Recall(args) => {
                assert_eq!(args.query, "rust ownership");
                assert!(!args.json);
                assert!(!args.raw);
            }
            _ => panic!("expected recall command"),
        }
        assert_eq!(cli.store, None);
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn parse_add_without_text_reads_stdin() {
        let cli = Cli::parse_from(["notebert", "add"]);
        match cli.command {
            Command::Add(args) => assert!(args.text.is_none()),
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "notebert", "list", "--store", "json", "-vv", "--data-dir", "/tmp/n",
        ]);
        assert_eq!(cli.store, Some(StoreKind::Json));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/n")));
        assert!(matches!(cli.command, Command::List(_)));
    }

    #[test]
    fn parse_checklist_check() {
        let cli = Cli::parse_from(["notebert", "checklist", "check", "Logging"]);
        match cli.command {
            Command::Checklist {
                action: ChecklistAction::Check { item },
            } => assert_eq!(item, "Logging"),
            _ => panic!("expected checklist check"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["notebert", "-q", "-v", "status"]).is_err());
    }

    #[test]
    fn unknown_store_is_rejected() {
        assert!(
            Cli::try_parse_from(["notebert", "--store", "sqlite", "list"])
                .is_err()
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
