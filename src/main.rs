use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use msgtrail::cli::output::OutputMode;
use msgtrail::cli::{chats, history, reactions, watch};
use msgtrail::config::Config;
use msgtrail::model::MessageFilter;
use msgtrail::store::MessageStore;
use msgtrail::watch::WatchRequest;

#[derive(Parser)]
#[command(name = "msgtrail")]
#[command(about = "Read and follow the macOS Messages history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Path to chat.db (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Emit one JSON object per line
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List recent chats
    Chats {
        /// Number of chats to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show recent messages for a chat
    History {
        /// Chat rowid from 'msgtrail chats'
        #[arg(long)]
        chat_id: i64,

        /// Number of messages to show
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Include attachment metadata
        #[arg(long)]
        attachments: bool,
    },

    /// List tapback add/remove events after a rowid
    Reactions {
        /// Limit to one chat rowid
        #[arg(long)]
        chat_id: Option<i64>,

        /// Start after this rowid
        #[arg(long, default_value_t = 0)]
        since_rowid: i64,

        /// Number of events to show
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Stream new messages as they arrive
    Watch {
        /// Limit to one chat rowid
        #[arg(long)]
        chat_id: Option<i64>,

        /// Start after this rowid (default: newest)
        #[arg(long)]
        since_rowid: Option<i64>,

        /// Debounce interval for filesystem events (e.g. 250ms)
        #[arg(long, value_parser = watch::parse_duration)]
        debounce: Option<std::time::Duration>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Include attachment metadata
        #[arg(long)]
        attachments: bool,

        /// Include tapback add/remove events
        #[arg(long)]
        reactions: bool,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Filter by participant handles (comma separated or repeated)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    participants: Vec<String>,

    /// ISO8601 start (inclusive)
    #[arg(long)]
    start: Option<String>,

    /// ISO8601 end (exclusive)
    #[arg(long)]
    end: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> Result<MessageFilter> {
        Ok(MessageFilter::from_iso(
            self.participants,
            self.start.as_deref(),
            self.end.as_deref(),
        )?)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "msgtrail=debug" } else { "msgtrail=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load config
    let config = Config::load(cli.config.as_deref())?;
    let db_path = cli.db.unwrap_or_else(|| config.database_path());

    // Open the store
    let store = MessageStore::open(&db_path)?;

    match cli.command {
        Commands::Chats { limit } => {
            chats::run(&store, limit, cli.json)?;
        }
        Commands::History {
            chat_id,
            limit,
            filter,
            attachments,
        } => {
            let args = history::HistoryArgs {
                chat_id,
                limit: limit.unwrap_or(config.history.limit),
                filter: filter.into_filter()?,
                mode: OutputMode {
                    json: cli.json,
                    attachments,
                },
            };
            history::run(&store, args)?;
        }
        Commands::Reactions {
            chat_id,
            since_rowid,
            limit,
        } => {
            reactions::run(&store, chat_id, since_rowid, limit, cli.json)?;
        }
        Commands::Watch {
            chat_id,
            since_rowid,
            debounce,
            filter,
            attachments,
            reactions,
        } => {
            let mut options = config.watch_options();
            if let Some(debounce) = debounce {
                options.debounce = debounce;
            }
            options.include_reactions |= reactions;
            let request = WatchRequest {
                chat_id,
                since_row_id: since_rowid,
                filter: filter.into_filter()?,
                options,
            };
            let mode = OutputMode {
                json: cli.json,
                attachments,
            };
            watch::run(Arc::new(store), request, mode).await?;
        }
    }

    Ok(())
}
