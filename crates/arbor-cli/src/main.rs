use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "arbor - inspect and maintain stored conversation histories", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides storage.data_dir from the config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored conversations, most recently updated first
    List,
    /// Print the active branch of a conversation
    Show {
        root: String,
        /// Print the whole tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a conversation's title
    Rename { root: String, title: String },
    /// Add (or with --remove, remove) a tag
    Tag {
        root: String,
        tag: String,
        #[arg(long)]
        remove: bool,
    },
    /// Delete a conversation and its index record
    Delete { root: String },
    /// Reconcile recorded file contents with the project directory
    Sync {
        root: String,
        /// Re-read every recorded file, not only the listed ones
        #[arg(long)]
        force: bool,
        /// Relative path changed outside the conversation
        #[arg(long = "changed", value_name = "PATH")]
        changed: Vec<String>,
        /// Relative path deleted outside the conversation
        #[arg(long = "deleted", value_name = "PATH")]
        deleted: Vec<String>,
        /// Rename as FROM=TO
        #[arg(long = "renamed", value_name = "FROM=TO", value_parser = commands::sync::parse_rename)]
        renamed: Vec<(String, String)>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ARBOR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut coordinator = commands::context::open_coordinator(cli.config, cli.data_dir).await?;

    match cli.command {
        Commands::List => commands::history::list(&coordinator),
        Commands::Show { root, json } => commands::history::show(&mut coordinator, &root, json).await?,
        Commands::Rename { root, title } => {
            commands::history::rename(&mut coordinator, &root, title).await?
        }
        Commands::Tag { root, tag, remove } => {
            commands::history::tag(&mut coordinator, &root, &tag, remove).await?
        }
        Commands::Delete { root } => commands::history::delete(&mut coordinator, &root).await?,
        Commands::Sync {
            root,
            force,
            changed,
            deleted,
            renamed,
        } => {
            let operations = commands::sync::operations(changed, deleted, renamed);
            commands::sync::run(&mut coordinator, &root, &operations, force).await?
        }
    }

    Ok(())
}
