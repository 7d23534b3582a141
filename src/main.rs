//! CLI entry point for inkpress

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkpress::{ContentKind, ContentStore, FsStorage, SiteConfig};

#[derive(Parser)]
#[command(name = "inkpress")]
#[command(version)]
#[command(about = "Markdown blog content engine", long_about = None)]
struct Cli {
    /// Set the content directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts, newest first
    List {
        /// Include drafts
        #[arg(long)]
        drafts: bool,

        /// Content kind to list (post, page)
        #[arg(long, default_value = "post")]
        kind: String,

        /// 1-based page number
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Search published posts
    Search {
        /// Term to look for
        term: String,
    },

    /// Show documents that failed to parse
    Errors,

    /// Watch the content directory and apply changes live
    Watch,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "inkpress=debug,info"
    } else {
        "inkpress=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let config_path = base_dir.join("_config.yml");
    let config = if config_path.exists() {
        SiteConfig::load(&config_path)?
    } else {
        SiteConfig::default()
    };

    let storage = Arc::new(FsStorage::new(&base_dir));
    let store = Arc::new(ContentStore::new(storage, config.clone()));
    store.load()?;

    match cli.command {
        Commands::List { drafts, kind, page } => {
            let kind = ContentKind::parse(&kind);
            let posts = store.list(kind, drafts, page, config.per_page);
            if posts.is_empty() {
                println!("No documents.");
            }
            for post in posts {
                println!(
                    "{}  {}  [{}]{}",
                    post.date.format(&config.date_format),
                    post.title,
                    post.slug,
                    if post.is_published() { "" } else { "  (draft)" }
                );
            }
        }

        Commands::Search { term } => {
            let posts = store.search(&term);
            println!("{} result(s) for {:?}", posts.len(), term);
            for post in posts {
                println!(
                    "{}  {}  [{}]",
                    post.date.format(&config.date_format),
                    post.title,
                    post.slug
                );
            }
        }

        Commands::Errors => {
            let errors = store.errors();
            if errors.is_empty() {
                println!("No parse errors.");
            } else {
                let mut paths: Vec<_> = errors.keys().collect();
                paths.sort();
                for path in paths {
                    println!("{}: {}", path, errors[path]);
                }
            }
        }

        Commands::Watch => {
            let _handle = inkpress::watch::spawn(Arc::clone(&store), base_dir.clone())?;
            println!(
                "Loaded {} documents. Watching {} for changes. Press Ctrl+C to stop.",
                store.len(),
                base_dir.display()
            );
            loop {
                std::thread::park();
            }
        }
    }

    Ok(())
}
