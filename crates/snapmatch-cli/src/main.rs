use anyhow::Result;
use clap::Parser;
use snapmatch_pipeline::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "snapmatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/snapmatch/snapmatch.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Create and list events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Register photos with an event
    Photos {
        #[command(subcommand)]
        action: PhotosAction,
    },
    /// Extract and store faces for an event's unprocessed photos
    ///
    /// Every photo that has not been processed yet is sent to the embedding
    /// service. Photos whose faces were stored (or that contain no face) are
    /// marked processed and never sent again. Photos that fail stay
    /// unprocessed; run the command again to retry only those.
    ///
    /// Press Ctrl-C to stop early. Photos already committed stay committed
    /// and the command exits with status 130.
    Process {
        /// Event ID
        event: String,

        /// Print the JSON trigger response instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Find photos containing the face in a reference image
    ///
    /// The reference image is sent to the embedding service once. Its face
    /// is compared with every stored face (or only those of --event) and
    /// photos scoring at or above the threshold are listed, best first.
    Search {
        /// URL of the reference image
        reference: String,

        /// Minimum similarity, in (0, 1] (default: from config, 0.6)
        #[arg(long)]
        threshold: Option<f32>,

        /// Only search this event's photos
        #[arg(long)]
        event: Option<String>,

        /// Return at most this many photos, best first (default: max_results from config)
        #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
        limit: Option<usize>,

        /// Copy matched local (file://) photos into this directory
        #[arg(long, value_name = "DIR")]
        copy_to: Option<PathBuf>,

        /// Print the JSON trigger response instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show processing status and embedding service health
    Status {
        /// Optional event ID (default: all events)
        event: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum EventAction {
    /// Create a new event
    Create {
        #[arg(long)]
        name: String,

        /// Event date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        #[arg(long)]
        description: Option<String>,

        /// Who is creating the event
        #[arg(long)]
        creator: String,
    },
    /// List all events
    List,
}

#[derive(Debug, clap::Subcommand)]
enum PhotosAction {
    /// Register photo URLs
    Add {
        /// Event ID
        event: String,

        /// Public photo URLs
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(long, default_value = "producer")]
        uploader: String,
    },
    /// Register every image in a local directory as a file:// URL
    Import {
        /// Event ID
        event: String,

        /// Directory to walk
        dir: PathBuf,

        #[arg(long, default_value = "producer")]
        uploader: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get { key: Option<String> },
    /// Set a value in the config file
    Set { key: String, value: String },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.db {
        Some(db_path) => Config::load_with_db_path(db_path)?,
        None => Config::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    match cli.command {
        Commands::Event { action } => match action {
            EventAction::Create {
                name,
                date,
                description,
                creator,
            } => commands::create_event(&config, &name, &date, description, &creator)?,
            EventAction::List => commands::list_events(&config)?,
        },
        Commands::Photos { action } => match action {
            PhotosAction::Add {
                event,
                urls,
                uploader,
            } => commands::add_photos(&config, &event, &urls, &uploader)?,
            PhotosAction::Import {
                event,
                dir,
                uploader,
            } => commands::import_photos(&config, &event, &dir, &uploader)?,
        },
        Commands::Process { event, json } => {
            let end = commands::run_process(&config, &event, json).await?;
            if end == commands::ProcessEnd::Interrupted {
                std::process::exit(commands::INTERRUPTED_EXIT_CODE);
            }
        }
        Commands::Search {
            reference,
            threshold,
            event,
            limit,
            copy_to,
            json,
        } => {
            let options = commands::SearchOptions {
                threshold,
                event,
                limit,
                copy_to,
                json,
            };
            commands::run_search(&config, &reference, &options).await?;
        }
        Commands::Status { event } => {
            commands::show_status(&config, event.as_deref()).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
