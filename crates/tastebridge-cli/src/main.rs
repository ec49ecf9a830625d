use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod app;
mod commands;

#[derive(Debug, Parser)]
#[command(name = "tastebridge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/tastebridge/tastebridge.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Store the catalog-A session credential pair
    ///
    /// The two values are the cookies captured by the web login flow. They
    /// are exchanged for a short-lived access token immediately; the token is
    /// refreshed automatically from then on until the credential expires.
    Login {
        /// Primary session cookie (sp_dc)
        #[arg(long)]
        primary: String,
        /// Secondary session cookie (sp_key)
        #[arg(long, default_value = "")]
        secondary: String,
    },
    /// Forget the stored credential and token
    Logout,
    /// Show session, profile cache and match cache status
    Status,
    /// Show the listener's merged top tracks and artists
    ///
    /// Reads through the tiered profile cache: fresh cached data is shown
    /// without touching the network; stale data is refreshed first.
    Profile {
        /// Number of tracks and artists to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Refresh from catalog A even if the cache is fresh
        #[arg(long)]
        refresh: bool,
        /// Also show followed artists and related-artist names
        #[arg(long)]
        followed: bool,
    },
    /// Recommend tracks to follow a seed track
    Recommend {
        /// Catalog-A id of the seed track
        track_id: String,
        /// Number of recommendations
        #[arg(short, long, default_value_t = 25)]
        limit: usize,
        /// Skip the engine and build the basic seed-artist queue
        #[arg(long)]
        basic: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Inspect and edit cross-catalog matches
    Matches {
        #[command(subcommand)]
        action: MatchCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Debug, clap::Subcommand)]
enum MatchCommands {
    /// List cached matches, newest first
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show the match for a catalog-A track
    Show { source_id: String },
    /// Show every catalog-A track matched to a catalog-B item
    Target { target_id: String },
    /// Pin a catalog-A track to a catalog-B item
    Override {
        source_id: String,
        target_id: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        artist: String,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write an example config file if none exists
    Init,
    /// Print the config file path
    Path,
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        },
    );
    clog.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match cli.db {
        Some(path) => tastebridge_engine::Config::load_with_db_path(path)?,
        None => tastebridge_engine::Config::load()?,
    };

    match cli.command {
        Commands::Config { action } => match action.unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => commands::config::show_config(&config)?,
            ConfigCommands::Init => commands::config::init_config()?,
            ConfigCommands::Path => commands::config::show_path(),
        },
        Commands::Login { primary, secondary } => {
            let app = app::App::open(config)?;
            commands::session::login(&app, primary, secondary).await?;
        }
        Commands::Logout => {
            let app = app::App::open(config)?;
            commands::session::logout(&app)?;
        }
        Commands::Status => {
            let app = app::App::open(config)?;
            commands::session::show_status(&app)?;
        }
        Commands::Profile {
            limit,
            refresh,
            followed,
        } => {
            let app = app::App::open(config)?;
            commands::profile::show_profile(&app, limit, refresh, followed).await?;
        }
        Commands::Recommend {
            track_id,
            limit,
            basic,
            json,
        } => {
            let app = app::App::open(config)?;
            commands::recommend::recommend(&app, &track_id, limit, basic, json).await?;
        }
        Commands::Matches { action } => {
            let app = app::App::open(config)?;
            match action {
                MatchCommands::List { limit } => commands::matches::list(&app, limit)?,
                MatchCommands::Show { source_id } => commands::matches::show(&app, &source_id)?,
                MatchCommands::Target { target_id } => commands::matches::target(&app, &target_id)?,
                MatchCommands::Override {
                    source_id,
                    target_id,
                    title,
                    artist,
                } => commands::matches::override_match(
                    &app,
                    &source_id,
                    &target_id,
                    &title,
                    &artist,
                )?,
            }
        }
    }

    Ok(())
}
