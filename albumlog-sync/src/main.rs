//! albumlog-sync - command-line entry point
//!
//! Syncs the Spotify listening history into the local database and shows
//! what was recorded.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use albumlog_common::config::{database_path, load_config, resolve_root_folder, TomlConfig};
use albumlog_common::db::init_database;
use albumlog_common::time::{format_millis, now_millis, parse_rfc3339_millis};
use albumlog_sync::config::{resolve_access_token, resolve_user_id};
use albumlog_sync::models::{ListenOutcome, SyncResult, SyncSource};
use albumlog_sync::{SpotifyClient, SqliteStore, SyncOrchestrator};

/// Command-line arguments for albumlog-sync
#[derive(Parser, Debug)]
#[command(name = "albumlog-sync")]
#[command(about = "Detect and record full album listens from Spotify listening history")]
#[command(version)]
struct Args {
    /// TOML configuration file (defaults to <config dir>/albumlog/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch recently played tracks and record album listens
    Sync {
        #[arg(short, long)]
        user: Option<String>,

        /// Spotify access token
        #[arg(long)]
        token: Option<String>,

        /// Plays to fetch (1-50)
        #[arg(long)]
        limit: Option<u32>,

        #[arg(long, value_enum, default_value_t = SourceArg::Manual)]
        source: SourceArg,
    },

    /// Reprocess archived batches left pending by an interrupted sync
    Replay {
        #[arg(long)]
        token: Option<String>,
    },

    /// Show recent sync runs
    Runs {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show recorded album listens, newest first
    Listens {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// Show listened albums with listen counts
    Albums {
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show played tracks, most recent first
    Tracks {
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long, default_value_t = 200)]
        limit: u32,
    },

    /// Show every known track of an album, including ones never played
    AlbumTracks {
        #[arg(short, long)]
        user: Option<String>,

        /// Spotify album id
        #[arg(long)]
        album: String,
    },

    /// Show every album in the database, newest first
    AllAlbums {
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Record a listen by hand for an album already in the database
    AddListen {
        #[arg(short, long)]
        user: Option<String>,

        /// Spotify album id
        #[arg(long)]
        album: String,

        /// When the album was listened to (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Delete a recorded listen
    DeleteListen {
        /// Listen guid
        guid: Uuid,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Manual,
    Cron,
}

impl From<SourceArg> for SyncSource {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::Manual => SyncSource::Manual,
            SourceArg::Cron => SyncSource::Cron,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level; logs go to stderr so JSON output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting albumlog-sync v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let store = SqliteStore::new(pool).with_max_lock_wait(toml_config.sync.max_lock_wait_ms);

    match args.command {
        Command::Sync {
            user,
            token,
            limit,
            source,
        } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let client = spotify_client(token.as_deref(), &toml_config)?;
            let orchestrator = SyncOrchestrator::new(store, client);

            let limit = limit.unwrap_or(toml_config.sync.fetch_limit);
            let result = orchestrator
                .sync_recently_played(&user_id, limit, source.into())
                .await;

            print_sync_results(args.json, std::slice::from_ref(&result))?;
            if !result.success {
                bail!("Sync failed");
            }
        }

        Command::Replay { token } => {
            let client = spotify_client(token.as_deref(), &toml_config)?;
            let orchestrator = SyncOrchestrator::new(store, client);

            let results = orchestrator
                .replay_pending_logs()
                .await
                .context("Failed to replay pending sync logs")?;

            if results.is_empty() && !args.json {
                println!("No pending sync logs");
            } else {
                print_sync_results(args.json, &results)?;
            }
            if results.iter().any(|r| !r.success) {
                bail!("One or more replays failed");
            }
        }

        Command::Runs { user, limit } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let runs = store.recent_sync_runs(&user_id, limit).await?;

            if args.json {
                print_json(&runs)?;
            } else {
                for run in &runs {
                    println!(
                        "{}  {:<7} {:<7} {:>6}ms  {} plays, {} listens{}",
                        format_millis(run.started_at),
                        run.source.as_str(),
                        run.status.as_str(),
                        run.duration_ms,
                        run.stats.tracks_from_api,
                        run.stats.album_listens_recorded,
                        run.error
                            .as_deref()
                            .map(|e| format!("  ({})", e))
                            .unwrap_or_default()
                    );
                }
            }
        }

        Command::Listens { user, limit } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let listens = store.list_listens(&user_id, limit).await?;

            if args.json {
                print_json(&listens)?;
            } else {
                for entry in &listens {
                    println!(
                        "{}  {} - {}  [{}]  {}",
                        format_millis(entry.listen.latest_played_at),
                        entry.album_name,
                        entry.artist_name,
                        entry.listen.source,
                        entry.listen.guid
                    );
                }
            }
        }

        Command::Albums { user } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let albums = store.list_user_albums(&user_id).await?;

            if args.json {
                print_json(&albums)?;
            } else {
                for entry in &albums {
                    println!(
                        "{:>3}x  {} - {}  (last {})",
                        entry.listen_count,
                        entry.album.name,
                        entry.album.artist_name,
                        format_millis(entry.last_listened_at)
                    );
                }
            }
        }

        Command::Tracks { user, limit } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let tracks = store.list_tracks(&user_id, limit).await?;

            if args.json {
                print_json(&tracks)?;
            } else {
                for track in &tracks {
                    println!(
                        "{}  {} - {}  ({})",
                        track.last_played_at.map(format_millis).unwrap_or_default(),
                        track.track_name,
                        track.artist_name,
                        track.album_name.as_deref().unwrap_or("unknown album")
                    );
                }
            }
        }

        Command::AlbumTracks { user, album } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let tracks = store.album_tracks(&user_id, &album).await?;

            if args.json {
                print_json(&tracks)?;
            } else if tracks.is_empty() {
                println!("No tracks for album {}", album);
            } else {
                for track in &tracks {
                    println!(
                        "{:>3}. {}  {}",
                        track.track_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
                        track.track_name,
                        track
                            .last_played_at
                            .map(|at| format!("last played {}", format_millis(at)))
                            .unwrap_or_else(|| "never played".to_string())
                    );
                }
            }
        }

        Command::AllAlbums { limit } => {
            let albums = store.list_albums(limit).await?;

            if args.json {
                print_json(&albums)?;
            } else {
                for album in &albums {
                    println!(
                        "{}  {} - {}  ({} tracks)",
                        album.spotify_album_id, album.name, album.artist_name, album.total_tracks
                    );
                }
            }
        }

        Command::AddListen { user, album, at } => {
            let user_id = resolve_user_id(user.as_deref(), &toml_config)?;
            let listened_at = match at.as_deref() {
                Some(value) => parse_rfc3339_millis(value)?,
                None => now_millis(),
            };

            let outcome = store
                .add_manual_listen(&user_id, &album, listened_at)
                .await
                .with_context(|| format!("Failed to add listen for album {}", album))?;

            match outcome {
                ListenOutcome::Recorded => println!("Listen recorded at {}", format_millis(listened_at)),
                ListenOutcome::Duplicate => println!("A listen at {} already exists", format_millis(listened_at)),
            }
        }

        Command::DeleteListen { guid } => {
            if store.delete_listen(guid).await? {
                println!("Deleted listen {}", guid);
            } else {
                bail!("No listen with id {}", guid);
            }
        }
    }

    Ok(())
}

fn spotify_client(cli_token: Option<&str>, toml_config: &TomlConfig) -> Result<SpotifyClient> {
    let token = resolve_access_token(cli_token, toml_config)?;

    SpotifyClient::new(
        token,
        toml_config.spotify.api_base_url.clone(),
        toml_config.spotify.rate_limit_ms,
    )
    .context("Failed to create Spotify client")
}

fn print_sync_results(json: bool, results: &[SyncResult]) -> Result<()> {
    if json {
        return print_json(results);
    }

    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", result.summary());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
