/// Main entry point for the hushplay CLI
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use hushplay::{App, Config, MprisSurfaces};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "hushplay",
    version,
    about = "Pauses Spotify while other audio plays and resumes it afterwards",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured one
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch audio activity and pause/resume Spotify automatically
    Run,

    /// Log in to Spotify through the browser
    Login,

    /// Forget the stored Spotify tokens
    Logout,

    /// Show the logged-in Spotify account
    Profile,

    /// List Liked Songs and your playlists
    Playlists,

    /// Choose what gets played (a playlist id, or "liked")
    Select { id: String },

    /// Pause, resume or start the selection, like the play button
    Toggle,

    /// Start a shuffled sample of the selection
    Play,

    /// Pause playback on the active device
    Pause,

    /// Resume playback on the active device
    Resume,

    /// Skip to the next track
    Next,

    /// Skip to the previous track
    Previous,

    /// Show what is playing and the current selection
    Status,

    /// Show or change the automation policy
    Policy {
        /// Pause Spotify when other audio starts
        #[arg(long)]
        auto_pause: Option<bool>,

        /// Restart Spotify when other audio stops
        #[arg(long)]
        auto_replay: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| anyhow!(e))
    .context("Failed to load configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    init_logging(&level)?;

    info!("Starting hushplay v{}", env!("CARGO_PKG_VERSION"));

    let app = App::open(config).await.context("Failed to open settings store")?;
    let controller = app.controller();

    match args.command.unwrap_or(Command::Status) {
        Command::Run => {
            if !controller.is_logged_in().await {
                tracing::warn!("Not logged in; run `hushplay login` first. Edges will still be tracked.");
            }
            let daemon = app.spawn_daemon(Arc::new(MprisSurfaces::new()));
            daemon
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await;
        }
        Command::Login => {
            let profile = controller
                .login(|url| {
                    println!("Open this URL in your browser to log in to Spotify:\n\n  {}\n", url);
                })
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Logged in as {}", profile.name());
        }
        Command::Logout => {
            controller.logout().await.map_err(|e| anyhow!(e))?;
            println!("Logged out");
        }
        Command::Profile => {
            let profile = controller.profile().await.map_err(|e| anyhow!(e))?;
            println!("{} ({})", profile.name(), profile.product.as_deref().unwrap_or("unknown plan"));
        }
        Command::Playlists => {
            for playlist in controller.playlists().await.map_err(|e| anyhow!(e))? {
                let marker = if playlist.selected { "*" } else { " " };
                println!("{} {:<24} {}", marker, playlist.id, playlist.name);
            }
        }
        Command::Select { id } => {
            let selection = controller.select_playlist(&id).await.map_err(|e| anyhow!(e))?;
            println!("Selected {}", selection);
        }
        Command::Toggle => {
            // A fresh process has no belief yet; ask the remote first
            controller.now_playing().await;
            let action = controller.toggle_play_pause().await.map_err(|e| anyhow!(e))?;
            println!("{}", action);
        }
        Command::Play => {
            let action = controller.play_selected().await.map_err(|e| anyhow!(e))?;
            println!("{}", action);
        }
        Command::Pause => {
            controller.pause().await.map_err(|e| anyhow!(e))?;
            println!("Playback paused!");
        }
        Command::Resume => {
            controller.resume().await.map_err(|e| anyhow!(e))?;
            println!("Playback resumed!");
        }
        Command::Next => controller.skip_next().await.map_err(|e| anyhow!(e))?,
        Command::Previous => controller.skip_previous().await.map_err(|e| anyhow!(e))?,
        Command::Status => {
            let view = controller.now_playing().await;
            let status = controller.audio_status().await.map_err(|e| anyhow!(e))?;
            println!("{}", view.status);
            let other_audio = if status.external_audio_active { "playing" } else { "silent" };
            println!("Other audio: {}", other_audio);
            println!("Selected: {}", status.selection.selected);
            println!("Play button: {}", status.play_button);
        }
        Command::Policy {
            auto_pause,
            auto_replay,
        } => {
            let policy = controller
                .set_policy(auto_pause, auto_replay)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("auto-pause:  {}", policy.auto_pause_enabled);
            println!("auto-replay: {}", policy.auto_replay_enabled);
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: filter::LevelFilter = level
        .parse()
        .with_context(|| format!("Invalid log level: {}", level))?;
    let filter = filter::Targets::new()
        .with_default(filter::LevelFilter::WARN)
        .with_target("hushplay", level)
        .with_target("hyper", filter::LevelFilter::INFO)
        .with_target("reqwest", filter::LevelFilter::INFO);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}
