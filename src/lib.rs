/// hushplay - pauses Spotify while other audio plays and brings it back afterwards
pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod error;
pub mod models;
pub mod monitor;
pub mod presenter;
pub mod providers;
pub mod reconcile;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::App;
pub use commands::Controller;
pub use config::Config;
pub use error::{PlayerError, Result};
pub use models::{PlaybackPolicy, PlaybackSelection, PlaybackSnapshot, Selection, TokenState};
pub use monitor::{AudioSurface, AudioSurfaceSource, Edge, MprisSurfaces};
pub use providers::{PlaybackApi, RemotePlayback, SpotifyClient};
pub use reconcile::{Reaction, ReconciliationLoop};
