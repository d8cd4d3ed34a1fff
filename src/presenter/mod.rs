/// Now-playing view derived from the remote playback snapshot
use crate::models::{PlaybackSelection, PlaybackSnapshot};
use crate::providers::RemotePlayback;
use crate::state::SharedState;
use serde::Serialize;
use std::sync::Arc;

pub const NOTHING_PLAYING: &str = "No track currently playing";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NowPlayingView {
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub is_playing: bool,
    pub skip_prev_enabled: bool,
    pub skip_next_enabled: bool,
    pub status: String,
}

impl NowPlayingView {
    /// Nothing is playing and both skip buttons are disabled
    pub fn idle() -> Self {
        Self::disabled(NOTHING_PLAYING.to_string())
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::disabled(format!("Error: {}", message))
    }

    fn disabled(status: String) -> Self {
        Self {
            track_name: None,
            artist_name: None,
            is_playing: false,
            skip_prev_enabled: false,
            skip_next_enabled: false,
            status,
        }
    }

    pub fn from_snapshot(snapshot: PlaybackSnapshot) -> Self {
        Self {
            status: format!(
                "Now playing: {} by {}",
                snapshot.track_name, snapshot.artist_name
            ),
            track_name: Some(snapshot.track_name),
            artist_name: Some(snapshot.artist_name),
            is_playing: snapshot.is_playing,
            skip_prev_enabled: !snapshot.skip_prev_disallowed,
            skip_next_enabled: !snapshot.skip_next_disallowed,
        }
    }
}

impl Default for NowPlayingView {
    fn default() -> Self {
        Self::idle()
    }
}

/// Label of the combined play/pause control
pub fn play_button_label(believed_playing: bool, selection: &PlaybackSelection) -> &'static str {
    if believed_playing {
        "Pause"
    } else if selection.is_armed() {
        "Resume"
    } else {
        "Play Selected"
    }
}

pub struct NowPlayingPresenter {
    remote: Arc<RemotePlayback>,
    state: SharedState,
}

impl NowPlayingPresenter {
    pub fn new(remote: Arc<RemotePlayback>, state: SharedState) -> Self {
        Self { remote, state }
    }

    /// Poll the remote once and publish the result. Never fails.
    pub async fn refresh(&self) -> NowPlayingView {
        let view = match self.remote.get_current_playback().await {
            Ok(Some(snapshot)) => NowPlayingView::from_snapshot(snapshot),
            Ok(None) => NowPlayingView::idle(),
            Err(e) => {
                tracing::debug!("Error fetching now playing: {}", e);
                NowPlayingView::error(e)
            }
        };

        self.state.publish_now_playing(view.clone()).await;
        view
    }
}
