/// Automatic pause and replay driven by foreground audio edges
///
/// The loop tracks whether other audio is believed active and reacts to each
/// transition with at most one remote action. Policy flags gate the action,
/// never the state tracking, so the state always follows edge parity.
use crate::error::PlayerError;
use crate::monitor::Edge;
use crate::providers::RemotePlayback;
use crate::state::SharedState;
use crate::storage::Settings;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExternalAudio {
    #[default]
    Idle,
    Active,
}

/// What the loop did in response to one edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// No transition: a `None` edge or one that repeats the current state
    Ignored,
    /// Transitioned, but the matching policy flag is off
    PolicyDisabled,
    Paused,
    Started { tracks: usize },
    NothingToPlay,
    Failed(PlayerError),
}

pub struct ReconciliationLoop {
    remote: Arc<RemotePlayback>,
    settings: Settings,
    state: SharedState,
    external: ExternalAudio,
}

impl ReconciliationLoop {
    pub fn new(remote: Arc<RemotePlayback>, settings: Settings, state: SharedState) -> Self {
        Self {
            remote,
            settings,
            state,
            external: ExternalAudio::Idle,
        }
    }

    pub fn external_audio(&self) -> ExternalAudio {
        self.external
    }

    pub async fn handle_edge(&mut self, edge: Edge) -> Reaction {
        let reaction = match (self.external, edge) {
            (ExternalAudio::Idle, Edge::Rising) => {
                self.transition(ExternalAudio::Active).await;
                info!("Non-Spotify audio started");
                self.on_audio_started().await
            }
            (ExternalAudio::Active, Edge::Falling) => {
                self.transition(ExternalAudio::Idle).await;
                info!("Non-Spotify audio stopped");
                self.on_audio_stopped().await
            }
            (_, Edge::None) => return Reaction::Ignored,
            (current, edge) => {
                debug!("Ignoring {:?} edge while {:?}", edge, current);
                return Reaction::Ignored;
            }
        };

        match &reaction {
            Reaction::Failed(e) => error!("Automatic playback action failed: {}", e),
            other => debug!("Reaction to {:?}: {:?}", edge, other),
        }
        reaction
    }

    /// Start from Idle, clearing a flag left behind by an earlier run
    pub async fn reset(&mut self) {
        self.transition(ExternalAudio::Idle).await;
    }

    async fn transition(&mut self, next: ExternalAudio) {
        self.external = next;
        let active = next == ExternalAudio::Active;
        self.state.set_external_audio_active(active).await;
        // Other processes (the CLI) read the flag from the store
        if let Err(e) = self.settings.set_external_audio_active(active).await {
            warn!("Failed to persist external audio state: {}", e);
        }
    }

    async fn on_audio_started(&self) -> Reaction {
        let policy = match self.settings.policy().await {
            Ok(policy) => policy,
            Err(e) => return Reaction::Failed(e),
        };
        if !policy.auto_pause_enabled {
            info!("Auto-pause disabled, leaving Spotify playing");
            return Reaction::PolicyDisabled;
        }

        match self.pause().await {
            Ok(()) => {
                self.state.set_believed_playing(false).await;
                Reaction::Paused
            }
            Err(e) => Reaction::Failed(e),
        }
    }

    async fn on_audio_stopped(&self) -> Reaction {
        let policy = match self.settings.policy().await {
            Ok(policy) => policy,
            Err(e) => return Reaction::Failed(e),
        };
        if !policy.auto_replay_enabled {
            info!("Auto-replay disabled, not restarting Spotify");
            return Reaction::PolicyDisabled;
        }

        match self.replay().await {
            Ok(reaction) => reaction,
            Err(e) => Reaction::Failed(e),
        }
    }

    async fn pause(&self) -> crate::error::Result<()> {
        let device = self
            .remote
            .list_active_device()
            .await?
            .ok_or(PlayerError::NoActiveDevice)?;
        self.remote.pause_playback(&device).await
    }

    async fn replay(&self) -> crate::error::Result<Reaction> {
        let device = self
            .remote
            .list_active_device()
            .await?
            .ok_or(PlayerError::NoActiveDevice)?;

        let selected = self.settings.selection().await?.selected;
        let tracks = self.remote.list_tracks_for_selection(&selected).await?;
        if tracks.is_empty() {
            warn!("No tracks found for {}, nothing to play", selected);
            return Ok(Reaction::NothingToPlay);
        }

        let count = self.remote.start_playback(&device, tracks).await?;
        self.settings.set_armed(&selected).await?;
        self.state.set_believed_playing(true).await;
        Ok(Reaction::Started { tracks: count })
    }
}
