// Command handlers for the hushplay control surface
use crate::auth::callback;
use crate::auth::SpotifyTokenEndpoint;
use crate::error::PlayerError;
use crate::models::{DeviceHandle, PlaybackPolicy, PlaybackSelection, Selection, UserProfile, LIKED_SONGS_ID};
use crate::presenter::{play_button_label, NowPlayingPresenter, NowPlayingView};
use crate::providers::RemotePlayback;
use crate::state::SharedState;
use crate::storage::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Command response types
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct AudioStatus {
    pub external_audio_active: bool,
    pub believed_playing: bool,
    pub selection: PlaybackSelection,
    pub play_button: String,
}

/// What the combined play/pause control ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    Paused,
    Resumed,
    Started { tracks: usize },
}

impl fmt::Display for PlayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayAction::Paused => write!(f, "Playback paused!"),
            PlayAction::Resumed => write!(f, "Playback resumed!"),
            PlayAction::Started { tracks } => write!(f, "Playback started! ({} tracks)", tracks),
        }
    }
}

/// A pending interactive authorization
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub url: String,
    pub state: String,
}

fn to_message(err: PlayerError) -> String {
    err.to_string()
}

/// UI-facing commands over the shared remote playback client
pub struct Controller {
    remote: Arc<RemotePlayback>,
    settings: Settings,
    state: SharedState,
    authorizer: Option<Arc<SpotifyTokenEndpoint>>,
}

impl Controller {
    pub fn new(remote: Arc<RemotePlayback>, settings: Settings, state: SharedState) -> Self {
        Self {
            remote,
            settings,
            state,
            authorizer: None,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Arc<SpotifyTokenEndpoint>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    fn authorizer(&self) -> Result<&SpotifyTokenEndpoint, String> {
        self.authorizer
            .as_deref()
            .ok_or_else(|| "Spotify login is not configured".to_string())
    }

    /// Build the authorize URL for a fresh CSRF state
    pub fn begin_login(&self) -> Result<LoginRequest, String> {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = self
            .authorizer()?
            .authorize_url(&state)
            .map_err(to_message)?;
        Ok(LoginRequest { url, state })
    }

    /// Run the whole interactive flow. `open` receives the URL the user must visit.
    pub async fn login(&self, open: impl FnOnce(&str)) -> Result<UserProfile, String> {
        let request = self.begin_login()?;
        open(&request.url);

        let code = callback::wait_for_code(self.authorizer()?.redirect_uri(), &request.state)
            .await
            .map_err(to_message)?;
        self.finish_login(&code).await
    }

    /// Exchange the authorization code and fetch the profile it belongs to
    pub async fn finish_login(&self, code: &str) -> Result<UserProfile, String> {
        self.remote
            .credentials()
            .complete_authorization(code)
            .await
            .map_err(to_message)?;
        let profile = self.remote.profile().await.map_err(to_message)?;
        tracing::info!("Logged in as {}", profile.name());
        Ok(profile)
    }

    pub async fn logout(&self) -> Result<(), String> {
        self.remote
            .credentials()
            .logout()
            .await
            .map_err(to_message)?;
        self.state.publish_now_playing(NowPlayingView::idle()).await;
        Ok(())
    }

    pub async fn is_logged_in(&self) -> bool {
        self.remote.credentials().is_logged_in().await
    }

    pub async fn profile(&self) -> Result<UserProfile, String> {
        self.remote.profile().await.map_err(to_message)
    }

    /// Liked Songs first, then the user's playlists
    pub async fn playlists(&self) -> Result<Vec<PlaylistInfo>, String> {
        let selected = self.selection().await?.selected;
        let playlists = self
            .remote
            .playlists()
            .await
            .map_err(|e| format!("Error fetching playlists: {}", e))?;

        let liked = PlaylistInfo {
            id: LIKED_SONGS_ID.to_string(),
            name: "Liked Songs".to_string(),
            selected: selected == Selection::Liked,
        };
        Ok(std::iter::once(liked)
            .chain(playlists.into_iter().map(|playlist| PlaylistInfo {
                selected: selected.as_id() == playlist.id,
                id: playlist.id,
                name: playlist.name,
            }))
            .collect())
    }

    pub async fn select_playlist(&self, id: &str) -> Result<Selection, String> {
        let selection = Selection::from_id(id);
        self.settings
            .set_selected(&selection)
            .await
            .map_err(to_message)?;
        tracing::info!("Selected {}", selection);
        Ok(selection)
    }

    pub async fn selection(&self) -> Result<PlaybackSelection, String> {
        self.settings.selection().await.map_err(to_message)
    }

    async fn active_device(&self) -> Result<DeviceHandle, String> {
        self.remote
            .list_active_device()
            .await
            .map_err(to_message)?
            .ok_or_else(|| PlayerError::NoActiveDevice.to_string())
    }

    /// Pause when playing, resume the armed selection, or start the selected one
    pub async fn toggle_play_pause(&self) -> Result<PlayAction, String> {
        if self.state.believed_playing().await {
            self.pause().await?;
            return Ok(PlayAction::Paused);
        }

        if self.selection().await?.is_armed() {
            self.resume().await?;
            Ok(PlayAction::Resumed)
        } else {
            self.play_selected().await
        }
    }

    /// Load a shuffled sample of the selected source onto the active device
    pub async fn play_selected(&self) -> Result<PlayAction, String> {
        let device = self.active_device().await?;
        let selected = self.selection().await?.selected;

        let tracks = self
            .remote
            .list_tracks_for_selection(&selected)
            .await
            .map_err(to_message)?;
        if tracks.is_empty() {
            return Err("No tracks found in the selected playlist".to_string());
        }

        let count = self
            .remote
            .start_playback(&device, tracks)
            .await
            .map_err(to_message)?;
        self.settings.set_armed(&selected).await.map_err(to_message)?;
        self.state.set_believed_playing(true).await;
        Ok(PlayAction::Started { tracks: count })
    }

    pub async fn resume(&self) -> Result<(), String> {
        let device = self.active_device().await?;
        self.remote
            .resume_playback(&device)
            .await
            .map_err(to_message)?;
        self.state.set_believed_playing(true).await;
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), String> {
        let device = self.active_device().await?;
        self.remote
            .pause_playback(&device)
            .await
            .map_err(to_message)?;
        self.state.set_believed_playing(false).await;
        Ok(())
    }

    pub async fn skip_previous(&self) -> Result<(), String> {
        let device = self.active_device().await?;
        self.remote.skip_previous(&device).await.map_err(to_message)
    }

    pub async fn skip_next(&self) -> Result<(), String> {
        let device = self.active_device().await?;
        self.remote.skip_next(&device).await.map_err(to_message)
    }

    /// Poll the remote now and return the refreshed view
    pub async fn now_playing(&self) -> NowPlayingView {
        NowPlayingPresenter::new(self.remote.clone(), self.state.clone())
            .refresh()
            .await
    }

    pub async fn policy(&self) -> Result<PlaybackPolicy, String> {
        self.settings.policy().await.map_err(to_message)
    }

    /// Update either flag; `None` leaves it unchanged
    pub async fn set_policy(
        &self,
        auto_pause: Option<bool>,
        auto_replay: Option<bool>,
    ) -> Result<PlaybackPolicy, String> {
        if let Some(enabled) = auto_pause {
            self.settings
                .set_auto_pause(enabled)
                .await
                .map_err(to_message)?;
        }
        if let Some(enabled) = auto_replay {
            self.settings
                .set_auto_replay(enabled)
                .await
                .map_err(to_message)?;
        }
        self.policy().await
    }

    pub async fn audio_status(&self) -> Result<AudioStatus, String> {
        let selection = self.selection().await?;
        let believed_playing = self.state.believed_playing().await;
        Ok(AudioStatus {
            external_audio_active: self
                .settings
                .external_audio_active()
                .await
                .map_err(to_message)?,
            believed_playing,
            play_button: play_button_label(believed_playing, &selection).to_string(),
            selection,
        })
    }
}
