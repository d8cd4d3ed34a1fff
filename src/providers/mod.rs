/// Remote playback primitives shared by the automation loop and the control surface
pub mod spotify;

use crate::auth::CredentialManager;
use crate::error::Result;
use crate::models::{DeviceHandle, PlaybackSnapshot, PlaylistSummary, Selection, UserProfile};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

pub use spotify::SpotifyClient;

/// Page size for the liked-songs fetch
pub const LIKED_SONGS_PAGE_SIZE: u32 = 50;

/// Most URIs submitted as one play queue
pub const MAX_QUEUE_LENGTH: usize = 50;

/// A device as listed by the remote API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDevice {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
}

/// Raw request/response surface of the remote API.
///
/// Every call takes an access token that the caller already validated;
/// implementations never refresh it themselves.
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    async fn devices(&self, token: &str) -> Result<Vec<RemoteDevice>>;

    async fn saved_track_uris(&self, token: &str, limit: u32) -> Result<Vec<String>>;

    /// First page of a playlist, remote default page size
    async fn playlist_track_uris(&self, token: &str, playlist_id: &str) -> Result<Vec<String>>;

    /// Replace the play queue on a device with these URIs
    async fn play_uris(&self, token: &str, device: &DeviceHandle, uris: &[String]) -> Result<()>;

    async fn resume(&self, token: &str, device: &DeviceHandle) -> Result<()>;

    async fn pause(&self, token: &str, device: &DeviceHandle) -> Result<()>;

    async fn previous(&self, token: &str, device: &DeviceHandle) -> Result<()>;

    async fn next(&self, token: &str, device: &DeviceHandle) -> Result<()>;

    /// `None` when there is no playback session
    async fn currently_playing(&self, token: &str) -> Result<Option<PlaybackSnapshot>>;

    async fn profile(&self, token: &str) -> Result<UserProfile>;

    async fn playlists(&self, token: &str) -> Result<Vec<PlaylistSummary>>;
}

/// Playback commands authorized through the credential manager
pub struct RemotePlayback {
    credentials: Arc<CredentialManager>,
    api: Arc<dyn PlaybackApi>,
    rng: Mutex<StdRng>,
}

impl RemotePlayback {
    pub fn new(credentials: Arc<CredentialManager>, api: Arc<dyn PlaybackApi>) -> Self {
        Self {
            credentials,
            api,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic shuffle order, for tests
    pub fn with_seed(credentials: Arc<CredentialManager>, api: Arc<dyn PlaybackApi>, seed: u64) -> Self {
        Self {
            credentials,
            api,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    async fn token(&self) -> Result<String> {
        self.credentials.get_valid_access_token().await
    }

    /// The first device flagged active, if any
    pub async fn list_active_device(&self) -> Result<Option<DeviceHandle>> {
        let token = self.token().await?;
        let devices = self.api.devices(&token).await?;
        Ok(devices
            .into_iter()
            .find(|device| device.is_active)
            .and_then(|device| device.id)
            .map(DeviceHandle))
    }

    /// Track URIs for a selection. Fetch failures yield an empty list.
    pub async fn list_tracks_for_selection(&self, selection: &Selection) -> Result<Vec<String>> {
        let token = self.token().await?;
        let fetched = match selection {
            Selection::Liked => self.api.saved_track_uris(&token, LIKED_SONGS_PAGE_SIZE).await,
            Selection::Playlist(id) => self.api.playlist_track_uris(&token, id).await,
        };

        match fetched {
            Ok(uris) => {
                tracing::debug!("Fetched {} tracks for {}", uris.len(), selection);
                Ok(uris)
            }
            Err(e) => {
                tracing::error!("Error fetching tracks for {}: {}", selection, e);
                Ok(Vec::new())
            }
        }
    }

    /// Shuffle the URIs and start the first fifty on the device
    /// Shuffle, cap and submit the tracks; returns how many were queued
    pub async fn start_playback(&self, device: &DeviceHandle, mut uris: Vec<String>) -> Result<usize> {
        let token = self.token().await?;
        {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            uris.shuffle(&mut *rng);
        }
        uris.truncate(MAX_QUEUE_LENGTH);

        self.api.play_uris(&token, device, &uris).await?;
        tracing::info!("Playback started with {} tracks on {}", uris.len(), device);
        Ok(uris.len())
    }

    pub async fn pause_playback(&self, device: &DeviceHandle) -> Result<()> {
        let token = self.token().await?;
        self.api.pause(&token, device).await?;
        tracing::info!("Playback paused on {}", device);
        Ok(())
    }

    pub async fn resume_playback(&self, device: &DeviceHandle) -> Result<()> {
        let token = self.token().await?;
        self.api.resume(&token, device).await?;
        tracing::info!("Playback resumed on {}", device);
        Ok(())
    }

    pub async fn skip_previous(&self, device: &DeviceHandle) -> Result<()> {
        let token = self.token().await?;
        self.api.previous(&token, device).await
    }

    pub async fn skip_next(&self, device: &DeviceHandle) -> Result<()> {
        let token = self.token().await?;
        self.api.next(&token, device).await
    }

    pub async fn get_current_playback(&self) -> Result<Option<PlaybackSnapshot>> {
        let token = self.token().await?;
        self.api.currently_playing(&token).await
    }

    pub async fn profile(&self) -> Result<UserProfile> {
        let token = self.token().await?;
        self.api.profile(&token).await
    }

    pub async fn playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let token = self.token().await?;
        self.api.playlists(&token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlayerError;
    use crate::test_support::{logged_in_credentials, logged_out_credentials, ApiCall, FakeApi};
    use std::collections::HashSet;

    fn uris(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("spotify:track:{}", i)).collect()
    }

    #[tokio::test]
    async fn test_active_device_is_first_active_entry() {
        let api = Arc::new(FakeApi::new().with_devices(vec![
            RemoteDevice {
                id: Some("phone".into()),
                name: "Phone".into(),
                is_active: false,
            },
            RemoteDevice {
                id: Some("laptop".into()),
                name: "Laptop".into(),
                is_active: true,
            },
        ]));
        let remote = RemotePlayback::new(logged_in_credentials().await, api);

        assert_eq!(
            remote.list_active_device().await.unwrap(),
            Some(DeviceHandle("laptop".into()))
        );
    }

    #[tokio::test]
    async fn test_no_active_device_is_none() {
        let api = Arc::new(FakeApi::new().with_devices(vec![RemoteDevice {
            id: Some("phone".into()),
            name: "Phone".into(),
            is_active: false,
        }]));
        let remote = RemotePlayback::new(logged_in_credentials().await, api);

        assert_eq!(remote.list_active_device().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_liked_fetch_failure_is_empty() {
        let api = Arc::new(FakeApi::new().failing_track_fetches());
        let remote = RemotePlayback::new(logged_in_credentials().await, api.clone());

        let tracks = remote.list_tracks_for_selection(&Selection::Liked).await;
        assert_eq!(tracks, Ok(Vec::new()));
        assert_eq!(api.calls(), vec![ApiCall::SavedTracks(LIKED_SONGS_PAGE_SIZE)]);
    }

    #[tokio::test]
    async fn test_playlist_selection_fetches_playlist() {
        let api = Arc::new(FakeApi::new().with_playlist_tracks(uris(3)));
        let remote = RemotePlayback::new(logged_in_credentials().await, api.clone());

        let tracks = remote
            .list_tracks_for_selection(&Selection::Playlist("p1".into()))
            .await
            .unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(api.calls(), vec![ApiCall::PlaylistTracks("p1".into())]);
    }

    #[tokio::test]
    async fn test_start_playback_submits_fifty_distinct_inputs() {
        let api = Arc::new(FakeApi::new());
        let remote = RemotePlayback::with_seed(logged_in_credentials().await, api.clone(), 7);
        let input = uris(200);

        let queued = remote
            .start_playback(&DeviceHandle("laptop".into()), input.clone())
            .await
            .unwrap();
        assert_eq!(queued, MAX_QUEUE_LENGTH);

        let submitted = api.played().pop().unwrap();
        assert_eq!(submitted.len(), MAX_QUEUE_LENGTH);
        let unique: HashSet<_> = submitted.iter().collect();
        assert_eq!(unique.len(), MAX_QUEUE_LENGTH);
        let input_set: HashSet<_> = input.iter().collect();
        assert!(submitted.iter().all(|uri| input_set.contains(uri)));
    }

    #[tokio::test]
    async fn test_start_playback_keeps_short_lists_whole() {
        let api = Arc::new(FakeApi::new());
        let remote = RemotePlayback::with_seed(logged_in_credentials().await, api.clone(), 1);
        let input = uris(12);

        let queued = remote
            .start_playback(&DeviceHandle("laptop".into()), input.clone())
            .await
            .unwrap();
        assert_eq!(queued, 12);

        let mut submitted = api.played().pop().unwrap();
        submitted.sort();
        let mut expected = input;
        expected.sort();
        assert_eq!(submitted, expected);
    }

    #[tokio::test]
    async fn test_commands_propagate_missing_credentials() {
        let api = Arc::new(FakeApi::new());
        let remote = RemotePlayback::new(logged_out_credentials(), api.clone());
        let device = DeviceHandle("laptop".into());

        assert_eq!(
            remote.pause_playback(&device).await,
            Err(PlayerError::AuthUnavailable)
        );
        assert_eq!(
            remote.list_tracks_for_selection(&Selection::Liked).await,
            Err(PlayerError::AuthUnavailable)
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_pause_passes_no_active_device_through() {
        let api = Arc::new(FakeApi::new().with_command_error(PlayerError::NoActiveDevice));
        let remote = RemotePlayback::new(logged_in_credentials().await, api);

        assert_eq!(
            remote.pause_playback(&DeviceHandle("gone".into())).await,
            Err(PlayerError::NoActiveDevice)
        );
    }
}
