/// Fakes shared by the unit tests
use crate::auth::{Clock, CredentialManager, TokenEndpoint, TokenGrant};
use crate::error::{PlayerError, Result};
use crate::models::{DeviceHandle, PlaybackSnapshot, PlaylistSummary, UserProfile};
use crate::providers::{PlaybackApi, RemoteDevice};
use crate::storage::MemoryStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NOW_MS: i64 = 1_700_000_000_000;

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

pub struct FakeTokenEndpoint {
    access_token: String,
    rotated_refresh: Option<String>,
    delay: Option<Duration>,
    fail: bool,
    refresh_calls: AtomicUsize,
}

impl FakeTokenEndpoint {
    pub fn succeeding(access_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            rotated_refresh: None,
            delay: None,
            fail: false,
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::succeeding("unused")
        }
    }

    pub fn with_rotated_refresh(mut self, refresh_token: &str) -> Self {
        self.rotated_refresh = Some(refresh_token.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange_code(&self, _code: &str) -> Result<TokenGrant> {
        if self.fail {
            return Err(PlayerError::AuthDenied("invalid_grant".to_string()));
        }
        Ok(TokenGrant {
            access_token: self.access_token.clone(),
            refresh_token: Some(format!("{}_refresh", self.access_token)),
            expires_in_secs: 3600,
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PlayerError::AuthRefreshFailed("invalid_grant".to_string()));
        }
        Ok(TokenGrant {
            access_token: self.access_token.clone(),
            refresh_token: self.rotated_refresh.clone(),
            expires_in_secs: 3600,
        })
    }
}

/// Credentials holding a token that stays valid under the fixed clock
pub async fn logged_in_credentials() -> Arc<CredentialManager> {
    let credentials = logged_out_credentials();
    credentials
        .complete_authorization("code")
        .await
        .expect("fake authorization succeeds");
    credentials
}

pub fn logged_out_credentials() -> Arc<CredentialManager> {
    Arc::new(CredentialManager::with_clock(
        Arc::new(MemoryStore::new()),
        Arc::new(FakeTokenEndpoint::succeeding("access")),
        Arc::new(FixedClock(NOW_MS)),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Devices,
    SavedTracks(u32),
    PlaylistTracks(String),
    Play(String),
    Resume(String),
    Pause(String),
    Previous(String),
    Next(String),
    CurrentlyPlaying,
    Profile,
    Playlists,
}

/// Scriptable remote API that records every call
pub struct FakeApi {
    devices: Mutex<Vec<RemoteDevice>>,
    liked: Vec<String>,
    playlist_tracks: Vec<String>,
    fail_track_fetches: bool,
    command_error: Option<PlayerError>,
    current: Mutex<Result<Option<PlaybackSnapshot>>>,
    playlists: Vec<PlaylistSummary>,
    calls: Mutex<Vec<ApiCall>>,
    played: Mutex<Vec<Vec<String>>>,
}

impl FakeApi {
    /// One active device named "laptop", no tracks, nothing playing
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(vec![RemoteDevice {
                id: Some("laptop".to_string()),
                name: "Laptop".to_string(),
                is_active: true,
            }]),
            liked: Vec::new(),
            playlist_tracks: Vec::new(),
            fail_track_fetches: false,
            command_error: None,
            current: Mutex::new(Ok(None)),
            playlists: Vec::new(),
            calls: Mutex::new(Vec::new()),
            played: Mutex::new(Vec::new()),
        }
    }

    pub fn with_devices(self, devices: Vec<RemoteDevice>) -> Self {
        self.set_devices(devices);
        self
    }

    pub fn with_liked_tracks(mut self, uris: Vec<String>) -> Self {
        self.liked = uris;
        self
    }

    pub fn with_playlist_tracks(mut self, uris: Vec<String>) -> Self {
        self.playlist_tracks = uris;
        self
    }

    pub fn failing_track_fetches(mut self) -> Self {
        self.fail_track_fetches = true;
        self
    }

    /// Every player command fails with this error
    pub fn with_command_error(mut self, error: PlayerError) -> Self {
        self.command_error = Some(error);
        self
    }

    pub fn with_playlists(mut self, playlists: Vec<PlaylistSummary>) -> Self {
        self.playlists = playlists;
        self
    }

    pub fn set_devices(&self, devices: Vec<RemoteDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn set_current_playback(&self, current: Result<Option<PlaybackSnapshot>>) {
        *self.current.lock().unwrap() = current;
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }

    /// URI lists submitted through `play_uris`, oldest first
    pub fn played(&self) -> Vec<Vec<String>> {
        self.played.lock().unwrap().clone()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn command(&self) -> Result<()> {
        match &self.command_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn tracks(&self, uris: &[String]) -> Result<Vec<String>> {
        if self.fail_track_fetches {
            return Err(PlayerError::RemoteCommandFailed("HTTP error! status: 500".to_string()));
        }
        Ok(uris.to_vec())
    }
}

#[async_trait]
impl PlaybackApi for FakeApi {
    async fn devices(&self, _token: &str) -> Result<Vec<RemoteDevice>> {
        self.record(ApiCall::Devices);
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn saved_track_uris(&self, _token: &str, limit: u32) -> Result<Vec<String>> {
        self.record(ApiCall::SavedTracks(limit));
        self.tracks(&self.liked)
    }

    async fn playlist_track_uris(&self, _token: &str, playlist_id: &str) -> Result<Vec<String>> {
        self.record(ApiCall::PlaylistTracks(playlist_id.to_string()));
        self.tracks(&self.playlist_tracks)
    }

    async fn play_uris(&self, _token: &str, device: &DeviceHandle, uris: &[String]) -> Result<()> {
        self.record(ApiCall::Play(device.0.clone()));
        self.command()?;
        self.played.lock().unwrap().push(uris.to_vec());
        Ok(())
    }

    async fn resume(&self, _token: &str, device: &DeviceHandle) -> Result<()> {
        self.record(ApiCall::Resume(device.0.clone()));
        self.command()
    }

    async fn pause(&self, _token: &str, device: &DeviceHandle) -> Result<()> {
        self.record(ApiCall::Pause(device.0.clone()));
        self.command()
    }

    async fn previous(&self, _token: &str, device: &DeviceHandle) -> Result<()> {
        self.record(ApiCall::Previous(device.0.clone()));
        self.command()
    }

    async fn next(&self, _token: &str, device: &DeviceHandle) -> Result<()> {
        self.record(ApiCall::Next(device.0.clone()));
        self.command()
    }

    async fn currently_playing(&self, _token: &str) -> Result<Option<PlaybackSnapshot>> {
        self.record(ApiCall::CurrentlyPlaying);
        self.current.lock().unwrap().clone()
    }

    async fn profile(&self, _token: &str) -> Result<UserProfile> {
        self.record(ApiCall::Profile);
        Ok(UserProfile {
            id: "user1".to_string(),
            display_name: Some("Test User".to_string()),
            product: Some("premium".to_string()),
        })
    }

    async fn playlists(&self, _token: &str) -> Result<Vec<PlaylistSummary>> {
        self.record(ApiCall::Playlists);
        Ok(self.playlists.clone())
    }
}
