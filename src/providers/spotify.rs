/// Spotify Web API client
use super::{PlaybackApi, RemoteDevice};
use crate::config::SpotifyConfig;
use crate::error::{PlayerError, Result};
use crate::models::{DeviceHandle, PlaybackSnapshot, PlaylistSummary, UserProfile};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Spotify API response types
#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<SpotifyDevice>,
}

#[derive(Debug, Deserialize)]
struct SpotifyDevice {
    id: Option<String>,
    name: String,
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    /// Null for removed or unavailable playlist entries
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentlyPlaying {
    is_playing: bool,
    item: Option<PlayingItem>,
    actions: Option<Actions>,
}

#[derive(Debug, Deserialize)]
struct PlayingItem {
    name: String,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Actions {
    #[serde(default)]
    disallows: Disallows,
}

#[derive(Debug, Default, Deserialize)]
struct Disallows {
    #[serde(default)]
    skipping_prev: bool,
    #[serde(default)]
    skipping_next: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
    display_name: Option<String>,
    product: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistsResponse {
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Spotify Web API client state
pub struct SpotifyClient {
    base_url: String,
    client: Client,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self::with_base_url(&config.api_base_url)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
    }

    /// GET a JSON document, failing on any non-success status
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let response = self.request(Method::GET, path, token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PlayerError::RemoteCommandFailed(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a player command and map the response
    async fn command(&self, request: RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        command_result(status, &body)
    }
}

/// Map a player command response: 404 means the device is gone
fn command_result(status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(PlayerError::NoActiveDevice);
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("Unknown error occurred (HTTP {})", status.as_u16()));
    Err(PlayerError::RemoteCommandFailed(message))
}

/// Map a currently-playing response; 204 and 202 mean no session
fn parse_currently_playing(status: StatusCode, body: &str) -> Result<Option<PlaybackSnapshot>> {
    if status == StatusCode::NO_CONTENT || status == StatusCode::ACCEPTED {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(PlayerError::RemoteCommandFailed(format!(
            "HTTP error! status: {}",
            status.as_u16()
        )));
    }
    if body.trim().is_empty() {
        return Ok(None);
    }

    let playing: CurrentlyPlaying = serde_json::from_str(body)?;
    let Some(item) = playing.item else {
        return Ok(None);
    };
    let disallows = playing.actions.map(|a| a.disallows).unwrap_or_default();

    Ok(Some(PlaybackSnapshot {
        track_name: item.name,
        artist_name: item
            .artists
            .into_iter()
            .next()
            .map(|artist| artist.name)
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        is_playing: playing.is_playing,
        skip_prev_disallowed: disallows.skipping_prev,
        skip_next_disallowed: disallows.skipping_next,
    }))
}

fn track_uris(page: TrackPage) -> Vec<String> {
    page.items
        .into_iter()
        .filter_map(|item| item.track.and_then(|track| track.uri))
        .collect()
}

#[async_trait]
impl PlaybackApi for SpotifyClient {
    async fn devices(&self, token: &str) -> Result<Vec<RemoteDevice>> {
        let response: DevicesResponse = self.get_json("/me/player/devices", token).await?;
        Ok(response
            .devices
            .into_iter()
            .map(|device| RemoteDevice {
                id: device.id,
                name: device.name,
                is_active: device.is_active,
            })
            .collect())
    }

    async fn saved_track_uris(&self, token: &str, limit: u32) -> Result<Vec<String>> {
        let page: TrackPage = self
            .get_json(&format!("/me/tracks?limit={}", limit), token)
            .await?;
        Ok(track_uris(page))
    }

    async fn playlist_track_uris(&self, token: &str, playlist_id: &str) -> Result<Vec<String>> {
        let page: TrackPage = self
            .get_json(&format!("/playlists/{}/tracks", playlist_id), token)
            .await?;
        Ok(track_uris(page))
    }

    async fn play_uris(&self, token: &str, device: &DeviceHandle, uris: &[String]) -> Result<()> {
        let request = self
            .request(Method::PUT, "/me/player/play", token)
            .query(&[("device_id", device.as_str())])
            .json(&json!({ "uris": uris }));
        self.command(request).await
    }

    async fn resume(&self, token: &str, device: &DeviceHandle) -> Result<()> {
        let request = self
            .request(Method::PUT, "/me/player/play", token)
            .query(&[("device_id", device.as_str())]);
        self.command(request).await
    }

    async fn pause(&self, token: &str, device: &DeviceHandle) -> Result<()> {
        let request = self
            .request(Method::PUT, "/me/player/pause", token)
            .query(&[("device_id", device.as_str())]);
        self.command(request).await
    }

    async fn previous(&self, token: &str, device: &DeviceHandle) -> Result<()> {
        let request = self
            .request(Method::POST, "/me/player/previous", token)
            .query(&[("device_id", device.as_str())]);
        self.command(request).await
    }

    async fn next(&self, token: &str, device: &DeviceHandle) -> Result<()> {
        let request = self
            .request(Method::POST, "/me/player/next", token)
            .query(&[("device_id", device.as_str())]);
        self.command(request).await
    }

    async fn currently_playing(&self, token: &str) -> Result<Option<PlaybackSnapshot>> {
        let response = self
            .request(Method::GET, "/me/player/currently-playing", token)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        parse_currently_playing(status, &body)
    }

    async fn profile(&self, token: &str) -> Result<UserProfile> {
        let profile: ProfileResponse = self.get_json("/me", token).await?;
        Ok(UserProfile {
            id: profile.id,
            display_name: profile.display_name,
            product: profile.product,
        })
    }

    async fn playlists(&self, token: &str) -> Result<Vec<PlaylistSummary>> {
        let response: PlaylistsResponse = self.get_json("/me/playlists", token).await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| PlaylistSummary {
                id: item.id,
                name: item.name,
            })
            .collect())
    }
}
