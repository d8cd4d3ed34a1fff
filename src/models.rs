/// Core data models
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire id of the liked-songs selection
pub const LIKED_SONGS_ID: &str = "liked";

/// The user's chosen source of tracks
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Selection {
    #[default]
    Liked,
    Playlist(String),
}

impl Selection {
    /// Parse a stored or user-supplied id. Empty means liked songs.
    pub fn from_id(id: &str) -> Self {
        let id = id.trim();
        if id.is_empty() || id == LIKED_SONGS_ID {
            Selection::Liked
        } else {
            Selection::Playlist(id.to_string())
        }
    }

    pub fn as_id(&self) -> &str {
        match self {
            Selection::Liked => LIKED_SONGS_ID,
            Selection::Playlist(id) => id,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Liked => write!(f, "Liked Songs"),
            Selection::Playlist(id) => write!(f, "playlist {}", id),
        }
    }
}

impl FromStr for Selection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Selection::from_id(s))
    }
}

impl Serialize for Selection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_id())
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;
        Ok(Selection::from_id(&id))
    }
}

/// OAuth token pair with its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds after which the access token is unusable
    pub expires_at_ms: i64,
}

impl TokenState {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// What the user wants to play and what this process last loaded
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackSelection {
    pub selected: Selection,
    /// May be stale if playback was changed from another client
    pub armed: Option<Selection>,
}

impl PlaybackSelection {
    pub fn is_armed(&self) -> bool {
        self.armed.as_ref() == Some(&self.selected)
    }
}

/// User-configured automation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackPolicy {
    pub auto_pause_enabled: bool,
    pub auto_replay_enabled: bool,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self {
            auto_pause_enabled: true,
            auto_replay_enabled: true,
        }
    }
}

/// Opaque id of the currently active remote device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub String);

impl DeviceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current playback as reported by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub track_name: String,
    pub artist_name: String,
    pub is_playing: bool,
    pub skip_prev_disallowed: bool,
    pub skip_next_disallowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    /// Subscription type (premium, free, ...)
    pub product: Option<String>,
}

impl UserProfile {
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_ids() {
        assert_eq!(Selection::from_id("liked"), Selection::Liked);
        assert_eq!(Selection::from_id(""), Selection::Liked);
        assert_eq!(
            Selection::from_id("37i9dQZF1DXcBWIGoYBM5M"),
            Selection::Playlist("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
        assert_eq!(Selection::Liked.as_id(), LIKED_SONGS_ID);
    }

    #[test]
    fn test_selection_serializes_as_plain_id() {
        let json = serde_json::to_value(Selection::Playlist("abc".into())).unwrap();
        assert_eq!(json, serde_json::json!("abc"));
        let back: Selection = serde_json::from_value(serde_json::json!("liked")).unwrap();
        assert_eq!(back, Selection::Liked);
    }

    #[test]
    fn test_token_expiry_boundary() {
        let token = TokenState {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at_ms: 1_000,
        };
        assert!(!token.is_expired_at(999));
        assert!(token.is_expired_at(1_000));
    }

    #[test]
    fn test_armed_matches_selected() {
        let mut selection = PlaybackSelection::default();
        assert!(!selection.is_armed());
        selection.armed = Some(Selection::Liked);
        assert!(selection.is_armed());
        selection.selected = Selection::Playlist("p1".into());
        assert!(!selection.is_armed());
    }
}
