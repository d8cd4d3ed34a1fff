/// Error type shared by the credential manager, the remote client and the settings store
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    /// No credentials stored at all; the user has to log in
    #[error("Not logged in to Spotify")]
    AuthUnavailable,

    /// The refresh exchange was rejected
    #[error("Spotify session expired, please log in again ({0})")]
    AuthRefreshFailed(String),

    /// The interactive authorization or the code exchange failed
    #[error("Authentication failed: {0}")]
    AuthDenied(String),

    /// Remote 404 on a device-scoped command
    #[error("No active Spotify device found. Open Spotify and start playing, then try again.")]
    NoActiveDevice,

    #[error("{0}")]
    RemoteCommandFailed(String),

    /// Transport-level failure, worded like a remote failure for the user
    #[error("{0}")]
    NetworkFailure(String),

    #[error("Settings storage error: {0}")]
    Storage(String),
}

impl PlayerError {
    /// Whether the user has to go through the login flow again
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            PlayerError::AuthUnavailable | PlayerError::AuthRefreshFailed(_)
        )
    }
}

impl From<reqwest::Error> for PlayerError {
    fn from(err: reqwest::Error) -> Self {
        PlayerError::NetworkFailure(format!("Request to Spotify failed: {}", err))
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(err: serde_json::Error) -> Self {
        PlayerError::RemoteCommandFailed(format!("Unexpected response from Spotify: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_login() {
        assert!(PlayerError::AuthUnavailable.requires_login());
        assert!(PlayerError::AuthRefreshFailed("400".to_string()).requires_login());
        assert!(!PlayerError::NoActiveDevice.requires_login());
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = PlayerError::RemoteCommandFailed("Player command failed: Restriction violated".into());
        assert_eq!(err.to_string(), "Player command failed: Restriction violated");
    }
}
