/// Wiring of the shared components from a loaded configuration
use crate::auth::{CredentialManager, SpotifyTokenEndpoint};
use crate::commands::Controller;
use crate::config::Config;
use crate::daemon::Daemon;
use crate::error::{PlayerError, Result};
use crate::monitor::{ActivityMonitor, AudioSurfaceSource};
use crate::presenter::NowPlayingPresenter;
use crate::providers::{RemotePlayback, SpotifyClient};
use crate::reconcile::ReconciliationLoop;
use crate::state::SharedState;
use crate::storage::{JsonFileStore, KeyValueStore, Settings};
use std::sync::Arc;

/// Everything the daemon and the control surface share
pub struct App {
    config: Config,
    endpoint: Arc<SpotifyTokenEndpoint>,
    remote: Arc<RemotePlayback>,
    settings: Settings,
    state: SharedState,
}

impl App {
    /// Open the settings store in the configured data directory
    pub async fn open(config: Config) -> Result<Self> {
        let data_dir = config
            .data_dir()
            .map_err(|e| PlayerError::Storage(e.to_string()))?;
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(data_dir).await?);
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        let endpoint = Arc::new(SpotifyTokenEndpoint::new(&config.spotify));
        let credentials = Arc::new(CredentialManager::new(store.clone(), endpoint.clone()));
        let api = Arc::new(SpotifyClient::new(&config.spotify));

        Self {
            remote: Arc::new(RemotePlayback::new(credentials, api)),
            settings: Settings::new(store),
            state: SharedState::new(),
            endpoint,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn controller(&self) -> Controller {
        Controller::new(self.remote.clone(), self.settings.clone(), self.state.clone())
            .with_authorizer(self.endpoint.clone())
    }

    /// Start the monitor and presenter tasks over the given audio source
    pub fn spawn_daemon(&self, source: Arc<dyn AudioSurfaceSource>) -> Daemon {
        let monitor = &self.config.monitor;
        Daemon::spawn(
            ActivityMonitor::new(&monitor.target_patterns),
            source,
            ReconciliationLoop::new(self.remote.clone(), self.settings.clone(), self.state.clone()),
            NowPlayingPresenter::new(self.remote.clone(), self.state.clone()),
            monitor.poll_interval(),
            monitor.presenter_interval(),
        )
    }
}
