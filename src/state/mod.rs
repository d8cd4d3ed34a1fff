/// State shared between the background tasks and the control surface
use crate::presenter::NowPlayingView;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct Inner {
    /// Best guess of whether the remote device is playing
    believed_playing: bool,
    external_audio_active: bool,
    now_playing: NowPlayingView,
}

/// Cheap to clone; all clones see the same state
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<Inner>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn believed_playing(&self) -> bool {
        self.inner.lock().await.believed_playing
    }

    pub async fn set_believed_playing(&self, playing: bool) {
        self.inner.lock().await.believed_playing = playing;
    }

    pub async fn external_audio_active(&self) -> bool {
        self.inner.lock().await.external_audio_active
    }

    pub async fn set_external_audio_active(&self, active: bool) {
        self.inner.lock().await.external_audio_active = active;
    }

    pub async fn now_playing(&self) -> NowPlayingView {
        self.inner.lock().await.now_playing.clone()
    }

    /// Publish a presenter refresh; the view's playing flag becomes the belief
    pub async fn publish_now_playing(&self, view: NowPlayingView) {
        let mut inner = self.inner.lock().await;
        inner.believed_playing = view.is_playing;
        inner.now_playing = view;
    }
}
