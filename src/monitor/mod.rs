/// Foreground audio detection
///
/// The monitor samples every audio surface the platform exposes, drops the
/// ones belonging to the streaming service itself, and turns the remaining
/// "is anything audible" bit into rising and falling edges.
pub mod mpris;

use async_trait::async_trait;

pub use mpris::MprisSurfaces;

/// One audio-producing surface (a browser tab, a media player, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSurface {
    /// Identifies the producer; matched against the target patterns
    pub origin: String,
    pub audible: bool,
}

/// Enumerates the audio surfaces currently present
#[async_trait]
pub trait AudioSurfaceSource: Send + Sync {
    async fn surfaces(&self) -> anyhow::Result<Vec<AudioSurface>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Foreground audio appeared
    Rising,
    /// Foreground audio went away
    Falling,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioActivitySnapshot {
    pub non_target_audible_count: usize,
}

impl AudioActivitySnapshot {
    pub fn is_active(&self) -> bool {
        self.non_target_audible_count > 0
    }
}

pub struct ActivityMonitor {
    target_patterns: Vec<String>,
    active: bool,
}

impl ActivityMonitor {
    pub fn new(target_patterns: &[String]) -> Self {
        Self {
            target_patterns: target_patterns
                .iter()
                .map(|pattern| pattern.to_lowercase())
                .filter(|pattern| !pattern.is_empty())
                .collect(),
            active: false,
        }
    }

    /// Whether a surface belongs to the streaming service
    pub fn is_target(&self, origin: &str) -> bool {
        let origin = origin.to_lowercase();
        self.target_patterns
            .iter()
            .any(|pattern| origin.contains(pattern.as_str()))
    }

    pub fn snapshot(&self, surfaces: &[AudioSurface]) -> AudioActivitySnapshot {
        AudioActivitySnapshot {
            non_target_audible_count: surfaces
                .iter()
                .filter(|surface| surface.audible && !self.is_target(&surface.origin))
                .count(),
        }
    }

    /// Fold a snapshot into the retained state and report the transition
    pub fn observe(&mut self, snapshot: AudioActivitySnapshot) -> Edge {
        let now_active = snapshot.is_active();
        let edge = match (self.active, now_active) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => Edge::None,
        };
        self.active = now_active;
        edge
    }

    /// Sample the source once. A failed enumeration keeps the previous state.
    pub async fn tick(&mut self, source: &dyn AudioSurfaceSource) -> Edge {
        match source.surfaces().await {
            Ok(surfaces) => {
                let snapshot = self.snapshot(&surfaces);
                let edge = self.observe(snapshot);
                if edge != Edge::None {
                    tracing::debug!(
                        "Audio activity {:?} ({} non-target audible)",
                        edge,
                        snapshot.non_target_audible_count
                    );
                }
                edge
            }
            Err(e) => {
                tracing::warn!("Failed to enumerate audio surfaces: {}", e);
                Edge::None
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
