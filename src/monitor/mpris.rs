//! MPRIS audio surfaces read from the session D-Bus
//!
//! Every MPRIS player counts as one surface. Browsers publish a player per
//! audible tab with the page URL in `xesam:url`, which is what lets the
//! monitor tell the streaming service's web player apart from other audio.

use super::{AudioSurface, AudioSurfaceSource};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2.";

#[derive(Debug, Default)]
pub struct MprisSurfaces;

impl MprisSurfaces {
    pub fn new() -> Self {
        Self
    }

    async fn dbus_send(args: &[&str]) -> Result<String> {
        let output = Command::new("dbus-send")
            .arg("--session")
            .arg("--print-reply")
            .args(args)
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!(
                "dbus-send failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list_players() -> Result<Vec<String>> {
        let stdout = Self::dbus_send(&[
            "--dest=org.freedesktop.DBus",
            "/org/freedesktop/DBus",
            "org.freedesktop.DBus.ListNames",
        ])
        .await?;
        Ok(parse_player_names(&stdout))
    }

    async fn player_property(player: &str, property: &str) -> Result<String> {
        let dest = format!("--dest={}", player);
        let name = format!("string:{}", property);
        Self::dbus_send(&[
            dest.as_str(),
            "/org/mpris/MediaPlayer2",
            "org.freedesktop.DBus.Properties.Get",
            "string:org.mpris.MediaPlayer2.Player",
            name.as_str(),
        ])
        .await
    }

    async fn read_surface(player: String) -> AudioSurface {
        let audible = match Self::player_property(&player, "PlaybackStatus").await {
            Ok(stdout) => parse_variant_string(&stdout).as_deref() == Some("Playing"),
            Err(e) => {
                debug!("Failed to read PlaybackStatus of {}: {}", player, e);
                false
            }
        };

        let url = match Self::player_property(&player, "Metadata").await {
            Ok(stdout) => parse_metadata_url(&stdout),
            Err(e) => {
                debug!("Failed to read Metadata of {}: {}", player, e);
                None
            }
        };

        let origin = match url {
            Some(url) => format!("{} {}", player, url),
            None => player,
        };
        AudioSurface { origin, audible }
    }
}

#[async_trait]
impl AudioSurfaceSource for MprisSurfaces {
    async fn surfaces(&self) -> Result<Vec<AudioSurface>> {
        let players = Self::list_players().await?;
        let surfaces = futures::future::join_all(players.into_iter().map(Self::read_surface)).await;
        Ok(surfaces)
    }
}

/// MPRIS bus names from a `ListNames` reply
fn parse_player_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let name = line.trim().strip_prefix("string \"")?.strip_suffix('"')?;
            name.starts_with(MPRIS_PREFIX).then(|| name.to_string())
        })
        .collect()
}

/// The string carried by a `Properties.Get` reply
fn parse_variant_string(stdout: &str) -> Option<String> {
    let lines: Vec<&str> = stdout.lines().map(str::trim).collect();
    let start = lines.iter().position(|line| line.starts_with("variant"))?;
    lines[start..]
        .iter()
        .take(2)
        .find_map(|line| line.split('"').nth(1))
        .map(str::to_string)
}

/// The `xesam:url` entry of a Metadata reply
fn parse_metadata_url(stdout: &str) -> Option<String> {
    let lines: Vec<&str> = stdout.lines().map(str::trim).collect();
    let key = lines.iter().position(|line| *line == "string \"xesam:url\"")?;
    lines[key + 1..]
        .iter()
        .take(2)
        .take_while(|line| !line.starts_with("dict entry(") && !line.starts_with(')'))
        .find(|line| line.starts_with("variant") || line.starts_with("string"))
        .and_then(|line| line.split('"').nth(1))
        .map(str::to_string)
}
