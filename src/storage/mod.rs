/// Persistent key-value settings store
///
/// Two scopes mirror the split the player needs: `Local` holds session data
/// (tokens, playlist selection) and `Sync` holds user preferences that may be
/// shared between installations (the automation policy).
use crate::error::{PlayerError, Result};
use crate::models::{PlaybackPolicy, PlaybackSelection, Selection};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Storage keys
pub mod keys {
    pub const ACCESS_TOKEN: &str = "spotify_access_token";
    pub const REFRESH_TOKEN: &str = "spotify_refresh_token";
    pub const TOKEN_EXPIRES_AT: &str = "spotify_token_expires_at_ms";
    pub const SELECTED_PLAYLIST: &str = "selected_playlist_id";
    pub const ARMED_PLAYLIST: &str = "current_playlist_id";
    pub const AUTO_PAUSE: &str = "auto_pause_enabled";
    pub const AUTO_REPLAY: &str = "auto_replay_enabled";
    pub const EXTERNAL_AUDIO_ACTIVE: &str = "external_audio_active";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Local,
    Sync,
}

impl Scope {
    fn file_name(self) -> &'static str {
        match self {
            Scope::Local => "local.json",
            Scope::Sync => "sync.json",
        }
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>>;

    /// Write all entries in one step; readers never observe a partial write
    async fn set_many(&self, scope: Scope, entries: Vec<(String, Value)>) -> Result<()>;

    async fn remove(&self, scope: Scope, keys: &[&str]) -> Result<()>;

    async fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        self.set_many(scope, vec![(key.to_string(), value)]).await
    }
}

/// In-memory store, used by tests and embedders without a data directory
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(Scope, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&(scope, key.to_string())).cloned())
    }

    async fn set_many(&self, scope: Scope, new_entries: Vec<(String, Value)>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for (key, value) in new_entries {
            entries.insert((scope, key), value);
        }
        Ok(())
    }

    async fn remove(&self, scope: Scope, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(&(scope, key.to_string()));
        }
        Ok(())
    }
}

/// One JSON object file per scope inside a data directory
///
/// Nothing is cached: the daemon and each CLI invocation open their own
/// store on the same directory, so every read goes to disk and every write
/// merges into the file's current contents.
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| PlayerError::Storage(format!("Failed to create {:?}: {}", dir, e)))?;

        tracing::debug!("Opened settings store in {:?}", dir);
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn scope_path(&self, scope: Scope) -> PathBuf {
        self.dir.join(scope.file_name())
    }

    async fn read_scope(&self, scope: Scope) -> Result<Map<String, Value>> {
        let path = self.scope_path(scope);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(PlayerError::Storage(format!(
                    "Failed to read {:?}: {}",
                    path, e
                )))
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                tracing::warn!("Settings file {:?} is corrupt, treating it as empty", path);
                Ok(Map::new())
            }
        }
    }

    async fn write_scope(&self, scope: Scope, map: &Map<String, Value>) -> Result<()> {
        let path = self.scope_path(scope);
        let tmp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

        let content = serde_json::to_string_pretty(map)
            .map_err(|e| PlayerError::Storage(format!("Failed to serialize settings: {}", e)))?;
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| PlayerError::Storage(format!("Failed to write {:?}: {}", tmp_path, e)))?;

        // Tokens live in the local scope; keep the file private to the user
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| PlayerError::Storage(format!("Failed to set permissions: {}", e)))?;
        }

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| PlayerError::Storage(format!("Failed to replace {:?}: {}", path, e)))?;
        Ok(())
    }

    /// Apply `edit` to the scope as it is on disk right now
    async fn update_scope(
        &self,
        scope: Scope,
        edit: impl FnOnce(&mut Map<String, Value>),
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read_scope(scope).await?;
        edit(&mut current);
        self.write_scope(scope, &current).await
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, scope: Scope, key: &str) -> Result<Option<Value>> {
        let mut map = self.read_scope(scope).await?;
        Ok(map.remove(key))
    }

    async fn set_many(&self, scope: Scope, entries: Vec<(String, Value)>) -> Result<()> {
        self.update_scope(scope, |map| {
            for (key, value) in entries {
                map.insert(key, value);
            }
        })
        .await
    }

    async fn remove(&self, scope: Scope, keys: &[&str]) -> Result<()> {
        self.update_scope(scope, |map| {
            for key in keys {
                map.remove(*key);
            }
        })
        .await
    }
}

/// Typed access to the policy and selection keys
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KeyValueStore>,
}

impl Settings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Read the automation policy. Unset or malformed flags count as enabled.
    pub async fn policy(&self) -> Result<PlaybackPolicy> {
        let auto_pause = self.store.get(Scope::Sync, keys::AUTO_PAUSE).await?;
        let auto_replay = self.store.get(Scope::Sync, keys::AUTO_REPLAY).await?;
        Ok(PlaybackPolicy {
            auto_pause_enabled: auto_pause.and_then(|v| v.as_bool()).unwrap_or(true),
            auto_replay_enabled: auto_replay.and_then(|v| v.as_bool()).unwrap_or(true),
        })
    }

    pub async fn set_auto_pause(&self, enabled: bool) -> Result<()> {
        self.store
            .set(Scope::Sync, keys::AUTO_PAUSE, Value::Bool(enabled))
            .await
    }

    pub async fn set_auto_replay(&self, enabled: bool) -> Result<()> {
        self.store
            .set(Scope::Sync, keys::AUTO_REPLAY, Value::Bool(enabled))
            .await
    }

    pub async fn selection(&self) -> Result<PlaybackSelection> {
        let selected = self
            .read_selection(keys::SELECTED_PLAYLIST)
            .await?
            .unwrap_or_default();
        let armed = self.read_selection(keys::ARMED_PLAYLIST).await?;
        Ok(PlaybackSelection { selected, armed })
    }

    pub async fn set_selected(&self, selection: &Selection) -> Result<()> {
        self.store
            .set(
                Scope::Local,
                keys::SELECTED_PLAYLIST,
                Value::String(selection.as_id().to_string()),
            )
            .await
    }

    /// Record what was just loaded on the remote device
    pub async fn set_armed(&self, selection: &Selection) -> Result<()> {
        self.store
            .set(
                Scope::Local,
                keys::ARMED_PLAYLIST,
                Value::String(selection.as_id().to_string()),
            )
            .await
    }

    /// Whether the running daemon last saw other audio playing
    pub async fn external_audio_active(&self) -> Result<bool> {
        let value = self
            .store
            .get(Scope::Local, keys::EXTERNAL_AUDIO_ACTIVE)
            .await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    pub async fn set_external_audio_active(&self, active: bool) -> Result<()> {
        self.store
            .set(Scope::Local, keys::EXTERNAL_AUDIO_ACTIVE, Value::Bool(active))
            .await
    }

    async fn read_selection(&self, key: &str) -> Result<Option<Selection>> {
        let value = self.store.get(Scope::Local, key).await?;
        Ok(value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(Selection::from_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("hushplay-store-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_memory_store_scopes_are_separate() {
        let store = MemoryStore::new();
        store.set(Scope::Local, "k", json!(1)).await.unwrap();
        assert_eq!(store.get(Scope::Local, "k").await.unwrap(), Some(json!(1)));
        assert_eq!(store.get(Scope::Sync, "k").await.unwrap(), None);

        store.remove(Scope::Local, &["k"]).await.unwrap();
        assert_eq!(store.get(Scope::Local, "k").await.unwrap(), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_file_store_persists_across_reopen() {
        let dir = temp_dir();
        {
            let store = JsonFileStore::open(&dir).await.unwrap();
            store
                .set_many(
                    Scope::Local,
                    vec![
                        ("a".to_string(), json!("x")),
                        ("b".to_string(), json!(42)),
                    ],
                )
                .await
                .unwrap();
            store.set(Scope::Sync, "flag", json!(false)).await.unwrap();
            store.remove(Scope::Local, &["b"]).await.unwrap();
        }

        let reopened = JsonFileStore::open(&dir).await.unwrap();
        assert_eq!(reopened.get(Scope::Local, "a").await.unwrap(), Some(json!("x")));
        assert_eq!(reopened.get(Scope::Local, "b").await.unwrap(), None);
        assert_eq!(reopened.get(Scope::Sync, "flag").await.unwrap(), Some(json!(false)));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.join("local.json"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_file_store_ignores_corrupt_file() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sync.json"), "{not json").unwrap();

        let store = JsonFileStore::open(&dir).await.unwrap();
        assert_eq!(store.get(Scope::Sync, "anything").await.unwrap(), None);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_file_stores_on_one_dir_see_each_others_writes() {
        let dir = temp_dir();
        let daemon = Arc::new(JsonFileStore::open(&dir).await.unwrap());
        let cli = Arc::new(JsonFileStore::open(&dir).await.unwrap());
        let daemon_settings = Settings::new(daemon.clone());
        let cli_settings = Settings::new(cli.clone());

        daemon
            .set_many(
                Scope::Local,
                vec![
                    (keys::ACCESS_TOKEN.to_string(), json!("a")),
                    (keys::REFRESH_TOKEN.to_string(), json!("r")),
                ],
            )
            .await
            .unwrap();
        assert!(daemon_settings.policy().await.unwrap().auto_pause_enabled);

        cli_settings.set_auto_pause(false).await.unwrap();
        cli_settings
            .set_selected(&Selection::Playlist("p1".into()))
            .await
            .unwrap();
        cli.remove(Scope::Local, &[keys::ACCESS_TOKEN, keys::REFRESH_TOKEN])
            .await
            .unwrap();

        assert!(!daemon_settings.policy().await.unwrap().auto_pause_enabled);
        assert_eq!(
            daemon_settings.selection().await.unwrap().selected,
            Selection::Playlist("p1".into())
        );

        // A later write from the other store must not bring back removed keys
        daemon_settings.set_armed(&Selection::Liked).await.unwrap();
        let reopened = JsonFileStore::open(&dir).await.unwrap();
        assert_eq!(reopened.get(Scope::Local, keys::REFRESH_TOKEN).await.unwrap(), None);
        assert_eq!(
            reopened.get(Scope::Local, keys::SELECTED_PLAYLIST).await.unwrap(),
            Some(json!("p1"))
        );
        assert_eq!(
            reopened.get(Scope::Local, keys::ARMED_PLAYLIST).await.unwrap(),
            Some(json!("liked"))
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_policy_defaults_to_enabled() {
        let store = Arc::new(MemoryStore::new());
        let settings = Settings::new(store.clone());
        assert_eq!(settings.policy().await.unwrap(), PlaybackPolicy::default());

        // Only an explicit false disables a flag
        store
            .set(Scope::Sync, keys::AUTO_PAUSE, json!("no"))
            .await
            .unwrap();
        settings.set_auto_replay(false).await.unwrap();
        let policy = settings.policy().await.unwrap();
        assert!(policy.auto_pause_enabled);
        assert!(!policy.auto_replay_enabled);
    }

    #[tokio::test]
    async fn test_selection_defaults_to_liked() {
        let settings = Settings::new(Arc::new(MemoryStore::new()));
        let selection = settings.selection().await.unwrap();
        assert_eq!(selection.selected, Selection::Liked);
        assert_eq!(selection.armed, None);

        settings
            .set_selected(&Selection::Playlist("p1".into()))
            .await
            .unwrap();
        settings.set_armed(&Selection::Liked).await.unwrap();
        let selection = settings.selection().await.unwrap();
        assert_eq!(selection.selected, Selection::Playlist("p1".into()));
        assert_eq!(selection.armed, Some(Selection::Liked));
    }
}
