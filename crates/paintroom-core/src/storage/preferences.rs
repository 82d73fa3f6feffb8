//! Persisted tool preferences.
//!
//! Every change to the tool settings is written through to storage, so a
//! reload restores the last brush the user picked.

use crate::storage::{Storage, StorageError, StorageResult};
use crate::tools::{BrushBounds, ToolSettings};
use std::sync::Arc;

/// Storage key holding the serialized [`ToolSettings`].
pub const TOOL_SETTINGS_KEY: &str = "tool_settings";

/// Tool settings bound to a storage backend.
pub struct PreferenceStore<S: Storage> {
    storage: Arc<S>,
    settings: ToolSettings,
    bounds: BrushBounds,
}

impl<S: Storage> PreferenceStore<S> {
    /// Create a store holding default settings. Call [`Self::load`] to pick
    /// up persisted values.
    pub fn new(storage: Arc<S>, bounds: BrushBounds) -> Self {
        Self {
            storage,
            settings: ToolSettings::with_bounds(bounds),
            bounds,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Restore persisted settings.
    ///
    /// A missing or unreadable entry falls back to defaults; only backend
    /// failures are returned as errors.
    pub async fn load(&mut self) -> StorageResult<&ToolSettings> {
        match self.storage.get(TOOL_SETTINGS_KEY).await {
            Ok(json) => match serde_json::from_str::<ToolSettings>(&json) {
                Ok(stored) => self.settings = stored.normalized(self.bounds),
                Err(e) => {
                    log::warn!("Discarding unreadable tool settings: {}", e);
                    self.settings = ToolSettings::with_bounds(self.bounds);
                }
            },
            Err(StorageError::NotFound(_)) => {
                self.settings = ToolSettings::with_bounds(self.bounds);
            }
            Err(e) => return Err(e),
        }
        Ok(&self.settings)
    }

    /// Apply `change` and persist the result if anything changed.
    /// Returns true if a write happened. If the write fails the settings
    /// are rolled back, so memory never runs ahead of storage.
    pub async fn update<F>(&mut self, change: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut ToolSettings),
    {
        let before = self.settings.clone();
        change(&mut self.settings);
        if self.settings == before {
            return Ok(false);
        }
        if let Err(e) = self.save().await {
            log::warn!("Failed to save tool settings, reverting: {}", e);
            self.settings = before;
            return Err(e);
        }
        Ok(true)
    }

    /// Write the current settings.
    pub async fn save(&self) -> StorageResult<()> {
        let json = serde_json::to_string(&self.settings)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.set(TOOL_SETTINGS_KEY, &json).await?;
        log::debug!("Saved tool settings: {}", json);
        Ok(())
    }

    /// Forget persisted settings and return to defaults.
    pub async fn reset(&mut self) -> StorageResult<()> {
        self.storage.remove(TOOL_SETTINGS_KEY).await?;
        self.settings = ToolSettings::with_bounds(self.bounds);
        Ok(())
    }

    /// Get a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Convenience type alias for platform-specific storage.
#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = crate::storage::FileStorage;

#[cfg(target_arch = "wasm32")]
pub type PlatformStorage = crate::storage::LocalStorage;

/// Preference store with platform-specific storage.
pub type PlatformPreferenceStore = PreferenceStore<PlatformStorage>;

/// Create a preference store backed by the platform's default storage.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_preference_store(bounds: BrushBounds) -> StorageResult<PlatformPreferenceStore> {
    let storage = crate::storage::FileStorage::default_location()?;
    Ok(PreferenceStore::new(Arc::new(storage), bounds))
}

#[cfg(target_arch = "wasm32")]
pub fn create_preference_store(bounds: BrushBounds) -> StorageResult<PlatformPreferenceStore> {
    Ok(PreferenceStore::new(Arc::new(crate::storage::LocalStorage::new()), bounds))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::storage::{BoxFuture, MemoryStorage, block_on};
    use crate::tools::ToolKind;

    fn store() -> PreferenceStore<MemoryStorage> {
        PreferenceStore::new(Arc::new(MemoryStorage::new()), BrushBounds::default())
    }

    #[test]
    fn test_load_missing_uses_defaults() {
        let mut prefs = store();
        let settings = block_on(prefs.load()).unwrap();
        assert_eq!(settings, &ToolSettings::default());
    }

    #[test]
    fn test_update_persists() {
        let mut prefs = store();
        let written = block_on(prefs.update(|s| {
            s.set_tool(ToolKind::Eraser);
            s.set_brush_size(20);
        }))
        .unwrap();
        assert!(written);

        // A fresh store over the same backend sees the change
        let mut reloaded = PreferenceStore::new(prefs.storage().clone(), BrushBounds::default());
        let settings = block_on(reloaded.load()).unwrap();
        assert_eq!(settings.selected_tool(), ToolKind::Eraser);
        assert_eq!(settings.brush_size(), 20);
    }

    #[test]
    fn test_unchanged_update_skips_write() {
        let mut prefs = store();
        let written = block_on(prefs.update(|s| s.set_brush_size(5))).unwrap();
        assert!(!written);
        assert!(block_on(prefs.storage().get(TOOL_SETTINGS_KEY)).is_err());
    }

    #[test]
    fn test_load_reclamps_to_bounds() {
        let storage = Arc::new(MemoryStorage::new());
        block_on(storage.set(TOOL_SETTINGS_KEY, r#"{"brush_size":40}"#)).unwrap();

        let mut prefs = PreferenceStore::new(storage, BrushBounds { min: 1, max: 30 });
        let settings = block_on(prefs.load()).unwrap();
        assert_eq!(settings.brush_size(), 30);
    }

    #[test]
    fn test_corrupt_entry_falls_back() {
        let storage = Arc::new(MemoryStorage::new());
        block_on(storage.set(TOOL_SETTINGS_KEY, "not json")).unwrap();

        let mut prefs = PreferenceStore::new(storage, BrushBounds::default());
        let settings = block_on(prefs.load()).unwrap();
        assert_eq!(settings, &ToolSettings::default());
    }

    /// Backend whose writes always fail.
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<String>> {
            let key = key.to_string();
            Box::pin(async move { Err(StorageError::NotFound(key)) })
        }

        fn set(&self, _key: &str, _value: &str) -> BoxFuture<'_, StorageResult<()>> {
            Box::pin(async { Err(StorageError::Io("read-only".to_string())) })
        }

        fn remove(&self, _key: &str) -> BoxFuture<'_, StorageResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[test]
    fn test_failed_write_reverts_settings() {
        let mut prefs = PreferenceStore::new(Arc::new(ReadOnlyStorage), BrushBounds::default());
        let result = block_on(prefs.update(|s| {
            s.set_tool(ToolKind::Eraser);
            s.set_brush_size(30);
        }));

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(prefs.settings(), &ToolSettings::default());
    }

    #[test]
    fn test_reset() {
        let mut prefs = store();
        block_on(prefs.update(|s| s.set_brush_opacity(0.3))).unwrap();
        block_on(prefs.reset()).unwrap();

        assert_eq!(prefs.settings().brush_opacity(), 1.0);
        assert!(block_on(prefs.storage().get(TOOL_SETTINGS_KEY)).is_err());
    }
}
