//! Browser `localStorage` implementation for WebAssembly.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use wasm_bindgen::JsValue;

/// Prefix applied to every key so PaintRoom entries don't collide with
/// other scripts on the same origin.
const KEY_PREFIX: &str = "paintroom:";

/// `window.localStorage`-backed storage.
///
/// Note: This is intentionally not Send/Sync since WASM is single-threaded.
#[derive(Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn storage() -> StorageResult<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        window
            .local_storage()
            .map_err(js_error)?
            .ok_or_else(|| StorageError::Other("localStorage not available".to_string()))
    }
}

fn js_error(e: JsValue) -> StorageError {
    StorageError::Other(format!("localStorage error: {:?}", e))
}

impl Storage for LocalStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, StorageResult<String>> {
        let key = key.to_string();
        Box::pin(async move {
            Self::storage()?
                .get_item(&format!("{KEY_PREFIX}{key}"))
                .map_err(js_error)?
                .ok_or(StorageError::NotFound(key))
        })
    }

    fn set(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = format!("{KEY_PREFIX}{key}");
        let value = value.to_string();
        Box::pin(async move { Self::storage()?.set_item(&key, &value).map_err(js_error) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = format!("{KEY_PREFIX}{key}");
        Box::pin(async move { Self::storage()?.remove_item(&key).map_err(js_error) })
    }

    fn keys(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let storage = Self::storage()?;
            let len = storage.length().map_err(js_error)?;
            let mut keys = Vec::new();
            for i in 0..len {
                if let Some(key) = storage.key(i).map_err(js_error)? {
                    if let Some(stripped) = key.strip_prefix(KEY_PREFIX) {
                        keys.push(stripped.to_string());
                    }
                }
            }
            Ok(keys)
        })
    }
}
