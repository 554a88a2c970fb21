use log::{info, warn};
use wasm_bindgen::JsValue;
use web_sys::{Storage, Window};

use tangible_core::signature::{DEFAULT_OBJECT_IDS, default_signatures};
use tangible_core::{KeyValueStore, KnownObjectSignature, SignatureStore, StoreError};

use crate::utils::{asset_candidates, fetch_text_with_fallbacks};

/// `window.localStorage` as a key-value backend.
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    pub fn from_window(window: &Window) -> Result<Self, StoreError> {
        let storage = window
            .local_storage()
            .map_err(backend)?
            .ok_or_else(|| StoreError::Backend("localStorage unavailable".to_string()))?;
        Ok(LocalStorageStore { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage.get_item(key).map_err(backend)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage.set_item(key, value).map_err(backend)
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.storage.remove_item(key).map_err(backend)
    }
}

fn backend(e: JsValue) -> StoreError {
    StoreError::Backend(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

pub type BrowserSignatureStore = SignatureStore<LocalStorageStore>;

/// The signature store, or `None` when local storage is blocked.
pub fn open_store(window: &Window) -> Option<BrowserSignatureStore> {
    match LocalStorageStore::from_window(window) {
        Ok(kv) => Some(SignatureStore::new(kv)),
        Err(e) => {
            warn!("signature store unavailable, using defaults only: {e}");
            None
        }
    }
}

/// Signatures in effect: stored calibrations over the presets file (when
/// `presets` names one that loads) or over the built-in defaults.
pub async fn load_signatures(
    window: &Window,
    store: Option<&BrowserSignatureStore>,
    presets: Option<&str>,
) -> Vec<KnownObjectSignature> {
    let fallbacks = match presets {
        Some(name) => fetch_presets(window, name).await,
        None => None,
    };
    let sigs = match (store, fallbacks) {
        (Some(store), Some(presets)) => store.load_over(presets),
        (Some(store), None) => store.load_or_default(DEFAULT_OBJECT_IDS),
        (None, Some(presets)) => presets,
        (None, None) => default_signatures(),
    };
    info!(
        "tracking {} object(s): {:?}",
        sigs.len(),
        sigs.iter().map(|s| s.id.as_str()).collect::<Vec<_>>()
    );
    sigs
}

async fn fetch_presets(window: &Window, name: &str) -> Option<Vec<KnownObjectSignature>> {
    let path = if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("presets/{name}.json")
    };
    let urls = asset_candidates(&path);
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let Some(text) = fetch_text_with_fallbacks(window, &refs).await else {
        warn!("presets '{name}' not found, using built-in defaults");
        return None;
    };
    match serde_json::from_str::<Vec<KnownObjectSignature>>(&text) {
        Ok(sigs) => Some(sigs),
        Err(e) => {
            warn!("presets '{name}' unreadable ({e}), using built-in defaults");
            None
        }
    }
}
