//! Persistence of signature records in a string key-value store.

use std::collections::HashMap;

use log::{info, warn};

use crate::constants::SIGNATURE_KEY_PREFIX;
use crate::error::StoreError;
use crate::signature::{KnownObjectSignature, default_signature};

/// Generic string key-value backend (browser local storage, memory, ...).
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

pub fn signature_key(id: &str) -> String {
    format!("{SIGNATURE_KEY_PREFIX}{id}")
}

/// One JSON record per object id.
pub struct SignatureStore<S> {
    inner: S,
}

impl<S: KeyValueStore> SignatureStore<S> {
    pub fn new(inner: S) -> Self {
        SignatureStore { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The calibrated record for `id`, if one is stored and well formed.
    pub fn load(&self, id: &str) -> Result<Option<KnownObjectSignature>, StoreError> {
        let key = signature_key(id);
        let Some(text) = self.inner.get(&key)? else {
            return Ok(None);
        };
        let sig: KnownObjectSignature = serde_json::from_str(&text)
            .map_err(|source| StoreError::Malformed { key, source })?;
        sig.validate()?;
        Ok(Some(sig))
    }

    pub fn save(&mut self, sig: &KnownObjectSignature) -> Result<(), StoreError> {
        sig.validate()?;
        let text = serde_json::to_string(sig)?;
        self.inner.set(&signature_key(&sig.id), &text)?;
        info!("saved signature for '{}': {:?}", sig.id, sig.sides);
        Ok(())
    }

    /// Forget the calibration for `id`; the built-in default applies again.
    pub fn reset(&mut self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(&signature_key(id))
    }

    /// Resolve a signature for each id: the stored record if usable, else
    /// the built-in default. Ids with neither are left out; an empty result
    /// means tracking stays off.
    pub fn load_or_default<I, T>(&self, ids: I) -> Vec<KnownObjectSignature>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut out = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match self.stored(id).or_else(|| default_signature(id)) {
                Some(sig) => out.push(sig),
                None => warn!("no signature for '{id}', not tracked"),
            }
        }
        if out.is_empty() {
            warn!("no object signatures resolved; tracking disabled");
        }
        out
    }

    /// Like [`load_or_default`](Self::load_or_default), with the given
    /// records (a presets file) standing in for the built-in defaults.
    pub fn load_over<I>(&self, fallbacks: I) -> Vec<KnownObjectSignature>
    where
        I: IntoIterator<Item = KnownObjectSignature>,
    {
        fallbacks
            .into_iter()
            .map(|fallback| self.stored(&fallback.id).unwrap_or(fallback))
            .collect()
    }

    fn stored(&self, id: &str) -> Option<KnownObjectSignature> {
        match self.load(id) {
            Ok(sig) => sig,
            Err(e) => {
                warn!("ignoring stored signature for '{id}': {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{BoundingBox, DEFAULT_OBJECT_IDS};

    #[test]
    fn save_then_load() {
        let mut store = SignatureStore::new(MemoryStore::new());
        let sig = KnownObjectSignature::new(
            "box",
            [101.5, 149.25, 201.0],
            Some(BoundingBox {
                width: 180.0,
                height: 90.0,
                x_offset: -4.5,
                y_offset: 7.0,
                orientation_offset: 0.125,
            }),
        );
        store.save(&sig).unwrap();
        assert!(store.inner().get("object-signature-box").unwrap().is_some());
        assert_eq!(store.load("box").unwrap(), Some(sig));
        assert_eq!(store.load("tape").unwrap(), None);
    }

    #[test]
    fn save_rejects_invalid_records() {
        let mut store = SignatureStore::new(MemoryStore::new());
        let bad = KnownObjectSignature::new("box", [0.0, 1.0, 2.0], None);
        assert!(matches!(store.save(&bad), Err(StoreError::Invalid(_))));
        assert!(store.inner().is_empty());
    }

    #[test]
    fn malformed_record_falls_back_to_default() {
        let mut kv = MemoryStore::new();
        kv.set(&signature_key("tape"), "{not json").unwrap();
        let store = SignatureStore::new(kv);
        assert!(matches!(store.load("tape"), Err(StoreError::Malformed { .. })));

        let sigs = store.load_or_default(["tape"]);
        assert_eq!(sigs, vec![default_signature("tape").unwrap()]);
    }

    #[test]
    fn stored_record_wins_over_default() {
        let mut store = SignatureStore::new(MemoryStore::new());
        let custom = KnownObjectSignature::new("iron", [70.0, 100.0, 140.0], None);
        store.save(&custom).unwrap();
        let sigs = store.load_or_default(DEFAULT_OBJECT_IDS);
        assert_eq!(sigs.len(), 3);
        assert_eq!(sigs[2], custom);
        assert_eq!(sigs[0], default_signature("box").unwrap());
    }

    #[test]
    fn presets_stand_in_for_defaults() {
        let mut store = SignatureStore::new(MemoryStore::new());
        let calibrated = KnownObjectSignature::new("mug", [40.0, 55.0, 61.0], None);
        store.save(&calibrated).unwrap();
        let presets = vec![
            KnownObjectSignature::new("mug", [42.0, 50.0, 60.0], None),
            KnownObjectSignature::new("stapler", [30.0, 90.0, 95.0], None),
        ];
        let sigs = store.load_over(presets.clone());
        assert_eq!(sigs, vec![calibrated, presets[1].clone()]);
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let store = SignatureStore::new(MemoryStore::new());
        assert!(store.load_or_default(["kettle"]).is_empty());
    }

    #[test]
    fn reset_restores_default() {
        let mut store = SignatureStore::new(MemoryStore::new());
        store
            .save(&KnownObjectSignature::new("box", [1.0, 2.0, 2.5], None))
            .unwrap();
        store.reset("box").unwrap();
        assert_eq!(store.load("box").unwrap(), None);
        assert_eq!(
            store.load_or_default(["box"]),
            vec![default_signature("box").unwrap()]
        );
    }
}
