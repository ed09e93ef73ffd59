use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use super::KeyValueStore;
use crate::error::Result;

const KEY_ENTRY: &str = "storage_key";
const KEY_LEN: usize = 32;

/// Reversible XOR obfuscation for the stored blob.
///
/// This only keeps the blob from being readable at a glance. Anyone with the
/// data directory also has the key.
#[derive(Clone)]
pub struct Obfuscator {
    key: Vec<u8>,
}

impl Obfuscator {
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// Load the key persisted in `store`, generating and saving one on first use.
    pub fn load_or_create(store: &dyn KeyValueStore) -> Result<Self> {
        if let Some(encoded) = store.get(KEY_ENTRY)? {
            match BASE64.decode(encoded.trim()) {
                Ok(key) if !key.is_empty() => return Ok(Self::new(key)),
                _ => tracing::warn!("Stored obfuscation key is unreadable, generating a new one"),
            }
        }

        let mut key = vec![0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        store.set(KEY_ENTRY, &BASE64.encode(&key))?;
        Ok(Self::new(key))
    }

    fn xor(&self, bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .zip(self.key.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect()
    }

    pub fn encode(&self, plain: &str) -> String {
        BASE64.encode(self.xor(plain.as_bytes()))
    }

    /// Returns `None` when `encoded` is not something this key produced.
    pub fn decode(&self, encoded: &str) -> Option<String> {
        let bytes = BASE64.decode(encoded.trim()).ok()?;
        String::from_utf8(self.xor(&bytes)).ok()
    }
}

/// How the config/stats blob is written to storage.
#[derive(Clone)]
pub enum Codec {
    Plain,
    Obfuscated(Obfuscator),
}

impl Codec {
    pub fn encode(&self, json: &str) -> String {
        match self {
            Codec::Plain => json.to_string(),
            Codec::Obfuscated(o) => o.encode(json),
        }
    }

    pub fn decode(&self, stored: &str) -> Option<String> {
        match self {
            Codec::Plain => Some(stored.to_string()),
            Codec::Obfuscated(o) => o.decode(stored),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_obfuscated_text_is_not_plain() {
        let o = Obfuscator::new(b"secret-key".to_vec());
        let encoded = o.encode(r#"{"secretCode":"TESTE"}"#);
        assert!(!encoded.contains("TESTE"));
        assert_eq!(o.decode(&encoded).as_deref(), Some(r#"{"secretCode":"TESTE"}"#));
    }

    #[test]
    fn test_decode_garbage_returns_none() {
        let o = Obfuscator::new(b"k".to_vec());
        assert_eq!(o.decode("%%% not base64 %%%"), None);
    }

    #[test]
    fn test_key_survives_reload() {
        let store = MemoryStore::new();
        let first = Obfuscator::load_or_create(&store).unwrap();
        let encoded = first.encode("hello");

        let second = Obfuscator::load_or_create(&store).unwrap();
        assert_eq!(second.decode(&encoded).as_deref(), Some("hello"));
    }

    #[test]
    fn test_unreadable_key_is_replaced() {
        let store = MemoryStore::new();
        store.set(KEY_ENTRY, "!!!").unwrap();

        let o = Obfuscator::load_or_create(&store).unwrap();
        assert_eq!(o.key.len(), KEY_LEN);
        assert_ne!(store.get(KEY_ENTRY).unwrap().as_deref(), Some("!!!"));
    }

    #[test]
    fn test_plain_codec_passthrough() {
        assert_eq!(Codec::Plain.decode("{}").as_deref(), Some("{}"));
        assert_eq!(Codec::Plain.encode("{}"), "{}");
    }
}
