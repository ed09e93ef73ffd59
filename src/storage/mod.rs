//! Local key-value storage.
//!
//! Everything the widget remembers lives here, on the end user's machine:
//!
//! ```text
//! redeemer_data   → config + stats blob (optionally obfuscated)
//! storage_key     → obfuscation key (base64)
//! fingerprints    → JSON list of browser fingerprints
//! used_ips        → JSON list of IP addresses
//! backup.db.json  → secondary fingerprint database
//! ```

mod backup;
mod kv;
mod obfuscate;

pub use backup::{BackupDatabase, BackupRecord};
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use obfuscate::{Codec, Obfuscator};
