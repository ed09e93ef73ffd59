use sha2::{Digest, Sha256};
use std::time::Duration;

use super::probe::{EnvironmentProbe, ProbeError, ProbeResult};

const SEPARATOR: &str = "|";

/// Hash of the environment components, plus the names of any components that
/// had to be replaced by a sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: String,
    pub degraded: Vec<&'static str>,
}

impl Fingerprint {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Sentinel written in place of a component that could not be read.
fn sentinel(component: &'static str, err: &ProbeError) -> String {
    match (component, err) {
        ("webgl", ProbeError::Unsupported) => "no-webgl".into(),
        ("audio", ProbeError::Unsupported) => "no-audio".into(),
        ("hardware", ProbeError::Unsupported) => "no-connection-api".into(),
        (name, ProbeError::TimedOut) => format!("{name}-timeout"),
        (name, _) => format!("{name}-error"),
    }
}

/// Build the fingerprint from `probe`. Never fails.
///
/// The audio component is bounded by `audio_timeout` and becomes
/// `audio-timeout` when it runs over, or when the probe itself reports a
/// timeout.
pub async fn generate(probe: &dyn EnvironmentProbe, audio_timeout: Duration) -> Fingerprint {
    let audio = tokio::time::timeout(audio_timeout, probe.audio())
        .await
        .unwrap_or(Err(ProbeError::TimedOut));

    let components: [(&'static str, ProbeResult); 8] = [
        ("canvas", probe.canvas()),
        ("webgl", probe.webgl()),
        ("audio", audio),
        ("browser", probe.browser()),
        ("screen", probe.screen()),
        ("locale", probe.locale()),
        ("features", probe.features()),
        ("hardware", probe.hardware()),
    ];

    let mut degraded = Vec::new();
    let mut parts = Vec::with_capacity(components.len());
    for (name, result) in components {
        match result {
            Ok(value) => parts.push(value),
            Err(e) => {
                degraded.push(name);
                parts.push(sentinel(name, &e));
            }
        }
    }

    if !degraded.is_empty() {
        tracing::debug!(components = ?degraded, "Fingerprint built with fallback components");
    }

    Fingerprint {
        hash: hash_components(&parts),
        degraded,
    }
}

/// SHA-256 over the components joined with a fixed separator, as lowercase hex.
pub fn hash_components(parts: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(SEPARATOR).as_bytes());
    hex::encode(hasher.finalize())
}
