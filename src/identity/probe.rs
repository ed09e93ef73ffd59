use async_trait::async_trait;
use serde::Deserialize;

/// Why a fingerprint component could not be read.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// The environment has no such API at all.
    #[error("unsupported")]
    Unsupported,
    /// Collection was abandoned after running too long.
    #[error("timed out")]
    TimedOut,
    #[error("failed: {0}")]
    Failed(String),
}

pub type ProbeResult = std::result::Result<String, ProbeError>;

/// Source of the raw fingerprint components, in the order they are hashed.
#[async_trait]
pub trait EnvironmentProbe: Send + Sync {
    fn canvas(&self) -> ProbeResult;
    fn webgl(&self) -> ProbeResult;
    /// May take a while; callers bound it with a timeout.
    async fn audio(&self) -> ProbeResult;
    fn browser(&self) -> ProbeResult;
    fn screen(&self) -> ProbeResult;
    fn locale(&self) -> ProbeResult;
    fn features(&self) -> ProbeResult;
    fn hardware(&self) -> ProbeResult;
}

/// Components collected by the front end inside the webview and sent along
/// with a redemption. Absent components count as failed.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportedEnvironment {
    pub canvas: Option<String>,
    /// `None` with `webgl_supported == Some(false)` means no WebGL at all.
    pub webgl: Option<String>,
    pub webgl_supported: Option<bool>,
    pub audio: Option<String>,
    pub audio_supported: Option<bool>,
    /// Set when the webview gave up on the audio render.
    pub audio_timed_out: Option<bool>,
    pub browser: Option<String>,
    pub screen: Option<String>,
    pub locale: Option<String>,
    pub features: Option<String>,
    pub hardware: Option<String>,
}

fn reported(value: &Option<String>, supported: Option<bool>) -> ProbeResult {
    match (value, supported) {
        (Some(v), _) => Ok(v.clone()),
        (None, Some(false)) => Err(ProbeError::Unsupported),
        (None, _) => Err(ProbeError::Failed("not reported".into())),
    }
}

#[async_trait]
impl EnvironmentProbe for ReportedEnvironment {
    fn canvas(&self) -> ProbeResult {
        reported(&self.canvas, None)
    }

    fn webgl(&self) -> ProbeResult {
        reported(&self.webgl, self.webgl_supported)
    }

    async fn audio(&self) -> ProbeResult {
        if self.audio_timed_out == Some(true) {
            return Err(ProbeError::TimedOut);
        }
        reported(&self.audio, self.audio_supported)
    }

    fn browser(&self) -> ProbeResult {
        reported(&self.browser, None)
    }

    fn screen(&self) -> ProbeResult {
        reported(&self.screen, None)
    }

    fn locale(&self) -> ProbeResult {
        reported(&self.locale, None)
    }

    fn features(&self) -> ProbeResult {
        reported(&self.features, None)
    }

    fn hardware(&self) -> ProbeResult {
        reported(&self.hardware, None)
    }
}

/// Probe of the native host, for when no webview report is available.
/// Has no canvas, WebGL, or audio.
#[derive(Clone, Debug, Default)]
pub struct HostProbe;

fn env_or_unknown(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| "unknown".into())
}

#[async_trait]
impl EnvironmentProbe for HostProbe {
    fn canvas(&self) -> ProbeResult {
        Err(ProbeError::Unsupported)
    }

    fn webgl(&self) -> ProbeResult {
        Err(ProbeError::Unsupported)
    }

    async fn audio(&self) -> ProbeResult {
        Err(ProbeError::Unsupported)
    }

    fn browser(&self) -> ProbeResult {
        Ok([
            "Redeemer",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY,
        ]
        .join("~"))
    }

    fn screen(&self) -> ProbeResult {
        Err(ProbeError::Unsupported)
    }

    fn locale(&self) -> ProbeResult {
        let offset = chrono::Local::now().offset().to_string();
        Ok([offset, env_or_unknown("TZ"), env_or_unknown("LANG")].join("~"))
    }

    fn features(&self) -> ProbeResult {
        Ok([
            cfg!(target_pointer_width = "64"),
            cfg!(target_endian = "little"),
            cfg!(debug_assertions),
        ]
        .map(|b| b.to_string())
        .join("~"))
    }

    fn hardware(&self) -> ProbeResult {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .map_err(|e| ProbeError::Failed(e.to_string()))?;
        Ok(["no-connection-api".to_string(), cores, "unknown".into()].join("~"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reported_environment_maps_missing_components() {
        let env = ReportedEnvironment {
            canvas: Some("data:image/png;base64,AAA".into()),
            webgl_supported: Some(false),
            ..Default::default()
        };

        assert_eq!(env.canvas().unwrap(), "data:image/png;base64,AAA");
        assert_eq!(env.webgl(), Err(ProbeError::Unsupported));
        assert!(matches!(env.audio().await, Err(ProbeError::Failed(_))));
        assert!(matches!(env.screen(), Err(ProbeError::Failed(_))));
    }

    #[test]
    fn test_reported_environment_deserializes_camel_case() {
        let env: ReportedEnvironment = serde_json::from_str(
            r#"{"canvas":"c","webglSupported":false,"audioSupported":true,"audio":"0.1"}"#,
        )
        .unwrap();
        assert_eq!(env.canvas.as_deref(), Some("c"));
        assert_eq!(env.webgl_supported, Some(false));
        assert_eq!(env.audio.as_deref(), Some("0.1"));

        let env: ReportedEnvironment =
            serde_json::from_str(r#"{"audioTimedOut":true}"#).unwrap();
        assert_eq!(env.audio_timed_out, Some(true));
    }

    #[tokio::test]
    async fn test_reported_audio_timeout() {
        let env = ReportedEnvironment {
            audio: Some("0.1".into()),
            audio_timed_out: Some(true),
            ..Default::default()
        };
        assert_eq!(env.audio().await, Err(ProbeError::TimedOut));
    }

    #[tokio::test]
    async fn test_host_probe_is_stable() {
        let probe = HostProbe;
        assert_eq!(probe.browser(), probe.browser());
        assert_eq!(probe.hardware(), probe.hardware());
        assert_eq!(probe.canvas(), Err(ProbeError::Unsupported));
        assert_eq!(probe.audio().await, Err(ProbeError::Unsupported));
    }

    #[test]
    fn test_host_browser_ignores_app_version() {
        let browser = HostProbe.browser().unwrap();
        assert!(browser.starts_with("Redeemer~"));
        assert!(!browser.contains(env!("CARGO_PKG_VERSION")));
    }
}
