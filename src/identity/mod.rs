//! Best-effort identity signals used to deduplicate redemptions.
//!
//! None of these are trustworthy: every one of them can be reset by the
//! person being identified. Collectors never fail; a signal that could not be
//! gathered comes back as [`Signal::Degraded`].

pub mod fingerprint;
mod ip;
mod ledger;
mod probe;

pub use fingerprint::Fingerprint;
pub use ip::{HttpIpLookup, IpLookup};
pub use ledger::{FingerprintLedger, UsedSet};
pub use probe::{EnvironmentProbe, HostProbe, ProbeError, ReportedEnvironment};

/// Outcome of a collector that must always return something.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal<T> {
    Collected(T),
    Degraded(String),
}

impl<T> Signal<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Signal::Degraded(reason.into())
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Signal::Collected(v) => Some(v),
            Signal::Degraded(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Signal::Collected(v) => Some(v),
            Signal::Degraded(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Signal::Degraded(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Signal::Collected(_) => None,
            Signal::Degraded(r) => Some(r),
        }
    }
}
