//! Handshake profiles selectable at client construction.

use super::tls::TlsFingerprint;

/// Browser profile used to shape the TLS ClientHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintProfile {
    /// Chrome 131 on macOS (cipher suites, curves, sigalgs, GREASE).
    #[default]
    Chrome131,
    /// No fingerprinting - use default TLS settings
    None,
}

impl FingerprintProfile {
    /// Get the User-Agent string for this profile.
    pub fn user_agent(&self) -> &'static str {
        match self {
            Self::Chrome131 => {
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
            }
            Self::None => concat!("wraith/", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Get the TLS fingerprint for this profile.
    pub fn tls_fingerprint(&self) -> TlsFingerprint {
        match self {
            FingerprintProfile::Chrome131 => TlsFingerprint::chrome_131(),
            FingerprintProfile::None => TlsFingerprint::default(),
        }
    }
}
