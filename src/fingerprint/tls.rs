//! TLS ClientHello shaping: cipher suites, groups, signature algorithms, GREASE.

/// Chrome 131 cipher suites in exact order (BoringSSL names).
pub const CHROME_131_CIPHER_SUITES: &[&str] = &[
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-RSA-AES128-SHA",
    "ECDHE-RSA-AES256-SHA",
    "AES128-GCM-SHA256",
    "AES256-GCM-SHA384",
    "AES128-SHA",
    "AES256-SHA",
];

/// Chrome 131 signature algorithms.
pub const CHROME_131_SIGNATURE_ALGORITHMS: &[&str] = &[
    "ecdsa_secp256r1_sha256",
    "rsa_pss_rsae_sha256",
    "rsa_pkcs1_sha256",
    "ecdsa_secp384r1_sha384",
    "rsa_pss_rsae_sha384",
    "rsa_pkcs1_sha384",
    "rsa_pss_rsae_sha512",
    "rsa_pkcs1_sha512",
];

/// Chrome 131 supported curves.
pub const CHROME_131_CURVES: &[&str] = &["X25519", "P-256", "P-384"];

/// TLS fingerprint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFingerprint {
    /// Cipher suites in order. Empty keeps the BoringSSL defaults.
    pub cipher_list: Vec<&'static str>,
    /// Signature algorithms.
    pub sigalgs: Vec<&'static str>,
    /// Supported curves/groups.
    pub curves: Vec<&'static str>,
    /// Enable GREASE values.
    pub grease: bool,
    /// Randomize extension order per connection.
    pub permute_extensions: bool,
}

impl Default for TlsFingerprint {
    fn default() -> Self {
        Self {
            cipher_list: vec![],
            sigalgs: vec![],
            curves: vec![],
            grease: false,
            permute_extensions: false,
        }
    }
}

impl TlsFingerprint {
    /// Create a TLS fingerprint for Chrome 131.
    pub fn chrome_131() -> Self {
        Self {
            cipher_list: CHROME_131_CIPHER_SUITES.to_vec(),
            sigalgs: CHROME_131_SIGNATURE_ALGORITHMS.to_vec(),
            curves: CHROME_131_CURVES.to_vec(),
            grease: true,
            permute_extensions: true,
        }
    }

    /// Whether this fingerprint changes anything from the library defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_fingerprint() {
        let fp = TlsFingerprint::chrome_131();
        assert_eq!(fp.cipher_list[0], "TLS_AES_128_GCM_SHA256");
        assert!(fp.grease);
        assert!(!fp.is_default());
        assert!(TlsFingerprint::default().is_default());
    }
}
