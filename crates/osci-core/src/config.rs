#![forbid(unsafe_code)]

//! Process-wide configuration.
//!
//! All knobs are read once at startup and the struct is treated as immutable
//! afterwards; the parse and compose paths receive it by reference.

use crate::algorithm;

/// Name of the environment variable gating the opportunistic CBC→GCM
/// transport-encryption upgrade.  Set to `"false"` to disable.
pub const GCM_UPGRADE_ENV: &str = "OSCI_GCM_UPGRADE";

/// Immutable pipeline configuration.
#[derive(Debug, Clone)]
pub struct OsciConfig {
    /// Digest algorithm URI used for signature-relevant subtrees.
    pub digest_uri: String,
    /// Default symmetric cipher URI for transport encryption.
    pub cipher_uri: String,
    /// Reject messages containing duplicate signature-relevant elements.
    pub check_duplicate_ids: bool,
    /// Verify signatures on incoming signed messages.
    pub check_signatures: bool,
    /// Allow upgrading a CBC-encrypted dialog to GCM on the response path
    /// when the peer advertised GCM support.  Never downgrades.
    pub gcm_upgrade: bool,
    /// Maximum transport-decryption recursion depth.
    pub max_decryption_depth: u32,
}

impl Default for OsciConfig {
    fn default() -> Self {
        Self {
            digest_uri: algorithm::SHA256.to_owned(),
            cipher_uri: algorithm::AES256_CBC.to_owned(),
            check_duplicate_ids: true,
            check_signatures: true,
            gcm_upgrade: true,
            max_decryption_depth: 2,
        }
    }
}

impl OsciConfig {
    /// Build the default configuration, honoring the legacy environment
    /// toggle for the GCM upgrade.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var(GCM_UPGRADE_ENV) {
            cfg.gcm_upgrade = !v.eq_ignore_ascii_case("false");
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_variable_gates_gcm_upgrade() {
        std::env::set_var(GCM_UPGRADE_ENV, "false");
        assert!(!OsciConfig::from_env().gcm_upgrade);
        std::env::set_var(GCM_UPGRADE_ENV, "anything-else");
        assert!(OsciConfig::from_env().gcm_upgrade);
        std::env::remove_var(GCM_UPGRADE_ENV);
    }

    #[test]
    fn default_is_sha256_cbc() {
        let cfg = OsciConfig::default();
        assert_eq!(cfg.digest_uri, algorithm::SHA256);
        assert_eq!(cfg.cipher_uri, algorithm::AES256_CBC);
        assert!(cfg.gcm_upgrade);
        assert_eq!(cfg.max_decryption_depth, 2);
    }
}
