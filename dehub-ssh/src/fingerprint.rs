use std::collections::HashSet;

use russh::keys::{HashAlg, PublicKey};

/// SHA-256 fingerprint of a public key, used for set membership only (never
/// rendered to a user as an identity claim).
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// A trusted-key predicate assembled from authorized-keys blobs at
/// construction (spec §4.5.2 / §4.6.1): either side's "is this key allowed"
/// check is a SHA-256 fingerprint set lookup, never a raw key comparison.
#[derive(Clone, Default)]
pub struct TrustedKeys(HashSet<String>);

impl TrustedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a PublicKey>) -> Self {
        Self(keys.into_iter().map(fingerprint).collect())
    }

    /// Parses OpenSSH `authorized_keys`-style text, one public key per line;
    /// blank lines and `#` comments are skipped.
    pub fn from_authorized_keys(blob: &str) -> Result<Self, russh::keys::Error> {
        let mut set = HashSet::new();
        for line in blob.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            set.insert(fingerprint(&PublicKey::from_openssh(line)?));
        }
        Ok(Self(set))
    }

    pub fn contains(&self, key: &PublicKey) -> bool {
        self.0.contains(&fingerprint(key))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::{Algorithm, PrivateKey};

    fn gen() -> PrivateKey {
        PrivateKey::random(&mut rand_core::OsRng, Algorithm::Ed25519).expect("keygen")
    }

    #[test]
    fn trusts_only_listed_keys() {
        let trusted = gen();
        let other = gen();
        let set = TrustedKeys::from_keys([&trusted.public_key()]);

        assert!(set.contains(&trusted.public_key()));
        assert!(!set.contains(&other.public_key()));
    }

    #[test]
    fn parses_authorized_keys_blob() {
        let key = gen();
        let line = key.public_key().to_openssh().expect("encode");
        let blob = format!("# comment\n\n{line}\n");
        let set = TrustedKeys::from_authorized_keys(&blob).expect("parse");
        assert!(set.contains(&key.public_key()));
    }
}
