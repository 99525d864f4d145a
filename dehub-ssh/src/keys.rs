use std::path::Path;

use russh::keys::ssh_key::LineEnding;
use russh::keys::{Algorithm, PrivateKey};
use tracing::info;

/// Generates a fresh Ed25519 key pair. The original uses whatever key type
/// the operator hands it; Ed25519 is the one idiomatic default for a new
/// host key (spec §4.5.1, §4.6.1: "host key = servant's configured private
/// key").
pub fn generate_host_key() -> PrivateKey {
    PrivateKey::random(&mut rand_core::OsRng, Algorithm::Ed25519)
        .expect("ed25519 key generation does not fail")
}

/// Loads the host key at `path`, generating and persisting one there first
/// if it doesn't exist yet.
pub async fn load_or_generate_host_key(path: &Path) -> std::io::Result<PrivateKey> {
    if path.exists() {
        let data = tokio::fs::read_to_string(path).await?;
        return PrivateKey::from_openssh(&data)
            .map_err(|error| std::io::Error::new(std::io::ErrorKind::InvalidData, error));
    }

    info!(path = %path.display(), "generating host key");
    let key = generate_host_key();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let encoded = key
        .to_openssh(LineEnding::LF)
        .map_err(|error| std::io::Error::new(std::io::ErrorKind::Other, error))?;
    tokio::fs::write(path, encoded.as_bytes()).await?;
    Ok(key)
}
