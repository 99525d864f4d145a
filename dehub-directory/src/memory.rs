use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{Directory, DirectoryError};

struct Entry {
    addr: String,
    updated_at: DateTime<Utc>,
}

/// Process-local implementation of [`Directory`]. Legitimate as the default
/// for single-hub deployments (spec §9).
#[derive(Default)]
pub struct MemoryDirectory {
    entries: DashMap<String, Entry>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_fresh(updated_at: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(updated_at) <= chrono::Duration::from_std(dehub_common::TTL).expect("TTL fits in chrono::Duration")
    }
}

#[async_trait::async_trait]
impl Directory for MemoryDirectory {
    async fn store_location(&self, id: &str, relay_addr: &str) -> Result<(), DirectoryError> {
        self.entries.insert(
            id.to_owned(),
            Entry {
                addr: relay_addr.to_owned(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load_location(&self, id_prefix: &str) -> Result<(String, String), DirectoryError> {
        let mut best: Option<(String, String, DateTime<Utc>)> = None;

        for item in self.entries.iter() {
            let id = item.key();
            if !id.starts_with(id_prefix) {
                continue;
            }
            if !Self::is_fresh(item.value().updated_at) {
                continue;
            }
            let is_newer = best
                .as_ref()
                .map(|(_, _, updated_at)| item.value().updated_at > *updated_at)
                .unwrap_or(true);
            if is_newer {
                best = Some((item.value().addr.clone(), id.clone(), item.value().updated_at));
            }
        }

        best.map(|(addr, id, _)| (addr, id))
            .ok_or(DirectoryError::NotFound)
    }

    async fn delete_location(&self, id: &str) -> Result<(), DirectoryError> {
        self.entries.remove(id);
        Ok(())
    }
}
