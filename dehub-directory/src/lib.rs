//! The `id → (relayAddr, updatedAt)` directory (spec §4.2): a pluggable,
//! heartbeat-refreshed mapping from servant id to the hub currently holding
//! that servant's control connection.
//!
//! Two conforming implementations ship here: [`MemoryDirectory`] (the
//! default, single-process) and [`MongoDirectory`] (cluster-shared, backing
//! the original's `lib/hubdb/mongo.go`).

mod memory;
mod mongo;

use async_trait::async_trait;

pub use memory::MemoryDirectory;
pub use mongo::MongoDirectory;

#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("not found")]
    NotFound,
    #[error("mongo: {0}")]
    Mongo(#[from] ::mongodb::error::Error),
}

/// Abstract contract for the servant-location directory (spec §4.2, "DB").
///
/// Implementations MUST NOT panic on an empty prefix, and MUST ignore
/// entries whose `updatedAt` is older than [`dehub_common::TTL`].
#[async_trait]
pub trait Directory: Send + Sync {
    /// Upsert; refreshes `updatedAt` even if `id` already has an entry.
    async fn store_location(&self, id: &str, relay_addr: &str) -> Result<(), DirectoryError>;

    /// Returns `(relayAddr, fullId)` for the most-recently-updated entry
    /// whose id starts with `id_prefix`, or [`DirectoryError::NotFound`].
    async fn load_location(&self, id_prefix: &str) -> Result<(String, String), DirectoryError>;

    /// Idempotent: deleting an id with no entry is not an error.
    async fn delete_location(&self, id: &str) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod contract_tests {
    //! Shared property tests run against every `Directory` impl. Only
    //! `MemoryDirectory` is exercised here since `MongoDirectory` needs a
    //! live `mongod`; see `dehub-directory/tests/mongo.rs` for that one,
    //! gated behind the `DEHUB_TEST_MONGO_URI` environment variable.
    use super::*;

    async fn round_trips_store_and_load(db: &dyn Directory) {
        db.store_location("abcdef12", "10.0.0.1:4000").await.unwrap();
        let (addr, id) = db.load_location("abcdef12").await.unwrap();
        assert_eq!(addr, "10.0.0.1:4000");
        assert_eq!(id, "abcdef12");
    }

    async fn overwrite_wins(db: &dyn Directory) {
        db.store_location("a", "addr-1").await.unwrap();
        db.store_location("a", "addr-2").await.unwrap();
        let (addr, id) = db.load_location("a").await.unwrap();
        assert_eq!(addr, "addr-2");
        assert_eq!(id, "a");
    }

    async fn delete_then_not_found(db: &dyn Directory) {
        db.store_location("b", "addr").await.unwrap();
        db.delete_location("b").await.unwrap();
        assert!(matches!(
            db.load_location("b").await,
            Err(DirectoryError::NotFound)
        ));
    }

    async fn prefix_lookup_returns_full_id(db: &dyn Directory) {
        db.store_location("abcdef12", "addr").await.unwrap();
        let (addr, id) = db.load_location("abc").await.unwrap();
        assert_eq!(addr, "addr");
        assert_eq!(id, "abcdef12");
    }

    async fn empty_prefix_does_not_panic(db: &dyn Directory) {
        db.store_location("c", "addr").await.unwrap();
        let _ = db.load_location("").await;
    }

    async fn delete_is_idempotent(db: &dyn Directory) {
        db.delete_location("never-stored").await.unwrap();
        db.delete_location("never-stored").await.unwrap();
    }

    #[tokio::test]
    async fn memory_directory_satisfies_the_contract() {
        let db = MemoryDirectory::new();
        round_trips_store_and_load(&db).await;
        let db = MemoryDirectory::new();
        overwrite_wins(&db).await;
        let db = MemoryDirectory::new();
        delete_then_not_found(&db).await;
        let db = MemoryDirectory::new();
        prefix_lookup_returns_full_id(&db).await;
        let db = MemoryDirectory::new();
        empty_prefix_does_not_panic(&db).await;
        let db = MemoryDirectory::new();
        delete_is_idempotent(&db).await;
    }
}
