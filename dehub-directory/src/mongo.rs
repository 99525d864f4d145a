use mongodb::bson::{doc, DateTime as BsonDateTime};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::{Directory, DirectoryError};

#[derive(Debug, Serialize, Deserialize)]
struct LocationDoc {
    #[serde(rename = "_id")]
    id: String,
    addr: String,
    #[serde(rename = "updatedAt")]
    updated_at: BsonDateTime,
}

/// Cluster-shared implementation of [`Directory`] backed by a MongoDB
/// collection with a TTL index on `updatedAt`, mirroring the original's
/// `lib/hubdb/mongo.go`.
pub struct MongoDirectory {
    collection: Collection<LocationDoc>,
}

impl MongoDirectory {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }

    /// Creates the `updatedAt` TTL index. Safe to call on every startup;
    /// `create_index` is idempotent for an index with matching options.
    pub async fn ensure_indexes(&self) -> Result<(), DirectoryError> {
        let ttl_index = IndexModel::builder()
            .keys(doc! { "updatedAt": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(Some(dehub_common::TTL))
                    .build(),
            )
            .build();
        self.collection.create_index(ttl_index).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Directory for MongoDirectory {
    async fn store_location(&self, id: &str, relay_addr: &str) -> Result<(), DirectoryError> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "addr": relay_addr, "updatedAt": BsonDateTime::now() } },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn load_location(&self, id_prefix: &str) -> Result<(String, String), DirectoryError> {
        let cutoff = BsonDateTime::from_millis(
            BsonDateTime::now().timestamp_millis() - dehub_common::TTL.as_millis() as i64,
        );

        let filter = doc! {
            "_id": { "$regex": format!("^{}", regex::escape(id_prefix)) },
            "updatedAt": { "$gte": cutoff },
        };

        match self
            .collection
            .find_one(filter)
            .sort(doc! { "updatedAt": -1 })
            .await?
        {
            Some(doc) => Ok((doc.addr, doc.id)),
            None => Err(DirectoryError::NotFound),
        }
    }

    async fn delete_location(&self, id: &str) -> Result<(), DirectoryError> {
        self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(())
    }
}
