use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, Credential, Hint, IndexOptions};
use mongodb::{Client, Collection, IndexModel};

use super::{DocumentStore, FindOptions, IndexSpec};
use crate::cli::config::StoreConfig;
use crate::error::{BenchError, BenchResult};
use crate::models::EVENTS_COLLECTION;

/// Upper bound for connectivity checks
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for index builds
pub const INDEX_TIMEOUT: Duration = Duration::from_secs(10);

/// Events collection of a MongoDB deployment
pub struct MongoStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect to the deployment described by `config` and verify it answers a ping.
    pub async fn connect(config: &StoreConfig) -> BenchResult<Self> {
        let mut options = ClientOptions::parse(config.uri.as_str())
            .await
            .map_err(|e| BenchError::Connection(format!("Invalid URI '{}': {}", config.uri, e)))?;

        if let Some((username, password)) = config.credentials() {
            options.credential = Some(
                Credential::builder()
                    .username(username.to_string())
                    .password(password.to_string())
                    .build(),
            );
        }
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(options)
            .map_err(|e| BenchError::Connection(format!("Failed to create client: {}", e)))?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(EVENTS_COLLECTION);

        let store = Self {
            client,
            database: config.database.clone(),
            collection,
        };

        store.ping().await.map_err(|e| {
            BenchError::Connection(format!("Failed to reach {}: {}", store.describe(), e))
        })?;
        tracing::debug!("Connected to {}", store.describe());

        Ok(store)
    }

    /// Close all pooled connections
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find(&self, filter: Document, options: FindOptions) -> BenchResult<Vec<Document>> {
        let mut action = self.collection.find(filter);
        if let Some(projection) = options.projection {
            action = action.projection(projection);
        }
        if let Some(sort) = options.sort {
            action = action.sort(sort);
        }
        if let Some(limit) = options.limit {
            action = action.limit(limit);
        }
        if let Some(hint) = options.hint {
            action = action.hint(Hint::Keys(hint));
        }

        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> BenchResult<Vec<Document>> {
        let cursor = self.collection.aggregate(pipeline).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_one(&self, document: Document) -> BenchResult<Bson> {
        let result = self.collection.insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> BenchResult<Vec<String>> {
        let models: Vec<IndexModel> = indexes
            .into_iter()
            .map(|spec| {
                IndexModel::builder()
                    .keys(spec.keys)
                    .options(IndexOptions::builder().name(spec.name).build())
                    .build()
            })
            .collect();

        let result = tokio::time::timeout(INDEX_TIMEOUT, self.collection.create_indexes(models))
            .await
            .map_err(|_| BenchError::Timeout("createIndexes".to_string()))??;

        Ok(result.index_names)
    }

    async fn ping(&self) -> BenchResult<()> {
        tokio::time::timeout(
            PING_TIMEOUT,
            self.client
                .database(&self.database)
                .run_command(doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| BenchError::Timeout("ping".to_string()))??;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("MongoDB namespace {}.{}", self.database, EVENTS_COLLECTION)
    }
}
