//! Document store abstraction used by the generator and the benchmark harness.
//!
//! Two implementations are provided:
//! - [`MongoStore`]: a MongoDB collection reached through the official driver
//! - [`MemoryStore`]: an in-process evaluator of the filter, projection, sort
//!   and pipeline subset the query catalogue relies on

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::error::BenchResult;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Largest document a single result may occupy (MongoDB's BSON limit)
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Optional modifiers for a find operation
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    /// Index hint; `{"$natural": 1}` forces a collection scan
    pub hint: Option<Document>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn hint(mut self, hint: Document) -> Self {
        self.hint = Some(hint);
        self
    }
}

/// Definition of an index to create
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub keys: Document,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, keys: Document) -> Self {
        Self {
            name: name.into(),
            keys,
        }
    }
}

/// Operations the harness needs from a document collection.
///
/// Cursors are drained by the implementation, so results arrive as vectors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, filter: Document, options: FindOptions) -> BenchResult<Vec<Document>>;

    async fn aggregate(&self, pipeline: Vec<Document>) -> BenchResult<Vec<Document>>;

    /// Insert one document, returning its `_id`
    async fn insert_one(&self, document: Document) -> BenchResult<Bson>;

    /// Create indexes, returning the names the store reports as created
    async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> BenchResult<Vec<String>>;

    async fn ping(&self) -> BenchResult<()>;

    /// Short human-readable location of the store, for log lines
    fn describe(&self) -> String;
}

/// Indexes maintained on the events collection for everyday queries
pub fn event_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::new(
            "timestamp_eventType_severityLevel",
            bson::doc! { "timestamp": -1, "eventType": -1, "severity.level": -1 },
        ),
        IndexSpec::new(
            "timestamp_severityLevel",
            bson::doc! { "timestamp": -1, "severity.level": -1 },
        ),
    ]
}
