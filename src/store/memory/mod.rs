//! In-process document store.
//!
//! Evaluates the same filters, projections, sorts and pipelines the query
//! catalogue sends to MongoDB, over documents kept in a vector. Index
//! definitions are recorded but never consulted, so hints have no effect.

pub mod filter;
pub mod pipeline;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;

use super::{DocumentStore, FindOptions, IndexSpec, MAX_DOCUMENT_SIZE};
use crate::error::{BenchError, BenchResult};

pub struct MemoryStore {
    documents: RwLock<Vec<Document>>,
    indexes: RwLock<Vec<IndexSpec>>,
    max_document_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_document_size(MAX_DOCUMENT_SIZE)
    }

    /// Store whose aggregation results may not exceed `max_document_size` bytes
    pub fn with_max_document_size(max_document_size: usize) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            indexes: RwLock::new(Vec::new()),
            max_document_size,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Names of the indexes created so far
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().iter().map(|i| i.name.clone()).collect()
    }

    fn prepare(mut document: Document) -> (Bson, Document) {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };
        (id, document)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, filter: Document, options: FindOptions) -> BenchResult<Vec<Document>> {
        let mut found = Vec::new();
        for doc in self.documents.read().iter() {
            if filter::matches(doc, &filter)? {
                found.push(doc.clone());
            }
        }

        if let Some(sort) = &options.sort {
            filter::sort_documents(&mut found, sort)?;
        }

        if let Some(limit) = options.limit {
            // a negative limit means "single batch of |n|", same as the server
            let limit = limit.unsigned_abs() as usize;
            if limit > 0 {
                found.truncate(limit);
            }
        }

        match &options.projection {
            Some(projection) => found
                .iter()
                .map(|doc| filter::project(doc, projection))
                .collect(),
            None => Ok(found),
        }
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> BenchResult<Vec<Document>> {
        let snapshot = self.documents.read().clone();
        pipeline::run_pipeline(snapshot, &pipeline, self.max_document_size)
    }

    async fn insert_one(&self, document: Document) -> BenchResult<Bson> {
        let (id, document) = Self::prepare(document);

        let size = pipeline::document_size(&document)?;
        if size > self.max_document_size {
            return Err(BenchError::DocumentTooLarge {
                size,
                limit: self.max_document_size,
            });
        }

        let mut documents = self.documents.write();
        if documents
            .iter()
            .any(|existing| existing.get("_id").is_some_and(|e| filter::bson_equal(e, &id)))
        {
            return Err(BenchError::InvalidQuery(format!(
                "duplicate key error: _id {}",
                id
            )));
        }
        documents.push(document);

        Ok(id)
    }

    async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> BenchResult<Vec<String>> {
        let mut existing = self.indexes.write();
        let mut created = Vec::with_capacity(indexes.len());

        for spec in indexes {
            match existing.iter().find(|i| i.name == spec.name) {
                Some(current) if current.keys != spec.keys => {
                    return Err(BenchError::InvalidQuery(format!(
                        "an index named '{}' already exists with different keys",
                        spec.name
                    )));
                }
                Some(_) => {}
                None => existing.push(spec.clone()),
            }
            created.push(spec.name);
        }

        Ok(created)
    }

    async fn ping(&self) -> BenchResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory store ({} documents)", self.len())
    }
}
