//! Catalogue queries and comparison pairs against seeded in-memory data.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongo_bench::bench::{
    optimization_pairs, query_tests, CatalogueQuery, ComparisonRunner, IndexSetup, QueryContext,
    RunnableQuery,
};
use mongo_bench::generator::generate_event;
use mongo_bench::models::event::STATUSES;
use mongo_bench::store::{FindOptions, IndexSpec};
use mongo_bench::{BenchError, BenchResult, DocumentStore, MemoryStore};
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::{context, seeded_store, RECENT_HIGH_SEVERITY};

fn pair(id: &str) -> mongo_bench::bench::OptimizationPair {
    optimization_pairs()
        .into_iter()
        .find(|p| p.id == id)
        .unwrap()
}

#[tokio::test]
async fn test_every_catalogue_query_runs() {
    let ctx = context(seeded_store().await);

    for test in query_tests() {
        let outcome = test.query.execute(&ctx).await;
        assert!(outcome.is_ok(), "{} failed: {:?}", test.name, outcome);
    }
}

#[tokio::test]
async fn test_query_result_sizes() {
    let ctx = context(seeded_store().await);

    let recent = CatalogueQuery::FindRecentEvents.execute(&ctx).await.unwrap();
    assert_eq!(recent.documents, 10);

    let full = CatalogueQuery::FindAllFieldsAntiPattern
        .execute(&ctx)
        .await
        .unwrap();
    assert_eq!(full.documents, RECENT_HIGH_SEVERITY);

    let by_severity = CatalogueQuery::AggregateEventsBySeverity
        .execute(&ctx)
        .await
        .unwrap();
    assert_eq!(by_severity.documents, 5);

    let complex = CatalogueQuery::ComplexAggregation.execute(&ctx).await.unwrap();
    assert!(complex.documents <= 5);

    let projected = CatalogueQuery::FindEventsWithProjection
        .execute(&ctx)
        .await
        .unwrap();
    assert!(projected.documents <= 5);
}

#[tokio::test]
async fn test_projection_pair_reports_same_count() {
    let ctx = context(seeded_store().await);
    let runner = ComparisonRunner::new(&ctx, 3);

    let reports = runner
        .run(&[pair("ProjectionComparison")])
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.anti_pattern.documents, Some(RECENT_HIGH_SEVERITY));
    assert_eq!(report.optimized.documents, Some(RECENT_HIGH_SEVERITY));
    assert_eq!(report.anti_pattern.succeeded, 3);
    assert_eq!(report.optimized.succeeded, 3);
    assert!(report.index_setup.is_none());
    assert!(!report.degenerate);
}

#[tokio::test]
async fn test_oversized_group_is_a_skipped_repetition() {
    // group documents from $push $$ROOT exceed this, single events do not
    let store = Arc::new(MemoryStore::with_max_document_size(8 * 1024));
    let mut rng = StdRng::seed_from_u64(8);
    for _ in 0..60 {
        let mut event = generate_event(&mut rng);
        event.event_type = "System Warning".to_string();
        store
            .insert_one(event.to_document().unwrap())
            .await
            .unwrap();
    }

    let ctx = QueryContext::new(store);
    let direct = CatalogueQuery::AggregateBeforeFilterAntiPattern
        .execute(&ctx)
        .await;
    assert!(matches!(direct, Err(BenchError::DocumentTooLarge { .. })));

    let runner = ComparisonRunner::new(&ctx, 3);
    let reports = runner
        .run(&[pair("FilterBeforeAggregateComparison")])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.anti_pattern.failed, 3);
    assert_eq!(report.anti_pattern.succeeded, 0);
    assert_eq!(report.anti_pattern.documents, None);
    assert_eq!(report.anti_pattern.average.execution_time.as_nanos(), 0);
    assert_eq!(report.time_improvement_pct, 0.0);
    assert_eq!(report.memory_improvement_pct, 0.0);

    assert_eq!(report.optimized.succeeded, 3);
    assert_eq!(report.optimized.documents, Some(1));
}

#[tokio::test]
async fn test_indexed_sort_pair_creates_index() {
    let store = seeded_store().await;
    let ctx = context(store.clone());
    let runner = ComparisonRunner::new(&ctx, 1);

    let reports = runner
        .run(&[pair("IndexedSortComparison")])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(
        report.index_setup,
        Some(IndexSetup::Created(vec!["sourceSystem_status_idx".to_string()]))
    );
    assert!(store
        .index_names()
        .contains(&"sourceSystem_status_idx".to_string()));
    assert_eq!(report.anti_pattern.documents, report.optimized.documents);
}

#[tokio::test]
async fn test_index_setup_failure_is_not_fatal() {
    let store = seeded_store().await;
    // same name, different keys
    store
        .create_indexes(vec![IndexSpec::new(
            "sourceSystem_status_idx",
            doc! { "status": -1 },
        )])
        .await
        .unwrap();

    let ctx = context(store);
    let reports = ComparisonRunner::new(&ctx, 1)
        .run(&[pair("IndexedSortComparison")])
        .await
        .unwrap();

    assert!(matches!(
        reports[0].index_setup,
        Some(IndexSetup::Failed(_))
    ));
    assert_eq!(reports[0].anti_pattern.succeeded, 1);
    assert_eq!(reports[0].optimized.succeeded, 1);
}

#[tokio::test]
async fn test_sorted_results_follow_sort_keys() {
    let store = seeded_store().await;
    let documents = store
        .find(
            doc! { "sourceSystem": { "$in": ["Main Database", "Authentication Service", "API Gateway"] } },
            FindOptions::new()
                .sort(doc! { "sourceSystem": 1, "status": 1 })
                .limit(100),
        )
        .await
        .unwrap();

    let keys: Vec<(String, String)> = documents
        .iter()
        .map(|d| {
            (
                d.get_str("sourceSystem").unwrap().to_string(),
                d.get_str("status").unwrap().to_string(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(keys.iter().all(|(_, s)| STATUSES.contains(&s.as_str())));
}

/// Answers pings at once but stalls every read
struct StalledStore {
    inner: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl DocumentStore for StalledStore {
    async fn find(&self, filter: Document, options: FindOptions) -> BenchResult<Vec<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find(filter, options).await
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> BenchResult<Vec<Document>> {
        tokio::time::sleep(self.delay).await;
        self.inner.aggregate(pipeline).await
    }

    async fn insert_one(&self, document: Document) -> BenchResult<Bson> {
        self.inner.insert_one(document).await
    }

    async fn create_indexes(&self, indexes: Vec<IndexSpec>) -> BenchResult<Vec<String>> {
        self.inner.create_indexes(indexes).await
    }

    async fn ping(&self) -> BenchResult<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "stalled".to_string()
    }
}

#[tokio::test]
async fn test_expired_deadline_is_a_skipped_repetition() {
    let store = Arc::new(StalledStore {
        inner: MemoryStore::new(),
        delay: Duration::from_millis(200),
    });
    let ctx = QueryContext::new(store).with_deadline(Some(Duration::from_millis(20)));

    let direct = CatalogueQuery::FindRecentEvents.execute(&ctx).await;
    assert!(
        matches!(direct, Err(BenchError::Timeout(ref op)) if op == "find"),
        "{:?}",
        direct
    );

    let reports = ComparisonRunner::new(&ctx, 2)
        .run(&[pair("ProjectionComparison")])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.anti_pattern.failed, 2);
    assert_eq!(report.anti_pattern.succeeded, 0);
    assert_eq!(report.optimized.failed, 2);
    assert_eq!(report.optimized.succeeded, 0);
}
