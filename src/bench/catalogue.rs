//! Registry of named benchmark queries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bson::Document;

use super::comparison::{optimization_pairs, OptimizationPair};
use super::queries;
use crate::error::{BenchError, BenchResult};
use crate::store::{DocumentStore, FindOptions};

/// Handle shared by every query during a run: the store plus an optional
/// per-operation deadline.
#[derive(Clone)]
pub struct QueryContext {
    store: Arc<dyn DocumentStore>,
    deadline: Option<Duration>,
}

impl QueryContext {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn find(&self, filter: Document, options: FindOptions) -> BenchResult<Vec<Document>> {
        self.bounded("find", self.store.find(filter, options)).await
    }

    pub async fn aggregate(&self, pipeline: Vec<Document>) -> BenchResult<Vec<Document>> {
        self.bounded("aggregate", self.store.aggregate(pipeline))
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = BenchResult<T>>,
    ) -> BenchResult<T> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .map_err(|_| BenchError::Timeout(operation.to_string()))?,
            None => fut.await,
        }
    }
}

/// What a query returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOutcome {
    /// Documents or groups the operation produced
    pub documents: usize,
}

impl QueryOutcome {
    pub fn new(documents: usize) -> Self {
        Self { documents }
    }
}

/// A unit of work the harness can profile
#[async_trait]
pub trait RunnableQuery: Send + Sync {
    async fn execute(&self, ctx: &QueryContext) -> BenchResult<QueryOutcome>;
}

/// The built-in catalogue entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogueQuery {
    FindAllFieldsAntiPattern,
    FindWithProjectionOptimized,
    AggregateBeforeFilterAntiPattern,
    FilterBeforeAggregateOptimized,
    SortWithoutIndexAntiPattern,
    SortWithIndexOptimized,
    FindRecentEvents,
    FindHighSeverityEvents,
    AggregateEventsBySeverity,
    FindEventsWithProjection,
    FindEventsByTimeRange,
    ComplexAggregation,
    FindEventsWithSorting,
}

impl CatalogueQuery {
    pub const ALL: [CatalogueQuery; 13] = [
        CatalogueQuery::FindAllFieldsAntiPattern,
        CatalogueQuery::FindWithProjectionOptimized,
        CatalogueQuery::AggregateBeforeFilterAntiPattern,
        CatalogueQuery::FilterBeforeAggregateOptimized,
        CatalogueQuery::SortWithoutIndexAntiPattern,
        CatalogueQuery::SortWithIndexOptimized,
        CatalogueQuery::FindRecentEvents,
        CatalogueQuery::FindHighSeverityEvents,
        CatalogueQuery::AggregateEventsBySeverity,
        CatalogueQuery::FindEventsWithProjection,
        CatalogueQuery::FindEventsByTimeRange,
        CatalogueQuery::ComplexAggregation,
        CatalogueQuery::FindEventsWithSorting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CatalogueQuery::FindAllFieldsAntiPattern => "FindAllFieldsAntiPattern",
            CatalogueQuery::FindWithProjectionOptimized => "FindWithProjectionOptimized",
            CatalogueQuery::AggregateBeforeFilterAntiPattern => "AggregateBeforeFilterAntiPattern",
            CatalogueQuery::FilterBeforeAggregateOptimized => "FilterBeforeAggregateOptimized",
            CatalogueQuery::SortWithoutIndexAntiPattern => "SortWithoutIndexAntiPattern",
            CatalogueQuery::SortWithIndexOptimized => "SortWithIndexOptimized",
            CatalogueQuery::FindRecentEvents => "FindRecentEvents",
            CatalogueQuery::FindHighSeverityEvents => "FindHighSeverityEvents",
            CatalogueQuery::AggregateEventsBySeverity => "AggregateEventsBySeverity",
            CatalogueQuery::FindEventsWithProjection => "FindEventsWithProjection",
            CatalogueQuery::FindEventsByTimeRange => "FindEventsByTimeRange",
            CatalogueQuery::ComplexAggregation => "ComplexAggregation",
            CatalogueQuery::FindEventsWithSorting => "FindEventsWithSorting",
        }
    }
}

#[async_trait]
impl RunnableQuery for CatalogueQuery {
    async fn execute(&self, ctx: &QueryContext) -> BenchResult<QueryOutcome> {
        match self {
            CatalogueQuery::FindAllFieldsAntiPattern => {
                queries::find_all_fields_anti_pattern(ctx).await
            }
            CatalogueQuery::FindWithProjectionOptimized => {
                queries::find_with_projection_optimized(ctx).await
            }
            CatalogueQuery::AggregateBeforeFilterAntiPattern => {
                queries::aggregate_before_filter_anti_pattern(ctx).await
            }
            CatalogueQuery::FilterBeforeAggregateOptimized => {
                queries::filter_before_aggregate_optimized(ctx).await
            }
            CatalogueQuery::SortWithoutIndexAntiPattern => {
                queries::sort_without_index_anti_pattern(ctx).await
            }
            CatalogueQuery::SortWithIndexOptimized => queries::sort_with_index_optimized(ctx).await,
            CatalogueQuery::FindRecentEvents => queries::find_recent_events(ctx).await,
            CatalogueQuery::FindHighSeverityEvents => queries::find_high_severity_events(ctx).await,
            CatalogueQuery::AggregateEventsBySeverity => {
                queries::aggregate_events_by_severity(ctx).await
            }
            CatalogueQuery::FindEventsWithProjection => {
                queries::find_events_with_projection(ctx).await
            }
            CatalogueQuery::FindEventsByTimeRange => queries::find_events_by_time_range(ctx).await,
            CatalogueQuery::ComplexAggregation => queries::complex_aggregation(ctx).await,
            CatalogueQuery::FindEventsWithSorting => queries::find_events_with_sorting(ctx).await,
        }
    }
}

/// A named, individually runnable query
#[derive(Clone)]
pub struct QueryTest {
    pub name: String,
    pub query: Arc<dyn RunnableQuery>,
}

impl QueryTest {
    pub fn new(name: impl Into<String>, query: Arc<dyn RunnableQuery>) -> Self {
        Self {
            name: name.into(),
            query,
        }
    }
}

impl std::fmt::Debug for QueryTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTest").field("name", &self.name).finish()
    }
}

/// Every catalogue entry, in registration order
pub fn query_tests() -> Vec<QueryTest> {
    CatalogueQuery::ALL
        .into_iter()
        .map(|q| QueryTest::new(q.name(), Arc::new(q)))
        .collect()
}

/// Tests and comparison pairs chosen for one run
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub tests: Vec<QueryTest>,
    pub pairs: Vec<OptimizationPair>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty() && self.pairs.is_empty()
    }
}

/// Query tests plus optimization pairs, addressable by name
#[derive(Debug, Clone)]
pub struct Catalogue {
    tests: Vec<QueryTest>,
    pairs: Vec<OptimizationPair>,
}

impl Catalogue {
    pub fn new(tests: Vec<QueryTest>, pairs: Vec<OptimizationPair>) -> Self {
        Self { tests, pairs }
    }

    /// The built-in queries and comparisons
    pub fn standard() -> Self {
        Self::new(query_tests(), optimization_pairs())
    }

    pub fn tests(&self) -> &[QueryTest] {
        &self.tests
    }

    pub fn pairs(&self) -> &[OptimizationPair] {
        &self.pairs
    }

    /// Registered test names followed by comparison pair ids
    pub fn names(&self) -> Vec<&str> {
        self.tests
            .iter()
            .map(|t| t.name.as_str())
            .chain(self.pairs.iter().map(|p| p.id.as_str()))
            .collect()
    }

    /// Resolve requested names; an empty request selects everything.
    ///
    /// Any unknown name fails the whole selection so nothing runs.
    pub fn select(&self, names: &[String]) -> BenchResult<Selection> {
        if names.is_empty() {
            return Ok(Selection {
                tests: self.tests.clone(),
                pairs: self.pairs.clone(),
            });
        }

        let mut selection = Selection::default();
        for name in names {
            if let Some(test) = self.tests.iter().find(|t| &t.name == name) {
                selection.tests.push(test.clone());
            } else if let Some(pair) = self.pairs.iter().find(|p| &p.id == name) {
                selection.pairs.push(pair.clone());
            } else {
                return Err(BenchError::UnknownTest(name.clone()));
            }
        }

        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let catalogue = Catalogue::standard();
        let mut names = catalogue.names();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(catalogue.tests().len(), 13);
        assert_eq!(catalogue.pairs().len(), 3);
    }

    #[test]
    fn test_select_all_when_empty() {
        let selection = Catalogue::standard().select(&[]).unwrap();
        assert_eq!(selection.tests.len(), 13);
        assert_eq!(selection.pairs.len(), 3);
    }

    #[test]
    fn test_select_mixed_names() {
        let selection = Catalogue::standard()
            .select(&[
                "FindRecentEvents".to_string(),
                "IndexedSortComparison".to_string(),
            ])
            .unwrap();
        assert_eq!(selection.tests.len(), 1);
        assert_eq!(selection.tests[0].name, "FindRecentEvents");
        assert_eq!(selection.pairs.len(), 1);
        assert_eq!(selection.pairs[0].id, "IndexedSortComparison");
    }

    #[test]
    fn test_select_unknown_name_fails() {
        let result = Catalogue::standard().select(&[
            "FindRecentEvents".to_string(),
            "DoesNotExist".to_string(),
        ]);
        match result {
            Err(BenchError::UnknownTest(name)) => assert_eq!(name, "DoesNotExist"),
            other => panic!("expected UnknownTest, got {:?}", other),
        }
    }
}
