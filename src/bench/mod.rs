//! Query benchmark harness: profiler, catalogue, runners.

pub mod alloc;
pub mod catalogue;
pub mod comparison;
pub mod profiler;
pub mod queries;
pub mod runner;

pub use catalogue::{
    query_tests, Catalogue, CatalogueQuery, QueryContext, QueryOutcome, QueryTest, RunnableQuery,
    Selection,
};
pub use comparison::{
    memory_improvement_pct, optimization_pairs, time_improvement_pct, ComparisonReport,
    ComparisonRunner, IndexSetup, MeasurementTotals, OptimizationPair, VariantSummary,
    DEFAULT_REPETITIONS, MEMORY_BASELINE_FLOOR,
};
pub use profiler::{profile, ProfileResult};
pub use runner::{run_query_tests, TestFailure, TestRunSummary};
