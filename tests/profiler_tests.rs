//! Profiler and comparison arithmetic with the counting allocator installed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongo_bench::bench::alloc::CountingAllocator;
use mongo_bench::bench::{
    profile, ComparisonRunner, OptimizationPair, QueryContext, QueryOutcome, RunnableQuery,
};
use mongo_bench::{BenchError, BenchResult, MemoryStore};

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

const BUFFER_BYTES: usize = 1024 * 1024;

/// Fixed-cost workload: one sleep and one large buffer
struct SleepAndAllocate;

#[async_trait]
impl RunnableQuery for SleepAndAllocate {
    async fn execute(&self, _ctx: &QueryContext) -> BenchResult<QueryOutcome> {
        let buffer = std::hint::black_box(vec![1u8; BUFFER_BYTES]);
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok(QueryOutcome::new(buffer.len()))
    }
}

/// Fails every other call
struct Flaky(std::sync::atomic::AtomicUsize);

#[async_trait]
impl RunnableQuery for Flaky {
    async fn execute(&self, _ctx: &QueryContext) -> BenchResult<QueryOutcome> {
        let call = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if call % 2 == 1 {
            Err(BenchError::InvalidQuery("cursor failure".to_string()))
        } else {
            Ok(QueryOutcome::new(1))
        }
    }
}

#[tokio::test]
async fn test_profile_measures_allocations() {
    let (result, outcome) = profile("alloc", || async {
        let buffer = std::hint::black_box(vec![0u8; BUFFER_BYTES]);
        Ok::<_, BenchError>(buffer.len())
    })
    .await;

    assert_eq!(outcome.unwrap(), BUFFER_BYTES);
    assert!(result.memory_usage >= BUFFER_BYTES as u64);
    assert_eq!(result.name, "alloc");
}

#[test]
fn test_profile_returns_result_on_error() {
    let (result, outcome) = tokio_test::block_on(profile("failing", || async {
        tokio::time::sleep(Duration::from_millis(2)).await;
        Err::<(), _>(BenchError::Timeout("find".to_string()))
    }));

    assert!(matches!(outcome, Err(BenchError::Timeout(_))));
    assert_eq!(result.name, "failing");
    assert!(result.execution_time >= Duration::from_millis(2));
}

#[tokio::test]
async fn test_degenerate_pair_is_close_to_zero() {
    let query: Arc<dyn RunnableQuery> = Arc::new(SleepAndAllocate);
    let pair = OptimizationPair::new(
        "SameQuery",
        "Both variants run the same workload",
        ("Sleep and allocate", query.clone()),
        ("Sleep and allocate", query),
    );
    assert!(pair.is_degenerate());

    let ctx = QueryContext::new(Arc::new(MemoryStore::new()));
    let reports = ComparisonRunner::new(&ctx, 3).run(&[pair]).await.unwrap();
    let report = &reports[0];

    assert!(report.degenerate);
    assert!(
        report.time_improvement_pct.abs() < 25.0,
        "time improvement {:.2}%",
        report.time_improvement_pct
    );
    assert!(
        report.memory_improvement_pct.abs() < 25.0,
        "memory improvement {:.2}%",
        report.memory_improvement_pct
    );
}

#[tokio::test]
async fn test_failed_repetitions_still_divide_by_r() {
    let pair = OptimizationPair::new(
        "Flaky",
        "Every other repetition fails",
        ("flaky", Arc::new(Flaky(Default::default())) as Arc<dyn RunnableQuery>),
        ("steady", Arc::new(SleepAndAllocate) as Arc<dyn RunnableQuery>),
    );

    let ctx = QueryContext::new(Arc::new(MemoryStore::new()));
    let reports = ComparisonRunner::new(&ctx, 4).run(&[pair]).await.unwrap();
    let anti = &reports[0].anti_pattern;

    assert_eq!(anti.succeeded, 2);
    assert_eq!(anti.failed, 2);
    // two ~5ms successes spread over four repetitions
    assert!(anti.average.execution_time < Duration::from_millis(5) * 2);
    assert!(anti.average.execution_time >= Duration::from_millis(2));
}
