//! Paired anti-pattern / optimized measurements.
//!
//! Each pair goes through `Setup -> WarmUp -> MeasureAntiPattern xR ->
//! MeasureOptimized xR -> Report`. Setup and warm-up only apply to pairs that
//! declare a supporting index. A failed repetition is logged and left out of
//! the totals; averages still divide by the configured repetition count.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bson::doc;
use colored::Colorize;

use super::catalogue::{CatalogueQuery, QueryContext, QueryOutcome, RunnableQuery};
use super::profiler::{format_duration, profile, ProfileResult};
use super::queries::SORT_INDEX_NAME;
use crate::error::{BenchError, BenchResult};
use crate::store::IndexSpec;

pub const DEFAULT_REPETITIONS: u32 = 3;

/// Anti-pattern baselines at or below this many bytes report no memory change
pub const MEMORY_BASELINE_FLOOR: u64 = 1024;

/// Two functionally equivalent queries, one exposing a known pitfall
#[derive(Clone)]
pub struct OptimizationPair {
    /// Stable identifier usable with `run --test`
    pub id: String,
    pub anti_pattern_name: String,
    pub optimized_name: String,
    pub anti_pattern: Arc<dyn RunnableQuery>,
    pub optimized: Arc<dyn RunnableQuery>,
    pub description: String,
    /// Index created before measuring, outside the timed section
    pub index: Option<IndexSpec>,
    /// Run both variants once before measuring
    pub warm_up: bool,
}

impl OptimizationPair {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        anti_pattern: (impl Into<String>, Arc<dyn RunnableQuery>),
        optimized: (impl Into<String>, Arc<dyn RunnableQuery>),
    ) -> Self {
        Self {
            id: id.into(),
            anti_pattern_name: anti_pattern.0.into(),
            optimized_name: optimized.0.into(),
            anti_pattern: anti_pattern.1,
            optimized: optimized.1,
            description: description.into(),
            index: None,
            warm_up: false,
        }
    }

    /// Require `index` before measuring; also enables the warm-up pass
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.index = Some(index);
        self.warm_up = true;
        self
    }

    /// Both variants are configured to run the same query
    pub fn is_degenerate(&self) -> bool {
        self.anti_pattern_name == self.optimized_name
            || Arc::ptr_eq(&self.anti_pattern, &self.optimized)
    }
}

impl fmt::Debug for OptimizationPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationPair")
            .field("id", &self.id)
            .field("anti_pattern_name", &self.anti_pattern_name)
            .field("optimized_name", &self.optimized_name)
            .field("index", &self.index)
            .field("warm_up", &self.warm_up)
            .finish()
    }
}

/// The three comparisons shipped with the tool
pub fn optimization_pairs() -> Vec<OptimizationPair> {
    vec![
        OptimizationPair::new(
            "ProjectionComparison",
            "Only retrieve needed fields with projection to reduce network transfer and memory usage",
            (
                "Anti-pattern 1 - Full Document Retrieval",
                Arc::new(CatalogueQuery::FindAllFieldsAntiPattern),
            ),
            (
                "Optimization 1 - Using Projection",
                Arc::new(CatalogueQuery::FindWithProjectionOptimized),
            ),
        ),
        OptimizationPair::new(
            "FilterBeforeAggregateComparison",
            "Filter data before aggregation to reduce the number of documents to process",
            (
                "Anti-pattern 2 - Aggregate Without Filtering",
                Arc::new(CatalogueQuery::AggregateBeforeFilterAntiPattern),
            ),
            (
                "Optimization 2 - Filter Before Aggregation",
                Arc::new(CatalogueQuery::FilterBeforeAggregateOptimized),
            ),
        ),
        OptimizationPair::new(
            "IndexedSortComparison",
            "Create indexes for sorting fields to speed up sorting operations",
            (
                "Anti-pattern 3 - Sorting Without Index",
                Arc::new(CatalogueQuery::SortWithoutIndexAntiPattern),
            ),
            (
                "Optimization 3 - Using Index for Sorting",
                Arc::new(CatalogueQuery::SortWithIndexOptimized),
            ),
        )
        .with_index(IndexSpec::new(
            SORT_INDEX_NAME,
            doc! { "sourceSystem": 1, "status": 1 },
        )),
    ]
}

/// `(anti - opt) / anti * 100`, or 0 when the anti-pattern took no time
pub fn time_improvement_pct(anti_pattern: Duration, optimized: Duration) -> f64 {
    if anti_pattern.is_zero() {
        return 0.0;
    }
    let anti = anti_pattern.as_nanos() as f64;
    let opt = optimized.as_nanos() as f64;
    (anti - opt) / anti * 100.0
}

/// `(anti - opt) / anti * 100`, or 0 when the anti-pattern baseline is too
/// small to give a stable percentage
pub fn memory_improvement_pct(anti_pattern: u64, optimized: u64) -> f64 {
    if anti_pattern <= MEMORY_BASELINE_FLOOR {
        return 0.0;
    }
    let anti = anti_pattern as f64;
    (anti - optimized as f64) / anti * 100.0
}

/// Running totals for one variant of a pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementTotals {
    pub total_time: Duration,
    pub total_memory: u64,
    pub succeeded: u32,
    pub failed: u32,
    /// Result size reported by the last successful repetition
    pub documents: Option<usize>,
}

impl MeasurementTotals {
    pub fn record(&mut self, result: &ProfileResult, outcome: &QueryOutcome) {
        self.total_time += result.execution_time;
        self.total_memory = self.total_memory.saturating_add(result.memory_usage);
        self.succeeded += 1;
        self.documents = Some(outcome.documents);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Averages over the configured repetition count, not the successful
    /// repetitions, so failures pull the average down.
    pub fn average(&self, name: impl Into<String>, repetitions: u32) -> ProfileResult {
        let repetitions = repetitions.max(1);
        ProfileResult::new(
            name,
            self.total_time / repetitions,
            self.total_memory / repetitions as u64,
        )
    }
}

/// Averaged measurements for one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSummary {
    pub average: ProfileResult,
    pub succeeded: u32,
    pub failed: u32,
    pub documents: Option<usize>,
}

impl VariantSummary {
    fn from_totals(name: &str, totals: &MeasurementTotals, repetitions: u32) -> Self {
        Self {
            average: totals.average(name, repetitions),
            succeeded: totals.succeeded,
            failed: totals.failed,
            documents: totals.documents,
        }
    }
}

/// Result of preparing a pair's supporting index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSetup {
    Created(Vec<String>),
    Failed(String),
}

/// Everything printed for one pair
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub pair_id: String,
    pub description: String,
    pub repetitions: u32,
    pub anti_pattern: VariantSummary,
    pub optimized: VariantSummary,
    pub time_improvement_pct: f64,
    pub memory_improvement_pct: f64,
    pub degenerate: bool,
    pub index_setup: Option<IndexSetup>,
}

impl ComparisonReport {
    /// Signed `anti - optimized` average time, in nanoseconds
    pub fn time_difference_nanos(&self) -> i128 {
        self.anti_pattern.average.execution_time.as_nanos() as i128
            - self.optimized.average.execution_time.as_nanos() as i128
    }

    /// Signed `anti - optimized` average memory, in bytes
    pub fn memory_difference(&self) -> i128 {
        self.anti_pattern.average.memory_usage as i128
            - self.optimized.average.memory_usage as i128
    }

    pub fn print(&self) {
        if self.degenerate {
            println!(
                "Note: both variants run the same query, the performance difference should be close to zero"
            );
        }

        println!("{}", "-".repeat(60));
        println!("{}", "Performance Comparison:".bold());
        println!(
            "Execution Time: {} improvement (Anti-pattern: {}, Optimized: {}, Difference: {})",
            colorize_pct(self.time_improvement_pct),
            format_duration(self.anti_pattern.average.execution_time),
            format_duration(self.optimized.average.execution_time),
            format_signed_duration(self.time_difference_nanos()),
        );
        println!(
            "Memory Usage: {} improvement (Anti-pattern: {:.2} MB, Optimized: {:.2} MB, Difference: {:.2} MB)",
            colorize_pct(self.memory_improvement_pct),
            self.anti_pattern.average.memory_megabytes(),
            self.optimized.average.memory_megabytes(),
            self.memory_difference() as f64 / (1024.0 * 1024.0),
        );

        for (label, summary) in [("Anti-pattern", &self.anti_pattern), ("Optimized", &self.optimized)] {
            if summary.failed > 0 {
                println!(
                    "{} {}: {} of {} repetitions failed; the average still divides by {}",
                    "!".yellow(),
                    label,
                    summary.failed,
                    self.repetitions,
                    self.repetitions
                );
            }
        }

        println!("{}", "=".repeat(60));
    }
}

fn colorize_pct(pct: f64) -> String {
    let text = format!("{:.2}%", pct);
    if pct > 0.0 {
        text.green().to_string()
    } else if pct < 0.0 {
        text.red().to_string()
    } else {
        text
    }
}

fn format_signed_duration(nanos: i128) -> String {
    let magnitude = Duration::from_nanos(nanos.unsigned_abs().min(u64::MAX as u128) as u64);
    if nanos < 0 {
        format!("-{}", format_duration(magnitude))
    } else {
        format_duration(magnitude)
    }
}

/// Drives optimization pairs against one query context
pub struct ComparisonRunner<'a> {
    ctx: &'a QueryContext,
    repetitions: u32,
}

impl<'a> ComparisonRunner<'a> {
    pub fn new(ctx: &'a QueryContext, repetitions: u32) -> Self {
        Self {
            ctx,
            repetitions: repetitions.max(1),
        }
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    /// Run every pair in order.
    ///
    /// Only an unreachable store is fatal; measurement errors end up in the
    /// reports.
    pub async fn run(&self, pairs: &[OptimizationPair]) -> BenchResult<Vec<ComparisonReport>> {
        self.ctx.store().ping().await.map_err(|e| {
            BenchError::Connection(format!(
                "{} is not reachable: {}",
                self.ctx.store().describe(),
                e
            ))
        })?;

        println!(
            "\n{}",
            "=================== Query Optimization Comparison ===================".bold()
        );

        let mut reports = Vec::with_capacity(pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            reports.push(self.run_pair(i + 1, pair).await);
        }

        Ok(reports)
    }

    /// Run a single pair through setup, warm-up, measurement and report
    pub async fn run_pair(&self, group: usize, pair: &OptimizationPair) -> ComparisonReport {
        println!("\nOptimization Group {}: {}", group, pair.description);
        println!("{}", "-".repeat(60));

        let index_setup = match &pair.index {
            Some(spec) => Some(self.setup_index(pair, spec).await),
            None => None,
        };

        if pair.warm_up {
            self.warm_up(pair).await;
        }

        println!(
            "\nExecuting anti-pattern: {} (repeated {} times for average)",
            pair.anti_pattern_name, self.repetitions
        );
        let anti_totals = self
            .measure(pair, &pair.anti_pattern_name, &pair.anti_pattern, "anti-pattern")
            .await;

        println!(
            "\nExecuting optimized solution: {} (repeated {} times for average)",
            pair.optimized_name, self.repetitions
        );
        let optimized_totals = self
            .measure(pair, &pair.optimized_name, &pair.optimized, "optimized")
            .await;

        let anti_pattern =
            VariantSummary::from_totals(&pair.anti_pattern_name, &anti_totals, self.repetitions);
        let optimized =
            VariantSummary::from_totals(&pair.optimized_name, &optimized_totals, self.repetitions);

        let report = ComparisonReport {
            pair_id: pair.id.clone(),
            description: pair.description.clone(),
            repetitions: self.repetitions,
            time_improvement_pct: time_improvement_pct(
                anti_pattern.average.execution_time,
                optimized.average.execution_time,
            ),
            memory_improvement_pct: memory_improvement_pct(
                anti_pattern.average.memory_usage,
                optimized.average.memory_usage,
            ),
            anti_pattern,
            optimized,
            degenerate: pair.is_degenerate(),
            index_setup,
        };

        report.print();
        report
    }

    async fn setup_index(&self, pair: &OptimizationPair, spec: &IndexSpec) -> IndexSetup {
        println!(
            "Pre-creating index for fair comparison (this operation time is not included in performance measurement)..."
        );

        match self.ctx.store().create_indexes(vec![spec.clone()]).await {
            Ok(names) => {
                tracing::debug!(pair = %pair.id, "Created indexes {:?}", names);
                println!("Index created successfully, continuing with performance comparison...");
                IndexSetup::Created(names)
            }
            Err(e) => {
                tracing::warn!(pair = %pair.id, phase = "setup", "Failed to create index {}: {}", spec.name, e);
                println!(
                    "{} Failed to create index: {}, continuing test but results may not be accurate",
                    "Note:".yellow(),
                    e
                );
                IndexSetup::Failed(e.to_string())
            }
        }
    }

    async fn warm_up(&self, pair: &OptimizationPair) {
        println!("Running warm-up queries to reduce cache effects...");
        if let Err(e) = pair.anti_pattern.execute(self.ctx).await {
            tracing::debug!(pair = %pair.id, phase = "warm-up", "Anti-pattern warm-up failed: {}", e);
        }
        if let Err(e) = pair.optimized.execute(self.ctx).await {
            tracing::debug!(pair = %pair.id, phase = "warm-up", "Optimized warm-up failed: {}", e);
        }
        println!("Warm-up complete, starting formal testing...");
    }

    async fn measure(
        &self,
        pair: &OptimizationPair,
        name: &str,
        query: &Arc<dyn RunnableQuery>,
        phase: &str,
    ) -> MeasurementTotals {
        let mut totals = MeasurementTotals::default();

        for run in 1..=self.repetitions {
            let label = format!("{} (run {}/{})", name, run, self.repetitions);
            let (result, outcome) = profile(label, || query.execute(self.ctx)).await;

            match outcome {
                Ok(outcome) => totals.record(&result, &outcome),
                Err(e) => {
                    if e.is_connection() {
                        tracing::error!(pair = %pair.id, phase, run, "{} lost the store: {}", name, e);
                    } else {
                        tracing::warn!(pair = %pair.id, phase, run, "{} execution failed: {}", name, e);
                    }
                    println!("{} {} test execution failed: {}", "✗".red(), phase, e);
                    totals.record_failure();
                }
            }
        }

        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_improvement() {
        let pct = time_improvement_pct(Duration::from_millis(200), Duration::from_millis(50));
        assert!((pct - 75.0).abs() < 1e-9);

        let pct = time_improvement_pct(Duration::from_millis(100), Duration::from_millis(150));
        assert!((pct + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_time_improvement_zero_baseline() {
        assert_eq!(time_improvement_pct(Duration::ZERO, Duration::ZERO), 0.0);
        assert_eq!(
            time_improvement_pct(Duration::ZERO, Duration::from_secs(3)),
            0.0
        );
        assert!(!time_improvement_pct(Duration::ZERO, Duration::ZERO).is_nan());
    }

    #[test]
    fn test_memory_improvement_floor() {
        assert_eq!(memory_improvement_pct(0, 0), 0.0);
        assert_eq!(memory_improvement_pct(1024, 0), 0.0);
        assert_eq!(memory_improvement_pct(1024, 1_000_000), 0.0);
        assert_eq!(memory_improvement_pct(500, 10), 0.0);

        let pct = memory_improvement_pct(4096, 1024);
        assert!((pct - 75.0).abs() < 1e-9);

        let pct = memory_improvement_pct(2048, 4096);
        assert!((pct + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_divides_by_configured_repetitions() {
        let mut totals = MeasurementTotals::default();
        let outcome = QueryOutcome::new(4);
        totals.record(
            &ProfileResult::new("x", Duration::from_millis(30), 3000),
            &outcome,
        );
        totals.record_failure();
        totals.record_failure();

        let avg = totals.average("x", 3);
        assert_eq!(avg.execution_time, Duration::from_millis(10));
        assert_eq!(avg.memory_usage, 1000);
        assert_eq!(totals.succeeded, 1);
        assert_eq!(totals.failed, 2);
        assert_eq!(totals.documents, Some(4));
    }

    #[test]
    fn test_average_with_no_successes_is_zero() {
        let mut totals = MeasurementTotals::default();
        totals.record_failure();
        let avg = totals.average("x", 1);
        assert_eq!(avg.execution_time, Duration::ZERO);
        assert_eq!(avg.memory_usage, 0);
    }

    #[test]
    fn test_standard_pairs() {
        let pairs = optimization_pairs();
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].index.is_none() && !pairs[0].warm_up);
        assert!(pairs[1].index.is_none() && !pairs[1].warm_up);
        let index = pairs[2].index.as_ref().unwrap();
        assert_eq!(index.name, SORT_INDEX_NAME);
        assert!(pairs[2].warm_up);
        assert!(pairs.iter().all(|p| !p.is_degenerate()));
    }

    #[test]
    fn test_shared_query_under_two_labels_is_degenerate() {
        let query: Arc<dyn RunnableQuery> = Arc::new(CatalogueQuery::FindRecentEvents);
        let pair = OptimizationPair::new(
            "Relabelled",
            "Same query, different labels",
            ("Recent events", query.clone()),
            ("Recent events again", query),
        );
        assert!(pair.is_degenerate());
    }

    #[test]
    fn test_format_signed_duration() {
        assert_eq!(format_signed_duration(-2_000_000), "-2.00ms");
        assert_eq!(format_signed_duration(1_500), "1.50µs");
    }
}
