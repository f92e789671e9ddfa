//! `run` subcommand.

use std::sync::Arc;

use colored::Colorize;

use super::config::RunConfig;
use crate::bench::{
    run_query_tests, Catalogue, ComparisonReport, ComparisonRunner, QueryContext, Selection,
    TestRunSummary,
};
use crate::error::{BenchError, BenchResult};
use crate::store::{DocumentStore, MongoStore};

/// Everything one `run` produced
#[derive(Debug, Default)]
pub struct RunReport {
    pub tests: TestRunSummary,
    pub comparisons: Vec<ComparisonReport>,
}

pub fn list(catalogue: &Catalogue) {
    println!("{}", "Query tests:".bold());
    for test in catalogue.tests() {
        println!("  {}", test.name);
    }
    println!("{}", "Optimization comparisons:".bold());
    for pair in catalogue.pairs() {
        println!("  {} - {}", pair.id, pair.description);
    }
}

/// Resolve the requested names against `catalogue`.
///
/// Runs before any connection is made so a typo never touches the store.
pub fn plan(catalogue: &Catalogue, config: &RunConfig) -> BenchResult<Selection> {
    config.validate()?;

    let mut selection = catalogue.select(&config.tests)?;
    if config.skip_comparison && config.tests.is_empty() {
        selection.pairs.clear();
    }
    Ok(selection)
}

pub async fn execute(config: RunConfig) -> BenchResult<()> {
    let catalogue = Catalogue::standard();
    let selection = plan(&catalogue, &config)?;

    let store = Arc::new(MongoStore::connect(&config.store).await?);
    println!(
        "{} Connected to MongoDB: {}/{}",
        "✓".green(),
        config.store.uri,
        config.store.database
    );

    let result = run_with_store(&config, &selection, store.clone()).await;

    if let Ok(store) = Arc::try_unwrap(store) {
        store.shutdown().await;
    }

    let report = result?;
    if !report.tests.failures.is_empty() {
        tracing::warn!(
            "{} of {} query tests failed",
            report.tests.failures.len(),
            report.tests.executed()
        );
    }
    Ok(())
}

/// Profile the selected tests, then run the selected comparison pairs.
pub async fn run_with_store(
    config: &RunConfig,
    selection: &Selection,
    store: Arc<dyn DocumentStore>,
) -> BenchResult<RunReport> {
    if selection.is_empty() {
        return Err(BenchError::InvalidConfig("nothing selected to run".to_string()));
    }

    let ctx = QueryContext::new(store).with_deadline(config.timeout);
    let mut report = RunReport::default();

    if !selection.tests.is_empty() {
        println!("\n{}", "Running query benchmark tests...".bold());
        println!("{}", "=".repeat(50));

        report.tests = run_query_tests(&ctx, &selection.tests).await;
        report.tests.print();
    }

    if !selection.pairs.is_empty() {
        let runner = ComparisonRunner::new(&ctx, config.repetitions);
        report.comparisons = runner.run(&selection.pairs).await?;
    }

    Ok(report)
}
