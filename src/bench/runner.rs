//! Profiles individual catalogue entries one after another.

use colored::Colorize;

use super::catalogue::{QueryContext, QueryTest};
use super::profiler::{profile, ProfileResult};

/// A test whose single execution returned an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    pub name: String,
    pub error: String,
}

/// Outcome of profiling a list of tests
#[derive(Debug, Clone, Default)]
pub struct TestRunSummary {
    /// Successful runs, in execution order
    pub results: Vec<ProfileResult>,
    pub failures: Vec<TestFailure>,
}

impl TestRunSummary {
    pub fn executed(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn print(&self) {
        println!("\n{}", "Test Results Summary:".bold());
        println!("{}", "=".repeat(50));
        for result in &self.results {
            println!("{}", result);
            println!("{}", "-".repeat(30));
        }

        if !self.failures.is_empty() {
            println!(
                "{} {} of {} tests failed:",
                "✗".red(),
                self.failures.len(),
                self.executed()
            );
            for failure in &self.failures {
                println!("  {} - {}", failure.name, failure.error);
            }
        }
    }
}

/// Profile each test exactly once, sequentially.
///
/// Failed tests are logged and recorded but never stop the remaining ones.
pub async fn run_query_tests(ctx: &QueryContext, tests: &[QueryTest]) -> TestRunSummary {
    let mut summary = TestRunSummary::default();

    for test in tests {
        println!("\nRunning test: {}", test.name.cyan());
        println!("{}", "-".repeat(40));

        let (result, outcome) = profile(test.name.clone(), || test.query.execute(ctx)).await;

        match outcome {
            Ok(outcome) => {
                tracing::debug!(test = %test.name, documents = outcome.documents, "Test completed");
                println!("{}", "-".repeat(40));
                summary.results.push(result);
            }
            Err(e) => {
                if e.is_connection() {
                    tracing::error!(test = %test.name, phase = "query", "Store unreachable: {}", e);
                } else {
                    tracing::warn!(test = %test.name, phase = "query", "Test failed: {}", e);
                }
                summary.failures.push(TestFailure {
                    name: test.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::bench::catalogue::{QueryOutcome, RunnableQuery};
    use crate::error::{BenchError, BenchResult};
    use crate::store::MemoryStore;

    struct Fixed(usize);

    #[async_trait]
    impl RunnableQuery for Fixed {
        async fn execute(&self, _ctx: &QueryContext) -> BenchResult<QueryOutcome> {
            Ok(QueryOutcome::new(self.0))
        }
    }

    struct Broken;

    #[async_trait]
    impl RunnableQuery for Broken {
        async fn execute(&self, _ctx: &QueryContext) -> BenchResult<QueryOutcome> {
            Err(BenchError::InvalidQuery("unsupported operator $foo".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_run() {
        let ctx = QueryContext::new(Arc::new(MemoryStore::new()));
        let tests = vec![
            QueryTest::new("first", Arc::new(Fixed(1))),
            QueryTest::new("broken", Arc::new(Broken)),
            QueryTest::new("last", Arc::new(Fixed(2))),
        ];

        let summary = run_query_tests(&ctx, &tests).await;

        assert_eq!(summary.executed(), 3);
        let names: Vec<_> = summary.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "last"]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].name, "broken");
        assert!(summary.failures[0].error.contains("$foo"));
    }
}
