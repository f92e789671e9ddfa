//! Command-line surface: `generate` and `run`.

pub mod config;
pub mod generate;
pub mod run;

use std::time::Duration;

use clap::{Parser, Subcommand};

use self::config::{
    GenerateConfig, RunConfig, StoreArgs, StoreConfig, DEFAULT_CONCURRENCY, DEFAULT_INTERVAL_SECS,
};
use crate::bench::{Catalogue, DEFAULT_REPETITIONS};
use crate::error::BenchResult;

#[derive(Parser, Debug)]
#[command(name = "mongo-bench")]
#[command(about = "Generate synthetic events and benchmark MongoDB query patterns", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert random events, periodically or in one bulk load
    Generate {
        #[command(flatten)]
        store: StoreArgs,

        /// Minutes to run; 0 runs until interrupted
        #[arg(long, default_value_t = 0)]
        duration: u64,

        /// Maximum concurrent inserts
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Seconds between generation ticks
        #[arg(long, default_value_t = DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Insert this many events once and exit
        #[arg(long)]
        bulk: Option<usize>,

        /// Do not create the event indexes first
        #[arg(long)]
        skip_indexes: bool,
    },

    /// Profile catalogue queries and optimization comparisons
    Run {
        #[command(flatten)]
        store: StoreArgs,

        /// Test or comparison to run (repeatable); all when omitted
        #[arg(long = "test")]
        tests: Vec<String>,

        /// Repetitions per comparison variant
        #[arg(long, default_value_t = DEFAULT_REPETITIONS)]
        repetitions: u32,

        /// Skip the optimization comparisons when running everything
        #[arg(long)]
        skip_comparison: bool,

        /// Per-operation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the registered test names and exit
        #[arg(long)]
        list: bool,
    },
}

pub async fn execute(cli: Cli) -> BenchResult<()> {
    match cli.command {
        Command::Generate {
            store,
            duration,
            concurrency,
            interval,
            bulk,
            skip_indexes,
        } => {
            let config = GenerateConfig {
                store: StoreConfig::resolve(&store)?,
                duration_minutes: duration,
                concurrency,
                interval_secs: interval,
                bulk,
                create_indexes: !skip_indexes,
            };
            tracing::debug!("{:?}", config);
            generate::execute(config).await
        }
        Command::Run {
            store,
            tests,
            repetitions,
            skip_comparison,
            timeout,
            list,
        } => {
            if list {
                run::list(&Catalogue::standard());
                return Ok(());
            }

            let mut config = RunConfig::new(StoreConfig::resolve(&store)?);
            config.tests = tests;
            config.repetitions = repetitions;
            config.skip_comparison = skip_comparison;
            config.timeout = timeout.map(Duration::from_secs);
            tracing::debug!("{:?}", config);
            run::execute(config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "mongo-bench",
            "run",
            "--test",
            "FindRecentEvents",
            "--test",
            "IndexedSortComparison",
            "--repetitions",
            "5",
            "--database",
            "bench",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                store,
                tests,
                repetitions,
                ..
            } => {
                assert_eq!(tests, vec!["FindRecentEvents", "IndexedSortComparison"]);
                assert_eq!(repetitions, 5);
                assert_eq!(store.database.as_deref(), Some("bench"));
                assert!(store.uri.is_none());
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["mongo-bench", "generate"]).unwrap();
        match cli.command {
            Command::Generate {
                duration,
                concurrency,
                interval,
                bulk,
                skip_indexes,
                ..
            } => {
                assert_eq!(duration, 0);
                assert_eq!(concurrency, 5);
                assert_eq!(interval, 60);
                assert_eq!(bulk, None);
                assert!(!skip_indexes);
            }
            other => panic!("expected generate, got {:?}", other),
        }
    }
}
