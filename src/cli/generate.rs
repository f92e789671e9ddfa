//! `generate` subcommand.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::GenerateConfig;
use crate::error::BenchResult;
use crate::generator::{self, BatchStats};
use crate::store::{event_indexes, DocumentStore, MongoStore};

pub async fn execute(config: GenerateConfig) -> BenchResult<()> {
    config.validate()?;

    let store = MongoStore::connect(&config.store).await?;
    println!(
        "{} Connected to MongoDB: {}/{}",
        "✓".green(),
        config.store.uri,
        config.store.database
    );

    let stats = generate_with_store(&config, &store, shutdown_signal()).await;
    tracing::info!(
        attempted = stats.attempted,
        failed = stats.failed,
        "Event generator finished"
    );

    store.shutdown().await;
    Ok(())
}

/// Index setup plus either a bulk load or the periodic loop
pub async fn generate_with_store<S>(
    config: &GenerateConfig,
    store: &dyn DocumentStore,
    shutdown: S,
) -> BatchStats
where
    S: std::future::Future<Output = ()>,
{
    if config.create_indexes {
        match store.create_indexes(event_indexes()).await {
            Ok(names) => tracing::info!("Event indexes ready: {}", names.join(", ")),
            Err(e) => tracing::warn!("Failed to create indexes: {}", e),
        }
    }

    let mut rng = StdRng::from_entropy();

    match config.bulk {
        Some(_) => {
            let total = config.bulk_size();
            let pb = progress_bar(total as u64);
            let stats = generator::run_bulk(store, &mut rng, total, config.concurrency, |chunk| {
                pb.inc(chunk.attempted as u64)
            })
            .await;
            pb.finish_and_clear();
            println!(
                "{} {} events inserted ({} failed)",
                "✓".green(),
                stats.inserted(),
                stats.failed
            );
            stats
        }
        None => {
            let schedule = config.schedule();
            match schedule.duration {
                Some(duration) => println!(
                    "Event generator will run for {} minutes",
                    duration.as_secs() / 60
                ),
                None => println!("Event generator will run until interrupted"),
            }
            println!("Press Ctrl+C to stop");

            generator::run_periodic(store, &mut rng, schedule, config.concurrency, shutdown).await
        }
    }
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => tracing::debug!("Invalid progress template: {}", e),
    }
    pb
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
