//! Synthetic event generation and insertion.

use std::future::Future;
use std::time::Duration;

use bson::oid::ObjectId;
use bson::{doc, DateTime, Document};
use chrono::Utc;
use colored::Colorize;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{BenchError, BenchResult};
use crate::models::event::{
    COMPONENTS, DESCRIPTIONS, EVENT_TYPES, SERVER_IPS, SOURCE_SYSTEMS, STATUSES,
    STATUS_IN_PROGRESS, STATUS_RESOLVED, TEAMS,
};
use crate::models::{Event, Severity, SeverityLevel};
use crate::store::DocumentStore;

/// Upper bound (inclusive) of events produced per periodic tick
pub const MAX_EVENTS_PER_TICK: usize = 3;

/// Default size of a one-shot bulk load
pub const DEFAULT_BULK_EVENTS: usize = 40_000;

const API_STATUS_CODES: [i32; 4] = [408, 500, 502, 503];

fn pick<R: Rng + ?Sized>(rng: &mut R, pool: &[&'static str]) -> &'static str {
    pool[rng.gen_range(0..pool.len())]
}

fn now() -> DateTime {
    DateTime::from_millis(Utc::now().timestamp_millis())
}

/// Build one random event stamped with the current time.
pub fn generate_event<R: Rng + ?Sized>(rng: &mut R) -> Event {
    let timestamp = now();
    let event_type = pick(rng, EVENT_TYPES);
    let level = SeverityLevel::ALL[rng.gen_range(0..SeverityLevel::ALL.len())];
    let status = pick(rng, STATUSES);

    let component_count = rng.gen_range(1..=3);
    let affected_components = COMPONENTS
        .choose_multiple(rng, component_count)
        .map(|c| c.to_string())
        .collect();

    let tag = event_type.split(' ').next().unwrap_or(event_type);

    let mut event = Event {
        id: None,
        timestamp,
        event_type: event_type.to_string(),
        description: pick(rng, DESCRIPTIONS).to_string(),
        severity: Severity::from(level),
        source_system: pick(rng, SOURCE_SYSTEMS).to_string(),
        source_ip: Some(pick(rng, SERVER_IPS).to_string()),
        affected_components,
        recommendation: format!(
            "Recommended action for {} issue",
            level.label().to_lowercase()
        ),
        status: status.to_string(),
        assigned_to: None,
        resolved_at: None,
        resolution_notes: None,
        tags: vec![tag.to_string(), "Automated".to_string()],
        metadata: event_metadata(rng, event_type, level),
    };

    if status == STATUS_RESOLVED {
        let hours_back = rng.gen_range(1..=24i64);
        event.resolved_at = Some(DateTime::from_millis(
            timestamp.timestamp_millis() - hours_back * 3_600_000,
        ));
        event.resolution_notes = Some(format!(
            "Issue resolved by applying standard procedure #{}",
            rng.gen_range(1..=100)
        ));
        event.assigned_to = Some(pick(rng, TEAMS).to_string());
    } else if status == STATUS_IN_PROGRESS {
        event.assigned_to = Some(pick(rng, TEAMS).to_string());
    }

    event
}

/// Metadata keyed by the kind of incident
fn event_metadata<R: Rng + ?Sized>(rng: &mut R, event_type: &str, level: SeverityLevel) -> Document {
    let mut metadata = doc! { "eventId": ObjectId::new().to_hex() };

    if level >= SeverityLevel::High {
        metadata.insert("priorityFollow", true);
    }

    if event_type.contains("System") {
        metadata.insert("cpuUsage", 50.0 + rng.gen::<f64>() * 50.0);
        metadata.insert("memoryUsage", 40.0 + rng.gen::<f64>() * 50.0);
    } else if event_type.contains("Security") {
        metadata.insert("attemptCount", rng.gen_range(5..25i32));
        metadata.insert("ipBlocked", rng.gen_bool(0.5));
    } else if event_type.contains("Database") {
        metadata.insert("queryTime", rng.gen_range(100..10_000i32));
        metadata.insert("connectionCount", rng.gen_range(10..100i32));
    } else if event_type.contains("API") {
        metadata.insert(
            "statusCode",
            API_STATUS_CODES[rng.gen_range(0..API_STATUS_CODES.len())],
        );
        metadata.insert("responseTime", rng.gen_range(1000..10_000i32));
    }

    metadata
}

pub fn generate_events<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Event> {
    (0..count).map(|_| generate_event(rng)).collect()
}

/// Counts for one inserted batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub attempted: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn inserted(&self) -> usize {
        self.attempted - self.failed
    }

    fn absorb(&mut self, other: BatchStats) {
        self.attempted += other.attempted;
        self.failed += other.failed;
    }
}

/// Insert `events` with at most `concurrency` inserts in flight and wait for
/// all of them. Failures are logged and counted, never retried.
pub async fn insert_batch(
    store: &dyn DocumentStore,
    events: Vec<Event>,
    concurrency: usize,
) -> BatchStats {
    let attempted = events.len();

    let results: Vec<BenchResult<bson::Bson>> = stream::iter(events)
        .map(|event| async move {
            let document = event.to_document()?;
            let id = store.insert_one(document).await?;
            tracing::info!(
                "Event inserted, ID: {}, type: {}, severity: {} ({}), status: {}",
                id,
                event.event_type,
                event.severity.label,
                event.severity.level,
                event.status
            );
            Ok::<_, BenchError>(id)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut failed = 0;
    for result in results {
        if let Err(e) = result {
            tracing::error!("Failed to insert event: {}", e);
            failed += 1;
        }
    }

    BatchStats { attempted, failed }
}

/// One periodic tick: 0 to 3 random events, inserted concurrently.
pub async fn generate_tick<R: Rng + ?Sized>(
    store: &dyn DocumentStore,
    rng: &mut R,
    concurrency: usize,
) -> BatchStats {
    let count = rng.gen_range(0..=MAX_EVENTS_PER_TICK);
    if count == 0 {
        println!("No events generated in this interval");
        return BatchStats::default();
    }

    println!("Generating {} events...", count);
    let events = generate_events(rng, count);
    for e in &events {
        println!(
            "  Event generated: Type={}, Severity={}, Resolved={}",
            e.event_type,
            e.severity.level,
            e.is_resolved()
        );
    }

    let stats = insert_batch(store, events, concurrency).await;
    if stats.failed == 0 {
        println!("{} All events successfully inserted", "✓".green());
    } else {
        println!(
            "{} {} of {} inserts failed",
            "✗".red(),
            stats.failed,
            stats.attempted
        );
    }
    stats
}

/// Timing of the periodic generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Stop after this long; `None` runs until shutdown
    pub duration: Option<Duration>,
}

/// Generate on every interval tick, starting immediately, until the schedule
/// ends or `shutdown` resolves. Returns the accumulated insert counts.
pub async fn run_periodic<R, S>(
    store: &dyn DocumentStore,
    rng: &mut R,
    schedule: Schedule,
    concurrency: usize,
    shutdown: S,
) -> BatchStats
where
    R: Rng + ?Sized,
    S: Future<Output = ()>,
{
    let mut totals = BatchStats::default();
    let mut ticker = tokio::time::interval(schedule.interval);
    let deadline = schedule
        .duration
        .and_then(|d| tokio::time::Instant::now().checked_add(d));

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping event generator");
                break;
            }
            _ = sleep_until_deadline(deadline) => {
                println!("Duration completed, stopping event generator");
                break;
            }
            _ = ticker.tick() => {
                let stats = generate_tick(store, rng, concurrency).await;
                totals.absorb(stats);
            }
        }
    }

    totals
}

async fn sleep_until_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Events generated and inserted per bulk chunk
pub const BULK_CHUNK_SIZE: usize = 1000;

/// Insert `count` random events, chunk by chunk. `on_chunk` sees the counts
/// of every finished chunk.
pub async fn run_bulk<R, F>(
    store: &dyn DocumentStore,
    rng: &mut R,
    count: usize,
    concurrency: usize,
    mut on_chunk: F,
) -> BatchStats
where
    R: Rng + ?Sized,
    F: FnMut(&BatchStats),
{
    tracing::info!("Concurrently generating {} events...", count);

    let mut totals = BatchStats::default();
    let mut remaining = count;
    while remaining > 0 {
        let size = remaining.min(BULK_CHUNK_SIZE);
        let events = generate_events(rng, size);
        let stats = insert_batch(store, events, concurrency).await;
        on_chunk(&stats);
        totals.absorb(stats);
        remaining -= size;
    }

    tracing::info!(
        "{} events inserted, {} failed",
        totals.inserted(),
        totals.failed
    );
    totals
}
