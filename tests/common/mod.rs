//! Common test utilities
//!
//! Seeds in-memory event stores with a known shape so query counts are
//! predictable.

#![allow(dead_code)]

use std::sync::Arc;

use bson::DateTime;
use chrono::Utc;
use mongo_bench::bench::QueryContext;
use mongo_bench::generator::generate_event;
use mongo_bench::models::Event;
use mongo_bench::{DocumentStore, MemoryStore, Severity, SeverityLevel};
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const SEEDED_EVENTS: usize = 100;
pub const RECENT_HIGH_SEVERITY: usize = 10;

pub fn minutes_ago(minutes: i64) -> DateTime {
    DateTime::from_millis(Utc::now().timestamp_millis() - minutes * 60_000)
}

pub fn event_with(rng: &mut StdRng, level: SeverityLevel, timestamp: DateTime) -> Event {
    let mut event = generate_event(rng);
    event.severity = Severity::from(level);
    event.timestamp = timestamp;
    event
}

/// 100 events of which exactly 10 have `severity.level >= 3` and a timestamp
/// within the last 24 hours.
///
/// The other 90 are either low severity and recent, or high severity and
/// three days old.
pub fn seeded_events() -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(42);
    let low = [
        SeverityLevel::Information,
        SeverityLevel::Low,
        SeverityLevel::Medium,
    ];

    (0..SEEDED_EVENTS)
        .map(|i| {
            if i < RECENT_HIGH_SEVERITY {
                let level = if i % 2 == 0 {
                    SeverityLevel::High
                } else {
                    SeverityLevel::Critical
                };
                event_with(&mut rng, level, minutes_ago(i as i64 + 1))
            } else if i % 3 == 0 {
                event_with(&mut rng, SeverityLevel::Critical, minutes_ago(72 * 60))
            } else {
                event_with(&mut rng, low[(i / 3) % low.len()], minutes_ago(i as i64 * 5))
            }
        })
        .collect()
}

pub async fn insert_all(store: &dyn DocumentStore, events: &[Event]) {
    for event in events {
        store
            .insert_one(event.to_document().expect("event serializes"))
            .await
            .expect("insert succeeds");
    }
}

pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    insert_all(store.as_ref(), &seeded_events()).await;
    store
}

pub fn context(store: Arc<MemoryStore>) -> QueryContext {
    QueryContext::new(store)
}
