//! Query implementations behind the catalogue entries.
//!
//! Each function issues exactly one store operation, prints what it found and
//! reports how many documents (or groups) came back.

use bson::{doc, Bson, DateTime, Document};
use chrono::Utc;

use super::catalogue::{QueryContext, QueryOutcome};
use crate::error::BenchResult;
use crate::models::Event;
use crate::store::FindOptions;

/// Index the sort comparison relies on
pub const SORT_INDEX_NAME: &str = "sourceSystem_status_idx";

/// Event type both aggregation variants narrow down to
pub const WARNING_EVENT_TYPE: &str = "System Warning";

fn hours_ago(hours: i64) -> DateTime {
    DateTime::from_millis((Utc::now() - chrono::Duration::hours(hours)).timestamp_millis())
}

fn recent_high_severity_filter() -> Document {
    doc! {
        "severity.level": { "$gte": 3 },
        "timestamp": { "$gte": hours_ago(24) },
    }
}

fn sort_comparison_filter() -> Document {
    doc! {
        "sourceSystem": { "$in": ["Main Database", "Authentication Service", "API Gateway"] },
    }
}

fn sort_comparison_options() -> FindOptions {
    FindOptions::new()
        .sort(doc! { "sourceSystem": 1, "status": 1 })
        .limit(100)
}

fn decode_events(documents: Vec<Document>) -> BenchResult<Vec<Event>> {
    documents.into_iter().map(Event::from_document).collect()
}

fn display(value: Option<&Bson>) -> String {
    match value {
        Some(Bson::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "<none>".to_string(),
    }
}

fn as_f64(value: Option<&Bson>) -> f64 {
    match value {
        Some(Bson::Double(d)) => *d,
        Some(Bson::Int32(i)) => *i as f64,
        Some(Bson::Int64(i)) => *i as f64,
        _ => 0.0,
    }
}

// Projection pair

pub async fn find_all_fields_anti_pattern(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Running anti-pattern: Querying all fields when only a few are needed");

    let documents = ctx
        .find(recent_high_severity_filter(), FindOptions::new())
        .await?;
    let events = decode_events(documents)?;

    println!("Found {} high severity events", events.len());
    Ok(QueryOutcome::new(events.len()))
}

pub async fn find_with_projection_optimized(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Running optimized solution: Using projection to return only needed fields");

    let options = FindOptions::new().projection(doc! {
        "eventType": 1,
        "severity": 1,
        "timestamp": 1,
        "sourceSystem": 1,
        "_id": 0,
    });
    let documents = ctx.find(recent_high_severity_filter(), options).await?;

    println!(
        "Found {} high severity events (projected fields)",
        documents.len()
    );
    Ok(QueryOutcome::new(documents.len()))
}

// Aggregation pair

pub async fn aggregate_before_filter_anti_pattern(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Running anti-pattern: Performing aggregations before filtering");

    let pipeline = vec![
        doc! { "$group": {
            "_id": "$eventType",
            "count": { "$sum": 1 },
            "events": { "$push": "$$ROOT" },
        } },
        doc! { "$match": { "_id": { "$eq": WARNING_EVENT_TYPE } } },
    ];
    let groups = ctx.aggregate(pipeline).await?;

    println!("Found {} event type groups after aggregation", groups.len());
    Ok(QueryOutcome::new(groups.len()))
}

pub async fn filter_before_aggregate_optimized(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Running optimized solution: Filtering data before aggregation");

    let pipeline = vec![
        doc! { "$match": { "eventType": { "$eq": WARNING_EVENT_TYPE } } },
        doc! { "$group": {
            "_id": "$eventType",
            "count": { "$sum": 1 },
            "avgTimestamp": { "$avg": { "$toLong": "$timestamp" } },
        } },
    ];
    let groups = ctx.aggregate(pipeline).await?;

    println!(
        "Found {} event type groups with optimized aggregation",
        groups.len()
    );
    Ok(QueryOutcome::new(groups.len()))
}

// Sort pair

pub async fn sort_without_index_anti_pattern(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Running anti-pattern: Sorting with a forced collection scan");

    let options = sort_comparison_options().hint(doc! { "$natural": 1 });
    let documents = ctx.find(sort_comparison_filter(), options).await?;

    println!("Sorted {} events without an index", documents.len());
    Ok(QueryOutcome::new(documents.len()))
}

pub async fn sort_with_index_optimized(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!(
        "Running optimized solution: Sorting on fields covered by {}",
        SORT_INDEX_NAME
    );

    let documents = ctx
        .find(sort_comparison_filter(), sort_comparison_options())
        .await?;

    println!("Sorted {} events using the index", documents.len());
    Ok(QueryOutcome::new(documents.len()))
}

// Standalone queries

pub async fn find_recent_events(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Finding most recent events");

    let options = FindOptions::new().sort(doc! { "timestamp": -1 }).limit(10);
    let events = decode_events(ctx.find(doc! {}, options).await?)?;

    println!("Found {} recent events", events.len());
    for (i, e) in events.iter().enumerate() {
        println!(
            "  {}. {} - {} (Severity: {})",
            i + 1,
            e.timestamp_rfc3339(),
            e.event_type,
            e.severity.level
        );
    }

    Ok(QueryOutcome::new(events.len()))
}

pub async fn find_high_severity_events(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Finding high severity events");

    let options = FindOptions::new().sort(doc! { "timestamp": -1 }).limit(10);
    let events = decode_events(
        ctx.find(doc! { "severity.level": { "$gte": 3 } }, options)
            .await?,
    )?;

    println!("Found {} high severity events", events.len());
    for (i, e) in events.iter().enumerate() {
        println!(
            "  {}. [Level {}] {} - {}",
            i + 1,
            e.severity.level,
            e.event_type,
            e.description
        );
    }

    Ok(QueryOutcome::new(events.len()))
}

pub async fn aggregate_events_by_severity(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Aggregating events by severity level");

    let pipeline = vec![
        doc! { "$group": {
            "_id": "$severity.level",
            "count": { "$sum": 1 },
            "label": { "$first": "$severity.label" },
        } },
        doc! { "$sort": { "_id": 1 } },
    ];
    let groups = ctx.aggregate(pipeline).await?;

    println!("Found {} severity groups", groups.len());
    for group in &groups {
        println!(
            "  Level {} ({}): {} events",
            display(group.get("_id")),
            display(group.get("label")),
            display(group.get("count"))
        );
    }

    Ok(QueryOutcome::new(groups.len()))
}

pub async fn find_events_with_projection(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Finding events with field projection");

    let filter = doc! { "eventType": { "$regex": ".*Database.*", "$options": "i" } };
    let options = FindOptions::new()
        .projection(doc! {
            "eventType": 1,
            "description": 1,
            "severity": 1,
            "sourceSystem": 1,
            "timestamp": 1,
            "_id": 0,
        })
        .limit(5);
    let documents = ctx.find(filter, options).await?;

    println!("Found {} database-related events", documents.len());
    for (i, d) in documents.iter().enumerate() {
        println!(
            "  {}. {} - {}",
            i + 1,
            display(d.get("eventType")),
            display(d.get("description"))
        );
    }

    Ok(QueryOutcome::new(documents.len()))
}

pub async fn find_events_by_time_range(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Finding events within a time range");

    let end = DateTime::now();
    let start = hours_ago(24);
    let filter = doc! { "timestamp": { "$gte": start, "$lte": end } };
    let options = FindOptions::new().sort(doc! { "timestamp": -1 }).limit(10);
    let events = decode_events(ctx.find(filter, options).await?)?;

    println!("Found {} events in the last 24 hours", events.len());
    for (i, e) in events.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, e.timestamp_rfc3339(), e.event_type);
    }

    Ok(QueryOutcome::new(events.len()))
}

pub async fn complex_aggregation(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Performing complex aggregation");

    let pipeline = vec![
        doc! { "$match": { "severity.level": { "$gte": 2 } } },
        doc! { "$group": {
            "_id": "$eventType",
            "count": { "$sum": 1 },
            "avgSeverity": { "$avg": "$severity.level" },
            "systems": { "$addToSet": "$sourceSystem" },
        } },
        doc! { "$sort": { "avgSeverity": -1 } },
        doc! { "$limit": 5 },
    ];
    let groups = ctx.aggregate(pipeline).await?;

    println!("Complex aggregation produced {} result groups", groups.len());
    for (i, group) in groups.iter().enumerate() {
        println!("  {}. Event Type: {}", i + 1, display(group.get("_id")));
        println!(
            "     Count: {}, Avg Severity: {:.2}",
            display(group.get("count")),
            as_f64(group.get("avgSeverity"))
        );
        println!("     Affected Systems: {}", display(group.get("systems")));
    }

    Ok(QueryOutcome::new(groups.len()))
}

pub async fn find_events_with_sorting(ctx: &QueryContext) -> BenchResult<QueryOutcome> {
    println!("Finding events with sorting options");

    let filter = doc! {
        "sourceSystem": { "$in": ["Database", "Main Database", "Authentication Service"] },
    };
    let options = FindOptions::new()
        .sort(doc! { "severity.level": -1, "timestamp": -1 })
        .limit(10);
    let events = decode_events(ctx.find(filter, options).await?)?;

    println!("Found {} database/auth service events", events.len());
    for (i, e) in events.iter().enumerate() {
        println!(
            "  {}. [Level {}] {} - {} ({})",
            i + 1,
            e.severity.level,
            e.source_system,
            e.event_type,
            e.timestamp_rfc3339()
        );
    }

    Ok(QueryOutcome::new(events.len()))
}
