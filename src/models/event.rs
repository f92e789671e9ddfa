use bson::oid::ObjectId;
use bson::{DateTime, Document};
use serde::{Deserialize, Serialize};

use super::severity::Severity;
use crate::error::BenchResult;

/// Name of the collection holding generated events
pub const EVENTS_COLLECTION: &str = "events";

/// A simulated operational incident
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub timestamp: DateTime,
    pub event_type: String,
    pub description: String,
    pub severity: Severity,
    pub source_system: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub affected_components: Vec<String>,
    #[serde(default)]
    pub recommendation: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Document,
}

impl Event {
    pub fn to_document(&self) -> BenchResult<Document> {
        Ok(bson::to_document(self)?)
    }

    pub fn from_document(document: Document) -> BenchResult<Self> {
        Ok(bson::from_document(document)?)
    }

    pub fn is_resolved(&self) -> bool {
        self.status == STATUS_RESOLVED
    }

    /// RFC 3339 rendering of the timestamp for console output
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp
            .try_to_rfc3339_string()
            .unwrap_or_else(|_| self.timestamp.timestamp_millis().to_string())
    }
}

pub const STATUS_RESOLVED: &str = "Resolved";
pub const STATUS_IN_PROGRESS: &str = "In Progress";

pub const EVENT_TYPES: &[&str] = &[
    "System Warning",
    "Security Incident",
    "Database Exception",
    "API Error",
    "Network Issue",
    "Application Error",
    "Hardware Failure",
    "System Maintenance",
];

pub const DESCRIPTIONS: &[&str] = &[
    "CPU usage exceeds 90%",
    "Multiple failed login attempts detected",
    "Database connection pool exhausted",
    "Third-party API consistently returning timeout errors",
    "Network latency increased significantly",
    "Application crashed unexpectedly",
    "Disk I/O performance degraded",
    "Memory usage approaching limit",
    "Scheduled system update required",
    "Suspicious network traffic detected",
];

pub const SOURCE_SYSTEMS: &[&str] = &[
    "Server A",
    "Authentication Service",
    "Main Database",
    "Payment Service",
    "Network Gateway",
    "User Management System",
    "API Gateway",
    "Monitoring System",
];

pub const SERVER_IPS: &[&str] = &[
    "192.168.1.100",
    "192.168.1.101",
    "192.168.1.150",
    "192.168.2.50",
    "10.0.0.15",
    "10.0.0.16",
];

pub const COMPONENTS: &[&str] = &[
    "Web Server",
    "Database",
    "User Authentication System",
    "Order System",
    "User Management",
    "Checkout Process",
    "Payment Processing",
    "Reporting System",
    "Notification Service",
    "Admin Panel",
];

pub const STATUSES: &[&str] = &["Unhandled", STATUS_IN_PROGRESS, STATUS_RESOLVED, "Scheduled"];

pub const TEAMS: &[&str] = &[
    "Security Team",
    "Database Team",
    "Network Team",
    "DevOps Team",
    "Application Team",
    "Operations Team",
];
