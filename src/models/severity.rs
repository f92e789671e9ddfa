use serde::{Deserialize, Serialize};

/// Ordered severity scale attached to every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeverityLevel {
    Information,
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 5] = [
        SeverityLevel::Information,
        SeverityLevel::Low,
        SeverityLevel::Medium,
        SeverityLevel::High,
        SeverityLevel::Critical,
    ];

    /// Numeric level stored in `severity.level` and used for filtering and sorting
    pub fn level(self) -> i32 {
        match self {
            SeverityLevel::Information => 0,
            SeverityLevel::Low => 1,
            SeverityLevel::Medium => 2,
            SeverityLevel::High => 3,
            SeverityLevel::Critical => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityLevel::Information => "Information",
            SeverityLevel::Low => "Low",
            SeverityLevel::Medium => "Medium",
            SeverityLevel::High => "High",
            SeverityLevel::Critical => "Critical",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SeverityLevel::Information => "blue",
            SeverityLevel::Low => "green",
            SeverityLevel::Medium => "yellow",
            SeverityLevel::High => "orange",
            SeverityLevel::Critical => "red",
        }
    }

    pub fn from_level(level: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.level() == level)
    }
}

/// Embedded severity sub-document as stored in the events collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Severity {
    pub level: i32,
    pub label: String,
    pub color: String,
}

impl From<SeverityLevel> for Severity {
    fn from(level: SeverityLevel) -> Self {
        Self {
            level: level.level(),
            label: level.label().to_string(),
            color: level.color().to_string(),
        }
    }
}
