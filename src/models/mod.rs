//! Event document model and the sample-data pools used by the generator.

pub mod event;
pub mod severity;

pub use event::{Event, EVENTS_COLLECTION};
pub use severity::{Severity, SeverityLevel};
