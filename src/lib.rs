pub mod bench;
pub mod cli;
pub mod error;
pub mod generator;
pub mod models;
pub mod store;

pub use error::{BenchError, BenchResult};
pub use models::{Event, Severity, SeverityLevel};
pub use store::{DocumentStore, MemoryStore, MongoStore};
