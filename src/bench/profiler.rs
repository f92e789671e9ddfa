use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use super::alloc::AllocSnapshot;

/// Timing and allocation figures for one profiled unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileResult {
    pub name: String,
    pub execution_time: Duration,
    /// Bytes allocated while the work ran
    pub memory_usage: u64,
}

impl ProfileResult {
    pub fn new(name: impl Into<String>, execution_time: Duration, memory_usage: u64) -> Self {
        Self {
            name: name.into(),
            execution_time,
            memory_usage,
        }
    }

    pub fn memory_megabytes(&self) -> f64 {
        bytes_to_megabytes(self.memory_usage)
    }
}

impl fmt::Display for ProfileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Profile [{}]:\n- Execution time: {}\n- Memory usage: {:.2} MB",
            self.name,
            format_duration(self.execution_time),
            self.memory_megabytes()
        )
    }
}

pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

pub fn format_duration(d: Duration) -> String {
    if d.as_secs() > 0 {
        format!("{:.2}s", d.as_secs_f64())
    } else if d.as_millis() > 0 {
        format!("{:.2}ms", d.as_secs_f64() * 1000.0)
    } else {
        format!("{:.2}µs", d.as_secs_f64() * 1_000_000.0)
    }
}

/// Run `work` once, measuring wall time and bytes allocated.
///
/// The result is filled in even when `work` fails; its error is handed back
/// next to the measurements.
pub async fn profile<T, E, F, Fut>(name: impl Into<String>, work: F) -> (ProfileResult, Result<T, E>)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let baseline = AllocSnapshot::now();
    let start = Instant::now();

    let outcome = work().await;

    let execution_time = start.elapsed();
    let memory_usage = AllocSnapshot::now().bytes_since(&baseline);

    (
        ProfileResult::new(name, execution_time, memory_usage),
        outcome,
    )
}
