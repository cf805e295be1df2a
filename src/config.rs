//! Host configuration.

use std::num::NonZeroUsize;
use std::thread;

/// How many times a query that failed against a reused analysis is
/// re-issued against a fresh one.
pub const MAX_RETRIES_WITHOUT_CACHE: u32 = 1;

/// Configuration for an [`AnalysisHost`](crate::ide::AnalysisHost).
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Number of analysis worker threads.
    pub worker_threads: usize,
    /// Prefix of worker thread names.
    pub thread_name: String,
    /// Allow answering queries from an analysis of an older snapshot.
    pub try_existing_analysis: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            thread_name: String::from("cursorkit-worker"),
            try_existing_analysis: true,
        }
    }
}

impl HostConfig {
    /// Set the number of worker threads; at least one is always used.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn with_thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    pub fn with_try_existing_analysis(mut self, enabled: bool) -> Self {
        self.try_existing_analysis = enabled;
        self
    }
}
