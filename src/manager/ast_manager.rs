//! Scheduling analysis builds and handing analyses to consumers.
//!
//! # Request flow
//!
//! 1. The latest snapshot of the invocation's primary file is looked up.
//! 2. If the most recent analysis for the invocation was built on exactly
//!    that snapshot it is delivered as is.
//! 3. Otherwise an out-of-date analysis is offered to the consumer's reuse
//!    check, synchronously.
//! 4. Otherwise the consumer joins the build for `(invocation, snapshot)`,
//!    starting it if none is in flight. Every waiter of a build is called
//!    back with the same analysis once it completes.
//!
//! All consumer callbacks run on the worker pool.
//!
//! # Locking
//!
//! `in_flight` is always taken before `latest`. A finished build is cached
//! and its key removed under one `in_flight` critical section, and a new key
//! is only inserted after re-checking the cache under that same lock, so a
//! request can never start a second build for a key that just completed.
//!
//! A panicking analyzer fails its build; a panicking consumer is logged and
//! its responder reports the query as cancelled.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::consumer::AstConsumer;
use crate::base::BufferId;
use crate::config::HostConfig;
use crate::error::{BuildError, HostError};
use crate::hir::{AnalysisResult, Analyzer, Invocation};
use crate::text::{EditorDocuments, Snapshot};

/// Identity of one build: the same invocation over the same snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct BuildKey {
    invocation: Invocation,
    buffer: BufferId,
    stamp: u64,
}

impl BuildKey {
    fn new(invocation: &Invocation, snapshot: &Snapshot) -> Self {
        Self { invocation: invocation.clone(), buffer: snapshot.buffer_id(), stamp: snapshot.stamp() }
    }
}

type Waiters = Vec<Box<dyn AstConsumer>>;

struct ManagerInner {
    pool: ThreadPool,
    analyzer: Arc<dyn Analyzer>,
    documents: Arc<EditorDocuments>,
    /// Builds in progress and the consumers waiting on each.
    in_flight: Mutex<FxHashMap<BuildKey, Waiters>>,
    /// Most recent completed analysis per invocation.
    latest: Mutex<FxHashMap<Invocation, Arc<AnalysisResult>>>,
    cancel: CancellationToken,
}

/// Owns the worker pool, the single-flight build registry and the cache of
/// recent analyses.
#[derive(Clone)]
pub struct AstManager {
    inner: Arc<ManagerInner>,
}

impl AstManager {
    pub fn new(
        config: &HostConfig,
        analyzer: Arc<dyn Analyzer>,
        documents: Arc<EditorDocuments>,
    ) -> Result<Self, HostError> {
        let prefix = config.thread_name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .panic_handler(|payload| error!(panic = panic_message(&*payload), "analysis worker job panicked"))
            .build()?;

        Ok(Self {
            inner: Arc::new(ManagerInner {
                pool,
                analyzer,
                documents,
                in_flight: Mutex::new(FxHashMap::default()),
                latest: Mutex::new(FxHashMap::default()),
                cancel: CancellationToken::new(),
            }),
        })
    }

    pub fn analyzer(&self) -> &dyn Analyzer {
        &*self.inner.analyzer
    }

    pub fn documents(&self) -> &EditorDocuments {
        &self.inner.documents
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); requests derive their
    /// own tokens from it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Cancel every pending and future request.
    pub fn shutdown(&self) {
        debug!("shutting down analysis manager");
        self.inner.cancel.cancel();
    }

    /// The most recent completed analysis for `invocation`, if any.
    pub fn cached_analysis(&self, invocation: &Invocation) -> Option<Arc<AnalysisResult>> {
        self.inner.latest.lock().get(invocation).cloned()
    }

    /// Close `path` in the editing session and drop every cached analysis
    /// whose primary file it is. Returns whether the document was open.
    pub fn close_document(&self, path: &str) -> bool {
        let closed = self.inner.documents.close(path);
        let mut latest = self.inner.latest.lock();
        let before = latest.len();
        latest.retain(|invocation, _| invocation.primary_file() != path);
        debug!(path, closed, evicted = before - latest.len(), "closed document");
        closed
    }

    /// Number of builds currently in flight.
    pub fn builds_in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Deliver an analysis of `invocation` to `consumer`, building one if
    /// needed.
    pub fn process_ast(&self, invocation: Invocation, mut consumer: Box<dyn AstConsumer>) {
        if self.inner.cancel.is_cancelled() {
            consumer.cancelled();
            return;
        }

        let Some(snapshot) = self.inner.documents.latest_snapshot(invocation.primary_file()) else {
            let path = Arc::from(invocation.primary_file());
            self.spawn(move || consumer.failed(BuildError::MissingDocument(path)));
            return;
        };

        if let Some(existing) = self.cached_analysis(&invocation) {
            if !existing.snapshot.is_from_same_buffer(&snapshot) {
                self.inner.forget(&invocation, &existing);
            } else if is_built_on(&existing, &snapshot)
                || consumer.can_use_existing(std::slice::from_ref(&existing.snapshot))
            {
                self.spawn(move || consumer.handle_primary_ast(existing));
                return;
            }
        }

        let key = BuildKey::new(&invocation, &snapshot);
        {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(waiters) = in_flight.get_mut(&key) {
                debug!(?key, waiters = waiters.len() + 1, "joined in-flight build");
                waiters.push(consumer);
                return;
            }
            let finished = self
                .inner
                .latest
                .lock()
                .get(&invocation)
                .filter(|cached| is_built_on(cached, &snapshot))
                .cloned();
            if let Some(finished) = finished {
                drop(in_flight);
                debug!(?key, "build finished while scheduling");
                self.spawn(move || consumer.handle_primary_ast(finished));
                return;
            }
            in_flight.insert(key.clone(), vec![consumer]);
        }

        let inner = self.inner.clone();
        self.spawn(move || inner.build(key, invocation, snapshot));
    }

    fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.inner.pool.spawn(job);
    }
}

impl ManagerInner {
    fn build(&self, key: BuildKey, invocation: Invocation, snapshot: Snapshot) {
        let cancel = self.cancel.child_token();
        let outcome = if cancel.is_cancelled() {
            Err(BuildError::Cancelled)
        } else {
            debug!(?invocation, stamp = snapshot.stamp(), "building analysis");
            catch_unwind(AssertUnwindSafe(|| self.analyzer.build_analysis(&invocation, &snapshot, &cancel)))
                .unwrap_or_else(|payload| {
                    Err(BuildError::Analyzer(format!("analyzer panicked: {}", panic_message(&*payload))))
                })
                .map(|tree| Arc::new(AnalysisResult { tree, snapshot, invocation: invocation.clone() }))
        };

        let waiters = {
            let mut in_flight = self.in_flight.lock();
            if let Ok(result) = &outcome {
                self.remember(&invocation, result);
            }
            in_flight.remove(&key).unwrap_or_default()
        };

        match outcome {
            Ok(result) => {
                for waiter in waiters {
                    let result = result.clone();
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(move || waiter.handle_primary_ast(result))) {
                        error!(?invocation, panic = panic_message(&*payload), "consumer panicked");
                    }
                }
            }
            Err(BuildError::Cancelled) => {
                for waiter in waiters {
                    waiter.cancelled();
                }
            }
            Err(error) => {
                warn!(?invocation, %error, "analysis build failed");
                for waiter in waiters {
                    waiter.failed(error.clone());
                }
            }
        }
    }

    /// Keep `result` unless a newer analysis of the same buffer is cached or
    /// its document was closed or reopened meanwhile.
    fn remember(&self, invocation: &Invocation, result: &Arc<AnalysisResult>) {
        let still_open = self
            .documents
            .latest_snapshot(invocation.primary_file())
            .is_some_and(|snap| snap.is_from_same_buffer(&result.snapshot));
        if !still_open {
            debug!(?invocation, "document changed identity during build, not caching");
            return;
        }
        let mut latest = self.latest.lock();
        let keep_existing = latest.get(invocation).is_some_and(|existing| {
            existing.snapshot.is_from_same_buffer(&result.snapshot)
                && existing.snapshot.stamp() > result.snapshot.stamp()
        });
        if !keep_existing {
            latest.insert(invocation.clone(), result.clone());
        }
    }

    /// Drop `stale` from the cache unless something else replaced it.
    fn forget(&self, invocation: &Invocation, stale: &Arc<AnalysisResult>) {
        let mut latest = self.latest.lock();
        if latest.get(invocation).is_some_and(|cached| Arc::ptr_eq(cached, stale)) {
            debug!(?invocation, "evicting analysis of a replaced buffer");
            latest.remove(invocation);
        }
    }
}

fn is_built_on(analysis: &AnalysisResult, snapshot: &Snapshot) -> bool {
    analysis.snapshot.is_from_same_buffer(snapshot) && analysis.snapshot.stamp() == snapshot.stamp()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl fmt::Debug for AstManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstManager")
            .field("threads", &self.inner.pool.current_num_threads())
            .field("in_flight", &self.builds_in_flight())
            .field("cancelled", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::hir::{AnalysisTree, ModuleInfo, TreeBuilder};

    #[derive(Default)]
    struct Counting {
        builds: AtomicUsize,
    }

    impl Analyzer for Counting {
        fn build_analysis(
            &self,
            invocation: &Invocation,
            _snapshot: &Snapshot,
            _cancel: &CancellationToken,
        ) -> Result<AnalysisTree, BuildError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(TreeBuilder::new(invocation.primary_file(), ModuleInfo::new("main")).finish())
        }
    }

    struct Panicking;

    impl Analyzer for Panicking {
        fn build_analysis(
            &self,
            _invocation: &Invocation,
            _snapshot: &Snapshot,
            _cancel: &CancellationToken,
        ) -> Result<AnalysisTree, BuildError> {
            panic!("tree construction blew up")
        }
    }

    #[derive(Debug, PartialEq)]
    enum Event {
        Analysis(u64),
        Cancelled,
        Failed(BuildError),
    }

    struct Recorder {
        reuse: bool,
        tx: mpsc::Sender<Event>,
    }

    impl AstConsumer for Recorder {
        fn can_use_existing(&mut self, _snapshots: &[Snapshot]) -> bool {
            self.reuse
        }

        fn handle_primary_ast(self: Box<Self>, analysis: Arc<AnalysisResult>) {
            self.tx.send(Event::Analysis(analysis.snapshot.stamp())).unwrap();
        }

        fn cancelled(self: Box<Self>) {
            self.tx.send(Event::Cancelled).unwrap();
        }

        fn failed(self: Box<Self>, error: BuildError) {
            self.tx.send(Event::Failed(error)).unwrap();
        }
    }

    /// Panics on delivery; reports that it was dropped.
    struct Exploding {
        dropped: mpsc::Sender<()>,
    }

    impl Drop for Exploding {
        fn drop(&mut self) {
            let _ = self.dropped.send(());
        }
    }

    impl AstConsumer for Exploding {
        fn handle_primary_ast(self: Box<Self>, _analysis: Arc<AnalysisResult>) {
            panic!("consumer blew up")
        }

        fn cancelled(self: Box<Self>) {}

        fn failed(self: Box<Self>, _error: BuildError) {}
    }

    fn setup() -> (AstManager, Arc<Counting>) {
        let analyzer = Arc::new(Counting::default());
        let documents = Arc::new(EditorDocuments::new());
        documents.open("/a.mini", "let x = 1");
        let config = HostConfig::default().with_worker_threads(2);
        let manager = AstManager::new(&config, analyzer.clone(), documents).unwrap();
        (manager, analyzer)
    }

    fn request(manager: &AstManager, reuse: bool) -> Event {
        let (tx, rx) = mpsc::channel();
        let inv = Invocation::new("/a.mini", ["-g"]);
        manager.process_ast(inv, Box::new(Recorder { reuse, tx }));
        rx.recv_timeout(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_up_to_date_analysis_is_cached() {
        let (manager, analyzer) = setup();

        assert_eq!(request(&manager, false), Event::Analysis(0));
        assert_eq!(request(&manager, false), Event::Analysis(0));
        assert_eq!(analyzer.builds.load(Ordering::SeqCst), 1);
        assert_eq!(manager.builds_in_flight(), 0);
    }

    #[test]
    fn test_reuse_check_decides_on_stale_analysis() {
        let (manager, analyzer) = setup();
        assert_eq!(request(&manager, false), Event::Analysis(0));
        manager.documents().replace("/a.mini", 0, 0, " ").unwrap();

        assert_eq!(request(&manager, true), Event::Analysis(0));
        assert_eq!(analyzer.builds.load(Ordering::SeqCst), 1);

        assert_eq!(request(&manager, false), Event::Analysis(1));
        assert_eq!(analyzer.builds.load(Ordering::SeqCst), 2);
        assert_eq!(manager.cached_analysis(&Invocation::new("/a.mini", ["-g"])).unwrap().snapshot.stamp(), 1);
    }

    #[test]
    fn test_missing_document_and_shutdown() {
        let (manager, _) = setup();
        let (tx, rx) = mpsc::channel();
        manager.process_ast(Invocation::new("/b.mini", ["-g"]), Box::new(Recorder { reuse: false, tx }));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(10)).unwrap(),
            Event::Failed(BuildError::MissingDocument(Arc::from("/b.mini")))
        );

        manager.shutdown();
        assert_eq!(request(&manager, false), Event::Cancelled);
    }

    #[test]
    fn test_concurrent_requests_share_one_build() {
        for _ in 0..20 {
            let (manager, analyzer) = setup();
            let (tx, rx) = mpsc::channel();
            let threads: Vec<_> = (0..16)
                .map(|_| {
                    let manager = manager.clone();
                    let tx = tx.clone();
                    std::thread::spawn(move || {
                        manager.process_ast(Invocation::new("/a.mini", ["-g"]), Box::new(Recorder { reuse: false, tx }));
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }

            for _ in 0..16 {
                assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), Event::Analysis(0));
            }
            assert_eq!(analyzer.builds.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_close_document_evicts_cache() {
        let (manager, analyzer) = setup();
        let inv = Invocation::new("/a.mini", ["-g"]);
        assert_eq!(request(&manager, false), Event::Analysis(0));
        assert!(manager.cached_analysis(&inv).is_some());

        assert!(manager.close_document("/a.mini"));
        assert!(manager.cached_analysis(&inv).is_none());
        assert!(!manager.close_document("/a.mini"));

        manager.documents().open("/a.mini", "let y = 2");
        assert_eq!(request(&manager, true), Event::Analysis(0));
        assert_eq!(analyzer.builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reopened_document_is_never_served_old_analysis() {
        let (manager, analyzer) = setup();
        let inv = Invocation::new("/a.mini", ["-g"]);
        assert_eq!(request(&manager, false), Event::Analysis(0));
        let first = manager.cached_analysis(&inv).unwrap();

        let reopened = manager.documents().open("/a.mini", "let y = 2");
        // the consumer would take anything, but the cached analysis belongs to the closed buffer
        assert_eq!(request(&manager, true), Event::Analysis(0));
        assert_eq!(analyzer.builds.load(Ordering::SeqCst), 2);

        let cached = manager.cached_analysis(&inv).unwrap();
        assert!(!Arc::ptr_eq(&cached, &first));
        assert!(cached.snapshot.is_from_same_buffer(&reopened));
    }

    #[test]
    fn test_analyzer_panic_fails_the_build() {
        let documents = Arc::new(EditorDocuments::new());
        documents.open("/a.mini", "let x = 1");
        let config = HostConfig::default().with_worker_threads(1);
        let manager = AstManager::new(&config, Arc::new(Panicking), documents).unwrap();

        let Event::Failed(BuildError::Analyzer(message)) = request(&manager, false) else {
            panic!("expected a failed build");
        };
        assert!(message.contains("tree construction blew up"), "{message}");
        assert_eq!(manager.builds_in_flight(), 0);
        assert!(manager.cached_analysis(&Invocation::new("/a.mini", ["-g"])).is_none());
    }

    #[test]
    fn test_consumer_panic_keeps_workers_alive() {
        let (manager, _) = setup();
        let inv = Invocation::new("/a.mini", ["-g"]);

        // once while a build is delivered, once from the cache
        for _ in 0..2 {
            let (dropped, rx) = mpsc::channel();
            manager.process_ast(inv.clone(), Box::new(Exploding { dropped }));
            rx.recv_timeout(Duration::from_secs(10)).unwrap();
        }

        assert_eq!(request(&manager, false), Event::Analysis(0));
    }
}
