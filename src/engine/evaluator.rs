//! The parallel evaluator: worker pool, scheduling, and finalization.
//!
//! # Scheduling model
//!
//! A dispatch loop pops ready keys from a shared FIFO queue and spawns one
//! worker task per key, bounded by the configured parallelism. A worker
//! invokes the key's compute function through a fresh environment, records
//! the dep groups the function requested, and subscribes the key to every
//! requested dep that has not yet reached a terminal state. A key with
//! missing deps is left in progress; the dep signal that completes its
//! awaited set re-enqueues it, so a key re-enters compute only after every
//! key in its most recent request set is terminal.
//!
//! # Failure policies
//!
//! Under fail-fast the first domain error is recorded in the first-exception
//! slot and shutdown begins: the dispatch loop stops handing out work and
//! in-flight compute invocations are abandoned at their next await point.
//! Under keep-going errors stay local to their key; parents that declared
//! the error kind catchable recover inside their own compute, all others
//! inherit the union of their failed children's root causes. A catastrophic
//! error aborts like fail-fast regardless of the policy. Unexpected
//! (unclassified) errors abort the whole evaluation and are returned as
//! `Err` rather than recorded in the graph.
//!
//! # After the scheduler drains
//!
//! Two single-threaded passes finish the job: error bubbling walks from the
//! first-errored key toward the requested roots, then cycle detection
//! explains any roots that are still unfinished.

use crate::engine::bubbling::bubble_error;
use crate::engine::cycles::detect_cycles;
use crate::engine::env::ComputeEnv;
use crate::engine::result::EvaluationResult;
use crate::engine::work_queue::WorkQueue;
use crate::errors::{ComputeError, CycleInfo, ErrorInfo, EvalError};
use crate::events::{EventReplayer, EventSink};
use crate::graph::{Graph, Key, NodeEntry, NodeState};
use crate::observability::messages::engine as msg;
use crate::observability::messages::StructuredLog;
use crate::registry::ComputationRegistry;
use crate::traits::{ComputeFailure, EvaluationState, ProgressReceiver};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Worker-pool size used when none is configured.
pub const DEFAULT_PARALLELISM: usize = 200;

/// Cycles reported per requested root before the detector gives up.
pub const DEFAULT_CYCLE_REPORT_LIMIT: usize = 20;

/// Interval at which the dispatch loop re-checks for runnable work.
const DISPATCH_POLL: Duration = Duration::from_millis(2);

/// Knobs for one evaluator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorOptions {
    /// Maximum number of concurrently running compute invocations.
    pub parallelism: usize,
    /// Continue past individual failures instead of shutting down on the
    /// first one.
    pub keep_going: bool,
    /// Cap on the cycles reported per requested root.
    pub cycle_report_limit: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            keep_going: false,
            cycle_report_limit: DEFAULT_CYCLE_REPORT_LIMIT,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the dispatch loop and the worker tasks of one
/// evaluation.
struct EvalShared {
    graph: Arc<dyn Graph>,
    registry: Arc<ComputationRegistry>,
    keep_going: bool,
    queue: Mutex<WorkQueue>,
    active: AtomicUsize,
    built: AtomicUsize,
    cancel: CancellationToken,
    /// First domain error observed; decides the top-level exception.
    first_error: Mutex<Option<(Key, ComputeError)>>,
    /// Unrecoverable failure; returned as `Err` from `evaluate`.
    fatal: Mutex<Option<EvalError>>,
    catastrophic: AtomicBool,
    progress: Option<Arc<dyn ProgressReceiver>>,
    sink: Option<Arc<dyn EventSink>>,
    replayer: Mutex<EventReplayer>,
}

impl EvalShared {
    fn enqueue_if_new(&self, key: &Key) {
        let first = lock(&self.queue).push_if_new(key.clone());
        if first {
            if let Some(progress) = &self.progress {
                progress.enqueueing(key);
            }
        }
    }

    fn record_first_error(&self, key: &Key, error: &ComputeError) {
        let mut slot = lock(&self.first_error);
        if slot.is_none() {
            *slot = Some((key.clone(), error.clone()));
        }
    }

    fn record_fatal(&self, error: EvalError) {
        let mut slot = lock(&self.fatal);
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.cancel.cancel();
    }

    /// Deliver this key's terminal transition to every parent that
    /// requested it; parents whose awaited set completes go back on the
    /// queue.
    async fn signal_reverse_deps(&self, key: &Key, entry: &Arc<NodeEntry>) {
        for parent in entry.reverse_deps() {
            if self.graph.signal(&parent, key).await {
                lock(&self.queue).reenqueue(parent);
            }
        }
    }
}

fn requester_names(entry: &Arc<NodeEntry>) -> String {
    let rdeps = entry.reverse_deps();
    if rdeps.is_empty() {
        "top level".to_string()
    } else {
        rdeps
            .iter()
            .map(Key::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Handle one work item: run the key's compute function and act on the
/// outcome.
async fn process_key(shared: &Arc<EvalShared>, key: Key) {
    if shared.cancel.is_cancelled() {
        return;
    }
    let entry = shared.graph.create_if_absent(&key).await;
    if entry.is_terminal() {
        if let Some(progress) = &shared.progress {
            progress.evaluated(&key, entry.value().as_ref(), EvaluationState::Clean);
        }
        return;
    }
    let computation = match shared.registry.get(key.family()) {
        Some(computation) => computation,
        None => {
            shared.record_fatal(EvalError::Unrecoverable {
                key: key.clone(),
                requested_by: requester_names(&entry),
                source: anyhow::anyhow!(
                    "no computation registered for family '{}'",
                    key.family()
                ),
            });
            return;
        }
    };
    if !entry.mark_in_progress() {
        return;
    }

    let tag = computation.extract_tag(&key);
    let mut env = ComputeEnv::new(shared.graph.clone(), key.clone(), tag);
    let result = tokio::select! {
        _ = shared.cancel.cancelled() => {
            // Shutdown interrupts in-flight work at its next await point.
            return;
        }
        result = computation.compute(&key, &mut env) => result,
    };
    let outcome = env.into_outcome();

    // Record this run's dep declarations, then subscribe to every requested
    // dep that is not yet terminal. Registration and the terminal check
    // happen under the child's lock, so a signal is neither lost nor
    // duplicated.
    for group in &outcome.groups {
        entry.add_dep_group(group.clone());
    }
    for (child, kinds) in &outcome.catches {
        entry.record_catch(child, kinds);
    }
    let mut awaited = 0usize;
    for dep in outcome.groups.iter().flatten() {
        let dep_is_terminal = shared.graph.add_reverse_dep(dep, &key).await;
        if !dep_is_terminal {
            awaited += 1;
            shared.enqueue_if_new(dep);
        }
    }

    match result {
        Err(ComputeFailure::Unexpected(source)) => {
            shared.record_fatal(EvalError::Unrecoverable {
                key: key.clone(),
                requested_by: requester_names(&entry),
                source,
            });
        }
        Err(ComputeFailure::Domain(error)) => {
            msg::NodeFailed {
                key: key.to_string(),
                kind: error.kind().to_string(),
                catastrophic: error.is_catastrophic(),
            }
            .log();
            if entry.set_error(ErrorInfo::from_compute_error(&key, error.clone())) {
                shared.record_first_error(&key, &error);
                // Shutdown begins before parents are signaled: the dispatch
                // loop must refuse re-enqueued work once the first error is
                // in, or a parent could race past the shutdown and finish.
                if error.is_catastrophic() {
                    shared.catastrophic.store(true, Ordering::Release);
                    shared.cancel.cancel();
                } else if !shared.keep_going {
                    shared.cancel.cancel();
                }
                shared.signal_reverse_deps(&key, &entry).await;
            }
        }
        Ok(_) if outcome.missing => {
            // Suspend until every awaited dep signals. Waiting for the full
            // request set (even with failed children already known) keeps
            // root-cause sets deterministic.
            if entry.begin_suspension(awaited) {
                lock(&shared.queue).reenqueue(key.clone());
            }
        }
        Ok(_) if !outcome.failed_children.is_empty() => {
            let mut root_causes = BTreeSet::new();
            let mut exception = None;
            for (_, info) in &outcome.failed_children {
                root_causes.extend(info.root_causes.iter().cloned());
                if exception.is_none() {
                    exception = info.exception.clone();
                }
            }
            if entry.set_error(ErrorInfo::propagated(exception, root_causes)) {
                shared.signal_reverse_deps(&key, &entry).await;
            }
        }
        Ok(Some(value)) => {
            if entry.set_value(value.clone(), outcome.events) {
                shared.built.fetch_add(1, Ordering::Relaxed);
                if let Some(sink) = &shared.sink {
                    lock(&shared.replayer).replay(shared.graph.as_ref(), &key, sink.as_ref());
                }
                if let Some(progress) = &shared.progress {
                    let state = if entry.restarts() > 0 {
                        EvaluationState::RestartedBuilt
                    } else {
                        EvaluationState::Built
                    };
                    progress.evaluated(&key, Some(&value), state);
                }
                shared.signal_reverse_deps(&key, &entry).await;
            }
        }
        Ok(None) => {
            shared.record_fatal(EvalError::Unrecoverable {
                key: key.clone(),
                requested_by: requester_names(&entry),
                source: anyhow::anyhow!(
                    "compute returned no value but requested no missing deps"
                ),
            });
        }
    }
}

/// Parallel evaluator for a demand-driven, keyed dependency graph.
///
/// Construction wires together the graph store, the computation registry,
/// an optional progress receiver, an optional event sink, and a
/// cancellation token. One evaluator may run any number of sequential
/// evaluations against the same graph; results already in the graph are
/// reused without recomputation. Concurrent calls to
/// [`evaluate`](Self::evaluate) on the same graph are not supported.
pub struct ParallelEvaluator {
    graph: Arc<dyn Graph>,
    registry: Arc<ComputationRegistry>,
    options: EvaluatorOptions,
    progress: Option<Arc<dyn ProgressReceiver>>,
    sink: Option<Arc<dyn EventSink>>,
    cancel: CancellationToken,
}

impl ParallelEvaluator {
    pub fn new(
        graph: Arc<dyn Graph>,
        registry: Arc<ComputationRegistry>,
        options: EvaluatorOptions,
    ) -> Self {
        Self {
            graph,
            registry,
            options,
            progress: None,
            sink: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a progress receiver.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReceiver>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Attach an event sink for diagnostic-event replay.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use an externally owned cancellation token. Cancelling it makes the
    /// evaluation fail with [`EvalError::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token external callers can cancel to stop the evaluation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Evaluate the requested roots, returning a result that maps each root
    /// to a value, an error, or neither (not attempted under fail-fast).
    pub async fn evaluate(&self, roots: &[Key]) -> Result<EvaluationResult, EvalError> {
        let started = Instant::now();
        msg::EvaluationStarted {
            root_count: roots.len(),
            parallelism: self.options.parallelism,
            keep_going: self.options.keep_going,
        }
        .log();

        let shared = Arc::new(EvalShared {
            graph: self.graph.clone(),
            registry: self.registry.clone(),
            keep_going: self.options.keep_going,
            queue: Mutex::new(WorkQueue::new()),
            active: AtomicUsize::new(0),
            built: AtomicUsize::new(0),
            cancel: self.cancel.child_token(),
            first_error: Mutex::new(None),
            fatal: Mutex::new(None),
            catastrophic: AtomicBool::new(false),
            progress: self.progress.clone(),
            sink: self.sink.clone(),
            replayer: Mutex::new(EventReplayer::new()),
        });

        // Roots already terminal from an earlier evaluation are not
        // re-enqueued; their events are replayed at result assembly.
        for root in roots {
            let entry = shared.graph.create_if_absent(root).await;
            if !entry.is_terminal() {
                shared.enqueue_if_new(root);
            }
        }

        loop {
            if shared.cancel.is_cancelled() {
                break;
            }
            let next = if shared.active.load(Ordering::Acquire) < self.options.parallelism {
                lock(&shared.queue).pop()
            } else {
                None
            };
            match next {
                Some(key) => {
                    shared.active.fetch_add(1, Ordering::AcqRel);
                    let worker_shared = shared.clone();
                    tokio::spawn(async move {
                        process_key(&worker_shared, key).await;
                        worker_shared.active.fetch_sub(1, Ordering::AcqRel);
                    });
                }
                None => {
                    if shared.active.load(Ordering::Acquire) == 0
                        && lock(&shared.queue).is_empty()
                    {
                        break;
                    }
                    sleep(DISPATCH_POLL).await;
                }
            }
        }
        // Let in-flight workers observe the shutdown and settle before the
        // single-threaded passes touch the graph.
        while shared.active.load(Ordering::Acquire) > 0 {
            sleep(DISPATCH_POLL).await;
        }

        if let Some(fatal) = lock(&shared.fatal).take() {
            msg::EvaluationAborted {
                reason: "unrecoverable error",
            }
            .log();
            return Err(fatal);
        }
        if self.cancel.is_cancelled() {
            msg::EvaluationAborted {
                reason: "cancelled",
            }
            .log();
            return Err(EvalError::Cancelled);
        }

        self.finalize(&shared, roots, started).await
    }

    async fn finalize(
        &self,
        shared: &Arc<EvalShared>,
        roots: &[Key],
        started: Instant,
    ) -> Result<EvaluationResult, EvalError> {
        let first_error = lock(&shared.first_error).clone();
        let catastrophic = shared.catastrophic.load(Ordering::Acquire);
        let is_unfinished = |key: &Key| {
            shared
                .graph
                .get(key)
                .map_or(true, |entry| !entry.is_terminal())
        };

        // Error bubbling: only a shutdown leaves errored keys with
        // unfinished ancestors. Under keep-going the scheduler itself
        // propagates inheritance, so bubbling runs only for fail-fast and
        // catastrophic shutdowns.
        if roots.iter().any(|root| is_unfinished(root)) {
            if let Some((origin, error)) = &first_error {
                if catastrophic || !self.options.keep_going {
                    bubble_error(&shared.graph, &self.registry, origin, error).await;
                }
            }
        }

        // Cycle detection. Every unfinished root is scanned before any
        // attribution so one root's attribution cannot hide another root's
        // cycles.
        let mut per_root_cycles: Vec<Vec<CycleInfo>> = Vec::new();
        for root in roots {
            if !is_unfinished(root) {
                continue;
            }
            let cycles = detect_cycles(
                shared.graph.as_ref(),
                root,
                self.options.cycle_report_limit,
                !self.options.keep_going,
            );
            if !cycles.is_empty() {
                msg::CycleDetected {
                    root: root.to_string(),
                    cycle_count: cycles.len(),
                }
                .log();
                per_root_cycles.push(cycles);
            }
        }
        let mut attributed: HashMap<Key, Vec<CycleInfo>> = HashMap::new();
        for cycles in &per_root_cycles {
            for info in cycles {
                for key in info.cycle.iter().chain(info.path_to_cycle.iter()) {
                    let list = attributed.entry(key.clone()).or_default();
                    if !list.contains(info) {
                        list.push(info.clone());
                    }
                }
            }
        }
        for (key, cycles) in attributed {
            if let Some(entry) = shared.graph.get(&key) {
                if !entry.is_terminal() {
                    entry.set_error(ErrorInfo::from_cycles(cycles));
                }
            }
        }

        let mut result = EvaluationResult::new();
        for root in roots {
            let entry = match shared.graph.get(root) {
                Some(entry) => entry,
                None => continue,
            };
            match entry.state() {
                NodeState::Done => {
                    if let Some(sink) = &self.sink {
                        lock(&shared.replayer).replay(
                            shared.graph.as_ref(),
                            root,
                            sink.as_ref(),
                        );
                    }
                    if let Some(value) = entry.value() {
                        result.insert_value(root.clone(), value);
                    }
                }
                NodeState::Errored => {
                    if let Some(error) = entry.error() {
                        result.insert_error(root.clone(), error);
                    }
                }
                _ => {}
            }
        }
        if let Some((key, error)) = first_error {
            if catastrophic {
                result.set_top_level_error(EvalError::Catastrophic { key, source: error });
            } else if !self.options.keep_going {
                result.set_top_level_error(EvalError::NodeFailed { key, source: error });
            }
        }

        msg::EvaluationCompleted {
            built_count: shared.built.load(Ordering::Relaxed),
            error_count: result.error_map().len(),
            duration: started.elapsed(),
        }
        .log();
        Ok(result)
    }
}
