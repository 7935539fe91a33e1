//! Seam between the metadata injection step and the engine that runs the
//! injected template.
//!
//! The injection step never runs steps itself. It asks a
//! [`TransformationEngine`] to prepare a [`SubTransformation`] from the
//! injected template, wires rows in and out of it, starts it and polls it
//! until it finishes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use indexmap::IndexMap;
use log::debug;

use crate::{
    core::{row::RowMetaAndData, step::StepExecution, variables::Variables},
    BatchError,
};

use super::TransformationMeta;

/// Counters reported by a running or finished transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransResult {
    pub lines_input: u64,
    pub lines_output: u64,
    pub lines_read: u64,
    pub lines_written: u64,
    pub lines_updated: u64,
    pub lines_rejected: u64,
    pub errors: u64,
}

impl TransResult {
    /// Copies the counters onto a step execution, replacing its own.
    pub fn copy_into(&self, step_execution: &mut StepExecution) {
        step_execution.lines_input = self.lines_input;
        step_execution.lines_output = self.lines_output;
        step_execution.lines_read = self.lines_read;
        step_execution.lines_written = self.lines_written;
        step_execution.lines_updated = self.lines_updated;
        step_execution.lines_rejected = self.lines_rejected;
        step_execution.errors = self.errors;
    }
}

/// Pushes rows into a step of a running transformation.
pub trait RowProducer: Send {
    fn put_row(&mut self, row: RowMetaAndData) -> Result<(), BatchError>;

    /// Signals that no more rows will be put.
    fn finished(&mut self);
}

/// Called for every row a step of a running transformation writes.
pub type RowListener = Box<dyn Fn(&RowMetaAndData) + Send + Sync>;

/// A prepared, runnable transformation.
pub trait SubTransformation: Send + Sync {
    fn name(&self) -> &str;

    /// Attaches a producer feeding rows into `step_name`. Must be called
    /// before [`SubTransformation::start`].
    fn add_row_producer(&self, step_name: &str) -> Result<Box<dyn RowProducer>, BatchError>;

    /// Registers `listener` on the output of `step_name`.
    ///
    /// # Errors
    /// Fails when the transformation has no step called `step_name`.
    fn add_row_listener(&self, step_name: &str, listener: RowListener) -> Result<(), BatchError>;

    /// Starts the step threads. Returns without waiting for them.
    fn start(&self) -> Result<(), BatchError>;

    fn is_finished(&self) -> bool;

    fn is_stopped(&self) -> bool;

    /// Asks every step to stop as soon as possible.
    fn stop_all(&self);

    /// Counters gathered so far.
    fn result(&self) -> TransResult;

    fn wait_until_finished(&self);
}

/// Prepares runnable transformations from templates.
pub trait TransformationEngine {
    fn prepare(
        &self,
        meta: &TransformationMeta,
        parent: &ParentTransformation,
    ) -> Result<Arc<dyn SubTransformation>, BatchError>;
}

type StopListener = Box<dyn Fn() + Send + Sync>;

/// Handle returned by [`StopSignal::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopListenerId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    registered: Vec<(u64, StopListener)>,
}

#[derive(Default)]
struct StopState {
    stopped: AtomicBool,
    listeners: Mutex<Listeners>,
}

/// A shareable stop flag with listeners.
///
/// Listeners run once, on the first call to [`StopSignal::stop`]. A listener
/// added after the signal fired runs immediately. The flag is only raised
/// while the listener list is locked, so a listener is never added to a
/// list that was already drained.
#[derive(Clone, Default)]
pub struct StopSignal {
    state: Arc<StopState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        let listeners = {
            let mut guard = lock(&self.state.listeners);
            if self.state.stopped.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut guard.registered)
        };
        debug!("Stop requested, notifying {} listener(s)", listeners.len());
        for (_, listener) in listeners {
            listener();
        }
    }

    pub fn add_listener<F>(&self, listener: F) -> StopListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut guard = lock(&self.state.listeners);
        let id = guard.next_id;
        guard.next_id += 1;

        if self.state.stopped.load(Ordering::SeqCst) {
            drop(guard);
            listener();
        } else {
            guard.registered.push((id, Box::new(listener)));
        }
        StopListenerId(id)
    }

    /// Drops a listener that has not run yet. Returns whether it was found.
    pub fn remove_listener(&self, id: StopListenerId) -> bool {
        let mut guard = lock(&self.state.listeners);
        let before = guard.registered.len();
        guard.registered.retain(|(registered, _)| *registered != id.0);
        guard.registered.len() != before
    }

    /// Number of listeners waiting for the signal.
    pub fn listener_count(&self) -> usize {
        lock(&self.state.listeners).registered.len()
    }
}

/// The transformation hosting the metadata injection step.
///
/// Provides the variables and parameters handed down to the injected
/// template, the stop signal, and the registry of running
/// sub-transformations keyed by the name of the step that launched them.
pub struct ParentTransformation {
    name: String,
    variables: Variables,
    parameters: IndexMap<String, String>,
    stop: StopSignal,
    active_sub_transformations: Mutex<IndexMap<String, Arc<dyn SubTransformation>>>,
}

impl ParentTransformation {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variables: Variables::new(),
            parameters: IndexMap::new(),
            stop: StopSignal::new(),
            active_sub_transformations: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn parameters(&self) -> &IndexMap<String, String> {
        &self.parameters
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn stop_all(&self) {
        self.stop.stop();
    }

    pub fn add_active_sub_transformation(&self, step_name: &str, sub: Arc<dyn SubTransformation>) {
        lock(&self.active_sub_transformations).insert(step_name.to_string(), sub);
    }

    pub fn active_sub_transformation(&self, step_name: &str) -> Option<Arc<dyn SubTransformation>> {
        lock(&self.active_sub_transformations).get(step_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn stop_listeners_run_once() {
        let signal = StopSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        signal.add_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.stop();
        signal.stop();

        assert!(signal.is_stopped());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_listener_runs_immediately() {
        let signal = StopSignal::new();
        signal.stop();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.add_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_added_while_stopping_still_runs() {
        let signal = StopSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_signal = signal.clone();
        let inner_calls = Arc::clone(&calls);
        signal.add_listener(move || {
            let counter = Arc::clone(&inner_calls);
            inner_signal.add_listener(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        signal.stop();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn no_listener_is_lost_to_a_concurrent_stop() {
        for _ in 0..200 {
            let signal = StopSignal::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(std::sync::Barrier::new(5));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let signal = signal.clone();
                    let calls = Arc::clone(&calls);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        let counter = Arc::clone(&calls);
                        signal.add_listener(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        });
                    })
                })
                .collect();

            barrier.wait();
            signal.stop();
            for handle in handles {
                handle.join().expect("listener thread");
            }

            assert_eq!(calls.load(Ordering::SeqCst), 4);
        }
    }

    #[test]
    fn removed_listener_never_runs() {
        let signal = StopSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = signal.add_listener(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.listener_count(), 1);

        assert!(signal.remove_listener(id));
        assert!(!signal.remove_listener(id));
        signal.stop();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parent_stop_is_shared_with_clones() {
        let parent = ParentTransformation::new("host").with_parameter("ENV", "test");
        let signal = parent.stop_signal().clone();

        parent.stop_all();

        assert!(signal.is_stopped());
        assert_eq!(parent.parameters().get("ENV").map(String::as_str), Some("test"));
    }

    #[test]
    fn result_replaces_step_counters() {
        let mut step_execution = StepExecution::new("inject");
        step_execution.lines_read = 99;

        let result = TransResult {
            lines_read: 3,
            lines_written: 2,
            errors: 1,
            ..TransResult::default()
        };
        result.copy_into(&mut step_execution);

        assert_eq!(step_execution.lines_read, 3);
        assert_eq!(step_execution.lines_written, 2);
        assert_eq!(step_execution.errors, 1);
    }
}
