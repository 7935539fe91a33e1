//! An engine that records the templates it prepares and simulates their run
//! on a background thread.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use spring_batch_metainject::{
    core::row::RowMetaAndData,
    transformation::{
        engine::{
            ParentTransformation, RowListener, RowProducer, SubTransformation, TransResult,
            TransformationEngine,
        },
        TransformationMeta,
    },
    BatchError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone, Default)]
struct Script {
    emit_step: String,
    emitted_rows: Vec<RowMetaAndData>,
    result: TransResult,
    run_until_stopped: bool,
}

#[derive(Default)]
struct Shared {
    finished: AtomicBool,
    stopped: AtomicBool,
    has_producer: AtomicBool,
    feed_done: AtomicBool,
    fed: Mutex<Vec<RowMetaAndData>>,
    listeners: Mutex<Vec<(String, RowListener)>>,
    result: Mutex<TransResult>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

pub struct FakeSubTransformation {
    name: String,
    step_names: Vec<String>,
    script: Script,
    shared: Arc<Shared>,
}

struct FakeProducer {
    shared: Arc<Shared>,
}

impl RowProducer for FakeProducer {
    fn put_row(&mut self, row: RowMetaAndData) -> Result<(), BatchError> {
        lock(&self.shared.fed).push(row);
        Ok(())
    }

    fn finished(&mut self) {
        self.shared.feed_done.store(true, Ordering::SeqCst);
    }
}

impl FakeSubTransformation {
    fn knows(&self, step_name: &str) -> Result<(), BatchError> {
        if self.step_names.iter().any(|s| s.eq_ignore_ascii_case(step_name)) {
            Ok(())
        } else {
            Err(BatchError::InvalidState(format!("no step {} in {}", step_name, self.name)))
        }
    }

    pub fn fed_rows(&self) -> Vec<RowMetaAndData> {
        lock(&self.shared.fed).clone()
    }
}

fn run(script: Script, shared: Arc<Shared>) {
    if script.run_until_stopped {
        while !shared.stopped.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
        shared.finished.store(true, Ordering::SeqCst);
        return;
    }

    if shared.has_producer.load(Ordering::SeqCst) {
        while !shared.feed_done.load(Ordering::SeqCst) && !shared.stopped.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }
    }

    let fed = lock(&shared.fed).clone();
    {
        let listeners = lock(&shared.listeners);
        for row in script.emitted_rows.iter().chain(fed.iter()) {
            for (step, listener) in listeners.iter() {
                if step.eq_ignore_ascii_case(&script.emit_step) {
                    listener(row);
                }
            }
        }
    }

    let mut result = script.result;
    result.lines_read += fed.len() as u64;
    *lock(&shared.result) = result;
    shared.finished.store(true, Ordering::SeqCst);
}

impl SubTransformation for FakeSubTransformation {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_row_producer(&self, step_name: &str) -> Result<Box<dyn RowProducer>, BatchError> {
        self.knows(step_name)?;
        self.shared.has_producer.store(true, Ordering::SeqCst);
        Ok(Box::new(FakeProducer {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn add_row_listener(&self, step_name: &str, listener: RowListener) -> Result<(), BatchError> {
        self.knows(step_name)?;
        lock(&self.shared.listeners).push((step_name.to_string(), listener));
        Ok(())
    }

    fn start(&self) -> Result<(), BatchError> {
        let script = self.script.clone();
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || run(script, shared));
        *lock(&self.shared.handle) = Some(handle);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::SeqCst)
    }

    fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    fn stop_all(&self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
    }

    fn result(&self) -> TransResult {
        *lock(&self.shared.result)
    }

    fn wait_until_finished(&self) {
        let handle = lock(&self.shared.handle).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Prepares [`FakeSubTransformation`]s following a script set with the
/// builder methods.
#[derive(Default)]
pub struct RecordingEngine {
    script: Script,
    prepared: Mutex<Vec<TransformationMeta>>,
    last: Mutex<Option<Arc<FakeSubTransformation>>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows written by `step_name` once the template runs. Rows fed through
    /// a producer are written by the same step after them.
    pub fn emitting(mut self, step_name: &str, rows: Vec<RowMetaAndData>) -> Self {
        self.script.emit_step = step_name.to_string();
        self.script.emitted_rows = rows;
        self
    }

    pub fn with_result(mut self, result: TransResult) -> Self {
        self.script.result = result;
        self
    }

    pub fn running_until_stopped(mut self) -> Self {
        self.script.run_until_stopped = true;
        self
    }

    pub fn prepared(&self) -> Vec<TransformationMeta> {
        lock(&self.prepared).clone()
    }

    pub fn last(&self) -> Option<Arc<FakeSubTransformation>> {
        lock(&self.last).clone()
    }
}

impl TransformationEngine for RecordingEngine {
    fn prepare(
        &self,
        meta: &TransformationMeta,
        _parent: &ParentTransformation,
    ) -> Result<Arc<dyn SubTransformation>, BatchError> {
        lock(&self.prepared).push(meta.clone());

        let sub = Arc::new(FakeSubTransformation {
            name: meta.name.clone(),
            step_names: meta.step_names(),
            script: self.script.clone(),
            shared: Arc::new(Shared::default()),
        });
        *lock(&self.last) = Some(Arc::clone(&sub));
        Ok(sub)
    }
}
