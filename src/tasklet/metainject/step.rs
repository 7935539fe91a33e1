use std::{
    cell::{Cell, RefCell},
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use log::{debug, error, info, log_enabled, warn, Level};

use crate::{
    core::{
        item::{ItemReader, ItemWriter},
        row::RowMetaAndData,
        step::{RepeatStatus, StepExecution, StepStatus, Tasklet},
    },
    injection::{
        cache::RowCache,
        mapping::MappingTable,
        migration::migrate,
        resolver::{
            check_source_steps_availability, check_target_steps_availability,
            remove_unavailable_steps_from_mapping, InjectionReport, InjectionResolver,
        },
    },
    repository::Repository,
    transformation::{
        engine::{
            ParentTransformation, RowListener, RowProducer, SubTransformation,
            TransformationEngine,
        },
        StepRegistry, TransformationMeta,
    },
    BatchError,
};

use super::{
    loader::TemplateLoader,
    meta::MetaInjectMeta,
    writer::{InjectedTemplateWriter, RepositoryWriteLock},
};

/// Pause between two polls of a running sub-transformation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lifecycle of a [`MetaInjectTasklet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionState {
    /// Nothing loaded yet, or a previous run was disposed.
    Uninitialized,
    /// Draining the upstream readers into the row cache.
    Caching,
    /// Writing mapped values into the template.
    Resolving,
    /// Starting the injected template and feeding the streaming step.
    Executing,
    /// Waiting for the injected template, copying counters and passing rows on.
    Draining,
    Done,
    Failed,
}

#[derive(Default)]
struct InjectionData {
    template: Option<TransformationMeta>,
    mapping: MappingTable,
    streaming: Option<(String, String)>,
    injected: Option<TransformationMeta>,
    report: Option<InjectionReport>,
}

/// The metadata injection step.
///
/// Loads a template, caches the rows of its upstream readers, injects them
/// into the template steps through the mapping table, then runs the
/// injected template on a [`TransformationEngine`] until it finishes. Rows
/// written by the configured source step of the template are passed on to
/// the output writer.
///
/// Each [`Tasklet::execute`] runs `init`, `process` and `dispose` once.
pub struct MetaInjectTasklet<'a> {
    step_name: String,
    meta: RefCell<MetaInjectMeta>,
    parent: &'a ParentTransformation,
    engine: Option<&'a dyn TransformationEngine>,
    registry: &'a StepRegistry,
    repository: Option<&'a dyn Repository>,
    lock: &'a RepositoryWriteLock,
    inputs: Vec<(String, &'a dyn ItemReader<RowMetaAndData>)>,
    output: Option<&'a dyn ItemWriter<RowMetaAndData>>,
    poll_interval: Duration,
    force_filesystem: bool,
    state: Cell<InjectionState>,
    data: RefCell<InjectionData>,
}

impl<'a> MetaInjectTasklet<'a> {
    pub fn step_name(&self) -> &str {
        &self.step_name
    }

    pub fn state(&self) -> InjectionState {
        self.state.get()
    }

    pub fn meta(&self) -> MetaInjectMeta {
        self.meta.borrow().clone()
    }

    /// The template as injected by the last run.
    pub fn injected_template(&self) -> Option<TransformationMeta> {
        self.data.borrow().injected.clone()
    }

    /// What the last run injected.
    pub fn last_report(&self) -> Option<InjectionReport> {
        self.data.borrow().report.clone()
    }

    fn set_state(&self, state: InjectionState) {
        debug!("Step {}: {:?} -> {:?}", self.step_name, self.state.get(), state);
        self.state.set(state);
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|(name, _)| name.clone()).collect()
    }

    fn input(&self, step_name: &str) -> Option<&'a dyn ItemReader<RowMetaAndData>> {
        self.inputs
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(step_name))
            .map(|(_, reader)| *reader)
    }

    /// Loads the template and prepares the mapping table for it.
    ///
    /// # Errors
    /// Fails when the template cannot be loaded.
    pub fn init(&self) -> Result<(), BatchError> {
        self.set_state(InjectionState::Uninitialized);
        *self.data.borrow_mut() = InjectionData::default();

        let meta = {
            let mut meta = self.meta.borrow_mut();
            meta.actualize_meta_inject_mapping();
            meta.clone()
        };

        let mut template =
            TemplateLoader::new(self.registry, self.repository)
                .load(&meta, self.parent.variables())?;
        template.merge_parameters_with(self.parent.parameters(), true);

        let mut mapping = meta.target_source_mapping().clone();
        let migrated = migrate(&mut mapping, &template);
        if migrated > 0 {
            debug!("Migrated {} attribute key(s) for step {}", migrated, self.step_name);
        }

        let unavailable_sources =
            check_source_steps_availability(&mapping, &self.input_names(), self.parent.name());
        let unavailable_targets = check_target_steps_availability(&mapping, &template);
        let removed =
            remove_unavailable_steps_from_mapping(
                &mut mapping,
                &unavailable_sources,
                &unavailable_targets,
            );
        if removed > 0 {
            warn!(
                "Step {} ignores {} mapping(s) on unavailable steps",
                self.step_name, removed
            );
        }

        let streaming = match meta.streaming_steps() {
            Some((source, target)) if self.input(source).is_some() => {
                Some((source.to_string(), target.to_string()))
            }
            Some((source, _)) => {
                warn!(
                    "Streaming source step {} is not an input of step {}, streaming disabled",
                    source, self.step_name
                );
                None
            }
            None => None,
        };

        let mut data = self.data.borrow_mut();
        data.template = Some(template);
        data.mapping = mapping;
        data.streaming = streaming;
        Ok(())
    }

    /// Caches the input rows, injects them and runs the injected template.
    ///
    /// # Errors
    /// Fails on read, injection, execution or write-out errors, or when
    /// [`MetaInjectTasklet::init`] did not run.
    pub fn process(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let (mut template, mapping, streaming) = {
            let mut data = self.data.borrow_mut();
            let template = data.template.take().ok_or_else(|| {
                BatchError::InvalidState(format!("step {} was not initialized", self.step_name))
            })?;
            (template, std::mem::take(&mut data.mapping), data.streaming.clone())
        };
        let meta = self.meta.borrow().clone();

        if let Some(output) = self.output {
            output.open()?;
        }

        self.set_state(InjectionState::Caching);
        let streaming_source = streaming.as_ref().map(|(source, _)| source.as_str());
        let cache = RowCache::build(&self.inputs, streaming_source)?;
        step_execution.lines_read += cache.row_count() as u64;

        self.set_state(InjectionState::Resolving);
        let report =
            InjectionResolver::new(&mapping, &cache, self.parent.name()).inject(&mut template)?;
        info!(
            "Step {} injected {} step(s) of {}, {} mapping(s) skipped",
            self.step_name,
            report.injected_steps.len(),
            template.name,
            report.skipped
        );
        if log_enabled!(Level::Debug) {
            if let Ok(json) = template.to_json() {
                debug!("Injected transformation:\n{}", json);
            }
        }

        if !meta.no_execution() {
            self.run_template(&template, &meta, streaming, step_execution)?;
        }

        if let Some(target) = meta.target_file() {
            let target = self.parent.variables().substitute(target);
            let writer = InjectedTemplateWriter::new(self.repository, self.lock)
                .with_variables(self.parent.variables());
            let writer = if self.force_filesystem {
                writer.force_filesystem(true)
            } else {
                writer
            };
            writer.write(&template, &target)?;
        }

        if let Some(output) = self.output {
            output.flush()?;
            output.close()?;
        }

        let mut data = self.data.borrow_mut();
        data.injected = Some(template);
        data.report = Some(report);
        drop(data);

        self.set_state(InjectionState::Done);
        Ok(())
    }

    fn run_template(
        &self,
        template: &TransformationMeta,
        meta: &MetaInjectMeta,
        streaming: Option<(String, String)>,
        step_execution: &mut StepExecution,
    ) -> Result<(), BatchError> {
        self.set_state(InjectionState::Executing);
        let engine = self.engine.ok_or_else(|| {
            BatchError::InvalidState(format!(
                "step {} has no engine to run templates",
                self.step_name
            ))
        })?;

        let sub = engine.prepare(template, self.parent)?;

        let child = Arc::downgrade(&sub);
        let stop_listener = self.parent.stop_signal().add_listener(move || {
            if let Some(child) = child.upgrade() {
                child.stop_all();
            }
        });

        let outcome = self.drive(&sub, meta, streaming, step_execution);
        self.parent.stop_signal().remove_listener(stop_listener);
        outcome
    }

    fn drive(
        &self,
        sub: &Arc<dyn SubTransformation>,
        meta: &MetaInjectMeta,
        streaming: Option<(String, String)>,
        step_execution: &mut StepExecution,
    ) -> Result<(), BatchError> {
        let mut producer = match &streaming {
            Some((_, target)) => Some(sub.add_row_producer(target)?),
            None => None,
        };

        let receiver = match (meta.source_step_name(), self.output) {
            (Some(source), Some(_)) => {
                let (sender, receiver) = mpsc::channel();
                let listener: RowListener = Box::new(move |row: &RowMetaAndData| {
                    // the receiver is gone once the step stopped listening
                    let _ = sender.send(row.clone());
                });
                sub.add_row_listener(source, listener)?;
                Some(receiver)
            }
            _ => None,
        };

        self.parent.add_active_sub_transformation(&self.step_name, Arc::clone(sub));

        sub.start()?;
        info!("Started injected transformation {}", sub.name());

        if let (Some((source, _)), Some(producer)) = (&streaming, producer.as_mut()) {
            let fed = self.feed(source, &mut **producer);
            producer.finished();
            let fed = fed?;
            debug!("Streamed {} row(s) from step {}", fed, source);
        }

        self.set_state(InjectionState::Draining);
        while !sub.is_finished() && !sub.is_stopped() && !self.parent.is_stopped() {
            sub.result().copy_into(step_execution);
            self.forward(receiver.as_ref())?;
            thread::sleep(self.poll_interval);
        }

        sub.wait_until_finished();
        sub.result().copy_into(step_execution);
        self.forward(receiver.as_ref())?;

        if self.parent.is_stopped() || sub.is_stopped() {
            info!("Injected transformation {} was stopped", sub.name());
            step_execution.status = StepStatus::Stopped;
        }

        Ok(())
    }

    fn feed(
        &self,
        source: &str,
        producer: &mut dyn RowProducer,
    ) -> Result<u64, BatchError> {
        let Some(reader) = self.input(source) else {
            return Ok(0);
        };

        let mut fed = 0;
        while !self.parent.is_stopped() {
            match reader.read()? {
                Some(row) => {
                    producer.put_row(row)?;
                    fed += 1;
                }
                None => break,
            }
        }
        Ok(fed)
    }

    fn forward(&self, receiver: Option<&mpsc::Receiver<RowMetaAndData>>) -> Result<(), BatchError> {
        let (Some(receiver), Some(output)) = (receiver, self.output) else {
            return Ok(());
        };

        let rows: Vec<RowMetaAndData> = receiver.try_iter().collect();
        if !rows.is_empty() {
            output.write(&rows)?;
        }
        Ok(())
    }

    /// Releases what the last run loaded. The injected template and the
    /// report stay available.
    pub fn dispose(&self) {
        let mut data = self.data.borrow_mut();
        data.template = None;
        data.mapping.clear();
        data.streaming = None;
    }
}

impl Tasklet for MetaInjectTasklet<'_> {
    fn execute(&self, step_execution: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
        info!("Starting metadata injection step {}", self.step_name);

        let result = self.init().and_then(|()| self.process(step_execution));
        self.dispose();

        match result {
            Ok(()) => Ok(RepeatStatus::Finished),
            Err(e) => {
                self.set_state(InjectionState::Failed);
                error!("Metadata injection step {} failed: {}", self.step_name, e);
                Err(e)
            }
        }
    }
}

/// Builder for [`MetaInjectTasklet`].
///
/// ```
/// use spring_batch_metainject::tasklet::metainject::{
///     MetaInjectMetaBuilder, MetaInjectTaskletBuilder,
/// };
/// use spring_batch_metainject::transformation::engine::ParentTransformation;
///
/// # fn example() -> Result<(), spring_batch_metainject::BatchError> {
/// let parent = ParentTransformation::new("host");
/// let meta = MetaInjectMetaBuilder::new()
///     .file_name("/etl/template.ktr")
///     .target_file("/tmp/generated.ktr")
///     .no_execution(true)
///     .build();
///
/// let tasklet = MetaInjectTaskletBuilder::new("inject")
///     .meta(meta)
///     .parent(&parent)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct MetaInjectTaskletBuilder<'a> {
    step_name: String,
    meta: Option<MetaInjectMeta>,
    parent: Option<&'a ParentTransformation>,
    engine: Option<&'a dyn TransformationEngine>,
    registry: Option<&'a StepRegistry>,
    repository: Option<&'a dyn Repository>,
    lock: Option<&'a RepositoryWriteLock>,
    inputs: Vec<(String, &'a dyn ItemReader<RowMetaAndData>)>,
    output: Option<&'a dyn ItemWriter<RowMetaAndData>>,
    poll_interval: Duration,
    force_filesystem: bool,
}

impl<'a> MetaInjectTaskletBuilder<'a> {
    pub fn new(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            meta: None,
            parent: None,
            engine: None,
            registry: None,
            repository: None,
            lock: None,
            inputs: Vec::new(),
            output: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            force_filesystem: false,
        }
    }

    pub fn meta(mut self, meta: MetaInjectMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn parent(mut self, parent: &'a ParentTransformation) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn engine(mut self, engine: &'a dyn TransformationEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Step types known when loading templates. Defaults to the built-in
    /// registry.
    pub fn registry(mut self, registry: &'a StepRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn repository(mut self, repository: &'a dyn Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Lock held while writing into the repository. Defaults to
    /// [`RepositoryWriteLock::shared`].
    pub fn write_lock(mut self, lock: &'a RepositoryWriteLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Adds the rows written by host step `step_name`.
    pub fn input(mut self, step_name: &str, reader: &'a dyn ItemReader<RowMetaAndData>) -> Self {
        self.inputs.push((step_name.to_string(), reader));
        self
    }

    pub fn output(mut self, writer: &'a dyn ItemWriter<RowMetaAndData>) -> Self {
        self.output = Some(writer);
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Writes the injected template to the filesystem even with a repository.
    pub fn force_filesystem(mut self, force_filesystem: bool) -> Self {
        self.force_filesystem = force_filesystem;
        self
    }

    /// # Errors
    /// - settings or parent transformation missing
    /// - no engine while the template is to be executed
    pub fn build(self) -> Result<MetaInjectTasklet<'a>, BatchError> {
        let meta = self.meta.ok_or_else(|| {
            BatchError::Configuration(format!("step {} has no settings", self.step_name))
        })?;
        let parent = self.parent.ok_or_else(|| {
            BatchError::Configuration(format!(
                "step {} has no parent transformation",
                self.step_name
            ))
        })?;
        if self.engine.is_none() && !meta.no_execution() {
            return Err(BatchError::Configuration(format!(
                "step {} executes its template and needs an engine",
                self.step_name
            )));
        }

        Ok(MetaInjectTasklet {
            step_name: self.step_name,
            meta: RefCell::new(meta),
            parent,
            engine: self.engine,
            registry: self.registry.unwrap_or(StepRegistry::builtin()),
            repository: self.repository,
            lock: self.lock.unwrap_or(RepositoryWriteLock::shared()),
            inputs: self.inputs,
            output: self.output,
            poll_interval: self.poll_interval,
            force_filesystem: self.force_filesystem,
            state: Cell::new(InjectionState::Uninitialized),
            data: RefCell::new(InjectionData::default()),
        })
    }
}
