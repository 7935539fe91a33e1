use std::time::{Duration, Instant};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

/// Status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step has been created but not started yet.
    Starting,
    /// The step is running.
    Started,
    /// The step ended without error.
    Success,
    /// The step ended with an error.
    Failed,
    /// The step was interrupted by a stop request.
    Stopped,
}

/// Runtime information about one execution of a step.
///
/// Besides timing, a step execution carries the row counters a step reports
/// to its host: lines input/output/read/written/updated/rejected and the
/// number of errors.
#[derive(Debug)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Rows read from a source outside of the row stream (files, databases...)
    pub lines_input: u64,
    /// Rows written to a target outside of the row stream
    pub lines_output: u64,
    /// Rows read from previous steps
    pub lines_read: u64,
    /// Rows written to next steps
    pub lines_written: u64,
    pub lines_updated: u64,
    pub lines_rejected: u64,
    /// Number of errors reported by the step
    pub errors: u64,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::default(),
            lines_input: 0,
            lines_output: 0,
            lines_read: 0,
            lines_written: 0,
            lines_updated: 0,
            lines_rejected: 0,
            errors: 0,
        }
    }
}

/// A domain object that encapsulates an independent phase of a job.
pub trait Step {
    /// Executes the step, updating `step_execution` along the way.
    ///
    /// # Returns
    /// - `Ok(())`: The step completed successfully
    /// - `Err(BatchError)`: The step failed
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError>;

    fn get_name(&self) -> &str;
}

/// Tells a [`TaskletStep`] whether its tasklet wants to be called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStatus {
    /// The tasklet can continue to execute.
    Continuable,
    /// The tasklet has finished executing.
    Finished,
}

/// A single task run inside a step, as opposed to chunk oriented processing.
pub trait Tasklet {
    fn execute(&self, step_execution: &mut StepExecution) -> Result<RepeatStatus, BatchError>;
}

/// A step that repeatedly runs a [`Tasklet`] until it reports
/// [`RepeatStatus::Finished`] or fails.
pub struct TaskletStep<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
}

impl Step for TaskletStep<'_> {
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        step_execution.start_time = start_time;
        step_execution.status = StepStatus::Started;

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        let result = loop {
            match self.tasklet.execute(step_execution) {
                Ok(RepeatStatus::Continuable) => continue,
                Ok(RepeatStatus::Finished) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                // a tasklet may already have flagged the execution as stopped
                if step_execution.status == StepStatus::Started {
                    step_execution.status = StepStatus::Success;
                }
                info!(
                    "End of step: {}, id: {}",
                    step_execution.name, step_execution.id
                );
                Ok(())
            }
            Err(err) => {
                step_execution.status = StepStatus::Failed;
                error!("Step {} failed: {}", step_execution.name, err);
                Err(err)
            }
        }
    }

    fn get_name(&self) -> &str {
        &self.name
    }
}

pub struct TaskletBuilder<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
}

impl<'a> TaskletBuilder<'a> {
    pub fn build(self) -> TaskletStep<'a> {
        TaskletStep {
            name: self.name,
            tasklet: self.tasklet,
        }
    }
}

/// Entry point for building steps.
///
/// ```
/// use spring_batch_metainject::core::step::{
///     RepeatStatus, Step, StepBuilder, StepExecution, StepStatus, Tasklet,
/// };
/// use spring_batch_metainject::BatchError;
///
/// struct Hello;
///
/// impl Tasklet for Hello {
///     fn execute(&self, step_execution: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
///         step_execution.lines_written += 1;
///         Ok(RepeatStatus::Finished)
///     }
/// }
///
/// let tasklet = Hello;
/// let step = StepBuilder::new("hello").tasklet(&tasklet).build();
///
/// let mut execution = StepExecution::new(step.get_name());
/// step.execute(&mut execution).unwrap();
/// assert_eq!(execution.status, StepStatus::Success);
/// assert_eq!(execution.lines_written, 1);
/// ```
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn tasklet(self, tasklet: &dyn Tasklet) -> TaskletBuilder<'_> {
        TaskletBuilder {
            name: self.name,
            tasklet,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct CountingTasklet {
        calls: Cell<usize>,
        rounds: usize,
    }

    impl Tasklet for CountingTasklet {
        fn execute(&self, step_execution: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
            self.calls.set(self.calls.get() + 1);
            step_execution.lines_read += 1;
            if self.calls.get() < self.rounds {
                Ok(RepeatStatus::Continuable)
            } else {
                Ok(RepeatStatus::Finished)
            }
        }
    }

    struct FailingTasklet;

    impl Tasklet for FailingTasklet {
        fn execute(&self, _step_execution: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
            Err(BatchError::Tasklet("boom".to_string()))
        }
    }

    #[test]
    fn tasklet_step_repeats_until_finished() -> Result<(), BatchError> {
        let tasklet = CountingTasklet {
            calls: Cell::new(0),
            rounds: 3,
        };
        let step = StepBuilder::new("count").tasklet(&tasklet).build();

        let mut execution = StepExecution::new("count");
        step.execute(&mut execution)?;

        assert_eq!(tasklet.calls.get(), 3);
        assert_eq!(execution.lines_read, 3);
        assert_eq!(execution.status, StepStatus::Success);
        assert_eq!(step.get_name(), "count");
        Ok(())
    }

    #[test]
    fn tasklet_error_fails_the_step() {
        let tasklet = FailingTasklet;
        let step = StepBuilder::new("fail").tasklet(&tasklet).build();

        let mut execution = StepExecution::new("fail");
        let result = step.execute(&mut execution);

        assert!(matches!(result, Err(BatchError::Tasklet(_))));
        assert_eq!(execution.status, StepStatus::Failed);
    }
}
