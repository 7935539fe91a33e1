use std::time::{Duration, Instant};

use log::info;
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{Step, StepExecution},
};

/// Type alias for job execution results.
type JobResult<T> = Result<T, BatchError>;

/// Represents a job that can be executed.
///
/// A job is a container for a sequence of steps that are executed in order.
/// The first failing step aborts the job.
pub trait Job {
    /// Runs the job and returns the result of the job execution.
    ///
    /// # Returns
    /// - `Ok(JobExecution)` when every step succeeded
    /// - `Err(BatchError::Step)` naming the first step that failed
    fn run(&self) -> JobResult<JobExecution>;
}

/// Timing and per-step details of a finished job run.
#[derive(Debug)]
pub struct JobExecution {
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    /// One execution per step, in run order
    pub step_executions: Vec<StepExecution>,
}

/// A configured job, built with [`JobBuilder`].
pub struct JobInstance<'a> {
    id: Uuid,
    name: String,
    steps: Vec<&'a dyn Step>,
}

impl JobInstance<'_> {
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

impl Job for JobInstance<'_> {
    fn run(&self) -> JobResult<JobExecution> {
        let start = Instant::now();

        info!("Start of job: {}, id: {}", self.name, self.id);

        let mut step_executions = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let mut step_execution = StepExecution::new(step.get_name());
            let result = step.execute(&mut step_execution);
            step_executions.push(step_execution);

            if result.is_err() {
                return Err(BatchError::Step(step.get_name().to_owned()));
            }
        }

        info!("End of job: {}, id: {}", self.name, self.id);

        Ok(JobExecution {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            step_executions,
        })
    }
}

/// Builder for creating a job instance.
///
/// ```
/// use spring_batch_metainject::core::job::{Job, JobBuilder};
/// use spring_batch_metainject::core::step::{RepeatStatus, StepBuilder, StepExecution, Tasklet};
/// use spring_batch_metainject::BatchError;
///
/// struct Noop;
///
/// impl Tasklet for Noop {
///     fn execute(&self, _: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
///         Ok(RepeatStatus::Finished)
///     }
/// }
///
/// let tasklet = Noop;
/// let step = StepBuilder::new("noop").tasklet(&tasklet).build();
/// let job = JobBuilder::new().name("nightly".to_string()).start(&step).build();
///
/// let execution = job.run().unwrap();
/// assert_eq!(execution.step_executions.len(), 1);
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    /// Optional name for the job (generated randomly if not specified)
    name: Option<String>,
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    /// Sets the first step of the job.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step to the job. Steps are executed in the order they are added.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    pub fn build(self) -> JobInstance<'a> {
        JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::step::{RepeatStatus, StepBuilder, StepStatus, Tasklet};

    use super::*;

    struct Outcome(bool);

    impl Tasklet for Outcome {
        fn execute(&self, _: &mut StepExecution) -> Result<RepeatStatus, BatchError> {
            if self.0 {
                Ok(RepeatStatus::Finished)
            } else {
                Err(BatchError::Tasklet("failed on purpose".to_string()))
            }
        }
    }

    #[test]
    fn runs_steps_in_order() -> Result<(), BatchError> {
        let ok = Outcome(true);
        let first = StepBuilder::new("first").tasklet(&ok).build();
        let second = StepBuilder::new("second").tasklet(&ok).build();

        let job = JobBuilder::new().start(&first).next(&second).build();
        let execution = job.run()?;

        let names: Vec<&str> = execution
            .step_executions
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(execution
            .step_executions
            .iter()
            .all(|s| s.status == StepStatus::Success));
        Ok(())
    }

    #[test]
    fn failing_step_aborts_the_job() {
        let ok = Outcome(true);
        let ko = Outcome(false);
        let first = StepBuilder::new("broken").tasklet(&ko).build();
        let second = StepBuilder::new("never").tasklet(&ok).build();

        let job = JobBuilder::new().start(&first).next(&second).build();
        let result = job.run();

        match result {
            Err(BatchError::Step(name)) => assert_eq!(name, "broken"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn generated_name_when_not_set() {
        let job = JobBuilder::new().build();
        assert_eq!(job.get_name().len(), 8);
    }
}
