//! Ordered registry of lifecycle and skip hooks for a chunk step.
//!
//! Hooks run in registration order and receive the step's single
//! [`StepExecution`]. Anything they log is queued on it and written by the
//! engine.

use super::execution::StepExecution;
use super::skip::StepError;

type LifecycleHook = Box<dyn Fn(&mut StepExecution) + Send + Sync>;
type ChunkHook = Box<dyn Fn(&mut StepExecution, usize) + Send + Sync>;
type ReadSkipHook = Box<dyn Fn(&mut StepExecution, &StepError) + Send + Sync>;
type ProcessSkipHook<I> = Box<dyn Fn(&mut StepExecution, &I, &StepError) + Send + Sync>;
type WriteSkipHook<O> = Box<dyn Fn(&mut StepExecution, &[O], &StepError) + Send + Sync>;

pub struct StepHooks<I, O> {
    before_step: Vec<LifecycleHook>,
    after_step: Vec<LifecycleHook>,
    after_chunk: Vec<ChunkHook>,
    skip_in_read: Vec<ReadSkipHook>,
    skip_in_process: Vec<ProcessSkipHook<I>>,
    skip_in_write: Vec<WriteSkipHook<O>>,
}

impl<I, O> Default for StepHooks<I, O> {
    fn default() -> Self {
        Self {
            before_step: Vec::new(),
            after_step: Vec::new(),
            after_chunk: Vec::new(),
            skip_in_read: Vec::new(),
            skip_in_process: Vec::new(),
            skip_in_write: Vec::new(),
        }
    }
}

impl<I, O> StepHooks<I, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs after the count estimate, before the START line.
    pub fn before_step(mut self, f: impl Fn(&mut StepExecution) + Send + Sync + 'static) -> Self {
        self.before_step.push(Box::new(f));
        self
    }

    /// Runs after the END line, before the result is recorded.
    pub fn after_step(mut self, f: impl Fn(&mut StepExecution) + Send + Sync + 'static) -> Self {
        self.after_step.push(Box::new(f));
        self
    }

    /// Runs after each committed chunk with its size.
    pub fn after_chunk(
        mut self,
        f: impl Fn(&mut StepExecution, usize) + Send + Sync + 'static,
    ) -> Self {
        self.after_chunk.push(Box::new(f));
        self
    }

    pub fn on_skip_in_read(
        mut self,
        f: impl Fn(&mut StepExecution, &StepError) + Send + Sync + 'static,
    ) -> Self {
        self.skip_in_read.push(Box::new(f));
        self
    }

    pub fn on_skip_in_process(
        mut self,
        f: impl Fn(&mut StepExecution, &I, &StepError) + Send + Sync + 'static,
    ) -> Self {
        self.skip_in_process.push(Box::new(f));
        self
    }

    pub fn on_skip_in_write(
        mut self,
        f: impl Fn(&mut StepExecution, &[O], &StepError) + Send + Sync + 'static,
    ) -> Self {
        self.skip_in_write.push(Box::new(f));
        self
    }

    pub(crate) fn fire_before_step(&self, exec: &mut StepExecution) {
        for hook in &self.before_step {
            hook(exec);
        }
    }

    pub(crate) fn fire_after_step(&self, exec: &mut StepExecution) {
        for hook in &self.after_step {
            hook(exec);
        }
    }

    pub(crate) fn fire_after_chunk(&self, exec: &mut StepExecution, size: usize) {
        for hook in &self.after_chunk {
            hook(exec, size);
        }
    }

    pub(crate) fn fire_skip_in_read(&self, exec: &mut StepExecution, err: &StepError) {
        for hook in &self.skip_in_read {
            hook(exec, err);
        }
    }

    pub(crate) fn fire_skip_in_process(&self, exec: &mut StepExecution, item: &I, err: &StepError) {
        for hook in &self.skip_in_process {
            hook(exec, item, err);
        }
    }

    pub(crate) fn fire_skip_in_write(
        &self,
        exec: &mut StepExecution,
        chunk: &[O],
        err: &StepError,
    ) {
        for hook in &self.skip_in_write {
            hook(exec, chunk, err);
        }
    }
}
