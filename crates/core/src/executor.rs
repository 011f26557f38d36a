use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::transform::{Parameters, StepError, Transformer};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Step '{step}' failed in '{block}': {source}")]
    Step {
        block: String,
        step: String,
        #[source]
        source: StepError,
    },
    #[error("Block '{block}' was aborted by step '{step}'")]
    Aborted { block: String, step: String },
}

impl ExecError {
    /// Name of the step that failed.
    pub fn step(&self) -> &str {
        match self {
            ExecError::Step { step, .. } | ExecError::Aborted { step, .. } => step,
        }
    }
}

/// State of one pipeline run over a `(ctx, batch)` pair.
pub trait ExecutionBlock<C, B> {
    fn exec(&mut self, step: Arc<dyn Transformer<C, B>>) -> Result<(), ExecError>;

    /// Names of steps that completed, in order.
    fn executed(&self) -> &[String];

    fn failed_step(&self) -> Option<&str>;

    /// Current batch; `None` once a step has failed.
    fn last_result(&self) -> Option<&B>;

    fn finish(self: Box<Self>) -> Result<B, ExecError>;
}

/// Factory for execution blocks.
pub trait Executor<C, B> {
    fn new_block<'a>(
        &'a self,
        name: &str,
        ctx: &'a mut C,
        batch: B,
    ) -> Box<dyn ExecutionBlock<C, B> + 'a>
    where
        C: 'a,
        B: 'a;
}

/// Runs `pipeline` in a fresh block of `executor`.
pub fn run_pipeline<C, B>(
    executor: &dyn Executor<C, B>,
    name: &str,
    ctx: &mut C,
    batch: B,
    pipeline: &[Arc<dyn Transformer<C, B>>],
) -> Result<B, ExecError> {
    let mut block = executor.new_block(name, ctx, batch);
    for step in pipeline {
        block.exec(Arc::clone(step))?;
    }
    block.finish()
}

fn run_step<C, B>(
    block: &str,
    step: &dyn Transformer<C, B>,
    ctx: &mut C,
    batch: B,
) -> Result<B, ExecError> {
    tracing::debug!(block, step = step.name(), "applying step");
    step.apply(ctx, batch).map_err(|source| ExecError::Step {
        block: block.to_string(),
        step: step.name().to_string(),
        source,
    })
}

// ── Shared block bookkeeping ─────────────────────────────────────────────────

struct BlockState<'a, C, B> {
    name: String,
    ctx: &'a mut C,
    batch: Option<B>,
    executed: Vec<String>,
    failed: Option<String>,
}

impl<'a, C, B> BlockState<'a, C, B> {
    fn new(name: &str, ctx: &'a mut C, batch: B) -> Self {
        BlockState {
            name: name.to_string(),
            ctx,
            batch: Some(batch),
            executed: Vec::new(),
            failed: None,
        }
    }

    fn aborted(&self) -> Option<ExecError> {
        self.failed.as_ref().map(|step| ExecError::Aborted {
            block: self.name.clone(),
            step: step.clone(),
        })
    }

    fn take_batch(&mut self) -> Result<B, ExecError> {
        if let Some(err) = self.aborted() {
            return Err(err);
        }
        self.batch.take().ok_or_else(|| ExecError::Aborted {
            block: self.name.clone(),
            step: "<unknown>".to_string(),
        })
    }

    fn succeed(&mut self, step: String, batch: B) {
        self.executed.push(step);
        self.batch = Some(batch);
    }

    fn run(&mut self, step: &dyn Transformer<C, B>) -> Result<(), ExecError> {
        let batch = self.take_batch()?;
        match run_step(&self.name, step, &mut *self.ctx, batch) {
            Ok(out) => {
                self.succeed(step.name().to_string(), out);
                Ok(())
            }
            Err(e) => {
                self.failed = Some(step.name().to_string());
                Err(e)
            }
        }
    }

    fn finish(&mut self) -> Result<B, ExecError> {
        let out = self.take_batch()?;
        tracing::debug!(block = %self.name, steps = self.executed.len(), "block finished");
        Ok(out)
    }
}

// ── Immediate ────────────────────────────────────────────────────────────────

/// Runs every step as soon as it is handed to the block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

struct ImmediateBlock<'a, C, B> {
    state: BlockState<'a, C, B>,
}

impl<C, B> ExecutionBlock<C, B> for ImmediateBlock<'_, C, B> {
    fn exec(&mut self, step: Arc<dyn Transformer<C, B>>) -> Result<(), ExecError> {
        self.state.run(step.as_ref())
    }

    fn executed(&self) -> &[String] {
        &self.state.executed
    }

    fn failed_step(&self) -> Option<&str> {
        self.state.failed.as_deref()
    }

    fn last_result(&self) -> Option<&B> {
        self.state.batch.as_ref()
    }

    fn finish(mut self: Box<Self>) -> Result<B, ExecError> {
        self.state.finish()
    }
}

impl<C, B> Executor<C, B> for ImmediateExecutor {
    fn new_block<'a>(
        &'a self,
        name: &str,
        ctx: &'a mut C,
        batch: B,
    ) -> Box<dyn ExecutionBlock<C, B> + 'a>
    where
        C: 'a,
        B: 'a,
    {
        Box::new(ImmediateBlock {
            state: BlockState::new(name, ctx, batch),
        })
    }
}

// ── Deferred ─────────────────────────────────────────────────────────────────

/// Queues steps and runs them all on `finish`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeferredExecutor;

struct DeferredBlock<'a, C, B> {
    state: BlockState<'a, C, B>,
    queue: Vec<Arc<dyn Transformer<C, B>>>,
}

impl<C, B> ExecutionBlock<C, B> for DeferredBlock<'_, C, B> {
    fn exec(&mut self, step: Arc<dyn Transformer<C, B>>) -> Result<(), ExecError> {
        self.queue.push(step);
        Ok(())
    }

    fn executed(&self) -> &[String] {
        &self.state.executed
    }

    fn failed_step(&self) -> Option<&str> {
        self.state.failed.as_deref()
    }

    fn last_result(&self) -> Option<&B> {
        self.state.batch.as_ref()
    }

    fn finish(mut self: Box<Self>) -> Result<B, ExecError> {
        for step in std::mem::take(&mut self.queue) {
            self.state.run(step.as_ref())?;
        }
        self.state.finish()
    }
}

impl<C, B> Executor<C, B> for DeferredExecutor {
    fn new_block<'a>(
        &'a self,
        name: &str,
        ctx: &'a mut C,
        batch: B,
    ) -> Box<dyn ExecutionBlock<C, B> + 'a>
    where
        C: 'a,
        B: 'a,
    {
        Box::new(DeferredBlock {
            state: BlockState::new(name, ctx, batch),
            queue: Vec::new(),
        })
    }
}

// ── Recording ────────────────────────────────────────────────────────────────

/// How the recording executor copies values it keeps.
pub trait SnapshotStrategy<T>: Send + Sync {
    fn snapshot(&self, value: &T) -> T;
}

/// Snapshot by `Clone`. For `RecordBatch` this shares columns copy-on-write.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepCopy;

impl<T: Clone> SnapshotStrategy<T> for DeepCopy {
    fn snapshot(&self, value: &T) -> T {
        value.clone()
    }
}

/// Before/after record of one step.
#[derive(Debug, Clone)]
pub struct Transformation<C, B> {
    pub name: String,
    pub parameters: Parameters,
    pub input: (C, B),
    /// `None` when the step failed.
    pub output: Option<B>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedRun<C, B> {
    pub name: String,
    pub transformations: Vec<Transformation<C, B>>,
}

impl<C, B> RecordedRun<C, B> {
    pub fn failed(&self) -> bool {
        self.transformations.iter().any(|t| t.error.is_some())
    }
}

/// Runs steps immediately and keeps a snapshot of every step's input and
/// output. Runs are stored when their block is dropped, including runs that
/// stopped on an error.
pub struct RecordingExecutor<C, B, S = DeepCopy> {
    snapshot: S,
    runs: Mutex<Vec<RecordedRun<C, B>>>,
}

impl<C, B> RecordingExecutor<C, B> {
    pub fn new() -> Self {
        Self::with_strategy(DeepCopy)
    }
}

impl<C, B> Default for RecordingExecutor<C, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, B, S> RecordingExecutor<C, B, S> {
    pub fn with_strategy(snapshot: S) -> Self {
        RecordingExecutor {
            snapshot,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn take_runs(&self) -> Vec<RecordedRun<C, B>> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *runs)
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct RecordingBlock<'a, C, B, S> {
    state: BlockState<'a, C, B>,
    snapshot: &'a S,
    store: &'a Mutex<Vec<RecordedRun<C, B>>>,
    run: Option<RecordedRun<C, B>>,
}

impl<C, B, S> RecordingBlock<'_, C, B, S> {
    fn record(&mut self, t: Transformation<C, B>) {
        if let Some(run) = self.run.as_mut() {
            run.transformations.push(t);
        }
    }
}

impl<C, B, S> ExecutionBlock<C, B> for RecordingBlock<'_, C, B, S>
where
    S: SnapshotStrategy<C> + SnapshotStrategy<B>,
{
    fn exec(&mut self, step: Arc<dyn Transformer<C, B>>) -> Result<(), ExecError> {
        let batch = self.state.take_batch()?;
        let input = (
            <S as SnapshotStrategy<C>>::snapshot(self.snapshot, &*self.state.ctx),
            <S as SnapshotStrategy<B>>::snapshot(self.snapshot, &batch),
        );
        let name = step.name().to_string();
        let parameters = step.parameters();

        match run_step(&self.state.name, step.as_ref(), &mut *self.state.ctx, batch) {
            Ok(out) => {
                let output = <S as SnapshotStrategy<B>>::snapshot(self.snapshot, &out);
                self.record(Transformation {
                    name: name.clone(),
                    parameters,
                    input,
                    output: Some(output),
                    error: None,
                });
                tracing::debug!(block = %self.state.name, step = %name, "transformation recorded");
                self.state.succeed(name, out);
                Ok(())
            }
            Err(e) => {
                self.record(Transformation {
                    name: name.clone(),
                    parameters,
                    input,
                    output: None,
                    error: Some(e.to_string()),
                });
                self.state.failed = Some(name);
                Err(e)
            }
        }
    }

    fn executed(&self) -> &[String] {
        &self.state.executed
    }

    fn failed_step(&self) -> Option<&str> {
        self.state.failed.as_deref()
    }

    fn last_result(&self) -> Option<&B> {
        self.state.batch.as_ref()
    }

    fn finish(mut self: Box<Self>) -> Result<B, ExecError> {
        self.state.finish()
    }
}

impl<C, B, S> Drop for RecordingBlock<'_, C, B, S> {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            tracing::debug!(block = %run.name, steps = run.transformations.len(), "recorded run ended");
            self.store
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(run);
        }
    }
}

impl<C, B, S> Executor<C, B> for RecordingExecutor<C, B, S>
where
    S: SnapshotStrategy<C> + SnapshotStrategy<B>,
{
    fn new_block<'a>(
        &'a self,
        name: &str,
        ctx: &'a mut C,
        batch: B,
    ) -> Box<dyn ExecutionBlock<C, B> + 'a>
    where
        C: 'a,
        B: 'a,
    {
        Box::new(RecordingBlock {
            state: BlockState::new(name, ctx, batch),
            snapshot: &self.snapshot,
            store: &self.runs,
            run: Some(RecordedRun {
                name: name.to_string(),
                transformations: Vec::new(),
            }),
        })
    }
}
