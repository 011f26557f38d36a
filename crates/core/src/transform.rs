use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Error type a step may fail with.
pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Static construction-time parameters of a step, kept for labelling.
pub type Parameters = BTreeMap<String, serde_json::Value>;

/// One named `(ctx, batch) -> batch` unit of a pipeline.
///
/// Steps may write to the context (diagnostics) but must not touch anything
/// outside the pair they are handed.
pub trait Transformer<C, B>: Send + Sync {
    fn name(&self) -> &str;

    fn parameters(&self) -> Parameters {
        Parameters::new()
    }

    fn apply(&self, ctx: &mut C, batch: B) -> Result<B, StepError>;
}

/// An ordered list of steps; the same list runs under any executor.
pub type Pipeline<C, B> = Vec<Arc<dyn Transformer<C, B>>>;

type StepFn<C, B> = dyn Fn(&mut C, B) -> Result<B, StepError> + Send + Sync;

/// A closure with a name and optional parameters.
pub struct Step<C, B> {
    name: String,
    parameters: Parameters,
    func: Box<StepFn<C, B>>,
}

impl<C, B> Step<C, B> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut C, B) -> Result<B, StepError> + Send + Sync + 'static,
    {
        Step {
            name: name.into(),
            parameters: Parameters::new(),
            func: Box::new(func),
        }
    }

    pub fn with_param(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn shared(self) -> Arc<dyn Transformer<C, B>>
    where
        C: 'static,
        B: 'static,
    {
        Arc::new(self)
    }
}

impl<C, B> fmt::Debug for Step<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl<C, B> Transformer<C, B> for Step<C, B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Parameters {
        self.parameters.clone()
    }

    fn apply(&self, ctx: &mut C, batch: B) -> Result<B, StepError> {
        (self.func)(ctx, batch)
    }
}
