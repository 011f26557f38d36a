pub mod account;
pub mod category;
pub mod diagnostics;
pub mod executor;
pub mod period;
pub mod record;
pub mod transform;

pub use account::{AccountId, AccountInfo};
pub use category::Category;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use executor::{
    run_pipeline, DeepCopy, DeferredExecutor, ExecError, ExecutionBlock, Executor,
    ImmediateExecutor, RecordedRun, RecordingExecutor, SnapshotStrategy, Transformation,
};
pub use period::{DateRange, PeriodError};
pub use record::{Column, FieldDef, FieldType, PaymentType, RecordBatch, Schema, SchemaError, Value};
pub use transform::{Parameters, Pipeline, Step, StepError, Transformer};
