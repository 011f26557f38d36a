//! Combining account ledgers into the master batch.
//!
//! A merge is one pipeline run whose steps are the accounts' mergers, in
//! account order. [`MergeContext`] carries the queue of account batches and a
//! cursor naming the account whose merger is running.

use monjour_core::{
    AccountId, Category, Diagnostics, Executor, Parameters, RecordBatch, SchemaError, StepError,
    Transformer,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("No account is being merged")]
    NoCurrentAccount,
    #[error("No account left to merge")]
    Exhausted,
    #[error("Merger for '{expected}' ran while '{current}' was current")]
    WrongAccount { expected: AccountId, current: AccountId },
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

pub type MergeStep = Arc<dyn Transformer<MergeContext, RecordBatch>>;
pub type MergeExecutor = dyn Executor<MergeContext, RecordBatch>;

#[derive(Debug, Clone)]
pub struct MergeContext {
    pub categories: Vec<Category>,
    to_merge: VecDeque<(AccountId, RecordBatch)>,
    merged: Vec<AccountId>,
    current: Option<(AccountId, RecordBatch)>,
    pub diagnostics: Diagnostics,
}

impl MergeContext {
    pub fn new<I>(categories: Vec<Category>, accounts: I) -> Self
    where
        I: IntoIterator<Item = (AccountId, RecordBatch)>,
    {
        MergeContext {
            categories,
            to_merge: accounts.into_iter().collect(),
            merged: Vec::new(),
            current: None,
            diagnostics: Diagnostics::with_prefix("MergeContext"),
        }
    }

    /// Moves the cursor to the next queued account.
    pub fn advance(&mut self) -> Result<&AccountId, MergeError> {
        let next = self.to_merge.pop_front().ok_or(MergeError::Exhausted)?;
        if let Some((done, _)) = self.current.replace(next) {
            self.merged.push(done);
        }
        self.current
            .as_ref()
            .map(|(id, _)| id)
            .ok_or(MergeError::NoCurrentAccount)
    }

    pub fn current(&self) -> Option<&AccountId> {
        self.current.as_ref().map(|(id, _)| id)
    }

    pub fn current_or_err(&self) -> Result<(&AccountId, &RecordBatch), MergeError> {
        self.current
            .as_ref()
            .map(|(id, batch)| (id, batch))
            .ok_or(MergeError::NoCurrentAccount)
    }

    /// Accounts whose merger finished before the current one.
    pub fn merged(&self) -> &[AccountId] {
        &self.merged
    }

    pub fn remaining(&self) -> usize {
        self.to_merge.len()
    }
}

/// Appends the bound account's rows to the master batch.
#[derive(Debug, Clone)]
pub struct AppendMerger {
    account: AccountId,
}

impl AppendMerger {
    pub fn new(account: AccountId) -> Self {
        AppendMerger { account }
    }

    pub fn shared(self) -> MergeStep {
        Arc::new(self)
    }
}

impl Transformer<MergeContext, RecordBatch> for AppendMerger {
    fn name(&self) -> &str {
        "merge.append"
    }

    fn parameters(&self) -> Parameters {
        Parameters::from([("account".to_string(), json!(self.account.as_str()))])
    }

    fn apply(&self, ctx: &mut MergeContext, mut master: RecordBatch) -> Result<RecordBatch, StepError> {
        let (current, batch) = ctx.current_or_err()?;
        if *current != self.account {
            return Err(MergeError::WrongAccount {
                expected: self.account.clone(),
                current: current.clone(),
            }
            .into());
        }
        if batch.is_empty() {
            let note = format!("Account '{current}' has no rows to merge");
            ctx.diagnostics.info(note);
            return Ok(master);
        }
        master.append(batch).map_err(MergeError::from)?;
        Ok(master)
    }
}

/// Advances the context before delegating, so the cursor moves with the
/// step actually running even when execution is deferred.
pub struct Advancing {
    inner: MergeStep,
}

impl Advancing {
    pub fn wrap(inner: MergeStep) -> MergeStep {
        Arc::new(Advancing { inner })
    }
}

impl Transformer<MergeContext, RecordBatch> for Advancing {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn parameters(&self) -> Parameters {
        self.inner.parameters()
    }

    fn apply(&self, ctx: &mut MergeContext, master: RecordBatch) -> Result<RecordBatch, StepError> {
        ctx.advance()?;
        self.inner.apply(ctx, master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monjour_core::{run_pipeline, Column, DeferredExecutor, ExecError, ImmediateExecutor, Value};

    fn rows(account: &str, n: usize) -> (AccountId, RecordBatch) {
        let index = (0..n).map(|i| format!("{account}_{i}")).collect();
        let batch = RecordBatch::from_columns(
            index,
            [("account_id".to_string(), Column::text(vec![account; n]))],
        )
        .unwrap();
        (AccountId::from(account), batch)
    }

    fn appenders(ids: &[&str]) -> Vec<MergeStep> {
        ids.iter()
            .map(|id| Advancing::wrap(AppendMerger::new(AccountId::from(*id)).shared()))
            .collect()
    }

    #[test]
    fn advance_walks_the_queue() {
        let mut ctx = MergeContext::new(Vec::new(), [rows("a", 1), rows("b", 1)]);
        assert!(matches!(ctx.current_or_err(), Err(MergeError::NoCurrentAccount)));
        assert_eq!(ctx.advance().unwrap().as_str(), "a");
        assert_eq!(ctx.advance().unwrap().as_str(), "b");
        assert_eq!(ctx.merged(), &[AccountId::from("a")]);
        assert_eq!(ctx.remaining(), 0);
        assert!(matches!(ctx.advance(), Err(MergeError::Exhausted)));
    }

    #[test]
    fn append_keeps_account_order() {
        let mut ctx = MergeContext::new(Vec::new(), [rows("a", 2), rows("b", 1), rows("c", 2)]);
        let master = run_pipeline(
            &ImmediateExecutor,
            "merge",
            &mut ctx,
            RecordBatch::new(),
            &appenders(&["a", "b", "c"]),
        )
        .unwrap();
        let owners: Vec<_> = master
            .column("account_id")
            .unwrap()
            .values()
            .iter()
            .filter_map(Value::as_text)
            .collect();
        assert_eq!(owners, ["a", "a", "b", "c", "c"]);
    }

    #[test]
    fn deferred_merge_matches_immediate() {
        let accounts = || [rows("a", 1), rows("b", 2)];
        let steps = appenders(&["a", "b"]);
        let mut c1 = MergeContext::new(Vec::new(), accounts());
        let mut c2 = MergeContext::new(Vec::new(), accounts());
        let now = run_pipeline(&ImmediateExecutor, "m", &mut c1, RecordBatch::new(), &steps).unwrap();
        let later = run_pipeline(&DeferredExecutor, "m", &mut c2, RecordBatch::new(), &steps).unwrap();
        assert_eq!(now, later);
    }

    #[test]
    fn merger_bound_to_another_account_fails() {
        let mut ctx = MergeContext::new(Vec::new(), [rows("a", 1)]);
        let err = run_pipeline(
            &ImmediateExecutor,
            "merge",
            &mut ctx,
            RecordBatch::new(),
            &appenders(&["b"]),
        )
        .unwrap_err();
        let ExecError::Step { source, .. } = err else {
            panic!("expected a step failure");
        };
        assert!(matches!(
            source.downcast_ref::<MergeError>(),
            Some(MergeError::WrongAccount { .. })
        ));
    }

    #[test]
    fn empty_account_leaves_an_info_note() {
        let mut ctx = MergeContext::new(Vec::new(), [rows("a", 0)]);
        let master =
            run_pipeline(&ImmediateExecutor, "m", &mut ctx, RecordBatch::new(), &appenders(&["a"])).unwrap();
        assert!(master.is_empty());
        assert_eq!(ctx.diagnostics.len(), 1);
    }
}
