//! Reusable import steps. Provider importers compose these with their own.

use monjour_core::{Column, FieldDef, FieldType, RecordBatch, Severity, Step, Transformer, Value};
use serde_json::json;
use std::sync::Arc;

use crate::context::ImportContext;
use crate::csv::{cast_value, CastOptions};

pub type ImportStep = Arc<dyn Transformer<ImportContext, RecordBatch>>;

pub fn add_archive_id() -> ImportStep {
    Step::new("csv_importer.add_archive_id", |ctx: &mut ImportContext, mut batch: RecordBatch| {
        batch.add_constant_column("archive_id", FieldType::Text, Value::text(ctx.archive_id.as_str()))?;
        Ok(batch)
    })
    .shared()
}

pub fn add_account_id() -> ImportStep {
    Step::new("csv_importer.add_account_id", |ctx: &mut ImportContext, mut batch: RecordBatch| {
        batch.add_constant_column("account_id", FieldType::Text, Value::text(ctx.account.id.as_str()))?;
        Ok(batch)
    })
    .shared()
}

/// Re-keys rows as `{archive_id}_{i}` so the same file always yields the
/// same row ids. The previous index is kept in `csv_prev_index`.
pub fn create_deterministic_index() -> ImportStep {
    Step::new(
        "csv_importer.create_deterministic_index",
        |ctx: &mut ImportContext, mut batch: RecordBatch| {
            let previous = batch.index().to_vec();
            let index = previous
                .iter()
                .map(|i| format!("{}_{i}", ctx.archive_id))
                .collect();
            batch.set_column("csv_prev_index", Column::text(previous))?;
            batch.set_index(index)?;
            Ok(batch)
        },
    )
    .shared()
}

pub fn rename_columns(mapping: &[(&str, &str)]) -> ImportStep {
    let mapping: Vec<(String, String)> = mapping
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();
    let params: serde_json::Map<String, serde_json::Value> = mapping
        .iter()
        .map(|(from, to)| (from.clone(), json!(to)))
        .collect();
    Step::new("csv_importer.rename_columns", move |_ctx: &mut ImportContext, mut batch: RecordBatch| {
        batch.rename_columns(mapping.iter().map(|(a, b)| (a.as_str(), b.as_str())))?;
        Ok(batch)
    })
    .with_param("column_remapping", serde_json::Value::Object(params))
    .shared()
}

/// Casts the listed columns. Cells that fail to convert become null and
/// leave an error diagnostic naming the row and the original text.
pub fn cast_columns(fields: Vec<FieldDef>, options: CastOptions) -> ImportStep {
    let params: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|f| (f.name.clone(), json!(f.ty.to_string())))
        .collect();
    let fill_missing = options.fill_missing;
    Step::new("csv_importer.cast_columns", move |ctx: &mut ImportContext, batch: RecordBatch| {
        Ok(cast_batch(ctx, batch, &fields, &options)?)
    })
    .with_param("column_dtypes", serde_json::Value::Object(params))
    .with_param("fill_unavailable_cols", json!(fill_missing))
    .shared()
}

/// Like [`cast_columns`] with the account's schema as the target.
pub fn cast_to_account_schema(options: CastOptions) -> ImportStep {
    Step::new(
        "csv_importer.cast_to_account_schema",
        move |ctx: &mut ImportContext, batch: RecordBatch| {
            let fields = ctx.account.schema.fields().to_vec();
            Ok(cast_batch(ctx, batch, &fields, &options)?)
        },
    )
    .shared()
}

fn cast_batch(
    ctx: &mut ImportContext,
    mut batch: RecordBatch,
    fields: &[FieldDef],
    options: &CastOptions,
) -> Result<RecordBatch, monjour_core::SchemaError> {
    for field in fields {
        let Some(column) = batch.column(&field.name) else {
            if options.fill_missing {
                batch.set_column(field.name.clone(), Column::nulls(field.ty.clone(), batch.len()))?;
            }
            continue;
        };
        if *column.ty() == field.ty {
            continue;
        }
        let mut values = Vec::with_capacity(column.len());
        for (row, value) in column.values().iter().enumerate() {
            match cast_value(value, &field.ty, options) {
                Ok(v) => values.push(v),
                Err(reason) => {
                    let row_id = batch.index().get(row).cloned().unwrap_or_default();
                    ctx.diagnostics.push_with_payload(
                        Severity::Error,
                        format!("Cannot cast column '{}' at row {row_id}: {reason}", field.name),
                        json!({ "row": row_id, "column": field.name, "value": value.to_string() }),
                    );
                    values.push(Value::Null);
                }
            }
        }
        batch.set_column(field.name.clone(), Column::new(field.ty.clone(), values)?)?;
    }
    Ok(batch)
}

pub fn add_constant_column(name: &str, ty: FieldType, value: Value) -> ImportStep {
    let column = name.to_string();
    let label = value.to_string();
    Step::new(
        "csv_importer.add_constant_column",
        move |_ctx: &mut ImportContext, mut batch: RecordBatch| {
            batch.add_constant_column(column.clone(), ty.clone(), value.clone())?;
            Ok(batch)
        },
    )
    .with_param("column", json!(name))
    .with_param("value", json!(label))
    .shared()
}

/// Fills null or missing `currency` cells with the account currency.
pub fn add_currency_info() -> ImportStep {
    Step::new("csv_importer.add_currency_info", |ctx: &mut ImportContext, mut batch: RecordBatch| {
        let currency = Value::text(ctx.account.currency.as_str());
        match batch.column_mut("currency") {
            Some(column) => {
                for row in 0..column.len() {
                    if column.get(row).is_some_and(Value::is_null) {
                        column.set(row, currency.clone())?;
                    }
                }
            }
            None => batch.add_constant_column("currency", FieldType::Text, currency)?,
        }
        Ok(batch)
    })
    .shared()
}

/// Projects onto the account schema, dropping every other column.
pub fn remove_unused_columns() -> ImportStep {
    Step::new(
        "csv_importer.remove_useless_columns",
        |ctx: &mut ImportContext, batch: RecordBatch| Ok(batch.select(&ctx.account.schema)?),
    )
    .shared()
}

pub fn warn_if_empty() -> ImportStep {
    Step::new(
        "csv_importer.warn_if_empty_dataframe",
        |ctx: &mut ImportContext, batch: RecordBatch| {
            if batch.is_empty() {
                ctx.diagnostics
                    .warning("Empty batch after applying all transformers");
            }
            Ok(batch)
        },
    )
    .shared()
}
