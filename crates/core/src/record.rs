use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Duplicate field '{field}' in schema '{schema}'")]
    DuplicateField { schema: String, field: String },
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("Column '{column}' has type {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: FieldType,
        found: FieldType,
    },
    #[error("Column '{column}' has {found} rows, batch has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Value {value:?} is not valid for type {ty}")]
    InvalidValue { ty: FieldType, value: Value },
    #[error("Row {row} out of range (len {len})")]
    RowOutOfRange { row: usize, len: usize },
    #[error("Renaming produces duplicate column '{0}'")]
    DuplicateColumn(String),
}

// ── Types and values ─────────────────────────────────────────────────────────

/// Storage type of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Float64,
    /// Second precision; sub-second parts are dropped on the way in.
    Timestamp,
    /// Text restricted to a closed set of values.
    Categorical(Arc<[String]>),
}

impl FieldType {
    pub fn categorical<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::Categorical(values.into_iter().map(Into::into).collect())
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Text, Value::Text(_)) => true,
            (FieldType::Float64, Value::Float(_)) => true,
            (FieldType::Timestamp, Value::Timestamp(_)) => true,
            (FieldType::Categorical(allowed), Value::Text(s)) => allowed.iter().any(|a| a == s),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Float64 => write!(f, "float64"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Categorical(values) => write!(f, "categorical[{}]", values.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Float(f64),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(s) => write!(f, "{s}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts.with_nanosecond(0).unwrap_or(ts))
    }
}

/// Drops sub-second parts; timestamps are stored at second precision.
fn whole_seconds(value: Value) -> Value {
    match value {
        Value::Timestamp(ts) => ts.into(),
        other => other,
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ── Payment type ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    CardPayment,
    Ecommerce,
    Transfer,
    InternalTransfer,
    Refund,
    Withdrawal,
    Deposit,
    PreauthorizedDebit,
}

impl PaymentType {
    pub const ALL: [PaymentType; 8] = [
        PaymentType::CardPayment,
        PaymentType::Ecommerce,
        PaymentType::Transfer,
        PaymentType::InternalTransfer,
        PaymentType::Refund,
        PaymentType::Withdrawal,
        PaymentType::Deposit,
        PaymentType::PreauthorizedDebit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::CardPayment => "CardPayment",
            PaymentType::Ecommerce => "Ecommerce",
            PaymentType::Transfer => "Transfer",
            PaymentType::InternalTransfer => "InternalTransfer",
            PaymentType::Refund => "Refund",
            PaymentType::Withdrawal => "Withdrawal",
            PaymentType::Deposit => "Deposit",
            PaymentType::PreauthorizedDebit => "PreauthorizedDebit",
        }
    }

    pub fn field_type() -> FieldType {
        FieldType::categorical(Self::ALL.iter().map(|p| p.as_str()))
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown payment type: '{s}'"))
    }
}

impl From<PaymentType> for Value {
    fn from(p: PaymentType) -> Self {
        Value::Text(p.as_str().to_string())
    }
}

// ── Schema ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: &str, ty: FieldType) -> Self {
        FieldDef {
            name: name.to_string(),
            ty,
        }
    }
}

/// Ordered field list of a record type. Every field defaults to null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    schema: name.to_string(),
                    field: f.name.clone(),
                });
            }
        }
        Ok(Schema {
            name: name.to_string(),
            fields,
        })
    }

    /// Base transaction record shared by every provider.
    pub fn transaction() -> Self {
        use FieldType::*;
        Schema {
            name: "transaction".to_string(),
            fields: vec![
                FieldDef::new("account_id", Text),
                FieldDef::new("archive_id", Text),
                FieldDef::new("date", Timestamp),
                FieldDef::new("amount", Float64),
                FieldDef::new("currency", Text),
                FieldDef::new("desc", Text),
                FieldDef::new("counterpart", Text),
                FieldDef::new("location", Text),
                FieldDef::new("payment_type", PaymentType::field_type()),
                FieldDef::new("payment_type_details", Text),
                FieldDef::new("extra", Text),
                FieldDef::new("ref", Text),
                FieldDef::new("notes", Text),
                FieldDef::new("category", Text),
            ],
        }
    }

    /// Appends provider fields after the existing ones.
    pub fn extend(&self, name: &str, extra: Vec<FieldDef>) -> Result<Self, SchemaError> {
        let mut fields = self.fields.clone();
        fields.extend(extra);
        Schema::new(name, fields)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

// ── Columns ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    ty: FieldType,
    values: Vec<Value>,
}

impl Column {
    pub fn new(ty: FieldType, values: Vec<Value>) -> Result<Self, SchemaError> {
        if let Some(bad) = values.iter().find(|v| !ty.accepts(v)) {
            return Err(SchemaError::InvalidValue {
                ty,
                value: bad.clone(),
            });
        }
        let values = values.into_iter().map(whole_seconds).collect();
        Ok(Column { ty, values })
    }

    pub fn nulls(ty: FieldType, len: usize) -> Self {
        Column {
            ty,
            values: vec![Value::Null; len],
        }
    }

    pub fn text<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Column {
            ty: FieldType::Text,
            values: values.into_iter().map(|s| Value::Text(s.into())).collect(),
        }
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn set(&mut self, row: usize, value: Value) -> Result<(), SchemaError> {
        if !self.ty.accepts(&value) {
            return Err(SchemaError::InvalidValue {
                ty: self.ty.clone(),
                value,
            });
        }
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(row)
            .ok_or(SchemaError::RowOutOfRange { row, len })?;
        *slot = whole_seconds(value);
        Ok(())
    }
}

// ── Record batch ─────────────────────────────────────────────────────────────

/// Ordered columnar rows with one string id per row.
///
/// Columns sit behind `Arc` and are copied on first write, so a clone is a
/// stable snapshot: later mutation of either copy never shows in the other.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    index: Arc<Vec<String>>,
    columns: IndexMap<String, Arc<Column>>,
}

impl PartialEq for RecordBatch {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.columns.len() == other.columns.len()
            && self.columns.iter().eq(other.columns.iter())
    }
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows with ids but no columns yet.
    pub fn with_index(index: Vec<String>) -> Self {
        RecordBatch {
            index: Arc::new(index),
            columns: IndexMap::new(),
        }
    }

    /// Zero rows, every schema column present.
    pub fn empty(schema: &Schema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), Arc::new(Column::nulls(f.ty.clone(), 0))))
            .collect();
        RecordBatch {
            index: Arc::new(Vec::new()),
            columns,
        }
    }

    pub fn from_columns<I>(index: Vec<String>, columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut batch = Self::with_index(index);
        for (name, column) in columns {
            if batch.columns.contains_key(&name) {
                return Err(SchemaError::DuplicateColumn(name));
            }
            batch.set_column(name, column)?;
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn set_index(&mut self, index: Vec<String>) -> Result<(), SchemaError> {
        if index.len() != self.len() {
            return Err(SchemaError::LengthMismatch {
                column: "<index>".to_string(),
                expected: self.len(),
                found: index.len(),
            });
        }
        self.index = Arc::new(index);
        Ok(())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name).map(|c| c.as_ref())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name).map(Arc::make_mut)
    }

    pub fn value(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column).and_then(|c| c.get(row))
    }

    /// Writes one cell of an existing column.
    pub fn set_value(&mut self, column: &str, row: usize, value: Value) -> Result<(), SchemaError> {
        self.column_mut(column)
            .ok_or_else(|| SchemaError::MissingColumn(column.to_string()))?
            .set(row, value)
    }

    /// Replaces a column in place or appends a new one at the end.
    pub fn set_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), SchemaError> {
        let name = name.into();
        if column.len() != self.len() {
            return Err(SchemaError::LengthMismatch {
                column: name,
                expected: self.len(),
                found: column.len(),
            });
        }
        self.columns.insert(name, Arc::new(column));
        Ok(())
    }

    /// Fills a column with the same value on every row.
    pub fn add_constant_column(
        &mut self,
        name: impl Into<String>,
        ty: FieldType,
        value: Value,
    ) -> Result<(), SchemaError> {
        let column = Column::new(ty, vec![value; self.len()])?;
        self.set_column(name, column)
    }

    /// One row as `(column, value)` pairs in column order.
    pub fn row(&self, row: usize) -> Option<Vec<(&str, &Value)>> {
        if row >= self.len() {
            return None;
        }
        Some(
            self.columns
                .iter()
                .filter_map(|(name, col)| col.get(row).map(|v| (name.as_str(), v)))
                .collect(),
        )
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.columns
            .shift_remove(name)
            .map(|c| Arc::try_unwrap(c).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Renames columns, keeping their positions. Unknown source names are ignored.
    pub fn rename_columns<K, V>(&mut self, mapping: impl IntoIterator<Item = (K, V)>) -> Result<(), SchemaError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mapping: HashMap<String, String> = mapping
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();
        let mut renamed = IndexMap::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            let target = mapping.get(name).unwrap_or(name).clone();
            if renamed.contains_key(&target) {
                return Err(SchemaError::DuplicateColumn(target));
            }
            renamed.insert(target, Arc::clone(column));
        }
        self.columns = renamed;
        Ok(())
    }

    /// Projects onto `schema`: exactly its columns, in its order, with its types.
    pub fn select(&self, schema: &Schema) -> Result<RecordBatch, SchemaError> {
        let mut columns = IndexMap::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let column = self
                .columns
                .get(&field.name)
                .ok_or_else(|| SchemaError::MissingColumn(field.name.clone()))?;
            if column.ty != field.ty {
                return Err(SchemaError::TypeMismatch {
                    column: field.name.clone(),
                    expected: field.ty.clone(),
                    found: column.ty.clone(),
                });
            }
            columns.insert(field.name.clone(), Arc::clone(column));
        }
        Ok(RecordBatch {
            index: Arc::clone(&self.index),
            columns,
        })
    }

    pub fn conforms_to(&self, schema: &Schema) -> bool {
        self.columns.len() == schema.fields().len()
            && self
                .columns
                .iter()
                .zip(schema.fields())
                .all(|((name, col), field)| *name == field.name && col.ty == field.ty)
    }

    /// Stable union: `other`'s rows go after ours. Columns missing on one side
    /// are null-filled; the batch is untouched if any shared column disagrees
    /// on type.
    pub fn append(&mut self, other: &RecordBatch) -> Result<(), SchemaError> {
        for (name, theirs) in &other.columns {
            if let Some(ours) = self.columns.get(name) {
                if ours.ty != theirs.ty {
                    return Err(SchemaError::TypeMismatch {
                        column: name.clone(),
                        expected: ours.ty.clone(),
                        found: theirs.ty.clone(),
                    });
                }
            }
        }

        let (ours_len, theirs_len) = (self.len(), other.len());
        for (name, ours) in self.columns.iter_mut() {
            let ours = Arc::make_mut(ours);
            match other.columns.get(name) {
                Some(theirs) => ours.values.extend(theirs.values.iter().cloned()),
                None => ours.values.resize(ours_len + theirs_len, Value::Null),
            }
        }
        for (name, theirs) in &other.columns {
            if !self.columns.contains_key(name) {
                let mut values = vec![Value::Null; ours_len];
                values.extend(theirs.values.iter().cloned());
                self.columns.insert(
                    name.clone(),
                    Arc::new(Column {
                        ty: theirs.ty.clone(),
                        values,
                    }),
                );
            }
        }
        Arc::make_mut(&mut self.index).extend(other.index.iter().cloned());
        Ok(())
    }

    /// Keeps the rows whose value in `column` satisfies `keep`. A missing
    /// column keeps every row.
    pub fn retain_where(&mut self, column: &str, keep: impl Fn(&Value) -> bool) {
        let Some(col) = self.columns.get(column) else {
            return;
        };
        let mask: Vec<bool> = col.values.iter().map(keep).collect();
        if mask.iter().all(|k| *k) {
            return;
        }
        for col in self.columns.values_mut() {
            let col = Arc::make_mut(col);
            let mut it = mask.iter();
            col.values.retain(|_| *it.next().unwrap_or(&true));
        }
        let mut it = mask.iter();
        Arc::make_mut(&mut self.index).retain(|_| *it.next().unwrap_or(&true));
    }
}
