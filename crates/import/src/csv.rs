use chrono::{NaiveDate, NaiveDateTime};
use monjour_core::{run_pipeline, Column, DateRange, FieldType, Pipeline, RecordBatch, Value};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::context::ImportContext;
use crate::importer::{ImportError, ImportExecutor, Importer, ImporterInfo};

// ── Reading ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub has_header: bool,
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            trim: true,
        }
    }
}

impl CsvOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Reads a CSV file into an all-text batch indexed `0..n`.
///
/// Empty cells and cells missing from short rows become nulls. Without a
/// header row, columns are named by position.
pub fn read_csv(content: &[u8], options: &CsvOptions) -> Result<RecordBatch, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(options.has_header)
        .delimiter(options.delimiter)
        .flexible(true)
        .trim(if options.trim { csv::Trim::All } else { csv::Trim::None })
        .from_reader(content);

    let mut names: Vec<String> = if options.has_header {
        reader
            .byte_headers()?
            .iter()
            .map(|h| String::from_utf8_lossy(h).into_owned())
            .collect()
    } else {
        Vec::new()
    };
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for result in reader.byte_records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        while names.len() < record.len() {
            names.push(names.len().to_string());
        }
        rows.push(
            record
                .iter()
                .map(|f| {
                    if f.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(String::from_utf8_lossy(f).into_owned())
                    }
                })
                .collect(),
        );
    }

    let index = (0..rows.len()).map(|i| i.to_string()).collect();
    let mut columns = Vec::with_capacity(names.len());
    for (c, name) in names.into_iter().enumerate() {
        let values = rows
            .iter()
            .map(|row| row.get(c).cloned().unwrap_or_default())
            .collect();
        columns.push((name, Column::new(FieldType::Text, values)?));
    }
    Ok(RecordBatch::from_columns(index, columns)?)
}

// ── Value parsing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal: char,
    pub thousands: Option<char>,
}

impl NumberFormat {
    /// `1,234.56`
    pub const DOT: NumberFormat = NumberFormat {
        decimal: '.',
        thousands: Some(','),
    };
    /// `1.234,56`
    pub const COMMA: NumberFormat = NumberFormat {
        decimal: ',',
        thousands: Some('.'),
    };

    /// Parses an amount. Accounting parentheses mean negative.
    pub fn parse(&self, s: &str) -> Option<f64> {
        let s = s.trim();
        let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
            (true, &s[1..s.len() - 1])
        } else {
            (false, s)
        };
        let mut cleaned = String::with_capacity(s.len());
        for ch in s.chars() {
            if Some(ch) == self.thousands || ch.is_whitespace() || ch == '$' || ch == '€' {
                continue;
            }
            cleaned.push(if ch == self.decimal { '.' } else { ch });
        }
        let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);
        if cleaned.is_empty() {
            return None;
        }
        let mut dec = Decimal::from_str(cleaned).ok()?;
        if negative {
            dec = -dec;
        }
        dec.to_f64()
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::DOT
    }
}

/// Ordered date/datetime formats tried until one parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    formats: Vec<String>,
}

const ISO_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d"];
const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y",
    "%d-%m-%Y",
];

impl DateFormat {
    pub fn iso() -> Self {
        DateFormat {
            formats: ISO_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// European `dd/mm/yyyy` first, ISO as a fallback.
    pub fn day_first() -> Self {
        DateFormat {
            formats: DAY_FIRST_FORMATS
                .iter()
                .chain(ISO_FORMATS)
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Tries `format` before the existing ones.
    pub fn with_format(mut self, format: &str) -> Self {
        self.formats.insert(0, format.to_string());
        self
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    pub fn parse(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        self.formats.iter().find_map(|fmt| {
            NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
                NaiveDate::parse_from_str(s, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::iso()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CastOptions {
    pub numbers: NumberFormat,
    pub dates: DateFormat,
    /// Create missing target columns filled with nulls.
    pub fill_missing: bool,
}

impl CastOptions {
    pub fn new(numbers: NumberFormat, dates: DateFormat) -> Self {
        CastOptions {
            numbers,
            dates,
            fill_missing: true,
        }
    }
}

/// Converts one cell to `ty`. Empty text becomes null.
pub fn cast_value(value: &Value, ty: &FieldType, options: &CastOptions) -> Result<Value, String> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::Text(s) if s.trim().is_empty() => return Ok(Value::Null),
        Value::Text(s) => s.as_str(),
        other if ty.accepts(other) => return Ok(other.clone()),
        other => return Err(format!("cannot convert {other:?} to {ty}")),
    };
    match ty {
        FieldType::Text => Ok(Value::text(text)),
        FieldType::Float64 => options
            .numbers
            .parse(text)
            .map(Value::Float)
            .ok_or_else(|| format!("'{text}' is not a number")),
        FieldType::Timestamp => options
            .dates
            .parse(text)
            .map(Value::from)
            .ok_or_else(|| format!("'{text}' is not a date")),
        FieldType::Categorical(allowed) => {
            if allowed.iter().any(|a| a == text) {
                Ok(Value::text(text))
            } else {
                Err(format!("'{text}' is not one of {allowed:?}"))
            }
        }
    }
}

// ── Importer ─────────────────────────────────────────────────────────────────

/// Declarative CSV importer: read options plus an ordered step list.
pub struct CsvImporter {
    info: ImporterInfo,
    csv: CsvOptions,
    date_column: String,
    dates: DateFormat,
    pipeline: Pipeline<ImportContext, RecordBatch>,
}

impl CsvImporter {
    pub fn new(info: ImporterInfo, csv: CsvOptions, pipeline: Pipeline<ImportContext, RecordBatch>) -> Self {
        CsvImporter {
            info,
            csv,
            date_column: "date".to_string(),
            dates: DateFormat::iso(),
            pipeline,
        }
    }

    /// Source column and formats used to infer the covered date range.
    pub fn with_date_column(mut self, column: &str, dates: DateFormat) -> Self {
        self.date_column = column.to_string();
        self.dates = dates;
        self
    }

    pub fn pipeline(&self) -> &Pipeline<ImportContext, RecordBatch> {
        &self.pipeline
    }

    pub fn date_range_from_content(&self, content: &[u8]) -> Result<DateRange, ImportError> {
        let batch = read_csv(content, &self.csv)?;
        let column = batch.column(&self.date_column).ok_or_else(|| {
            ImportError::DateRangeInference(format!("\"{}\" column not found", self.date_column))
        })?;
        let dates = column
            .values()
            .iter()
            .filter_map(|v| v.as_text())
            .filter_map(|s| self.dates.parse(s));
        DateRange::covering(dates).ok_or_else(|| {
            ImportError::DateRangeInference(format!("no parseable date in \"{}\"", self.date_column))
        })
    }
}

impl std::fmt::Debug for CsvImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvImporter")
            .field("info", &self.info)
            .field("csv", &self.csv)
            .field("steps", &self.pipeline.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl Importer for CsvImporter {
    fn info(&self) -> &ImporterInfo {
        &self.info
    }

    fn import_file(
        &self,
        ctx: &mut ImportContext,
        content: &[u8],
        executor: &ImportExecutor,
    ) -> Result<RecordBatch, ImportError> {
        let batch = read_csv(content, &self.csv)?;
        let block = format!("{} {}", self.info.id, ctx.archive_id);
        Ok(run_pipeline(executor, &block, ctx, batch, &self.pipeline)?)
    }

    /// Two `YYYY-MM-DD` dates in the filename win; otherwise min/max of the
    /// date column.
    fn try_infer_date_range(
        &self,
        content: &[u8],
        filename: Option<&str>,
    ) -> Result<DateRange, ImportError> {
        if let Some(range) = filename.and_then(DateRange::infer_from_filename) {
            return Ok(range);
        }
        self.date_range_from_content(content)
    }
}
