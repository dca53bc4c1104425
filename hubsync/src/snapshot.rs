//! Parquet encoding of [`Table`]s and loading of the committed snapshot.
//!
//! Column types are inferred from the JSON values found in each column:
//!
//! | values in the column         | Arrow type            |
//! |------------------------------|-----------------------|
//! | only booleans                | `Boolean`             |
//! | only integers                | `Int64`               |
//! | integers and/or floats       | `Float64`             |
//! | only strings                 | `Utf8`                |
//! | nested or mixed values       | `Utf8` (JSON text)    |
//! | nulls only                   | `Utf8`                |
//!
//! Every field is nullable. Rows lacking a column are written as nulls and nulls are left
//! out of decoded rows.
//!
//! A table decoded from a snapshot remembers the committed Arrow schema. Those columns keep
//! their committed type when the table is encoded again, so rows already in the snapshot
//! are written back unchanged. Decoding goes through the Arrow JSON writer: lists, structs
//! and maps come back as JSON arrays and objects, other non-scalar types as strings.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, new_null_array};
use arrow::datatypes::{DataType, Field, FieldRef, Schema};
use arrow::json::{ArrayWriter, ReaderBuilder};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{bail, sync_error};
use crate::error::{ErrorKind, SyncResult};
use crate::repository::Repository;
use crate::table::{Row, Table};

/// Storage type chosen for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Boolean,
    Integer,
    Float,
    String,
    Json,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<ColumnKind> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(ColumnKind::Boolean),
            Value::Number(number) if number.is_i64() => Some(ColumnKind::Integer),
            Value::Number(_) => Some(ColumnKind::Float),
            Value::String(_) => Some(ColumnKind::String),
            Value::Array(_) | Value::Object(_) => Some(ColumnKind::Json),
        }
    }

    fn widen(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Json,
        }
    }

    fn infer<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
        values
            .filter_map(ColumnKind::of)
            .reduce(ColumnKind::widen)
            .unwrap_or(ColumnKind::String)
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnKind::Boolean => DataType::Boolean,
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::String | ColumnKind::Json => DataType::Utf8,
        }
    }

    fn build<'a>(self, values: impl Iterator<Item = &'a Value>) -> ArrayRef {
        match self {
            ColumnKind::Boolean => Arc::new(values.map(Value::as_bool).collect::<BooleanArray>()),
            ColumnKind::Integer => Arc::new(values.map(Value::as_i64).collect::<Int64Array>()),
            ColumnKind::Float => Arc::new(values.map(Value::as_f64).collect::<Float64Array>()),
            ColumnKind::String => Arc::new(
                values
                    .map(|value| value.as_str().map(str::to_owned))
                    .collect::<StringArray>(),
            ),
            ColumnKind::Json => Arc::new(
                values
                    .map(|value| match value {
                        Value::Null => None,
                        Value::String(text) => Some(text.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect::<StringArray>(),
            ),
        }
    }
}

/// Converts `table` into a single Arrow record batch.
pub fn to_record_batch(table: &Table) -> SyncResult<RecordBatch> {
    if table.columns().is_empty() {
        bail!(
            ErrorKind::InvalidState,
            "Cannot build a record batch from a table without columns",
            table.name()
        );
    }

    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());

    for column in table.columns() {
        let (field, array) = build_column(table, column);
        fields.push(field);
        arrays.push(array);
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;

    Ok(batch)
}

/// Encodes `table` as a Snappy-compressed Parquet file.
pub fn encode_parquet(table: &Table) -> SyncResult<Bytes> {
    let batch = to_record_batch(table)?;

    let mut buffer = Vec::new();
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;

    writer.write(&batch)?;
    writer.close()?;

    debug!(
        table = table.name(),
        rows = table.len(),
        size_bytes = buffer.len(),
        "encoded table to parquet"
    );

    Ok(Bytes::from(buffer))
}

/// Decodes a Parquet file into a table called `name`.
///
/// The returned table carries the file's Arrow schema as its committed schema.
pub fn decode_parquet(name: &str, data: Bytes) -> SyncResult<Table> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)?;
    let schema = builder.schema().clone();
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut writer = ArrayWriter::new(Vec::new());
    for batch in reader {
        writer.write(&batch?)?;
    }
    writer.finish()?;
    let buffer = writer.into_inner();

    let mut rows: Vec<Row> = if buffer.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice(&buffer).map_err(|err| {
            sync_error!(
                ErrorKind::SnapshotFormatError,
                "Snapshot rows could not be read back as JSON",
                name,
                source: err
            )
        })?
    };
    // Non-finite floats are written as null.
    for row in &mut rows {
        row.retain(|_, value| !value.is_null());
    }

    Ok(Table::from_parts(name, columns, rows).with_committed_schema(schema))
}

/// Renders at most `limit` rows of `table` as a text grid.
pub fn preview(table: &Table, limit: usize) -> SyncResult<String> {
    if table.columns().is_empty() {
        return Ok(format!("{} (empty)", table.name()));
    }

    let batch = to_record_batch(table)?;
    let shown = batch.slice(0, limit.min(batch.num_rows()));

    Ok(pretty_format_batches(&[shown])?.to_string())
}

/// Loads the snapshot at `path`, returning [`None`] when the repository has no such file.
///
/// Any other failure, including an undecodable snapshot, is returned as an error.
pub async fn load_snapshot<R>(repository: &R, path: &str, name: &str) -> SyncResult<Option<Table>>
where
    R: Repository,
{
    let data = match repository.download(path).await {
        Ok(data) => data,
        Err(err) if err.is_not_found() => {
            info!(repo_id = repository.repo_id(), path, "snapshot does not exist");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let table = decode_parquet(name, data)?;
    info!(
        repo_id = repository.repo_id(),
        path,
        rows = table.len(),
        columns = table.columns().len(),
        "loaded snapshot"
    );

    Ok(Some(table))
}

/// Returns the first field of `row` whose value would change the committed type of its
/// column, if any.
pub fn misfit_column<'a>(table: &Table, row: &'a Row) -> Option<&'a str> {
    row.iter()
        .find(|(column, value)| {
            table
                .committed_field(column)
                .is_some_and(|field| !fits_committed_field(field, value))
        })
        .map(|(column, _)| column.as_str())
}

/// Returns `true` when `value` can be stored in a column committed as `field`.
///
/// Text columns take any value as JSON text. Types without a JSON counterpart are not
/// checked.
fn fits_committed_field(field: &FieldRef, value: &Value) -> bool {
    let Some(kind) = ColumnKind::of(value) else {
        return true;
    };

    match field.data_type() {
        DataType::Boolean => kind == ColumnKind::Boolean,
        data_type if data_type.is_integer() => {
            kind == ColumnKind::Integer && decode_column(field, [value].into_iter()).is_ok()
        }
        data_type if data_type.is_floating() => {
            matches!(kind, ColumnKind::Integer | ColumnKind::Float)
        }
        DataType::List(_)
        | DataType::LargeList(_)
        | DataType::FixedSizeList(_, _)
        | DataType::Struct(_)
        | DataType::Map(_, _) => decode_column(field, [value].into_iter()).is_ok(),
        _ => true,
    }
}

fn build_column(table: &Table, column: &str) -> (Field, ArrayRef) {
    if let Some(field) = table.committed_field(column) {
        match committed_column(field, table.column_values(column)) {
            Ok(built) => return built,
            Err(err) => warn!(
                table = table.name(),
                column,
                error = %err,
                "column no longer fits its committed type, re-inferring it"
            ),
        }
    }

    let kind = ColumnKind::infer(table.column_values(column));
    (
        Field::new(column, kind.data_type(), true),
        kind.build(table.column_values(column)),
    )
}

fn committed_column<'a>(
    field: &FieldRef,
    values: impl Iterator<Item = &'a Value>,
) -> SyncResult<(Field, ArrayRef)> {
    match field.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => Ok((
            Field::new(field.name(), DataType::Utf8, true),
            ColumnKind::Json.build(values),
        )),
        _ => {
            let array = decode_column(field, values)?;
            Ok((field.as_ref().clone().with_nullable(true), array))
        }
    }
}

/// Decodes JSON `values` into an array of the type of `field`.
fn decode_column<'a>(
    field: &FieldRef,
    values: impl Iterator<Item = &'a Value>,
) -> SyncResult<ArrayRef> {
    let field: FieldRef = Arc::new(field.as_ref().clone().with_nullable(true));
    let rows: Vec<Row> = values
        .map(|value| {
            let mut row = Row::new();
            if !value.is_null() {
                row.insert(field.name().clone(), value.clone());
            }
            row
        })
        .collect();

    let mut decoder = ReaderBuilder::new(Arc::new(Schema::new(vec![field.clone()])))
        .with_batch_size(rows.len().max(1))
        .with_strict_mode(true)
        .build_decoder()?;
    decoder.serialize(&rows)?;

    Ok(match decoder.flush()? {
        Some(batch) => batch.column(0).clone(),
        None => new_null_array(field.data_type(), 0),
    })
}
