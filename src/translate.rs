//! Upstream response translation.
//!
//! Turns a buffered `UpstreamResponse` into the normalized `Translated`
//! value served to clients. The decoding path is chosen by the operation's
//! declared `Shape`, never by the content-type the upstream happens to
//! send. Values are passed through verbatim: no renaming, no unit
//! conversion, no numeric reformatting.

use serde_json::Value;

use crate::model::{FacadeError, TabularRecord, Translated, TypedReading, UpstreamResponse};
use crate::operations::Shape;

/// Top-level fields a `TypedReading` document must carry in strict mode.
const READING_FIELDS: [&str; 3] = ["station_name", "timestamp", "values"];

/// How strictly `TypedReading` documents are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingPolicy {
    /// Missing or `null` fields decode to zero values.
    #[default]
    Permissive,
    /// A missing top-level field, or a `null` anywhere in the reading, is a
    /// `DecodeError`.
    Strict,
}

/// Translates an upstream response according to `shape`.
///
/// Non-2xx statuses fail with `UpstreamError` before the body is looked
/// at; anything that does not decode as `shape` fails with `DecodeError`.
pub fn translate(
    shape: Shape,
    response: &UpstreamResponse,
    policy: ReadingPolicy,
) -> Result<Translated, FacadeError> {
    if !response.is_success() {
        return Err(FacadeError::UpstreamError {
            status: response.status,
            body: response.body_snippet(),
        });
    }

    if let Some(content_type) = &response.content_type {
        if !content_type_matches(shape, content_type) {
            tracing::debug!(?shape, %content_type, "upstream content-type disagrees with expected shape");
        }
    }

    match shape {
        Shape::TypedReading => decode_reading(&response.body, policy).map(Translated::Reading),
        Shape::OpaqueJson => decode_opaque(&response.body).map(Translated::Opaque),
        Shape::TabularCsv => decode_csv(&response.body).map(Translated::Records),
    }
}

fn content_type_matches(shape: Shape, content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    match shape {
        Shape::TypedReading | Shape::OpaqueJson => content_type.contains("json"),
        Shape::TabularCsv => content_type.contains("csv"),
    }
}

// ---------------------------------------------------------------------------
// JSON path
// ---------------------------------------------------------------------------

/// Parses `body` as JSON without interpreting it.
pub fn decode_opaque(body: &[u8]) -> Result<Value, FacadeError> {
    serde_json::from_slice(body).map_err(|e| FacadeError::DecodeError(format!("invalid JSON: {}", e)))
}

/// Decodes a current-values document.
///
/// Fields present with the wrong JSON type are always rejected. Absent and
/// `null` fields are only rejected under `ReadingPolicy::Strict`.
pub fn decode_reading(body: &[u8], policy: ReadingPolicy) -> Result<TypedReading, FacadeError> {
    let value = decode_opaque(body)?;

    if policy == ReadingPolicy::Strict {
        let object = value
            .as_object()
            .ok_or_else(|| FacadeError::DecodeError("reading is not a JSON object".to_string()))?;
        if let Some(missing) = READING_FIELDS.iter().find(|f| !object.contains_key(**f)) {
            return Err(FacadeError::DecodeError(format!(
                "reading is missing field '{}'",
                missing
            )));
        }
        if let Some(field) = first_null_field(object) {
            return Err(FacadeError::DecodeError(format!(
                "reading field '{}' is null",
                field
            )));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| FacadeError::DecodeError(format!("unexpected reading layout: {}", e)))
}

fn first_null_field(object: &serde_json::Map<String, Value>) -> Option<String> {
    let null_field = READING_FIELDS
        .iter()
        .find(|f| object.get(**f).is_some_and(Value::is_null));
    if let Some(field) = null_field {
        return Some(field.to_string());
    }
    let entries = object.get("values")?.as_array()?;
    entries.iter().enumerate().find_map(|(i, entry)| match entry {
        Value::Null => Some(format!("values[{}]", i)),
        Value::Object(fields) => fields
            .iter()
            .find(|(_, v)| v.is_null())
            .map(|(key, _)| format!("values[{}].{}", i, key)),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// CSV path
// ---------------------------------------------------------------------------

/// Decodes a CSV table into one record per data row.
///
/// The first row names the columns. Short rows leave their trailing keys
/// out, long rows lose their extra trailing cells, and an empty body yields
/// no records. When a header repeats, the later column's value wins.
pub fn decode_csv(body: &[u8]) -> Result<Vec<TabularRecord>, FacadeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut rows = reader.records();

    let headers = match rows.next() {
        Some(row) => row.map_err(csv_error)?,
        None => return Ok(Vec::new()),
    };

    if has_duplicate_headers(&headers) {
        tracing::warn!(
            headers = ?headers.iter().collect::<Vec<_>>(),
            "upstream CSV repeats a column header; later columns overwrite earlier ones"
        );
    }

    let mut records = Vec::new();
    for row in rows {
        let row = row.map_err(csv_error)?;
        let record: TabularRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.to_string(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn has_duplicate_headers(headers: &csv::StringRecord) -> bool {
    let mut seen = std::collections::HashSet::new();
    headers.iter().any(|h| !seen.insert(h))
}

fn csv_error(e: csv::Error) -> FacadeError {
    FacadeError::DecodeError(format!("invalid CSV: {}", e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
