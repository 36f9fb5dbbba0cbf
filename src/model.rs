/// Core data types for the AirQino façade service.
///
/// This module defines the shared domain model imported by all other modules:
/// the request-scoped entities that flow from an inbound path to an upstream
/// call and back, plus the error taxonomy. It contains no I/O.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

// ---------------------------------------------------------------------------
// Upstream defaults
// ---------------------------------------------------------------------------

/// Production base URL of the AirQino API.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://airqino-api.magentalab.it";

/// Maximum number of characters of an upstream error body echoed back to
/// the client.
pub const UPSTREAM_BODY_SNIPPET_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Named path parameters extracted from an inbound request, in the order
/// the router captured them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParameters {
    pairs: Vec<(String, String)>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and fixed call sites.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a parameter. Replacing keeps the original position.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.pairs.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    /// Returns the value for `name`, treating an empty string as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl From<Vec<(String, String)>> for RequestParameters {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut params = RequestParameters::new();
        for (name, value) in &pairs {
            params.insert(name, value);
        }
        params
    }
}

// ---------------------------------------------------------------------------
// Upstream response
// ---------------------------------------------------------------------------

/// A fully buffered upstream reply. Owned by the request that produced it
/// and dropped once translation finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First `UPSTREAM_BODY_SNIPPET_CHARS` characters of the body, lossily
    /// decoded as UTF-8.
    pub fn body_snippet(&self) -> String {
        String::from_utf8_lossy(&self.body)
            .chars()
            .take(UPSTREAM_BODY_SNIPPET_CHARS)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Latest values reported by one AirQino station.
///
/// Every field defaults when absent or `null` so that a sparse upstream
/// document still decodes; `translate` decides whether that is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypedReading {
    #[serde(default, deserialize_with = "null_as_default")]
    pub station_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String, // e.g. "2024-03-01 10:15:00"
    #[serde(default, deserialize_with = "null_entries_as_default")]
    pub values: Vec<SensorValue>,
}

/// One sensor channel inside a `TypedReading`.
///
/// `value` keeps the upstream's number text, so `100` stays `100` and
/// `1.50` stays `1.50`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sensor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub unit: String,
    #[serde(default = "zero", deserialize_with = "null_as_zero")]
    pub value: Number,
}

impl Default for SensorValue {
    fn default() -> Self {
        Self {
            sensor: String::new(),
            unit: String::new(),
            value: zero(),
        }
    }
}

fn zero() -> Number {
    Number::from(0)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<Number, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Number>::deserialize(deserializer)?.unwrap_or_else(zero))
}

// A `null` list and `null` entries inside it both decode as defaults.
fn null_entries_as_default<'de, D>(deserializer: D) -> Result<Vec<SensorValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Option::<Vec<Option<SensorValue>>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// One CSV data row keyed by the header row's column names, in header order.
pub type TabularRecord = Map<String, Value>;

/// The normalized body returned to façade clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Translated {
    Reading(TypedReading),
    Records(Vec<TabularRecord>),
    Opaque(Value),
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while serving a single façade request.
///
/// None of these are fatal to the process; each one is rendered as a JSON
/// error response by the server module.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FacadeError {
    /// A required path parameter was absent or empty.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),
    /// The upstream could not be reached (DNS, connect, reset, ...).
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
    /// The upstream did not answer within the request deadline.
    #[error("upstream did not respond within {0} seconds")]
    UpstreamTimeout(u64),
    /// Non-2xx HTTP response from the upstream.
    #[error("upstream returned HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },
    /// The upstream body did not decode as the operation's expected shape.
    #[error("could not decode upstream response: {0}")]
    DecodeError(String),
    /// No façade route matches the requested path.
    #[error("no such endpoint: {0}")]
    NotFound(String),
}

impl FacadeError {
    /// Stable machine-readable code placed in the `error` field of the
    /// JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            FacadeError::MissingParameter(_) => "missing_parameter",
            FacadeError::UpstreamUnreachable(_) => "upstream_unreachable",
            FacadeError::UpstreamTimeout(_) => "upstream_timeout",
            FacadeError::UpstreamError { .. } => "upstream_error",
            FacadeError::DecodeError(_) => "decode_error",
            FacadeError::NotFound(_) => "not_found",
        }
    }
}
