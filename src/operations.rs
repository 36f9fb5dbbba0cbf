/// Operation registry and endpoint resolver for the AirQino façade.
///
/// Defines the closed set of façade operations, each described by a static
/// `OperationSpec`. This is the single source of truth for upstream path
/// names, parameter order and expected payload shapes: the router, the
/// resolver and the translator all read from `OPERATION_REGISTRY`.

use crate::model::{FacadeError, RequestParameters};

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Structural form the upstream is documented to return for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// JSON decoded into `model::TypedReading`.
    TypedReading,
    /// JSON validated and passed through untouched.
    OpaqueJson,
    /// CSV with a header row, re-encoded as an array of row objects.
    TabularCsv,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// One façade capability, mapped to one upstream call pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetCurrentValues,
    GetHourlyAvg,
    GetRange,
    GetSessionInfo,
    GetSingleDay,
    GetStationStatus,
    GetStations,
}

/// Static description of an operation.
pub struct OperationSpec {
    pub operation: Operation,
    /// Upstream path segment, also used as the façade route segment.
    pub name: &'static str,
    /// Required path parameters, in upstream path order.
    pub params: &'static [&'static str],
    /// Query string appended verbatim to the upstream URL.
    pub fixed_query: Option<&'static str>,
    pub shape: Shape,
}

pub static GET_CURRENT_VALUES: OperationSpec = OperationSpec {
    operation: Operation::GetCurrentValues,
    name: "getCurrentValues",
    params: &["station_name"],
    fixed_query: None,
    shape: Shape::TypedReading,
};

pub static GET_HOURLY_AVG: OperationSpec = OperationSpec {
    operation: Operation::GetHourlyAvg,
    name: "getHourlyAvg",
    params: &["station_name", "dt_from_string", "dt_to_string"],
    fixed_query: Some("pivot=true"),
    shape: Shape::TabularCsv,
};

pub static GET_RANGE: OperationSpec = OperationSpec {
    operation: Operation::GetRange,
    name: "getRange",
    params: &["station_name", "dt_from_string", "dt_to_string"],
    fixed_query: None,
    shape: Shape::OpaqueJson,
};

pub static GET_SESSION_INFO: OperationSpec = OperationSpec {
    operation: Operation::GetSessionInfo,
    name: "getSessionInfo",
    params: &["project_name"],
    fixed_query: None,
    shape: Shape::OpaqueJson,
};

pub static GET_SINGLE_DAY: OperationSpec = OperationSpec {
    operation: Operation::GetSingleDay,
    name: "getSingleDay",
    params: &["station_name", "dt_from_string"],
    fixed_query: None,
    shape: Shape::OpaqueJson,
};

pub static GET_STATION_STATUS: OperationSpec = OperationSpec {
    operation: Operation::GetStationStatus,
    name: "getStationStatus",
    params: &["station_id"],
    fixed_query: None,
    shape: Shape::OpaqueJson,
};

pub static GET_STATIONS: OperationSpec = OperationSpec {
    operation: Operation::GetStations,
    name: "getStations",
    params: &["project_name"],
    fixed_query: None,
    shape: Shape::OpaqueJson,
};

/// Every operation the façade serves, in route-table order.
pub static OPERATION_REGISTRY: &[&OperationSpec] = &[
    &GET_CURRENT_VALUES,
    &GET_HOURLY_AVG,
    &GET_RANGE,
    &GET_SESSION_INFO,
    &GET_SINGLE_DAY,
    &GET_STATION_STATUS,
    &GET_STATIONS,
];

impl Operation {
    /// Looks up this operation's static spec.
    pub fn spec(self) -> &'static OperationSpec {
        match self {
            Operation::GetCurrentValues => &GET_CURRENT_VALUES,
            Operation::GetHourlyAvg => &GET_HOURLY_AVG,
            Operation::GetRange => &GET_RANGE,
            Operation::GetSessionInfo => &GET_SESSION_INFO,
            Operation::GetSingleDay => &GET_SINGLE_DAY,
            Operation::GetStationStatus => &GET_STATION_STATUS,
            Operation::GetStations => &GET_STATIONS,
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn shape(self) -> Shape {
        self.spec().shape
    }

    /// Façade route in axum's path syntax, e.g.
    /// `/api/getSingleDay/:station_name/:dt_from_string`.
    pub fn route_path(self) -> String {
        let spec = self.spec();
        let mut path = format!("/api/{}", spec.name);
        for param in spec.params {
            path.push_str("/:");
            path.push_str(param);
        }
        path
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Builds the upstream URL for `operation`.
///
/// Parameters are substituted verbatim in `OperationSpec::params` order and the
/// fixed query string, if any, is appended. `base_url` must already be a
/// validated absolute URL (see `config::FacadeConfig::validate`); a trailing
/// slash is tolerated.
///
/// Fails with `FacadeError::MissingParameter` naming the first required
/// parameter that is absent or empty.
pub fn build_upstream_url(
    base_url: &str,
    operation: Operation,
    params: &RequestParameters,
) -> Result<String, FacadeError> {
    let spec = operation.spec();
    let mut url = format!("{}/{}", base_url.trim_end_matches('/'), spec.name);

    for name in spec.params {
        let value = params
            .get(name)
            .ok_or_else(|| FacadeError::MissingParameter(name.to_string()))?;
        url.push('/');
        url.push_str(value);
    }

    if let Some(query) = spec.fixed_query {
        url.push('?');
        url.push_str(query);
    }

    Ok(url)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
