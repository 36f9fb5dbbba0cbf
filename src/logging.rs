/// Structured logging for the AirQino façade
///
/// Installs the global `tracing` subscriber and classifies upstream
/// failures so that expected client-side problems stay quiet while
/// upstream breakage is logged loudly.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::model::FacadeError;
use crate::operations::Operation;

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `level`. With a `log_file`
/// events are appended there without ANSI colour; otherwise they go to
/// stdout. Calling this twice is harmless: the second call is ignored.
pub fn init_logging(level: &str, log_file: Option<&str>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

/// Filter directives for our crate and the HTTP trace layer.
fn default_directives(level: &str) -> String {
    format!("airqino_service={level},tower_http={level}")
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - bad client input or an unknown station/project
    Expected,
    /// Unexpected failure - the upstream is down, slow, or broke its contract
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a façade failure.
pub fn classify_failure(err: &FacadeError) -> FailureType {
    match err {
        FacadeError::MissingParameter(_) | FacadeError::NotFound(_) => FailureType::Expected,
        // 4xx from upstream usually means an unknown station or project.
        FacadeError::UpstreamError { status, .. } if (400..500).contains(status) => {
            FailureType::Expected
        }
        FacadeError::UpstreamError { status, .. } if *status >= 500 => FailureType::Unexpected,
        FacadeError::UpstreamError { .. } => FailureType::Unknown,
        FacadeError::UpstreamUnreachable(_)
        | FacadeError::UpstreamTimeout(_)
        | FacadeError::DecodeError(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed façade request with automatic classification.
pub fn log_upstream_failure(operation: Operation, err: &FacadeError) {
    let failure_type = classify_failure(err);
    let op = operation.name();
    let code = err.code();

    match failure_type {
        FailureType::Expected => {
            tracing::debug!(operation = op, code, kind = %failure_type, "{}", err)
        }
        FailureType::Unexpected => {
            tracing::error!(operation = op, code, kind = %failure_type, "{}", err)
        }
        FailureType::Unknown => {
            tracing::warn!(operation = op, code, kind = %failure_type, "{}", err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_side_failures_are_expected() {
        assert_eq!(
            classify_failure(&FacadeError::MissingParameter("station_name".into())),
            FailureType::Expected
        );
        assert_eq!(
            classify_failure(&FacadeError::UpstreamError {
                status: 404,
                body: "unknown station".into()
            }),
            FailureType::Expected
        );
    }

    #[test]
    fn test_upstream_breakage_is_unexpected() {
        let cases = [
            FacadeError::UpstreamError {
                status: 503,
                body: String::new(),
            },
            FacadeError::UpstreamTimeout(10),
            FacadeError::UpstreamUnreachable("connection refused".into()),
            FacadeError::DecodeError("invalid JSON".into()),
        ];
        for err in &cases {
            assert_eq!(classify_failure(err), FailureType::Unexpected, "{:?}", err);
        }
    }

    #[test]
    fn test_redirect_status_is_unknown() {
        let err = FacadeError::UpstreamError {
            status: 302,
            body: String::new(),
        };
        assert_eq!(classify_failure(&err), FailureType::Unknown);
    }

    #[test]
    fn test_default_directives_cover_http_layer() {
        assert_eq!(
            default_directives("debug"),
            "airqino_service=debug,tower_http=debug"
        );
    }
}
