//! AirQino façade service.
//!
//! Exposes a stable set of `/api/...` endpoints in front of the AirQino
//! sensor API and re-serves every upstream payload (typed JSON, untyped
//! JSON or CSV) as normalized JSON.
//!
//! Modules:
//! - `model` — request-scoped types and the `FacadeError` taxonomy.
//! - `operations` — operation registry and upstream URL resolver.
//! - `ingest` — the upstream HTTP client.
//! - `translate` — status check and shape-driven decoding.
//! - `server` — axum routes and JSON error rendering.
//! - `config`, `logging` — startup configuration and tracing setup.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod operations;
pub mod server;
pub mod translate;
