/// Upstream data source clients.
///
/// Submodules:
/// - `airqino` — the AirQino sensor API behind every façade route.

pub mod airqino;
