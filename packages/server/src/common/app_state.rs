//! Application state for the seesaw engine.

/// State carried by every effect context.
///
/// Jobs keep their durable state on the job row, so nothing request-scoped
/// rides along yet.
#[derive(Clone, Default)]
pub struct AppState;
