// Common types shared across domains

pub mod app_state;
pub mod entity_ids;
pub mod id;

pub use app_state::AppState;
pub use entity_ids::*;
pub use id::Id;
