pub mod classifier;
pub mod models;

pub use classifier::{classify, is_playable_video, is_resolvable_image};
pub use models::{AdItem, ContentCategory};
