// HTTP routes
pub mod health;
pub mod jobs;
pub mod organizations;

pub use health::*;
pub use jobs::*;
pub use organizations::*;
