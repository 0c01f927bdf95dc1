pub mod admission;
pub mod effects;
pub mod error;
pub mod events;
pub mod machine;
pub mod models;
pub mod store;

pub use admission::{submit_job, JobAdmission, SubmitJob};
pub use effects::job_effect;
pub use error::JobError;
pub use events::JobEvent;
pub use machine::JobStateMachine;
pub use models::{Job, JobId, JobStatus, RawScrapeResult};
pub use store::{InMemoryJobStore, JobStore, PgJobStore};
