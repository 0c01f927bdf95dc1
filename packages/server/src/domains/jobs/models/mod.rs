pub mod job;

pub use job::{Job, JobId, JobStatus, RawScrapeResult};
