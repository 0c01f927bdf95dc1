// Business domains
pub mod ads;
pub mod analysis;
pub mod jobs;
pub mod organization;
