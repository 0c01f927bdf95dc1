pub mod organization;

pub use organization::{BillingStatus, Organization, Plan};
