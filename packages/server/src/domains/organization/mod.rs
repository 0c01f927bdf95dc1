pub mod billing;
pub mod error;
pub mod models;
pub mod quota;
pub mod store;

pub use billing::{apply_billing_event, BillingEvent};
pub use error::QuotaError;
pub use models::{BillingStatus, Organization, Plan};
pub use quota::{parse_organization_id, QuotaLedger, QuotaReservation, QuotaStatus};
pub use store::{InMemoryOrganizationStore, OrganizationStore, PgOrganizationStore, ReserveOutcome};
