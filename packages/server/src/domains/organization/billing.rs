//! Confirmed billing events from the payment provider.
//!
//! Authenticity is checked upstream; by the time an event lands here it is
//! trusted.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::QuotaError;
use super::models::{BillingStatus, Organization, Plan};
use super::quota::QuotaLedger;
use crate::common::OrganizationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BillingEvent {
    /// Checkout or subscription change confirmed.
    PlanChanged { org_id: OrganizationId, plan: Plan },
    /// Renewal charge failed. Quota is left alone.
    PaymentFailed { org_id: OrganizationId },
}

pub async fn apply_billing_event(
    ledger: &QuotaLedger,
    event: BillingEvent,
) -> Result<Organization, QuotaError> {
    match event {
        BillingEvent::PlanChanged { org_id, plan } => {
            info!(org_id = %org_id, plan = %plan, "Applying plan change");
            ledger.reset_on_upgrade(org_id, plan).await
        }
        BillingEvent::PaymentFailed { org_id } => {
            warn!(org_id = %org_id, "Payment failed, marking past due");
            ledger
                .set_billing_status(org_id, BillingStatus::PastDue)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::organization::store::{InMemoryOrganizationStore, OrganizationStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn payment_failure_keeps_quota() {
        let store = Arc::new(InMemoryOrganizationStore::new());
        let mut org = Organization::new("Acme", Plan::Pro);
        org.quota_used = 120;
        store.insert(&org).await.unwrap();
        let ledger = QuotaLedger::new(store);

        let after = apply_billing_event(&ledger, BillingEvent::PaymentFailed { org_id: org.id })
            .await
            .unwrap();
        assert_eq!(after.billing_status, BillingStatus::PastDue);
        assert_eq!(after.quota_used, 120);

        let upgraded = apply_billing_event(
            &ledger,
            BillingEvent::PlanChanged {
                org_id: org.id,
                plan: Plan::Enterprise,
            },
        )
        .await
        .unwrap();
        assert_eq!(upgraded.billing_status, BillingStatus::Active);
        assert_eq!(upgraded.quota_limit, 2000);
        assert_eq!(upgraded.quota_used, 0);
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let org_id = OrganizationId::new();
        let json = serde_json::json!({ "type": "plan_changed", "org_id": org_id, "plan": "pro" });
        let event: BillingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(event, BillingEvent::PlanChanged { org_id, plan: Plan::Pro });
    }
}
