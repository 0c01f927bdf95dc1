//! Quota Ledger.
//!
//! The only writer of `plan`, `quota_limit` and `quota_used`. Admission
//! reserves quota proportional to the ads requested, in one conditional
//! update, before any job row exists.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::QuotaError;
use super::models::{BillingStatus, Organization, Plan};
use super::store::{OrganizationStore, ReserveOutcome};
use crate::common::OrganizationId;

/// Placeholder ids that must never resolve to a shared account.
const SENTINEL_ORGANIZATION_IDS: &[&str] = &[
    "default",
    "default-org",
    "default-organization",
    "placeholder",
    "none",
    "null",
    "undefined",
    "anonymous",
    "system",
];

/// Accept only a real, non-nil organization UUID.
pub fn parse_organization_id(raw: &str) -> Result<OrganizationId, QuotaError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QuotaError::InvalidOrganization(
            "organization id is required".into(),
        ));
    }
    if SENTINEL_ORGANIZATION_IDS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return Err(QuotaError::InvalidOrganization(format!(
            "'{}' is a placeholder, not an organization",
            trimmed
        )));
    }
    let id = OrganizationId::parse(trimmed).map_err(|_| {
        QuotaError::InvalidOrganization(format!("'{}' is not an organization id", trimmed))
    })?;
    if id.is_nil() {
        return Err(QuotaError::InvalidOrganization(
            "the nil id is not an organization".into(),
        ));
    }
    Ok(id)
}

/// Capacity taken by a successful admission.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaReservation {
    pub organization_id: OrganizationId,
    pub units: i32,
    pub used: i32,
    pub limit: i32,
    pub remaining: i32,
    pub plan: Plan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub used: i32,
    pub limit: i32,
    pub percentage: i32,
    pub remaining: i32,
    pub plan: Plan,
}

impl QuotaStatus {
    pub fn from_organization(org: &Organization) -> Self {
        let percentage = if org.quota_limit > 0 {
            (org.quota_used as f64 / org.quota_limit as f64 * 100.0).round() as i32
        } else if org.quota_used > 0 {
            100
        } else {
            0
        };
        Self {
            used: org.quota_used,
            limit: org.quota_limit,
            percentage,
            remaining: org.remaining(),
            plan: org.plan,
        }
    }
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn OrganizationStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn OrganizationStore>) -> Self {
        Self { store }
    }

    /// Reserve `units` ads for the organization named by `raw_org_id`.
    pub async fn check_and_reserve(
        &self,
        raw_org_id: &str,
        units: i32,
    ) -> Result<QuotaReservation, QuotaError> {
        let org_id = parse_organization_id(raw_org_id)?;
        let org = self.require(org_id).await?;

        let max = org.plan.quota_limit();
        if units < 1 || units > max {
            return Err(QuotaError::InvalidRequest(format!(
                "requested count must be between 1 and {} on the {} plan",
                max, org.plan
            )));
        }

        match self.store.try_reserve(org_id, units).await? {
            ReserveOutcome::Reserved(org) => {
                info!(
                    org_id = %org_id,
                    units,
                    used = org.quota_used,
                    limit = org.quota_limit,
                    "Quota reserved"
                );
                Ok(QuotaReservation {
                    organization_id: org_id,
                    units,
                    used: org.quota_used,
                    limit: org.quota_limit,
                    remaining: org.remaining(),
                    plan: org.plan,
                })
            }
            ReserveOutcome::Exceeded(org) => {
                warn!(
                    org_id = %org_id,
                    units,
                    used = org.quota_used,
                    limit = org.quota_limit,
                    "Quota exceeded"
                );
                Err(QuotaError::QuotaExceeded {
                    used: org.quota_used,
                    limit: org.quota_limit,
                })
            }
            ReserveOutcome::NotFound => Err(not_found(org_id)),
        }
    }

    /// Compensate a reservation whose job was never created.
    pub async fn release(&self, reservation: &QuotaReservation) -> Result<Organization, QuotaError> {
        let org_id = reservation.organization_id;
        let org = self
            .store
            .release(org_id, reservation.units)
            .await?
            .ok_or_else(|| not_found(org_id))?;
        warn!(org_id = %org_id, units = reservation.units, used = org.quota_used, "Quota reservation released");
        Ok(org)
    }

    /// Apply a confirmed plan change: new plan, its limit, usage back to zero.
    pub async fn reset_on_upgrade(
        &self,
        org_id: OrganizationId,
        plan: Plan,
    ) -> Result<Organization, QuotaError> {
        let org = self
            .store
            .apply_plan(org_id, plan)
            .await?
            .ok_or_else(|| not_found(org_id))?;
        info!(org_id = %org_id, plan = %plan, limit = org.quota_limit, "Plan applied, quota reset");
        Ok(org)
    }

    /// Administrative or scheduled reset of the usage counter.
    pub async fn reset_usage(&self, org_id: OrganizationId) -> Result<Organization, QuotaError> {
        let org = self
            .store
            .reset_usage(org_id)
            .await?
            .ok_or_else(|| not_found(org_id))?;
        info!(org_id = %org_id, "Quota usage reset");
        Ok(org)
    }

    pub async fn set_billing_status(
        &self,
        org_id: OrganizationId,
        status: BillingStatus,
    ) -> Result<Organization, QuotaError> {
        self.store
            .set_billing_status(org_id, status)
            .await?
            .ok_or_else(|| not_found(org_id))
    }

    pub async fn get_status(&self, raw_org_id: &str) -> Result<QuotaStatus, QuotaError> {
        let org_id = parse_organization_id(raw_org_id)?;
        let org = self.require(org_id).await?;
        Ok(QuotaStatus::from_organization(&org))
    }

    async fn require(&self, org_id: OrganizationId) -> Result<Organization, QuotaError> {
        self.store
            .find(org_id)
            .await?
            .ok_or_else(|| not_found(org_id))
    }
}

fn not_found(org_id: OrganizationId) -> QuotaError {
    QuotaError::InvalidOrganization(format!("organization {} does not exist", org_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::organization::store::InMemoryOrganizationStore;

    async fn ledger_with(plan: Plan, used: i32) -> (QuotaLedger, Arc<InMemoryOrganizationStore>, Organization) {
        let store = Arc::new(InMemoryOrganizationStore::new());
        let mut org = Organization::new("Acme", plan);
        org.quota_used = used;
        store.insert(&org).await.unwrap();
        (QuotaLedger::new(store.clone()), store, org)
    }

    #[tokio::test]
    async fn over_cap_request_is_rejected_without_change() {
        let (ledger, store, org) = ledger_with(Plan::Free, 8).await;

        let err = ledger
            .check_and_reserve(&org.id.to_string(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::QuotaExceeded { used: 8, limit: 10 }));

        let after = store.find(org.id).await.unwrap().unwrap();
        assert_eq!(after.quota_used, 8);
    }

    #[tokio::test]
    async fn reservation_consumes_requested_units() {
        let (ledger, store, org) = ledger_with(Plan::Free, 2).await;

        let reservation = ledger.check_and_reserve(&org.id.to_string(), 3).await.unwrap();
        assert_eq!(reservation.used, 5);
        assert_eq!(reservation.remaining, 5);

        let after = store.find(org.id).await.unwrap().unwrap();
        assert_eq!(after.quota_used, 5);
    }

    #[tokio::test]
    async fn sentinel_ids_are_invalid_organizations() {
        let (ledger, _, _) = ledger_with(Plan::Pro, 0).await;
        let nil = OrganizationId::nil().to_string();
        let missing = OrganizationId::new().to_string();

        for raw in ["", "  ", "default", "Default-Org", "null", "system", "abc", nil.as_str(), missing.as_str()] {
            let err = ledger.check_and_reserve(raw, 1).await.unwrap_err();
            assert!(
                matches!(err, QuotaError::InvalidOrganization(_)),
                "{:?} gave {:?}",
                raw,
                err
            );
        }
    }

    #[tokio::test]
    async fn requested_count_must_fit_the_plan() {
        let (ledger, _, org) = ledger_with(Plan::Free, 0).await;
        for units in [0, -1, 11] {
            let err = ledger.check_and_reserve(&org.id.to_string(), units).await.unwrap_err();
            assert!(matches!(err, QuotaError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn release_gives_back_units() {
        let (ledger, store, org) = ledger_with(Plan::Free, 1).await;
        let reservation = ledger.check_and_reserve(&org.id.to_string(), 4).await.unwrap();
        assert_eq!(reservation.used, 5);

        let after = ledger.release(&reservation).await.unwrap();
        assert_eq!(after.quota_used, 1);
        assert_eq!(store.find(org.id).await.unwrap().unwrap().quota_used, 1);
    }

    #[tokio::test]
    async fn upgrade_resets_usage_and_raises_limit() {
        let (ledger, _, org) = ledger_with(Plan::Free, 10).await;

        let upgraded = ledger.reset_on_upgrade(org.id, Plan::Pro).await.unwrap();
        assert_eq!(upgraded.plan, Plan::Pro);
        assert_eq!(upgraded.quota_limit, 500);
        assert_eq!(upgraded.quota_used, 0);
    }

    #[tokio::test]
    async fn status_reports_rounded_percentage() {
        let (ledger, _, org) = ledger_with(Plan::Pro, 333).await;
        let status = ledger.get_status(&org.id.to_string()).await.unwrap();
        assert_eq!(
            status,
            QuotaStatus {
                used: 333,
                limit: 500,
                percentage: 67,
                remaining: 167,
                plan: Plan::Pro,
            }
        );
    }

    #[tokio::test]
    async fn concurrent_admissions_never_pass_the_cap() {
        let (ledger, store, org) = ledger_with(Plan::Free, 0).await;
        let raw = org.id.to_string();

        let attempts = (0..20).map(|_| {
            let ledger = ledger.clone();
            let raw = raw.clone();
            tokio::spawn(async move { ledger.check_and_reserve(&raw, 3).await.is_ok() })
        });
        let admitted = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();

        assert_eq!(admitted, 3);
        assert_eq!(store.find(org.id).await.unwrap().unwrap().quota_used, 9);
    }
}
