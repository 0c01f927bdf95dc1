//! Organization persistence behind a trait so the ledger runs against
//! Postgres in production and an in-memory map in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::models::{BillingStatus, Organization, Plan};
use crate::common::OrganizationId;

/// Result of a conditional quota increment.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    /// Counter incremented; the updated row.
    Reserved(Organization),
    /// Cap would be exceeded; the unchanged row.
    Exceeded(Organization),
    NotFound,
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn find(&self, id: OrganizationId) -> Result<Option<Organization>>;

    async fn insert(&self, org: &Organization) -> Result<Organization>;

    /// Single atomic read-modify-write: `used + units <= limit` or nothing changes.
    async fn try_reserve(&self, id: OrganizationId, units: i32) -> Result<ReserveOutcome>;

    /// Give back `units` after an admission that never produced a job. Floors at zero.
    async fn release(&self, id: OrganizationId, units: i32) -> Result<Option<Organization>>;

    async fn apply_plan(&self, id: OrganizationId, plan: Plan) -> Result<Option<Organization>>;

    async fn reset_usage(&self, id: OrganizationId) -> Result<Option<Organization>>;

    async fn set_billing_status(
        &self,
        id: OrganizationId,
        status: BillingStatus,
    ) -> Result<Option<Organization>>;
}

// =============================================================================
// Postgres
// =============================================================================

pub struct PgOrganizationStore {
    pool: PgPool,
}

impl PgOrganizationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationStore for PgOrganizationStore {
    async fn find(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Organization::find_by_id(id, &self.pool).await
    }

    async fn insert(&self, org: &Organization) -> Result<Organization> {
        org.insert(&self.pool).await
    }

    async fn try_reserve(&self, id: OrganizationId, units: i32) -> Result<ReserveOutcome> {
        if let Some(org) = Organization::try_reserve(id, units, &self.pool).await? {
            return Ok(ReserveOutcome::Reserved(org));
        }
        // The guarded UPDATE matched nothing: either over the cap or no such row.
        Ok(match Organization::find_by_id(id, &self.pool).await? {
            Some(org) => ReserveOutcome::Exceeded(org),
            None => ReserveOutcome::NotFound,
        })
    }

    async fn release(&self, id: OrganizationId, units: i32) -> Result<Option<Organization>> {
        Organization::release(id, units, &self.pool).await
    }

    async fn apply_plan(&self, id: OrganizationId, plan: Plan) -> Result<Option<Organization>> {
        Organization::apply_plan(id, plan, &self.pool).await
    }

    async fn reset_usage(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Organization::reset_usage(id, &self.pool).await
    }

    async fn set_billing_status(
        &self,
        id: OrganizationId,
        status: BillingStatus,
    ) -> Result<Option<Organization>> {
        Organization::set_billing_status(id, status, &self.pool).await
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Map-backed store. The mutex makes `try_reserve` atomic like the SQL version.
#[derive(Default)]
pub struct InMemoryOrganizationStore {
    orgs: Mutex<HashMap<OrganizationId, Organization>>,
}

impl InMemoryOrganizationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OrganizationId, Organization>> {
        self.orgs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(
        &self,
        id: OrganizationId,
        apply: impl FnOnce(&mut Organization),
    ) -> Option<Organization> {
        let mut orgs = self.lock();
        let org = orgs.get_mut(&id)?;
        apply(org);
        org.updated_at = Utc::now();
        Some(org.clone())
    }
}

#[async_trait]
impl OrganizationStore for InMemoryOrganizationStore {
    async fn find(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn insert(&self, org: &Organization) -> Result<Organization> {
        let mut orgs = self.lock();
        if orgs.contains_key(&org.id) {
            anyhow::bail!("organization {} already exists", org.id);
        }
        orgs.insert(org.id, org.clone());
        Ok(org.clone())
    }

    async fn try_reserve(&self, id: OrganizationId, units: i32) -> Result<ReserveOutcome> {
        let mut orgs = self.lock();
        let Some(org) = orgs.get_mut(&id) else {
            return Ok(ReserveOutcome::NotFound);
        };
        if org.quota_used + units > org.quota_limit {
            return Ok(ReserveOutcome::Exceeded(org.clone()));
        }
        org.quota_used += units;
        org.updated_at = Utc::now();
        Ok(ReserveOutcome::Reserved(org.clone()))
    }

    async fn release(&self, id: OrganizationId, units: i32) -> Result<Option<Organization>> {
        Ok(self.update(id, |org| org.quota_used = (org.quota_used - units).max(0)))
    }

    async fn apply_plan(&self, id: OrganizationId, plan: Plan) -> Result<Option<Organization>> {
        Ok(self.update(id, |org| {
            org.plan = plan;
            org.quota_limit = plan.quota_limit();
            org.quota_used = 0;
            org.billing_status = BillingStatus::Active;
        }))
    }

    async fn reset_usage(&self, id: OrganizationId) -> Result<Option<Organization>> {
        Ok(self.update(id, |org| org.quota_used = 0))
    }

    async fn set_billing_status(
        &self,
        id: OrganizationId,
        status: BillingStatus,
    ) -> Result<Option<Organization>> {
        Ok(self.update(id, |org| org.billing_status = status))
    }
}
