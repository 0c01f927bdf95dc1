use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;

use crate::common::OrganizationId;

/// Subscription plan. Each plan fixes the monthly ad quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn quota_limit(&self) -> i32 {
        match self {
            Plan::Free => 10,
            Plan::Pro => 500,
            Plan::Enterprise => 2000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "billing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Active,
    PastDue,
    Canceled,
}

/// Organization - the tenant that owns jobs and a monthly quota.
///
/// `quota_used` and `quota_limit` are written only through the quota ledger.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub plan: Plan,
    pub quota_limit: i32,
    pub quota_used: i32,
    pub billing_status: BillingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// A fresh organization on `plan` with nothing used.
    pub fn new(name: impl Into<String>, plan: Plan) -> Self {
        let now = Utc::now();
        Self {
            id: OrganizationId::new(),
            name: name.into(),
            plan,
            quota_limit: plan.quota_limit(),
            quota_used: 0,
            billing_status: BillingStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Callers treat `used >= limit` as exhausted even if a race overshot.
    pub fn is_exhausted(&self) -> bool {
        self.quota_used >= self.quota_limit
    }

    pub fn remaining(&self) -> i32 {
        (self.quota_limit - self.quota_used).max(0)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Organization {
    /// Find organization by ID
    pub async fn find_by_id(id: OrganizationId, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(org)
    }

    /// Insert new organization
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (
                id, name, plan, quota_limit, quota_used, billing_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.plan)
        .bind(self.quota_limit)
        .bind(self.quota_used)
        .bind(self.billing_status)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await?;
        Ok(org)
    }

    /// Atomically add `units` to `quota_used` if the result stays within the limit.
    ///
    /// Returns None when the cap would be exceeded (or the row is missing).
    pub async fn try_reserve(id: OrganizationId, units: i32, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET quota_used = quota_used + $2, updated_at = NOW()
            WHERE id = $1 AND quota_used + $2 <= quota_limit
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(units)
        .fetch_optional(pool)
        .await?;
        Ok(org)
    }

    pub async fn release(id: OrganizationId, units: i32, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET quota_used = GREATEST(quota_used - $2, 0), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(units)
        .fetch_optional(pool)
        .await?;
        Ok(org)
    }

    /// Switch plan, raise the limit to the plan's value and zero the usage.
    pub async fn apply_plan(id: OrganizationId, plan: Plan, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET plan = $2, quota_limit = $3, quota_used = 0,
                billing_status = 'active', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(plan)
        .bind(plan.quota_limit())
        .fetch_optional(pool)
        .await?;
        Ok(org)
    }

    /// Zero the usage counter (monthly or administrative reset).
    pub async fn reset_usage(id: OrganizationId, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET quota_used = 0, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(org)
    }

    pub async fn set_billing_status(
        id: OrganizationId,
        status: BillingStatus,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET billing_status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await?;
        Ok(org)
    }
}
