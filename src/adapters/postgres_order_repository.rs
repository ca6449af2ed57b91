//! Postgres implementations of the member, order and contribution repositories.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Contribution, GradingDecision, Member, Order};
use crate::ports::{
    ContributionRepository, MemberRepository, OrderRepository, RepositoryError,
    RepositoryResult,
};

fn corrupt(column: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("unreadable {} column: {}", column, err))
}

#[derive(Clone)]
pub struct PostgresMemberRepository {
    pool: PgPool,
}

impl PostgresMemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberRepository for PostgresMemberRepository {
    async fn insert(&self, member: &Member) -> RepositoryResult<Member> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (id, group_id, name, phone, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, group_id, name, phone, status, created_at
            "#,
        )
        .bind(member.id)
        .bind(member.group_id)
        .bind(&member.name)
        .bind(&member.phone)
        .bind(member.status.as_str())
        .bind(member.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Member> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("member {}", id)))?
            .into_domain()
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Member>> {
        let rows = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(MemberRow::into_domain).collect()
    }
}

#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &Order) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (
                id, buyer_id, group_id, produce_type, required_quantity, unit,
                price_per_unit, truck_tier, status, scheduled_date, delivery_date,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(order.buyer_id)
        .bind(order.group_id)
        .bind(&order.produce_type)
        .bind(&order.required_quantity)
        .bind(order.unit.as_str())
        .bind(&order.price_per_unit)
        .bind(order.truck_tier.to_string())
        .bind(order.status.as_str())
        .bind(order.scheduled_date)
        .bind(order.delivery_date)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("order {}", id)))?
            .into_domain()
    }

    async fn update(&self, order: &Order) -> RepositoryResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            UPDATE orders
            SET price_per_unit = $2, status = $3, delivery_date = $4, updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.price_per_unit)
        .bind(order.status.as_str())
        .bind(order.delivery_date)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("order {}", order.id)))?
            .into_domain()
    }
}

#[derive(Clone)]
pub struct PostgresContributionRepository {
    pool: PgPool,
}

impl PostgresContributionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContributionRepository for PostgresContributionRepository {
    async fn insert(&self, contribution: &Contribution) -> RepositoryResult<Contribution> {
        let row = sqlx::query_as::<_, ContributionRow>(
            r#"
            INSERT INTO contributions (
                id, order_id, member_id, quantity, unit, grade, status,
                accepted_quantity, rejection_reason, created_at, graded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(contribution.id)
        .bind(contribution.order_id)
        .bind(contribution.member_id)
        .bind(&contribution.quantity)
        .bind(contribution.unit.as_str())
        .bind(contribution.grade.as_str())
        .bind(contribution.status.as_str())
        .bind(&contribution.accepted_quantity)
        .bind(&contribution.rejection_reason)
        .bind(contribution.created_at)
        .bind(contribution.graded_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Contribution> {
        let row = sqlx::query_as::<_, ContributionRow>("SELECT * FROM contributions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("contribution {}", id)))?
            .into_domain()
    }

    async fn list_for_order(&self, order_id: Uuid) -> RepositoryResult<Vec<Contribution>> {
        let rows = sqlx::query_as::<_, ContributionRow>(
            "SELECT * FROM contributions WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContributionRow::into_domain).collect()
    }

    async fn record_grading(
        &self,
        contribution: &Contribution,
        decision: &GradingDecision,
    ) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE contributions
            SET status = $2, accepted_quantity = $3, rejection_reason = $4, graded_at = $5
            WHERE id = $1
            "#,
        )
        .bind(contribution.id)
        .bind(contribution.status.as_str())
        .bind(&contribution.accepted_quantity)
        .bind(&contribution.rejection_reason)
        .bind(contribution.graded_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!(
                "contribution {}",
                contribution.id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO grading_decisions (
                id, contribution_id, status, accepted_quantity, rejection_reason, graded_by, decided_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(decision.id)
        .bind(decision.contribution_id)
        .bind(decision.status.as_str())
        .bind(&decision.accepted_quantity)
        .bind(&decision.rejection_reason)
        .bind(&decision.graded_by)
        .bind(decision.decided_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn grading_history(&self, contribution_id: Uuid) -> RepositoryResult<Vec<GradingDecision>> {
        let rows = sqlx::query_as::<_, GradingDecisionRow>(
            "SELECT * FROM grading_decisions WHERE contribution_id = $1 ORDER BY decided_at ASC",
        )
        .bind(contribution_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GradingDecisionRow::into_domain).collect()
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    group_id: Uuid,
    name: String,
    phone: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl MemberRow {
    fn into_domain(self) -> RepositoryResult<Member> {
        Ok(Member {
            id: self.id,
            group_id: self.group_id,
            name: self.name,
            phone: self.phone,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    group_id: Uuid,
    produce_type: String,
    required_quantity: BigDecimal,
    unit: String,
    price_per_unit: BigDecimal,
    truck_tier: String,
    status: String,
    scheduled_date: Option<NaiveDate>,
    delivery_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_domain(self) -> RepositoryResult<Order> {
        Ok(Order {
            id: self.id,
            buyer_id: self.buyer_id,
            group_id: self.group_id,
            produce_type: self.produce_type,
            required_quantity: self.required_quantity,
            unit: self.unit.parse().map_err(|e| corrupt("unit", e))?,
            price_per_unit: self.price_per_unit,
            truck_tier: self.truck_tier.parse().map_err(|e| corrupt("truck_tier", e))?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            scheduled_date: self.scheduled_date,
            delivery_date: self.delivery_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContributionRow {
    id: Uuid,
    order_id: Uuid,
    member_id: Uuid,
    quantity: BigDecimal,
    unit: String,
    grade: String,
    status: String,
    accepted_quantity: BigDecimal,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    graded_at: Option<DateTime<Utc>>,
}

impl ContributionRow {
    fn into_domain(self) -> RepositoryResult<Contribution> {
        Ok(Contribution {
            id: self.id,
            order_id: self.order_id,
            member_id: self.member_id,
            quantity: self.quantity,
            unit: self.unit.parse().map_err(|e| corrupt("unit", e))?,
            grade: self.grade.parse().map_err(|e| corrupt("grade", e))?,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            accepted_quantity: self.accepted_quantity,
            rejection_reason: self.rejection_reason,
            created_at: self.created_at,
            graded_at: self.graded_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GradingDecisionRow {
    id: Uuid,
    contribution_id: Uuid,
    status: String,
    accepted_quantity: BigDecimal,
    rejection_reason: Option<String>,
    graded_by: Option<String>,
    decided_at: DateTime<Utc>,
}

impl GradingDecisionRow {
    fn into_domain(self) -> RepositoryResult<GradingDecision> {
        Ok(GradingDecision {
            id: self.id,
            contribution_id: self.contribution_id,
            status: self.status.parse().map_err(|e| corrupt("status", e))?,
            accepted_quantity: self.accepted_quantity,
            rejection_reason: self.rejection_reason,
            graded_by: self.graded_by,
            decided_at: self.decided_at,
        })
    }
}
