//! Postgres implementation of SavingsRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::money::zero;
use crate::domain::{SavingsAccount, SavingsTransaction, SavingsTransactionKind};
use crate::ports::{RepositoryError, RepositoryResult, SavingsRepository};

#[derive(Clone)]
pub struct PostgresSavingsRepository {
    pool: PgPool,
}

impl PostgresSavingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SavingsRepository for PostgresSavingsRepository {
    async fn get_account(&self, member_id: Uuid) -> RepositoryResult<Option<SavingsAccount>> {
        let row = sqlx::query_as::<_, SavingsAccountRow>(
            "SELECT * FROM savings_accounts WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SavingsAccountRow::into_domain))
    }

    async fn list_accounts(&self) -> RepositoryResult<Vec<SavingsAccount>> {
        let rows = sqlx::query_as::<_, SavingsAccountRow>(
            "SELECT * FROM savings_accounts ORDER BY member_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SavingsAccountRow::into_domain).collect())
    }

    async fn append(&self, account: &SavingsAccount, tx: &SavingsTransaction) -> RepositoryResult<()> {
        let previous_total = &tx.balance - &tx.amount;
        let mut db = self.pool.begin().await?;

        // Compare-and-set on the running total keeps the ledger strictly ordered.
        let updated = sqlx::query(
            r#"
            UPDATE savings_accounts
            SET total_savings = $2, available_for_withdrawal = $3, annual_interest_rate = $4,
                last_rollover_date = $5, updated_at = $6
            WHERE member_id = $1 AND total_savings = $7
            "#,
        )
        .bind(account.member_id)
        .bind(&account.total_savings)
        .bind(&account.available_for_withdrawal)
        .bind(&account.annual_interest_rate)
        .bind(account.last_rollover_date)
        .bind(account.updated_at)
        .bind(&previous_total)
        .execute(&mut *db)
        .await?;

        if updated.rows_affected() == 0 {
            let opened = if previous_total == zero() {
                sqlx::query(
                    r#"
                    INSERT INTO savings_accounts (
                        member_id, total_savings, available_for_withdrawal,
                        annual_interest_rate, last_rollover_date, updated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (member_id) DO NOTHING
                    "#,
                )
                .bind(account.member_id)
                .bind(&account.total_savings)
                .bind(&account.available_for_withdrawal)
                .bind(&account.annual_interest_rate)
                .bind(account.last_rollover_date)
                .bind(account.updated_at)
                .execute(&mut *db)
                .await?
                .rows_affected()
            } else {
                0
            };

            if opened == 0 {
                db.rollback().await?;
                return Err(RepositoryError::Conflict(format!(
                    "stale savings balance for member {}: expected {}",
                    account.member_id, previous_total
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO savings_transactions (
                id, member_id, order_id, kind, amount, balance, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tx.id)
        .bind(tx.member_id)
        .bind(tx.order_id)
        .bind(tx.kind.as_str())
        .bind(&tx.amount)
        .bind(&tx.balance)
        .bind(tx.created_at)
        .execute(&mut *db)
        .await?;

        db.commit().await?;
        Ok(())
    }

    async fn find_deposit(
        &self,
        member_id: Uuid,
        order_id: Uuid,
    ) -> RepositoryResult<Option<SavingsTransaction>> {
        let row = sqlx::query_as::<_, SavingsTransactionRow>(
            r#"
            SELECT id, member_id, order_id, kind, amount, balance, created_at
            FROM savings_transactions
            WHERE member_id = $1 AND order_id = $2 AND kind = 'deposit'
            "#,
        )
        .bind(member_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SavingsTransactionRow::into_domain).transpose()
    }

    async fn transactions(&self, member_id: Uuid) -> RepositoryResult<Vec<SavingsTransaction>> {
        let rows = sqlx::query_as::<_, SavingsTransactionRow>(
            r#"
            SELECT id, member_id, order_id, kind, amount, balance, created_at
            FROM savings_transactions
            WHERE member_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SavingsTransactionRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SavingsAccountRow {
    member_id: Uuid,
    total_savings: BigDecimal,
    available_for_withdrawal: BigDecimal,
    annual_interest_rate: BigDecimal,
    last_rollover_date: NaiveDate,
    updated_at: DateTime<Utc>,
}

impl SavingsAccountRow {
    fn into_domain(self) -> SavingsAccount {
        SavingsAccount {
            member_id: self.member_id,
            total_savings: self.total_savings,
            available_for_withdrawal: self.available_for_withdrawal,
            annual_interest_rate: self.annual_interest_rate,
            last_rollover_date: self.last_rollover_date,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SavingsTransactionRow {
    id: Uuid,
    member_id: Uuid,
    order_id: Option<Uuid>,
    kind: String,
    amount: BigDecimal,
    balance: BigDecimal,
    created_at: DateTime<Utc>,
}

impl SavingsTransactionRow {
    fn into_domain(self) -> RepositoryResult<SavingsTransaction> {
        let kind: SavingsTransactionKind = self
            .kind
            .parse()
            .map_err(|e: String| RepositoryError::Storage(format!("unreadable kind column: {}", e)))?;

        Ok(SavingsTransaction {
            id: self.id,
            member_id: self.member_id,
            order_id: self.order_id,
            kind,
            amount: self.amount,
            balance: self.balance,
            created_at: self.created_at,
        })
    }
}
