//! Compulsory per-kg savings withholding and annual interest rollover.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::money::{zero, CURRENCY_SCALE};
use crate::domain::{AccountState, SavingsAccount, SavingsTransaction};
use crate::error::EngineError;
use crate::ports::{RepositoryError, SavingsRepository};
use crate::services::locks::KeyedLocks;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsSettings {
    /// KES withheld per accepted kilogram.
    pub rate_per_kg: BigDecimal,
    /// Rate given to newly opened accounts, in percent per year.
    pub annual_interest_rate: BigDecimal,
}

impl Default for SavingsSettings {
    fn default() -> Self {
        Self {
            rate_per_kg: BigDecimal::from(2),
            annual_interest_rate: BigDecimal::from(5),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsStatement {
    pub account: SavingsAccount,
    pub state: AccountState,
    pub next_rollover_date: NaiveDate,
    pub projected_interest: BigDecimal,
    pub transactions: Vec<SavingsTransaction>,
}

pub struct SavingsAccrual {
    savings: Arc<dyn SavingsRepository>,
    locks: KeyedLocks,
    settings: SavingsSettings,
}

impl SavingsAccrual {
    pub fn new(savings: Arc<dyn SavingsRepository>, settings: SavingsSettings) -> Self {
        Self {
            savings,
            locks: KeyedLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &SavingsSettings {
        &self.settings
    }

    /// Amount withheld for `accepted_kg`, in cents.
    pub fn withholding(&self, accepted_kg: &BigDecimal) -> BigDecimal {
        (accepted_kg * &self.settings.rate_per_kg).round(CURRENCY_SCALE)
    }

    pub async fn deposit(
        &self,
        member_id: Uuid,
        order_id: Uuid,
        accepted_kg: &BigDecimal,
    ) -> Result<SavingsTransaction, EngineError> {
        self.deposit_at(member_id, order_id, accepted_kg, Utc::now())
            .await
    }

    /// Credits the savings withheld on one order. A retry for the same
    /// (member, order) with the same amount returns the original entry; a
    /// retry with another amount fails with `DuplicateDeposit`.
    pub async fn deposit_at(
        &self,
        member_id: Uuid,
        order_id: Uuid,
        accepted_kg: &BigDecimal,
        at: DateTime<Utc>,
    ) -> Result<SavingsTransaction, EngineError> {
        if accepted_kg <= &zero() {
            return Err(EngineError::InvalidAmount(format!(
                "accepted quantity must be greater than zero, got {} kg",
                accepted_kg
            )));
        }
        let amount = self.withholding(accepted_kg);

        let _guard = self.locks.lock(member_id).await;
        if let Some(existing) = self.savings.find_deposit(member_id, order_id).await? {
            return self.replayed_deposit(existing, &amount);
        }

        let mut account = match self.savings.get_account(member_id).await? {
            Some(account) => account,
            None => SavingsAccount::open(
                member_id,
                self.settings.annual_interest_rate.clone(),
                at.date_naive(),
            ),
        };
        let tx = account.credit_deposit(order_id, amount.clone(), at);

        match self.savings.append(&account, &tx).await {
            Ok(()) => {}
            // Another process may have posted the same deposit first.
            Err(RepositoryError::Conflict(detail)) => {
                if let Some(existing) = self.savings.find_deposit(member_id, order_id).await? {
                    return self.replayed_deposit(existing, &amount);
                }
                return Err(RepositoryError::Conflict(detail).into());
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            member_id = %member_id,
            order_id = %order_id,
            amount = %tx.amount,
            balance = %tx.balance,
            "Savings deposit posted"
        );
        Ok(tx)
    }

    fn replayed_deposit(
        &self,
        existing: SavingsTransaction,
        amount: &BigDecimal,
    ) -> Result<SavingsTransaction, EngineError> {
        if &existing.amount == amount {
            tracing::info!(
                member_id = %existing.member_id,
                order_id = %existing.reference(),
                "Savings deposit already posted, returning original"
            );
            return Ok(existing);
        }

        tracing::warn!(
            member_id = %existing.member_id,
            order_id = %existing.reference(),
            posted = %existing.amount,
            requested = %amount,
            "Conflicting savings deposit refused"
        );
        Err(EngineError::DuplicateDeposit {
            member_id: existing.member_id,
            order_id: existing.order_id.unwrap_or_default(),
        })
    }

    pub async fn withdraw(
        &self,
        member_id: Uuid,
        amount: &BigDecimal,
    ) -> Result<SavingsTransaction, EngineError> {
        self.withdraw_at(member_id, amount, Utc::now()).await
    }

    pub async fn withdraw_at(
        &self,
        member_id: Uuid,
        amount: &BigDecimal,
        at: DateTime<Utc>,
    ) -> Result<SavingsTransaction, EngineError> {
        if amount <= &zero() {
            return Err(EngineError::InvalidAmount(format!(
                "withdrawal amount must be greater than zero, got {}",
                amount
            )));
        }

        let _guard = self.locks.lock(member_id).await;
        let mut account = self.load(member_id).await?;
        if amount > &account.available_for_withdrawal {
            tracing::warn!(
                member_id = %member_id,
                requested = %amount,
                available = %account.available_for_withdrawal,
                "Withdrawal refused"
            );
            return Err(EngineError::InsufficientFunds {
                requested: amount.clone(),
                available: account.available_for_withdrawal.clone(),
            });
        }

        let tx = account.debit_withdrawal(amount.clone(), at);
        self.savings.append(&account, &tx).await?;

        tracing::info!(
            member_id = %member_id,
            amount = %tx.amount,
            balance = %tx.balance,
            "Savings withdrawal posted"
        );
        Ok(tx)
    }

    /// Posts one year of interest when `as_of` has reached the anniversary.
    /// Returns `None` while the account is still inside its window.
    pub async fn accrue_interest(
        &self,
        member_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Option<SavingsTransaction>, EngineError> {
        let _guard = self.locks.lock(member_id).await;
        let mut account = self.load(member_id).await?;
        if account.state(as_of) == AccountState::Accruing {
            return Ok(None);
        }

        let tx = account.roll_over(Utc::now());
        self.savings.append(&account, &tx).await?;

        tracing::info!(
            member_id = %member_id,
            interest = %tx.amount,
            balance = %tx.balance,
            next_rollover = %account.next_rollover_date(),
            "Savings interest posted"
        );
        Ok(Some(tx))
    }

    pub async fn projected_interest(&self, member_id: Uuid) -> Result<BigDecimal, EngineError> {
        Ok(self.load(member_id).await?.projected_interest())
    }

    pub async fn account(&self, member_id: Uuid) -> Result<SavingsAccount, EngineError> {
        self.load(member_id).await
    }

    pub async fn accounts(&self) -> Result<Vec<SavingsAccount>, EngineError> {
        Ok(self.savings.list_accounts().await?)
    }

    pub async fn statement(
        &self,
        member_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<SavingsStatement, EngineError> {
        let account = self.load(member_id).await?;
        let transactions = self.savings.transactions(member_id).await?;

        Ok(SavingsStatement {
            state: account.state(as_of),
            next_rollover_date: account.next_rollover_date(),
            projected_interest: account.projected_interest(),
            account,
            transactions,
        })
    }

    async fn load(&self, member_id: Uuid) -> Result<SavingsAccount, EngineError> {
        self.savings
            .get_account(member_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("savings account for member {}", member_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySavingsRepository;
    use crate::domain::money::sum;
    use crate::domain::SavingsTransactionKind;
    use chrono::TimeZone;

    fn accrual() -> SavingsAccrual {
        SavingsAccrual::new(
            Arc::new(InMemorySavingsRepository::default()),
            SavingsSettings::default(),
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn deposit_withholds_two_per_kg() {
        let accrual = accrual();
        let member = Uuid::new_v4();

        let tx = accrual
            .deposit(member, Uuid::new_v4(), &BigDecimal::from(120))
            .await
            .unwrap();
        assert_eq!(tx.amount, BigDecimal::from(240));
        assert_eq!(tx.balance, BigDecimal::from(240));

        let tx = accrual
            .deposit(member, Uuid::new_v4(), &BigDecimal::from(50))
            .await
            .unwrap();
        assert_eq!(tx.balance, BigDecimal::from(340));
    }

    #[tokio::test]
    async fn identical_retry_returns_the_original_deposit() {
        let accrual = accrual();
        let (member, order) = (Uuid::new_v4(), Uuid::new_v4());

        let first = accrual.deposit(member, order, &BigDecimal::from(120)).await.unwrap();
        let retry = accrual.deposit(member, order, &BigDecimal::from(120)).await.unwrap();
        assert_eq!(first.id, retry.id);

        let statement = accrual.statement(member, day(2020, 1, 1)).await.unwrap();
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.account.total_savings, BigDecimal::from(240));
    }

    #[tokio::test]
    async fn retry_with_different_quantity_is_a_duplicate() {
        let accrual = accrual();
        let (member, order) = (Uuid::new_v4(), Uuid::new_v4());

        accrual.deposit(member, order, &BigDecimal::from(120)).await.unwrap();
        let err = accrual
            .deposit(member, order, &BigDecimal::from(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDeposit { .. }));
    }

    #[tokio::test]
    async fn deposits_are_locked_until_the_anniversary() {
        let accrual = accrual();
        let member = Uuid::new_v4();
        accrual
            .deposit_at(member, Uuid::new_v4(), &BigDecimal::from(500), at(2025, 3, 1))
            .await
            .unwrap();

        let err = accrual.withdraw(member, &BigDecimal::from(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));

        assert!(accrual
            .accrue_interest(member, day(2026, 2, 28))
            .await
            .unwrap()
            .is_none());

        let interest = accrual
            .accrue_interest(member, day(2026, 3, 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(interest.kind, SavingsTransactionKind::Interest);
        assert_eq!(interest.amount, BigDecimal::from(50));

        let account = accrual.account(member).await.unwrap();
        assert_eq!(account.total_savings, BigDecimal::from(1050));
        assert_eq!(account.available_for_withdrawal, BigDecimal::from(1050));
        // Anniversary moves by one year, not to the as-of date.
        assert_eq!(account.last_rollover_date, day(2026, 3, 1));

        let tx = accrual.withdraw(member, &BigDecimal::from(300)).await.unwrap();
        assert_eq!(tx.amount, BigDecimal::from(-300));
        let account = accrual.account(member).await.unwrap();
        assert_eq!(account.total_savings, BigDecimal::from(750));
        assert_eq!(account.available_for_withdrawal, BigDecimal::from(750));
    }

    #[tokio::test]
    async fn withdrawal_amount_must_be_positive() {
        let accrual = accrual();
        let member = Uuid::new_v4();
        accrual.deposit(member, Uuid::new_v4(), &BigDecimal::from(10)).await.unwrap();

        for amount in [0, -5] {
            let err = accrual
                .withdraw(member, &BigDecimal::from(amount))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)));
        }
    }

    #[tokio::test]
    async fn unknown_member_has_no_account() {
        let accrual = accrual();
        let err = accrual
            .withdraw(Uuid::new_v4(), &BigDecimal::from(5))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(matches!(
            accrual.projected_interest(Uuid::new_v4()).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn projected_interest_does_not_touch_the_account() {
        let accrual = accrual();
        let member = Uuid::new_v4();
        accrual
            .deposit_at(member, Uuid::new_v4(), &BigDecimal::from(1000), at(2025, 1, 1))
            .await
            .unwrap();

        for _ in 0..3 {
            assert_eq!(
                accrual.projected_interest(member).await.unwrap(),
                BigDecimal::from(100)
            );
        }
        let statement = accrual.statement(member, day(2025, 6, 1)).await.unwrap();
        assert_eq!(statement.state, AccountState::Accruing);
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.account.last_rollover_date, day(2025, 1, 1));
    }

    #[tokio::test]
    async fn ledger_balance_is_the_running_sum() {
        let accrual = accrual();
        let member = Uuid::new_v4();
        accrual
            .deposit_at(member, Uuid::new_v4(), &BigDecimal::from(120), at(2024, 5, 1))
            .await
            .unwrap();
        accrual
            .deposit_at(member, Uuid::new_v4(), &BigDecimal::from(75), at(2024, 9, 1))
            .await
            .unwrap();
        accrual.accrue_interest(member, day(2025, 5, 1)).await.unwrap();
        accrual.withdraw(member, &BigDecimal::from(100)).await.unwrap();
        accrual
            .deposit_at(member, Uuid::new_v4(), &BigDecimal::from(33), at(2025, 6, 1))
            .await
            .unwrap();

        let transactions = accrual
            .statement(member, day(2025, 6, 1))
            .await
            .unwrap()
            .transactions;
        assert_eq!(transactions.len(), 5);
        for (i, tx) in transactions.iter().enumerate() {
            let running = sum(transactions[..=i].iter().map(|t| &t.amount));
            assert_eq!(tx.balance, running);
        }
    }

    #[tokio::test]
    async fn concurrent_retries_post_one_deposit() {
        let accrual = Arc::new(accrual());
        let (member, order) = (Uuid::new_v4(), Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let accrual = accrual.clone();
            handles.push(tokio::spawn(async move {
                accrual.deposit(member, order, &BigDecimal::from(120)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let statement = accrual.statement(member, day(2020, 1, 1)).await.unwrap();
        assert_eq!(statement.transactions.len(), 1);
        assert_eq!(statement.account.total_savings, BigDecimal::from(240));
    }
}
