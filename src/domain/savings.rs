//! Compulsory savings accounts and their append-only transaction ledger.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::money::{percent_of, zero};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsTransactionKind {
    Deposit,
    Withdrawal,
    Interest,
}

impl SavingsTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavingsTransactionKind::Deposit => "deposit",
            SavingsTransactionKind::Withdrawal => "withdrawal",
            SavingsTransactionKind::Interest => "interest",
        }
    }
}

impl FromStr for SavingsTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(SavingsTransactionKind::Deposit),
            "withdrawal" => Ok(SavingsTransactionKind::Withdrawal),
            "interest" => Ok(SavingsTransactionKind::Interest),
            other => Err(format!("unknown savings transaction kind '{}'", other)),
        }
    }
}

/// A signed ledger entry. `balance` is the account total right after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsTransaction {
    pub id: Uuid,
    pub member_id: Uuid,
    /// Set for deposits only; interest and withdrawals carry no order.
    pub order_id: Option<Uuid>,
    pub kind: SavingsTransactionKind,
    pub amount: BigDecimal,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl SavingsTransaction {
    /// Display reference: the order id, or the `interest`/`withdrawal` sentinel.
    pub fn reference(&self) -> String {
        match self.order_id {
            Some(order_id) => order_id.to_string(),
            None => self.kind.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Accruing,
    RolloverDue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsAccount {
    pub member_id: Uuid,
    pub total_savings: BigDecimal,
    pub available_for_withdrawal: BigDecimal,
    pub annual_interest_rate: BigDecimal,
    pub last_rollover_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl SavingsAccount {
    pub fn open(member_id: Uuid, annual_interest_rate: BigDecimal, opened_on: NaiveDate) -> Self {
        Self {
            member_id,
            total_savings: zero(),
            available_for_withdrawal: zero(),
            annual_interest_rate,
            last_rollover_date: opened_on,
            updated_at: Utc::now(),
        }
    }

    /// One calendar year after the last rollover. Feb 29 lands on Feb 28.
    pub fn next_rollover_date(&self) -> NaiveDate {
        self.last_rollover_date
            .checked_add_months(Months::new(12))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn state(&self, as_of: NaiveDate) -> AccountState {
        if as_of >= self.next_rollover_date() {
            AccountState::RolloverDue
        } else {
            AccountState::Accruing
        }
    }

    pub fn projected_interest(&self) -> BigDecimal {
        percent_of(&self.total_savings, &self.annual_interest_rate)
    }

    fn record(
        &mut self,
        kind: SavingsTransactionKind,
        order_id: Option<Uuid>,
        amount: BigDecimal,
        at: DateTime<Utc>,
    ) -> SavingsTransaction {
        self.total_savings = &self.total_savings + &amount;
        self.updated_at = at;

        SavingsTransaction {
            id: Uuid::new_v4(),
            member_id: self.member_id,
            order_id,
            kind,
            amount,
            balance: self.total_savings.clone(),
            created_at: at,
        }
    }

    /// Credits the locked balance; it becomes withdrawable at the next rollover.
    pub fn credit_deposit(
        &mut self,
        order_id: Uuid,
        amount: BigDecimal,
        at: DateTime<Utc>,
    ) -> SavingsTransaction {
        self.record(SavingsTransactionKind::Deposit, Some(order_id), amount, at)
    }

    /// Caller checks `amount <= available_for_withdrawal`.
    pub fn debit_withdrawal(&mut self, amount: BigDecimal, at: DateTime<Utc>) -> SavingsTransaction {
        self.available_for_withdrawal = &self.available_for_withdrawal - &amount;
        self.record(SavingsTransactionKind::Withdrawal, None, -amount, at)
    }

    /// Posts a year of interest, moves the anniversary forward by exactly
    /// one year and unlocks the whole balance.
    pub fn roll_over(&mut self, at: DateTime<Utc>) -> SavingsTransaction {
        let interest = self.projected_interest();
        self.last_rollover_date = self.next_rollover_date();
        let tx = self.record(SavingsTransactionKind::Interest, None, interest, at);
        self.available_for_withdrawal = self.total_savings.clone();
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn anniversary_is_one_calendar_year_later() {
        let account = SavingsAccount::open(Uuid::new_v4(), BigDecimal::from(5), date(2025, 3, 15));
        assert_eq!(account.next_rollover_date(), date(2026, 3, 15));
        assert_eq!(account.state(date(2026, 3, 14)), AccountState::Accruing);
        assert_eq!(account.state(date(2026, 3, 15)), AccountState::RolloverDue);
    }

    #[test]
    fn leap_day_clamps_to_february_28() {
        let account = SavingsAccount::open(Uuid::new_v4(), BigDecimal::from(5), date(2024, 2, 29));
        assert_eq!(account.next_rollover_date(), date(2025, 2, 28));
    }

    #[test]
    fn deposits_stay_locked_until_rollover() {
        let mut account = SavingsAccount::open(Uuid::new_v4(), BigDecimal::from(10), date(2025, 1, 1));
        let tx = account.credit_deposit(Uuid::new_v4(), BigDecimal::from(240), Utc::now());

        assert_eq!(tx.balance, BigDecimal::from(240));
        assert_eq!(account.available_for_withdrawal, zero());

        let interest = account.roll_over(Utc::now());
        assert_eq!(interest.amount, BigDecimal::from(24));
        assert_eq!(account.total_savings, BigDecimal::from(264));
        assert_eq!(account.available_for_withdrawal, BigDecimal::from(264));
        assert_eq!(account.last_rollover_date, date(2026, 1, 1));
    }

    #[test]
    fn withdrawal_is_negative_and_reduces_both_balances() {
        let mut account = SavingsAccount::open(Uuid::new_v4(), BigDecimal::from(0), date(2025, 1, 1));
        account.credit_deposit(Uuid::new_v4(), BigDecimal::from(100), Utc::now());
        account.roll_over(Utc::now());

        let tx = account.debit_withdrawal(BigDecimal::from(30), Utc::now());
        assert_eq!(tx.amount, BigDecimal::from(-30));
        assert_eq!(tx.balance, BigDecimal::from(70));
        assert_eq!(account.available_for_withdrawal, BigDecimal::from(70));
        assert_eq!(tx.reference(), "withdrawal");
    }
}
