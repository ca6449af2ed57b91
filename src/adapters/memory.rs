//! In-memory repositories, used by tests and by storage-less runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Contribution, GradingDecision, Member, Order, SavingsAccount, SavingsTransaction,
    SavingsTransactionKind,
};
use crate::domain::money::zero;
use crate::ports::{
    ContributionRepository, MemberRepository, OrderRepository, RepositoryError,
    RepositoryResult, SavingsRepository,
};

#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: RwLock<HashMap<Uuid, Member>>,
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    async fn insert(&self, member: &Member) -> RepositoryResult<Member> {
        let mut members = self.members.write().await;
        if members.contains_key(&member.id) {
            return Err(RepositoryError::Conflict(format!("member {} exists", member.id)));
        }
        members.insert(member.id, member.clone());
        Ok(member.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Member> {
        self.members
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("member {}", id)))
    }

    async fn list_by_ids(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Member>> {
        let members = self.members.read().await;
        Ok(ids.iter().filter_map(|id| members.get(id).cloned()).collect())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> RepositoryResult<Order> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {} exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Order> {
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", id)))
    }

    async fn update(&self, order: &Order) -> RepositoryResult<Order> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(stored) => {
                *stored = order.clone();
                Ok(order.clone())
            }
            None => Err(RepositoryError::NotFound(format!("order {}", order.id))),
        }
    }
}

#[derive(Default)]
struct ContributionTables {
    contributions: HashMap<Uuid, Contribution>,
    history: HashMap<Uuid, Vec<GradingDecision>>,
}

#[derive(Default)]
pub struct InMemoryContributionRepository {
    inner: RwLock<ContributionTables>,
}

#[async_trait]
impl ContributionRepository for InMemoryContributionRepository {
    async fn insert(&self, contribution: &Contribution) -> RepositoryResult<Contribution> {
        let mut tables = self.inner.write().await;
        if tables.contributions.contains_key(&contribution.id) {
            return Err(RepositoryError::Conflict(format!(
                "contribution {} exists",
                contribution.id
            )));
        }
        tables
            .contributions
            .insert(contribution.id, contribution.clone());
        Ok(contribution.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Contribution> {
        self.inner
            .read()
            .await
            .contributions
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("contribution {}", id)))
    }

    async fn list_for_order(&self, order_id: Uuid) -> RepositoryResult<Vec<Contribution>> {
        let tables = self.inner.read().await;
        let mut found: Vec<Contribution> = tables
            .contributions
            .values()
            .filter(|c| c.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.created_at);
        Ok(found)
    }

    async fn record_grading(
        &self,
        contribution: &Contribution,
        decision: &GradingDecision,
    ) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;
        match tables.contributions.get_mut(&contribution.id) {
            Some(stored) => *stored = contribution.clone(),
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "contribution {}",
                    contribution.id
                )))
            }
        }
        tables
            .history
            .entry(contribution.id)
            .or_default()
            .push(decision.clone());
        Ok(())
    }

    async fn grading_history(&self, contribution_id: Uuid) -> RepositoryResult<Vec<GradingDecision>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(&contribution_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct SavingsTables {
    accounts: HashMap<Uuid, SavingsAccount>,
    ledger: HashMap<Uuid, Vec<SavingsTransaction>>,
}

#[derive(Default)]
pub struct InMemorySavingsRepository {
    inner: RwLock<SavingsTables>,
}

#[async_trait]
impl SavingsRepository for InMemorySavingsRepository {
    async fn get_account(&self, member_id: Uuid) -> RepositoryResult<Option<SavingsAccount>> {
        Ok(self.inner.read().await.accounts.get(&member_id).cloned())
    }

    async fn list_accounts(&self) -> RepositoryResult<Vec<SavingsAccount>> {
        let tables = self.inner.read().await;
        let mut accounts: Vec<SavingsAccount> = tables.accounts.values().cloned().collect();
        accounts.sort_by_key(|a| a.member_id);
        Ok(accounts)
    }

    async fn append(&self, account: &SavingsAccount, tx: &SavingsTransaction) -> RepositoryResult<()> {
        let mut tables = self.inner.write().await;

        let stored_total = tables
            .accounts
            .get(&account.member_id)
            .map(|a| a.total_savings.clone())
            .unwrap_or_else(zero);
        if stored_total != &tx.balance - &tx.amount {
            return Err(RepositoryError::Conflict(format!(
                "stale savings balance for member {}: stored {}, transaction expects {}",
                account.member_id,
                stored_total,
                &tx.balance - &tx.amount
            )));
        }

        let ledger = tables.ledger.entry(account.member_id).or_default();
        if tx.kind == SavingsTransactionKind::Deposit
            && ledger.iter().any(|existing| {
                existing.kind == SavingsTransactionKind::Deposit && existing.order_id == tx.order_id
            })
        {
            return Err(RepositoryError::Conflict(format!(
                "deposit for member {} on order {:?} already recorded",
                account.member_id, tx.order_id
            )));
        }
        ledger.push(tx.clone());
        tables.accounts.insert(account.member_id, account.clone());
        Ok(())
    }

    async fn find_deposit(
        &self,
        member_id: Uuid,
        order_id: Uuid,
    ) -> RepositoryResult<Option<SavingsTransaction>> {
        Ok(self
            .inner
            .read()
            .await
            .ledger
            .get(&member_id)
            .and_then(|ledger| {
                ledger.iter().find(|tx| {
                    tx.kind == SavingsTransactionKind::Deposit && tx.order_id == Some(order_id)
                })
            })
            .cloned())
    }

    async fn transactions(&self, member_id: Uuid) -> RepositoryResult<Vec<SavingsTransaction>> {
        Ok(self
            .inner
            .read()
            .await
            .ledger
            .get(&member_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::{NaiveDate, Utc};

    #[tokio::test]
    async fn append_rejects_out_of_order_transactions() {
        let repo = InMemorySavingsRepository::default();
        let member_id = Uuid::new_v4();
        let opened = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let mut account = SavingsAccount::open(member_id, BigDecimal::from(5), opened);
        let first = account.credit_deposit(Uuid::new_v4(), BigDecimal::from(100), Utc::now());
        repo.append(&account, &first).await.unwrap();

        // A writer that read the account before `first` was appended.
        let mut stale = SavingsAccount::open(member_id, BigDecimal::from(5), opened);
        let late = stale.credit_deposit(Uuid::new_v4(), BigDecimal::from(50), Utc::now());
        let err = repo.append(&stale, &late).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        assert_eq!(repo.transactions(member_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_rejects_second_deposit_for_same_order() {
        let repo = InMemorySavingsRepository::default();
        let member_id = Uuid::new_v4();
        let order_id = Uuid::new_v4();
        let mut account = SavingsAccount::open(
            member_id,
            BigDecimal::from(5),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        );

        let first = account.credit_deposit(order_id, BigDecimal::from(100), Utc::now());
        repo.append(&account, &first).await.unwrap();
        let second = account.credit_deposit(order_id, BigDecimal::from(100), Utc::now());
        assert!(matches!(
            repo.append(&account, &second).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(repo.find_deposit(member_id, order_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let repo = InMemoryOrderRepository::default();
        assert!(matches!(
            repo.get_by_id(Uuid::new_v4()).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
