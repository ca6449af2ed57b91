#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use harvest_core::config::Config;
use harvest_core::domain::{ContributionStatus, Member, Order, QualityGrade};
use harvest_core::ports::{
    DisbursementGateway, DisbursementKind, FinancePartner, FinanceQuote, FinanceSubmission,
    GatewayError,
};
use harvest_core::services::GradeRequest;
use harvest_core::use_cases::{PlaceOrderInput, RecordContributionInput, RegisterMemberInput};
use harvest_core::{AppState, Repositories};

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    /// Splits the net amount by the requested down payment percentage.
    Exact,
    /// Quotes one shilling more than the net amount.
    Mismatched,
    Unavailable,
}

pub struct StubFinance {
    mode: QuoteMode,
    pub submissions: Mutex<Vec<FinanceSubmission>>,
}

impl StubFinance {
    pub fn new(mode: QuoteMode) -> Self {
        Self {
            mode,
            submissions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FinancePartner for StubFinance {
    async fn submit(&self, submission: &FinanceSubmission) -> Result<FinanceQuote, GatewayError> {
        self.submissions.lock().unwrap().push(submission.clone());

        let down = (&submission.net_amount * &submission.down_payment_pct / BigDecimal::from(100))
            .with_scale(2);
        let balance = &submission.net_amount - &down;
        match self.mode {
            QuoteMode::Exact => Ok(FinanceQuote {
                reference_id: format!("FIN-{}", submission.order_id),
                down_payment_amount: down,
                balance_amount: balance,
            }),
            QuoteMode::Mismatched => Ok(FinanceQuote {
                reference_id: "FIN-BAD".to_string(),
                down_payment_amount: down,
                balance_amount: balance + BigDecimal::from(1),
            }),
            QuoteMode::Unavailable => Err(GatewayError::Request("connection refused".to_string())),
        }
    }
}

pub struct StubGateway {
    fail_on: Option<DisbursementKind>,
    pub calls: Mutex<Vec<(Uuid, DisbursementKind, BigDecimal)>>,
}

impl StubGateway {
    pub fn new(fail_on: Option<DisbursementKind>) -> Self {
        Self {
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DisbursementGateway for StubGateway {
    async fn request_disbursement(
        &self,
        order_id: Uuid,
        kind: DisbursementKind,
        amount: &BigDecimal,
    ) -> Result<String, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push((order_id, kind, amount.clone()));
        if self.fail_on == Some(kind) {
            return Err(GatewayError::Rejected("insufficient float".to_string()));
        }
        Ok(format!("MPESA-{}-{}", kind.as_str(), order_id))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub finance: Arc<StubFinance>,
    pub gateway: Arc<StubGateway>,
    pub group_id: Uuid,
}

/// Default configuration: 5% platform fee, maize floor 30, 2 KES/kg savings.
pub fn test_config() -> Config {
    Config::from_lookup(|_| None).unwrap()
}

pub fn setup_with(mode: QuoteMode, fail_on: Option<DisbursementKind>) -> TestApp {
    let finance = Arc::new(StubFinance::new(mode));
    let gateway = Arc::new(StubGateway::new(fail_on));
    let state = AppState::new(
        &test_config(),
        Repositories::in_memory(),
        finance.clone(),
        gateway.clone(),
    );

    TestApp {
        state,
        finance,
        gateway,
        group_id: Uuid::new_v4(),
    }
}

pub fn setup() -> TestApp {
    setup_with(QuoteMode::Exact, None)
}

impl TestApp {
    pub async fn register(&self, name: &str) -> Member {
        self.state
            .members
            .execute(RegisterMemberInput {
                group_id: self.group_id,
                name: name.to_string(),
                phone: "+254712345678".to_string(),
            })
            .await
            .unwrap()
    }

    /// 500 kg of maize at 400 KES/kg on a 30-ton truck: gross 200,000,
    /// platform 10,000 and transport 10,000, net 180,000.
    pub async fn place_maize_order(&self) -> Order {
        self.state
            .orders
            .execute(PlaceOrderInput {
                buyer_id: Uuid::new_v4(),
                group_id: self.group_id,
                produce_type: "Maize".to_string(),
                required_quantity: BigDecimal::from(500),
                unit: harvest_core::domain::Unit::Kilogram,
                price_per_unit: BigDecimal::from(400),
                truck_tier: "30-ton".to_string(),
                scheduled_date: None,
            })
            .await
            .unwrap()
    }

    pub async fn contribute(&self, order_id: Uuid, member_id: Uuid, quantity: i64) -> Uuid {
        self.state
            .grading
            .record(
                order_id,
                RecordContributionInput {
                    member_id,
                    produce_type: None,
                    quantity: BigDecimal::from(quantity),
                    unit: None,
                    quality_grade: QualityGrade::A,
                },
            )
            .await
            .unwrap()
            .id
    }

    pub async fn accept(&self, contribution_id: Uuid, quantity: i64) {
        self.state
            .grading
            .execute(
                contribution_id,
                GradeRequest {
                    status: ContributionStatus::Accepted,
                    accepted_quantity: BigDecimal::from(quantity),
                    rejection_reason: None,
                    graded_by: Some("clerk".to_string()),
                },
            )
            .await
            .unwrap();
    }

    pub async fn accept_part(&self, contribution_id: Uuid, quantity: i64, reason: &str) {
        self.state
            .grading
            .execute(
                contribution_id,
                GradeRequest {
                    status: ContributionStatus::PartiallyAccepted,
                    accepted_quantity: BigDecimal::from(quantity),
                    rejection_reason: Some(reason.to_string()),
                    graded_by: Some("clerk".to_string()),
                },
            )
            .await
            .unwrap();
    }

    /// Three members deliver 120, 150 and 100 kg; the last is partially
    /// accepted at 80 kg. Returns the order and the members in delivery order.
    pub async fn graded_order(&self) -> (Order, Vec<Member>) {
        let order = self.place_maize_order().await;
        let members = vec![
            self.register("Wanjiku Kamau").await,
            self.register("Otieno Odhiambo").await,
            self.register("Akinyi Atieno").await,
        ];

        let first = self.contribute(order.id, members[0].id, 120).await;
        let second = self.contribute(order.id, members[1].id, 150).await;
        let third = self.contribute(order.id, members[2].id, 100).await;
        self.accept(first, 120).await;
        self.accept(second, 150).await;
        self.accept_part(third, 80, "20kg overripe").await;

        (order, members)
    }

    pub async fn deliver(&self, order_id: Uuid) {
        use harvest_core::domain::OrderStatus;
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ] {
            self.state.orders.transition(order_id, status).await.unwrap();
        }
    }
}
