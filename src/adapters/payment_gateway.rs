use async_trait::async_trait;
use bigdecimal::BigDecimal;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::ports::{
    DisbursementGateway, DisbursementKind, FinancePartner, FinanceQuote, FinanceSubmission,
    GatewayError,
};

#[derive(Debug, Serialize)]
struct DisbursementRequest<'a> {
    order_id: Uuid,
    kind: DisbursementKind,
    amount: &'a BigDecimal,
}

#[derive(Debug, Deserialize)]
struct DisbursementResponse {
    reference_id: String,
}

/// HTTP client for the payment gateway that fronts both the disbursement
/// rail and the finance partner.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HttpPaymentGateway {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let url = self.url(path);
        let request = self.client.post(&url).json(body);

        // Partner rejections are business answers, not outages; they don't trip the breaker.
        let result = self
            .circuit_breaker
            .call_with(
                |err: &GatewayError| !matches!(err, GatewayError::Rejected(_)),
                async move {
                    let response = request
                        .send()
                        .await
                        .map_err(|e| GatewayError::Request(e.to_string()))?;
                    decode::<R>(response).await
                },
            )
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "payment gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

async fn decode<R>(response: Response) -> Result<R, GatewayError>
where
    R: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Rejected(format!("{}: {}", status, body)));
    }
    if !status.is_success() {
        return Err(GatewayError::Request(format!("gateway answered {}", status)));
    }

    response
        .json::<R>()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl DisbursementGateway for HttpPaymentGateway {
    async fn request_disbursement(
        &self,
        order_id: Uuid,
        kind: DisbursementKind,
        amount: &BigDecimal,
    ) -> Result<String, GatewayError> {
        let request = DisbursementRequest {
            order_id,
            kind,
            amount,
        };
        let response: DisbursementResponse = self.post("disbursements", &request).await?;

        tracing::info!(
            order_id = %order_id,
            kind = kind.as_str(),
            amount = %amount,
            reference_id = %response.reference_id,
            "Disbursement accepted"
        );
        Ok(response.reference_id)
    }
}

#[async_trait]
impl FinancePartner for HttpPaymentGateway {
    async fn submit(&self, submission: &FinanceSubmission) -> Result<FinanceQuote, GatewayError> {
        let quote: FinanceQuote = self.post("finance/submissions", submission).await?;

        tracing::info!(
            order_id = %submission.order_id,
            reference_id = %quote.reference_id,
            down_payment = %quote.down_payment_amount,
            balance = %quote.balance_amount,
            "Finance partner quote received"
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_gateway_creation() {
        let gateway = HttpPaymentGateway::new("http://localhost:8089/".to_string());
        assert_eq!(gateway.url("disbursements"), "http://localhost:8089/disbursements");
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_disbursement_returns_reference() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/disbursements")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"reference_id":"MPESA-123"}"#)
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(server.url());
        let reference = gateway
            .request_disbursement(
                Uuid::new_v4(),
                DisbursementKind::Balance,
                &BigDecimal::from(184_000),
            )
            .await
            .unwrap();

        assert_eq!(reference, "MPESA-123");
    }

    #[tokio::test]
    async fn test_client_error_is_a_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/disbursements")
            .with_status(422)
            .with_body("insufficient float")
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(server.url());
        let result = gateway
            .request_disbursement(Uuid::new_v4(), DisbursementKind::DownPayment, &BigDecimal::from(10))
            .await;

        assert!(matches!(result, Err(GatewayError::Rejected(_))));
        assert_eq!(gateway.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_finance_quote_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/finance/submissions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"reference_id":"FIN-9","down_payment_amount":"55200","balance_amount":"128800"}"#,
            )
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::new(server.url());
        let quote = gateway
            .submit(&FinanceSubmission {
                order_id: Uuid::new_v4(),
                produce_type: "maize".to_string(),
                total_amount: BigDecimal::from(200_000),
                net_amount: BigDecimal::from(184_000),
                contributions: vec![],
                down_payment_pct: BigDecimal::from(30),
            })
            .await
            .unwrap();

        assert_eq!(quote.reference_id, "FIN-9");
        assert_eq!(quote.down_payment_amount, BigDecimal::from_str("55200").unwrap());
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/disbursements")
            .with_status(500)
            .expect_at_least(2)
            .create_async()
            .await;

        let gateway = HttpPaymentGateway::with_circuit_breaker(server.url(), 2, 60);
        for _ in 0..2 {
            let _ = gateway
                .request_disbursement(Uuid::new_v4(), DisbursementKind::Balance, &BigDecimal::from(1))
                .await;
        }

        let result = gateway
            .request_disbursement(Uuid::new_v4(), DisbursementKind::Balance, &BigDecimal::from(1))
            .await;
        assert!(matches!(result, Err(GatewayError::CircuitOpen(_))));
    }
}
