//! Rollover interest use case, run by an external scheduler.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::error::EngineError;
use crate::services::SavingsAccrual;

/// Upper bound on anniversaries caught up per account in one run.
const MAX_CATCH_UP_YEARS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RolloverSummary {
    pub accounts_scanned: usize,
    pub interest_posted: usize,
    pub failures: usize,
}

pub struct RolloverInterest {
    savings: Arc<SavingsAccrual>,
}

impl RolloverInterest {
    pub fn new(savings: Arc<SavingsAccrual>) -> Self {
        Self { savings }
    }

    /// Posts every anniversary reached by `as_of`, catching up missed years.
    /// A failing account is logged and counted; the run carries on.
    pub async fn run(&self, as_of: NaiveDate) -> Result<RolloverSummary, EngineError> {
        let accounts = self.savings.accounts().await?;
        let mut summary = RolloverSummary {
            accounts_scanned: accounts.len(),
            ..RolloverSummary::default()
        };

        for account in accounts {
            for _ in 0..MAX_CATCH_UP_YEARS {
                match self.savings.accrue_interest(account.member_id, as_of).await {
                    Ok(Some(_)) => summary.interest_posted += 1,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::error!(
                            member_id = %account.member_id,
                            error = %err,
                            "Interest rollover failed"
                        );
                        summary.failures += 1;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            as_of = %as_of,
            accounts_scanned = summary.accounts_scanned,
            interest_posted = summary.interest_posted,
            failures = summary.failures,
            "Interest rollover finished"
        );
        Ok(summary)
    }
}
