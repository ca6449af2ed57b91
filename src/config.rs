use anyhow::Context;
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::services::fee_schedule::{FeeConfig, FeeDefaults, FloorPriceTable, GradingFee};
use crate::services::savings_accrual::SavingsSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'plain' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub url: String,
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_port: u16,
    /// Absent means in-memory storage.
    pub database_url: Option<String>,
    pub gateway: GatewayConfig,
    pub savings: SavingsSettings,
    pub fees: FeeDefaults,
    pub floor_prices: FloorPriceTable,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let grading_fee = match lookup("GRADING_FEE_FLAT").filter(|v| !v.trim().is_empty()) {
            Some(flat) => GradingFee::Flat(decimal("GRADING_FEE_FLAT", &flat)?),
            None => GradingFee::Percent(decimal("GRADING_FEE_PCT", &var("GRADING_FEE_PCT", "0"))?),
        };
        let fees = FeeDefaults {
            platform_fee_pct: decimal("PLATFORM_FEE_PCT", &var("PLATFORM_FEE_PCT", "5"))?,
            finance_markup_pct: decimal("FINANCE_MARKUP_PCT", &var("FINANCE_MARKUP_PCT", "0"))?,
            grading_fee,
            insurance_pct: decimal("INSURANCE_PCT", &var("INSURANCE_PCT", "0"))?,
        };
        // Transport varies per order; the other defaults must be valid on their own.
        FeeConfig {
            platform_fee_pct: fees.platform_fee_pct.clone(),
            finance_markup_pct: fees.finance_markup_pct.clone(),
            transport_pct: BigDecimal::from(0),
            grading_fee: fees.grading_fee.clone(),
            insurance_pct: fees.insurance_pct.clone(),
        }
        .validate()
        .context("invalid fee configuration")?;

        let savings = SavingsSettings {
            rate_per_kg: decimal("SAVINGS_RATE_PER_KG", &var("SAVINGS_RATE_PER_KG", "2"))?,
            annual_interest_rate: decimal(
                "SAVINGS_ANNUAL_INTEREST_RATE",
                &var("SAVINGS_ANNUAL_INTEREST_RATE", "5"),
            )?,
        };
        if savings.rate_per_kg < BigDecimal::from(0) || savings.annual_interest_rate < BigDecimal::from(0)
        {
            anyhow::bail!("savings rates must not be negative");
        }

        let floor_prices: FloorPriceTable = var("FLOOR_PRICES", "maize=30,beans=80")
            .parse()
            .map_err(|e: String| anyhow::anyhow!("FLOOR_PRICES: {}", e))?;

        Ok(Config {
            server_port: var("SERVER_PORT", "3000")
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            gateway: GatewayConfig {
                url: var("PAYMENT_GATEWAY_URL", "http://localhost:8089"),
                failure_threshold: var("PAYMENT_GATEWAY_FAILURE_THRESHOLD", "3")
                    .parse()
                    .context("PAYMENT_GATEWAY_FAILURE_THRESHOLD must be a number")?,
                reset_timeout_secs: var("PAYMENT_GATEWAY_RESET_SECS", "60")
                    .parse()
                    .context("PAYMENT_GATEWAY_RESET_SECS must be a number")?,
            },
            savings,
            fees,
            floor_prices,
            log_format: var("LOG_FORMAT", "plain").parse()?,
        })
    }
}

fn decimal(key: &str, raw: &str) -> anyhow::Result<BigDecimal> {
    BigDecimal::from_str(raw.trim()).with_context(|| format!("{} must be a decimal number", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = config(&[]).unwrap();
        assert_eq!(config.server_port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.fees.platform_fee_pct, BigDecimal::from(5));
        assert_eq!(config.savings.rate_per_kg, BigDecimal::from(2));
        assert_eq!(config.savings.annual_interest_rate, BigDecimal::from(5));
        assert_eq!(
            config.floor_prices.floor_for("maize"),
            Some(&BigDecimal::from(30))
        );
        assert_eq!(config.log_format, LogFormat::Plain);
    }

    #[test]
    fn flat_grading_fee_overrides_percentage() {
        let config = config(&[("GRADING_FEE_FLAT", "1500"), ("GRADING_FEE_PCT", "2")]).unwrap();
        assert_eq!(config.fees.grading_fee, GradingFee::Flat(BigDecimal::from(1500)));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config(&[("PLATFORM_FEE_PCT", "120")]).is_err());
        assert!(config(&[("SERVER_PORT", "http")]).is_err());
        assert!(config(&[("FLOOR_PRICES", "maize")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(config(&[("SAVINGS_RATE_PER_KG", "-1")]).is_err());
    }

    #[test]
    fn empty_floor_table_is_allowed() {
        let config = config(&[("FLOOR_PRICES", "")]).unwrap();
        assert!(config.floor_prices.is_empty());
    }
}
