use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::HttpPaymentGateway;
use crate::config::Config;
use crate::ports::{DisbursementGateway, FinancePartner};
use crate::{AppState, Repositories, Storage};

#[derive(Parser)]
#[command(name = "harvest-core")]
#[command(about = "Harvest Core - produce order contribution and payment distribution engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Member savings commands
    #[command(subcommand)]
    Savings(SavingsCommands),

    /// Print the distribution report of an order
    Report {
        /// Order UUID
        #[arg(value_name = "ORDER_ID")]
        order_id: Uuid,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Csv)]
        format: ReportFormat,
    },

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Subcommand)]
pub enum SavingsCommands {
    /// Post interest for every account whose anniversary has been reached
    Rollover {
        /// Evaluation date (YYYY-MM-DD), defaults to today
        #[arg(long, value_name = "DATE")]
        as_of: Option<NaiveDate>,
    },

    /// Show a member's savings statement
    Show {
        /// Member UUID
        #[arg(value_name = "MEMBER_ID")]
        member_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

/// Connects storage (Postgres when `DATABASE_URL` is set, memory otherwise)
/// and the payment gateway, and wires the application.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let repos = match &config.database_url {
        Some(url) => {
            let pool = crate::db::create_pool(url).await?;
            tracing::info!("Connected to Postgres");
            Repositories::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            Repositories::in_memory()
        }
    };

    let gateway = Arc::new(HttpPaymentGateway::with_circuit_breaker(
        config.gateway.url.clone(),
        config.gateway.failure_threshold,
        config.gateway.reset_timeout_secs,
    ));
    tracing::info!("Payment gateway client initialized with URL: {}", config.gateway.url);

    let finance: Arc<dyn FinancePartner> = gateway.clone();
    let disbursements: Arc<dyn DisbursementGateway> = gateway;
    Ok(AppState::new(config, repos, finance, disbursements))
}

pub async fn handle_serve(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    if let Storage::Postgres(pool) = &state.storage {
        crate::db::run_migrations(pool).await?;
    }

    let app = crate::create_app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let Some(url) = &config.database_url else {
        anyhow::bail!("DATABASE_URL must be set to run migrations");
    };
    let pool = crate::db::create_pool(url).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_savings_rollover(
    state: &AppState,
    as_of: Option<NaiveDate>,
) -> anyhow::Result<()> {
    // A fresh in-memory store holds no accounts to roll over.
    if matches!(state.storage, Storage::Memory) {
        anyhow::bail!("DATABASE_URL must be set to run the interest rollover");
    }
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let summary = state.rollover.run(as_of).await?;

    println!("✓ Interest rollover as of {}", as_of);
    println!("  Accounts scanned: {}", summary.accounts_scanned);
    println!("  Interest posted:  {}", summary.interest_posted);
    println!("  Failures:         {}", summary.failures);

    if summary.failures > 0 {
        anyhow::bail!("{} account(s) failed to roll over", summary.failures);
    }
    Ok(())
}

pub async fn handle_savings_show(state: &AppState, member_id: Uuid) -> anyhow::Result<()> {
    let statement = state
        .savings
        .statement(member_id, Utc::now().date_naive())
        .await?;

    println!("Savings account {}", member_id);
    println!("  Total savings:       {}", statement.account.total_savings);
    println!("  Available:           {}", statement.account.available_for_withdrawal);
    println!("  Interest rate:       {}%", statement.account.annual_interest_rate);
    println!("  Next rollover:       {}", statement.next_rollover_date);
    println!("  Projected interest:  {}", statement.projected_interest);
    println!();
    println!("{:<12} {:<38} {:>14} {:>14}", "Kind", "Reference", "Amount", "Balance");
    println!("{}", "-".repeat(81));
    for tx in &statement.transactions {
        println!(
            "{:<12} {:<38} {:>14} {:>14}",
            tx.kind.as_str(),
            tx.reference(),
            tx.amount.to_string(),
            tx.balance.to_string()
        );
    }

    Ok(())
}

pub async fn handle_report(
    state: &AppState,
    order_id: Uuid,
    format: ReportFormat,
) -> anyhow::Result<()> {
    let report = state.grading.report(order_id).await?;
    match format {
        ReportFormat::Csv => print!("{}", report.to_csv()?),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: (not set, in-memory storage)"),
    }
    println!("  Payment Gateway URL: {}", config.gateway.url);
    println!("  Savings Rate per kg: {}", config.savings.rate_per_kg);
    println!("  Annual Interest Rate: {}%", config.savings.annual_interest_rate);
    println!("  Platform Fee: {}%", config.fees.platform_fee_pct);
    println!("  Finance Markup: {}%", config.fees.finance_markup_pct);
    println!("  Grading Fee: {:?}", config.fees.grading_fee);
    println!("  Insurance: {}%", config.fees.insurance_pct);
    for (produce, floor) in config.floor_prices.entries() {
        println!("  Floor Price: {} = {}", produce, floor);
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user = &url[slash_pos + 2..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
