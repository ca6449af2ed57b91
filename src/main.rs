use clap::Parser;
use harvest_core::cli::{self, Cli, Commands, DbCommands, SavingsCommands};
use harvest_core::config::{Config, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cli::handle_serve(&config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Savings(command) => {
            let state = cli::build_state(&config).await?;
            match command {
                SavingsCommands::Rollover { as_of } => {
                    cli::handle_savings_rollover(&state, as_of).await
                }
                SavingsCommands::Show { member_id } => {
                    cli::handle_savings_show(&state, member_id).await
                }
            }
        }
        Commands::Report { order_id, format } => {
            let state = cli::build_state(&config).await?;
            cli::handle_report(&state, order_id, format).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}
