mod auth;
mod billing;
mod chat;
mod config;
mod gateway;
mod ledger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use ledger::CreditLedger;

#[derive(Parser)]
#[command(
    name = "fluente",
    version,
    about = "Language-practice chat backend with a credit-based message allowance"
)]
struct Cli {
    /// Path to the TOML config file (defaults to fluente.toml in the workspace)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show a user's credit balance
    Balance { user_id: String },
    /// Grant credits to a user (operator tool; purchases go through checkout)
    Grant { user_id: String, amount: u32 },
    /// List the purchasable credit packages
    Packages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config::workspace_dir()?.join("fluente.toml"),
    };
    let config = Config::load(&config_path)?;

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            gateway::run_gateway(&host, port, config).await
        }
        Command::Balance { user_id } => {
            let ledger = open_ledger(&config)?;
            let balance = ledger.balance(&user_id)?;
            println!(
                "{user_id}: {} credits, {} messages into the current credit",
                balance.credits, balance.message_count
            );
            Ok(())
        }
        Command::Grant { user_id, amount } => {
            let ledger = open_ledger(&config)?;
            let total = ledger.add_credits(&user_id, amount)?;
            println!("Granted {amount} credits to {user_id} (new total: {total})");
            Ok(())
        }
        Command::Packages => {
            for package in billing::PACKAGES {
                let price = package.price_cents as f64 / 100.0;
                let popular = if package.popular { "  ★ popular" } else { "" };
                println!(
                    "{:<14} R${:>6.2}  {:>4} credits  {}{popular}",
                    package.id, price, package.credits, package.name
                );
            }
            Ok(())
        }
    }
}

fn open_ledger(config: &Config) -> Result<CreditLedger> {
    let workspace = config::workspace_dir()?;
    std::fs::create_dir_all(&workspace)?;
    CreditLedger::open(
        &workspace.join("credits.db"),
        config.credits.free_credits,
        config.credits.batch_size,
    )
}
