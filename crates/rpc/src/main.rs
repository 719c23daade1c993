//! MintFund CLI - Main entry point

use clap::{Parser, Subcommand};
use mintfund_rpc::{commands, AppContext};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mintfund")]
#[command(about = "MintFund - Tokenized money-market custodial backend", long_about = None)]
struct Cli {
    /// Data directory path
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Registered manager identities, comma separated
    #[arg(long, default_value = "manager1,manager2", value_delimiter = ',')]
    managers: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose a privileged treasury operation (needs a second approval)
    Propose {
        /// Manager proposing the operation
        #[arg(long)]
        manager: String,

        #[command(subcommand)]
        operation: ProposeOp,
    },

    /// Approve a pending request (executes on the second signature)
    Approve {
        request_id: String,
        /// Approving manager
        #[arg(long)]
        manager: String,
    },

    /// Reject a pending request
    Reject {
        request_id: String,
        /// Rejecting manager
        #[arg(long)]
        manager: String,
        /// Reason for the rejection
        #[arg(long)]
        reason: Option<String>,
    },

    /// List requests awaiting a manager's signature (or all with --all)
    Requests {
        /// Manager whose queue to show
        #[arg(long)]
        manager: Option<String>,
        /// Show the full history instead of the pending queue
        #[arg(long)]
        all: bool,
    },

    /// Deposit and receive pegged tokens
    Invest {
        /// Investor's ledger account
        owner: String,
        /// Principal amount
        amount: Decimal,
    },

    /// Redeem an investment for principal plus accrued interest
    Redeem { investment_id: String },

    /// Show active positions and their current value
    Portfolio {
        /// Investor's ledger account
        owner: String,
    },

    /// Show the current annual rate and APY
    Rate {
        /// Also show daily/monthly/yearly earnings on this principal
        #[arg(long)]
        principal: Option<Decimal>,
    },

    /// Days of accrual needed to cover a flat fee
    BreakEven { principal: Decimal, fee: Decimal },

    /// Show the fund token record
    TokenInfo,
}

#[derive(Subcommand)]
enum ProposeOp {
    /// Create the fund token (once)
    CreateToken {
        #[arg(long, default_value = "MintFund Token")]
        name: String,
        #[arg(long, default_value = "MMF")]
        symbol: String,
        #[arg(long, default_value = "2")]
        decimals: u32,
        /// Initial supply as a fiat-equivalent amount
        #[arg(long)]
        initial_supply: Decimal,
        /// Treasury account on the ledger
        #[arg(long)]
        treasury: String,
    },

    /// Mint additional supply to the treasury
    Mint { amount: Decimal },

    /// Burn supply from the treasury
    Burn { amount: Decimal },

    /// Change the annual interest rate (percent)
    SetRate { rate_pct: Decimal },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let ctx = AppContext::new(&cli.data, cli.managers)?;

    match cli.command {
        Commands::Propose { manager, operation } => match operation {
            ProposeOp::CreateToken {
                name,
                symbol,
                decimals,
                initial_supply,
                treasury,
            } => {
                commands::propose_create_token(
                    &ctx,
                    &manager,
                    &name,
                    &symbol,
                    decimals,
                    initial_supply,
                    &treasury,
                )
                .await?;
            }
            ProposeOp::Mint { amount } => {
                commands::propose_mint(&ctx, &manager, amount).await?;
            }
            ProposeOp::Burn { amount } => {
                commands::propose_burn(&ctx, &manager, amount).await?;
            }
            ProposeOp::SetRate { rate_pct } => {
                commands::propose_set_rate(&ctx, &manager, rate_pct).await?;
            }
        },

        Commands::Approve {
            request_id,
            manager,
        } => {
            commands::approve(&ctx, &request_id, &manager).await?;
        }

        Commands::Reject {
            request_id,
            manager,
            reason,
        } => {
            commands::reject(&ctx, &request_id, &manager, reason.as_deref()).await?;
        }

        Commands::Requests { manager, all } => {
            commands::requests(&ctx, manager.as_deref(), all).await?;
        }

        Commands::Invest { owner, amount } => {
            commands::invest(&ctx, &owner, amount).await?;
        }

        Commands::Redeem { investment_id } => {
            commands::redeem(&ctx, &investment_id).await?;
        }

        Commands::Portfolio { owner } => {
            commands::portfolio(&ctx, &owner).await?;
        }

        Commands::Rate { principal } => {
            commands::rate(&ctx, principal).await?;
        }

        Commands::BreakEven { principal, fee } => {
            commands::break_even(&ctx, principal, fee).await?;
        }

        Commands::TokenInfo => {
            commands::token_info(&ctx).await?;
        }
    }

    Ok(())
}
