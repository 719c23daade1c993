//! CLI commands

use mintfund_core::Amount;
use mintfund_multisig::{MultiSigRequest, RequestStatus, RequestType};
use rust_decimal::Decimal;
use serde_json::json;

use crate::context::AppContext;

/// Propose creating the fund token (requires a second manager's approval)
pub async fn propose_create_token(
    ctx: &AppContext,
    manager: &str,
    name: &str,
    symbol: &str,
    decimals: u32,
    initial_supply: Decimal,
    treasury_account: &str,
) -> Result<(), anyhow::Error> {
    let payload = json!({
        "name": name,
        "symbol": symbol,
        "decimals": decimals,
        "initial_supply": initial_supply.to_string(),
        "treasury_account": treasury_account,
    });
    let request = ctx
        .workflow
        .initiate(RequestType::TokenCreation, payload, manager)
        .await?;

    print_proposed(&request);
    Ok(())
}

/// Propose minting additional supply
pub async fn propose_mint(
    ctx: &AppContext,
    manager: &str,
    amount: Decimal,
) -> Result<(), anyhow::Error> {
    let request = ctx
        .workflow
        .initiate(
            RequestType::TokenMint,
            json!({ "amount": amount.to_string() }),
            manager,
        )
        .await?;

    print_proposed(&request);
    Ok(())
}

/// Propose burning supply
pub async fn propose_burn(
    ctx: &AppContext,
    manager: &str,
    amount: Decimal,
) -> Result<(), anyhow::Error> {
    let request = ctx
        .workflow
        .initiate(
            RequestType::TokenBurn,
            json!({ "amount": amount.to_string() }),
            manager,
        )
        .await?;

    print_proposed(&request);
    Ok(())
}

/// Propose changing the annual interest rate
pub async fn propose_set_rate(
    ctx: &AppContext,
    manager: &str,
    rate_pct: Decimal,
) -> Result<(), anyhow::Error> {
    let request = ctx
        .workflow
        .initiate(
            RequestType::RateChange,
            json!({ "rate_pct": rate_pct.to_string() }),
            manager,
        )
        .await?;

    print_proposed(&request);
    Ok(())
}

fn print_proposed(request: &MultiSigRequest) {
    println!(
        "✅ Proposed {} ({})",
        request.request_type.as_str(),
        request.id
    );
    println!(
        "   Signatures: {}/{}, expires {}",
        request.signatures.len(),
        request.required_signatures,
        request.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
}

/// Approve a pending request (executes on quorum)
pub async fn approve(ctx: &AppContext, request_id: &str, manager: &str) -> Result<(), anyhow::Error> {
    let request = ctx.workflow.approve(request_id, manager).await?;

    match request.status {
        RequestStatus::Executed => {
            println!(
                "✅ Approved and executed {} (ref: {})",
                request.id,
                request.execution_ref.as_deref().unwrap_or("-")
            );
        }
        _ => {
            println!(
                "✅ Approved {} ({}/{} signatures)",
                request.id,
                request.signatures.len(),
                request.required_signatures
            );
        }
    }
    Ok(())
}

/// Reject a pending request
pub async fn reject(
    ctx: &AppContext,
    request_id: &str,
    manager: &str,
    reason: Option<&str>,
) -> Result<(), anyhow::Error> {
    let request = ctx.workflow.reject(request_id, manager, reason)?;
    println!(
        "✅ Rejected {} ({})",
        request.id,
        request.rejection_reason.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// List requests: pending queue for a manager, or full history
pub async fn requests(
    ctx: &AppContext,
    manager: Option<&str>,
    all: bool,
) -> Result<(), anyhow::Error> {
    let listed = if all {
        ctx.workflow.list_all(None, 50)?
    } else {
        ctx.workflow.list_pending(manager.unwrap_or(""))?
    };

    if listed.is_empty() {
        println!("No requests");
        return Ok(());
    }

    for request in &listed {
        println!(
            "{}  {:22}  {:9}  {}/{}  by {}",
            request.id,
            request.request_type.as_str(),
            request.status.as_str(),
            request.signatures.len(),
            request.required_signatures,
            request.created_by
        );
    }

    let stats = ctx.workflow.stats()?;
    println!(
        "-- {} pending, {} executed, {} rejected",
        stats.pending, stats.executed, stats.rejected
    );
    Ok(())
}

/// Open an investment: deposit fiat, receive pegged tokens
pub async fn invest(ctx: &AppContext, owner: &str, amount: Decimal) -> Result<(), anyhow::Error> {
    let principal = Amount::new(amount)?;
    let investment = ctx.ledger.open_investment(owner, principal).await?;

    println!(
        "✅ Investment {} opened: {} for {} ({} units at {}%)",
        investment.id,
        investment.principal,
        investment.owner,
        investment.token_amount,
        investment.rate_at_open
    );
    Ok(())
}

/// Redeem an investment: return tokens, pay principal + interest
pub async fn redeem(ctx: &AppContext, investment_id: &str) -> Result<(), anyhow::Error> {
    let redemption = ctx.ledger.redeem(investment_id).await?;

    println!(
        "✅ Redeemed {}: payout {} ({} principal + {} interest over {} days)",
        redemption.investment.id,
        redemption.payout,
        redemption.valuation.principal,
        redemption.valuation.interest,
        redemption.valuation.days_elapsed
    );
    Ok(())
}

/// Show an owner's active positions and their current value
pub async fn portfolio(ctx: &AppContext, owner: &str) -> Result<(), anyhow::Error> {
    let portfolio = ctx.ledger.portfolio(owner)?;

    if portfolio.count == 0 {
        println!("No active investments for {}", owner);
        return Ok(());
    }

    for line in &portfolio.entries {
        println!(
            "{}  principal {}  interest {}  value {}  ({} days)",
            line.id,
            line.valuation.principal,
            line.valuation.interest,
            line.valuation.total_value,
            line.valuation.days_elapsed
        );
    }
    println!(
        "-- total {} ({} principal + {} interest) at {}% annual",
        portfolio.total_value,
        portfolio.total_principal,
        portfolio.total_interest,
        portfolio.annual_rate_pct
    );
    Ok(())
}

/// Show the current rate, APY and daily earning figures
pub async fn rate(ctx: &AppContext, principal: Option<Decimal>) -> Result<(), anyhow::Error> {
    println!("Annual rate: {}%", ctx.engine.annual_rate_percent());
    println!("APY (daily compounding): {}%", ctx.engine.compute_apy());

    if let Some(principal) = principal {
        let breakdown = ctx.engine.compute_daily_breakdown(principal);
        println!(
            "On {}: {}/day, {}/month, {}/year",
            principal, breakdown.daily_interest, breakdown.monthly_interest, breakdown.yearly_interest
        );
    }
    Ok(())
}

/// Days of accrual needed to cover a flat fee
pub async fn break_even(
    ctx: &AppContext,
    principal: Decimal,
    fee: Decimal,
) -> Result<(), anyhow::Error> {
    let result = ctx.engine.compute_break_even(principal, fee)?;
    println!(
        "A fee of {} on {} is covered after {} day(s) of interest",
        result.fee, result.principal, result.days
    );
    Ok(())
}

/// Show the fund token record
pub async fn token_info(ctx: &AppContext) -> Result<(), anyhow::Error> {
    match ctx.ledger.token()? {
        Some(token) => {
            println!("Token:    {}", token.token_id);
            println!("Treasury: {}", token.treasury_account);
            println!("Decimals: {}", token.decimals);
            println!("Supply:   {} units", token.total_supply);
            println!("Managers: {}", token.manager_accounts.join(", "));
            println!("Created:  {}", token.created_at.format("%Y-%m-%d %H:%M UTC"));
        }
        None => println!("The fund token has not been created yet"),
    }
    Ok(())
}
