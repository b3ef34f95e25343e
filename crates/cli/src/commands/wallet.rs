//! Wallet operations: deposit, withdraw, reset, reconcile

use anyhow::{Context, Result};
use rust_decimal::Decimal;

use crate::commands;
use crate::config::AppConfig;

/// Deposit funds into the wallet
pub async fn deposit(config: &AppConfig, amount: Decimal) -> Result<()> {
    let palmpay = commands::open(config).await?;
    let result = palmpay
        .deposit(&config.user_id, amount)
        .await
        .context("Deposit failed")?;

    println!("✅ Deposit successful!");
    println!("   Entry:   #{}", result.event_id);
    println!("   Amount:  {}", amount);
    println!("   Balance: {}", result.balance_after);

    palmpay.context().db().close().await;
    Ok(())
}

/// Withdraw funds from the wallet
pub async fn withdraw(config: &AppConfig, amount: Decimal) -> Result<()> {
    let palmpay = commands::open(config).await?;
    let result = palmpay
        .withdraw(&config.user_id, amount)
        .await
        .context("Withdrawal failed")?;

    println!("✅ Withdrawal successful!");
    println!("   Entry:   #{}", result.event_id);
    println!("   Amount:  {}", amount);
    println!("   Balance: {}", result.balance_after);

    palmpay.context().db().close().await;
    Ok(())
}

/// Reset the wallet to zero
pub async fn reset(config: &AppConfig) -> Result<()> {
    let palmpay = commands::open(config).await?;
    let result = palmpay.reset_balance(&config.user_id).await?;
    println!("🔄 Balance reset (entry #{})", result.event_id);
    palmpay.context().db().close().await;
    Ok(())
}

/// Compare the stored balance against the ledger
pub async fn reconcile(config: &AppConfig) -> Result<()> {
    let palmpay = commands::open(config).await?;
    let report = palmpay.reconcile().await?;

    if report.consistent {
        println!("✅ Wallet matches ledger");
    } else {
        println!("⚠️  Wallet does not match ledger");
    }
    println!("   Stored balance: {}", report.stored);
    println!("   Ledger sum:     {}", report.ledger_sum);

    palmpay.context().db().close().await;
    Ok(())
}
