//! History and balance queries

use anyhow::Result;
use palmpay_core::ScanEvent;
use palmpay_settlement::PalmPay;

use crate::commands;
use crate::config::AppConfig;

pub async fn history(config: &AppConfig, limit: Option<u32>, mine: bool) -> Result<()> {
    let palmpay = commands::open(config).await?;

    let user = mine.then_some(config.user_id.as_str());
    let events = select_history(&palmpay, user, limit).await?;

    if events.is_empty() {
        println!("📭 No transactions yet");
    } else {
        println!("📜 Transaction History ({} of {})", events.len(), palmpay.scan_count().await?);
        println!();
        for event in &events {
            print_event(event);
        }
    }

    if let Some(last) = palmpay.latest_successful_payment().await? {
        println!();
        println!("   Last payment: {} from {}", last.amount, last.counterparty.as_deref().unwrap_or("-"));
    }

    palmpay.context().db().close().await;
    Ok(())
}

/// Newest entries, optionally one user's only. The limit applies after the
/// user filter.
async fn select_history(
    palmpay: &PalmPay,
    user_id: Option<&str>,
    limit: Option<u32>,
) -> Result<Vec<ScanEvent>> {
    let events = match (user_id, limit) {
        (Some(user_id), limit) => {
            let mut events = palmpay.history_for(user_id).await?;
            if let Some(limit) = limit {
                events.truncate(limit as usize);
            }
            events
        }
        (None, Some(limit)) => palmpay.history_pager(limit).next_page().await?,
        (None, None) => palmpay.get_history().await?,
    };
    Ok(events)
}

pub async fn balance(config: &AppConfig) -> Result<()> {
    let palmpay = commands::open(config).await?;
    println!("💰 Balance: {}", palmpay.get_balance().await?);
    palmpay.context().db().close().await;
    Ok(())
}

fn print_event(event: &ScanEvent) {
    println!(
        "   #{:<5} {}  {:<32} {:>12}",
        event.id,
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        event.label(),
        event.amount
    );
    if let Some(note) = &event.note {
        println!("          {}", note);
    }
}
