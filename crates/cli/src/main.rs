//! PalmPay CLI - palm-biometric payments from the command line
//!
//! Usage:
//! ```bash
//! palmpay init
//! palmpay enroll --image file:///palms/user_001.jpg --landmarks palm.json
//! palmpay pay 150.00 --frames live.json --counterparty "Kiran Kirana Store"
//! palmpay history --limit 20
//! palmpay balance
//! palmpay deposit 500
//! palmpay reconcile
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

mod commands;
mod config;
mod db;

use commands::{enroll, history, pay, wallet};
use config::{AppConfig, Overrides};

/// PalmPay - local palm-biometric payments over SQLite
#[derive(Parser)]
#[command(name = "palmpay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Database file path [env: PALMPAY_DB]
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting user [env: PALMPAY_USER]
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    /// Match acceptance threshold in (0, 1] [env: PALMPAY_MATCH_THRESHOLD]
    #[arg(long, global = true, value_parser = config::parse_threshold)]
    pub threshold: Option<f32>,

    /// Consecutive frames required for a stable hand [env: PALMPAY_STABLE_FRAMES]
    #[arg(long, global = true)]
    pub stable_frames: Option<usize>,

    /// Simulated processing delay in ms [env: PALMPAY_PROCESSING_DELAY_MS]
    #[arg(long, global = true)]
    pub delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database with schema
    Init {
        /// Force re-initialization (drops existing data)
        #[arg(long)]
        force: bool,
    },

    /// Show database status
    Status,

    /// Enroll the user's palm from a landmark file
    Enroll {
        /// Reference to the captured palm image
        #[arg(long)]
        image: String,
        /// JSON file with one detection (bounding box + 21 keypoints)
        #[arg(long)]
        landmarks: PathBuf,
    },

    /// Remove the user's palm template
    Unenroll,

    /// Pay by palm, replaying a detection script as the camera feed
    Pay {
        /// Amount to pay
        amount: Decimal,
        /// JSON array of detections (null for frames without a hand)
        #[arg(long)]
        frames: PathBuf,
        /// Merchant shown on the receipt [env: PALMPAY_COUNTERPARTY]
        #[arg(long)]
        counterparty: Option<String>,
    },

    /// Show transaction history, newest first
    History {
        /// Show at most this many entries
        #[arg(long, short)]
        limit: Option<u32>,
        /// Only the acting user's entries
        #[arg(long)]
        mine: bool,
    },

    /// Show wallet balance
    Balance,

    /// Deposit funds into the wallet
    Deposit {
        amount: Decimal,
    },

    /// Withdraw funds from the wallet
    Withdraw {
        amount: Decimal,
    },

    /// Reset the wallet balance to zero
    Reset,

    /// Check the wallet balance against the ledger
    Reconcile,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            db_path: self.db.clone(),
            user_id: self.user.clone(),
            match_threshold: self.threshold,
            stable_frames: self.stable_frames,
            processing_delay_ms: self.delay_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().apply(cli.overrides());

    match cli.command {
        Commands::Init { force } => {
            db::init_database(&config.db_path, force).await?;
            println!("✅ Database initialized at {:?}", config.db_path);
        }

        Commands::Status => {
            db::show_status(&config.db_path).await?;
        }

        Commands::Enroll { image, landmarks } => {
            enroll::enroll(&config, &image, &landmarks).await?;
        }

        Commands::Unenroll => {
            enroll::unenroll(&config).await?;
        }

        Commands::Pay {
            amount,
            frames,
            counterparty,
        } => {
            pay::pay(&config, amount, counterparty, &frames).await?;
        }

        Commands::History { limit, mine } => {
            history::history(&config, limit, mine).await?;
        }

        Commands::Balance => {
            history::balance(&config).await?;
        }

        Commands::Deposit { amount } => {
            wallet::deposit(&config, amount).await?;
        }

        Commands::Withdraw { amount } => {
            wallet::withdraw(&config, amount).await?;
        }

        Commands::Reset => {
            wallet::reset(&config).await?;
        }

        Commands::Reconcile => {
            wallet::reconcile(&config).await?;
        }
    }

    Ok(())
}
