//! Database initialization and status

use anyhow::{bail, Context, Result};
use palmpay_persistence::{Database, LedgerRepo, TemplateRepo, WalletRepo};
use std::path::Path;

fn db_url(db_path: &Path) -> String {
    format!("sqlite:{}", db_path.display())
}

/// Initialize the database with schema
pub async fn init_database(db_path: &Path, force: bool) -> Result<()> {
    if force && db_path.exists() {
        std::fs::remove_file(db_path).context("Failed to remove existing database")?;
        println!("🗑️  Removed existing database");
    }
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create data directory")?;
    }

    println!("📦 Creating schema...");
    let db = Database::new(&db_url(db_path))
        .await
        .context("Failed to create database")?;
    db.close().await;
    Ok(())
}

/// Show database status
pub async fn show_status(db_path: &Path) -> Result<()> {
    if !db_path.exists() {
        println!("❌ Database not found at {:?}", db_path);
        println!("   Run 'palmpay init' to create the database");
        return Ok(());
    }

    let db = open(db_path).await?;
    let pool = db.pool();

    println!("📊 Database Status");
    println!("   Path: {:?}", db_path);
    println!();
    println!("   Enrolled palms: {}", TemplateRepo::count(pool).await?);
    println!("   Ledger entries: {}", LedgerRepo::count(pool).await?);
    println!("   Balance:        {}", WalletRepo::balance(pool).await?);

    db.close().await;
    Ok(())
}

/// Open an existing database
pub async fn open(db_path: &Path) -> Result<Database> {
    if !db_path.exists() {
        bail!("Database not found at {:?}. Run 'palmpay init' first.", db_path);
    }
    Database::new(&db_url(db_path))
        .await
        .context("Failed to connect to database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("palmpay.db");

        assert!(open(&path).await.is_err());
        init_database(&path, false).await.unwrap();
        let db = open(&path).await.unwrap();
        assert_eq!(LedgerRepo::count(db.pool()).await.unwrap(), 0);
        db.close().await;

        // Force re-creates from scratch
        init_database(&path, true).await.unwrap();
        assert!(path.exists());
    }
}
