#![allow(dead_code)]

use common::Side;
use server::config::ServerConfig;
use server::database::{DatabaseConnection, DbAccount};
use server::database_manager::{DatabaseHandle, DatabaseManager};
use server::wager_manager::CoinSource;
use surrealdb::engine::local::{Db, Mem};
use surrealdb::Surreal;
use tokio::sync::mpsc;

pub async fn memory_database() -> DatabaseConnection<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    DatabaseConnection::from_surreal(db, "test", "mokesell").await.unwrap()
}

pub fn test_config() -> ServerConfig {
    ServerConfig::from_lookup(|name| match name {
        "JWT_SECRET" => Some("test-secret".into()),
        _ => None,
    })
    .unwrap()
}

/// An account holding `balance` minor units, with a password nobody can log in with.
pub fn account_with_balance(username: &str, balance: i64) -> DbAccount {
    DbAccount {
        balance,
        ..DbAccount::new(
            username,
            username,
            format!("{username}@example.com"),
            "not-a-password-hash",
        )
    }
}

pub async fn database_with(accounts: &[DbAccount]) -> DatabaseHandle {
    let mut db = memory_database().await;
    for account in accounts {
        db.add_account(account).await.unwrap();
    }
    let (tx, rx) = mpsc::channel(32);
    let mut manager = DatabaseManager::new(db, rx);
    tokio::spawn(async move {
        manager.manage().await;
    });
    DatabaseHandle::new(tx)
}

/// Always lands on the same side.
pub struct FixedCoin(pub Side);

impl CoinSource for FixedCoin {
    fn flip(&self) -> Side {
        self.0
    }
}
