pub mod account_manager;
pub mod config;
pub mod connection_manager;
pub mod database;
pub mod database_manager;
pub mod session;
pub mod wager_manager;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use account_manager::AccountManager;
use config::ServerConfig;
use connection_manager::Services;
use database::DatabaseConnection;
use database_manager::{DatabaseHandle, DatabaseManager};
use session::SessionKeys;
use wager_manager::{CoinSource, WagerHandle, WagerManager};

const QUEUE_DEPTH: usize = 32;

/// The background actors behind a running server.
pub struct Workers {
    pub database: JoinHandle<()>,
    pub wagers: JoinHandle<()>,
}

/// Starts the database and wager actors and hands back what client
/// connections need to reach them.
pub fn spawn_services<Conn, C>(
    db_connection: DatabaseConnection<Conn>,
    coin: C,
    config: &ServerConfig,
) -> anyhow::Result<(Services, Workers)>
where
    Conn: surrealdb::Connection,
    C: CoinSource,
{
    let (db_tx, db_rx) = mpsc::channel(QUEUE_DEPTH);
    let mut db_manager = DatabaseManager::new(db_connection, db_rx);
    let database = DatabaseHandle::new(db_tx);

    let (wager_tx, wager_rx) = mpsc::channel(QUEUE_DEPTH);
    let mut wager_manager = WagerManager::new(wager_rx, database.clone(), coin);

    let sessions = SessionKeys::new(config.jwt_secret.as_bytes(), config.session_ttl);
    let accounts = AccountManager::new(database, sessions, config.daily_reward)?;

    let workers = Workers {
        database: tokio::spawn(async move {
            db_manager.manage().await;
        }),
        wagers: tokio::spawn(async move {
            wager_manager.manage().await;
        }),
    };

    let services = Services {
        accounts,
        wagers: WagerHandle::new(wager_tx),
        last_active_interval: config.last_active_interval,
    };
    Ok((services, workers))
}
