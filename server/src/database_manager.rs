use anyhow::anyhow;
use chrono::{DateTime, Utc};
use surrealdb::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::database::{DatabaseConnection, DbAccount};

pub type Responder<T> = oneshot::Sender<anyhow::Result<T>>;

pub enum DatabaseRequest {
    AddAccount {
        account: Box<DbAccount>,
        responder: Responder<()>,
    },
    GetAccount {
        username: String,
        responder: Responder<Option<DbAccount>>,
    },
    GetAccountByEmail {
        email: String,
        responder: Responder<Option<DbAccount>>,
    },
    GetBalance {
        username: String,
        responder: Responder<Option<i64>>,
    },
    ApplyBalanceDelta {
        username: String,
        delta: i64,
        responder: Responder<Option<i64>>,
    },
    ClaimDailyReward {
        username: String,
        reward: i64,
        now: DateTime<Utc>,
        responder: Responder<Option<i64>>,
    },
    TouchLastActive {
        username: String,
        now: DateTime<Utc>,
        responder: Responder<()>,
    },
}

pub struct DatabaseManager<Conn: Connection> {
    db_connection: DatabaseConnection<Conn>,
    work_queue: mpsc::Receiver<DatabaseRequest>,
}

pub fn transform_err<T>(result: surrealdb::Result<T>) -> anyhow::Result<T> {
    result.map_err(Into::into)
}

impl<Conn: Connection> DatabaseManager<Conn> {
    pub fn new(
        db_connection: DatabaseConnection<Conn>,
        work_queue: mpsc::Receiver<DatabaseRequest>,
    ) -> Self {
        Self {
            db_connection,
            work_queue,
        }
    }

    pub async fn manage(&mut self) {
        // a dropped responder only means the requester gave up waiting
        while let Some(request) = self.work_queue.recv().await {
            match request {
                DatabaseRequest::AddAccount { account, responder } => {
                    trace!(username = %account.username, "add account");
                    let resp = self.db_connection.add_account(&account).await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::GetAccount { username, responder } => {
                    let resp = self.db_connection.get_account(&username).await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::GetAccountByEmail { email, responder } => {
                    let resp = self.db_connection.get_account_by_email(&email).await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::GetBalance { username, responder } => {
                    let resp = self.db_connection.get_balance(&username).await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::ApplyBalanceDelta {
                    username,
                    delta,
                    responder,
                } => {
                    trace!(%username, delta, "apply balance delta");
                    let resp = self.db_connection.apply_balance_delta(&username, delta).await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::ClaimDailyReward {
                    username,
                    reward,
                    now,
                    responder,
                } => {
                    let resp = self
                        .db_connection
                        .claim_daily_reward(&username, reward, now)
                        .await;
                    let _ = responder.send(transform_err(resp));
                }
                DatabaseRequest::TouchLastActive {
                    username,
                    now,
                    responder,
                } => {
                    let resp = self.db_connection.touch_last_active(&username, now).await;
                    let _ = responder.send(transform_err(resp));
                }
            }
        }
    }
}

/// Cloneable handle that turns the request/responder dance into plain async calls.
#[derive(Clone)]
pub struct DatabaseHandle {
    requester: mpsc::Sender<DatabaseRequest>,
}

impl DatabaseHandle {
    pub fn new(requester: mpsc::Sender<DatabaseRequest>) -> Self {
        Self { requester }
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Responder<T>) -> DatabaseRequest,
    ) -> anyhow::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.requester
            .send(request(tx))
            .await
            .map_err(|_| anyhow!("database manager has shut down"))?;
        rx.await?
    }

    pub async fn add_account(&self, account: DbAccount) -> anyhow::Result<()> {
        self.call(|responder| DatabaseRequest::AddAccount {
            account: Box::new(account),
            responder,
        })
        .await
    }

    pub async fn get_account(&self, username: &str) -> anyhow::Result<Option<DbAccount>> {
        self.call(|responder| DatabaseRequest::GetAccount {
            username: username.to_string(),
            responder,
        })
        .await
    }

    pub async fn get_account_by_email(&self, email: &str) -> anyhow::Result<Option<DbAccount>> {
        self.call(|responder| DatabaseRequest::GetAccountByEmail {
            email: email.to_string(),
            responder,
        })
        .await
    }

    pub async fn get_balance(&self, username: &str) -> anyhow::Result<Option<i64>> {
        self.call(|responder| DatabaseRequest::GetBalance {
            username: username.to_string(),
            responder,
        })
        .await
    }

    pub async fn apply_balance_delta(&self, username: &str, delta: i64) -> anyhow::Result<Option<i64>> {
        self.call(|responder| DatabaseRequest::ApplyBalanceDelta {
            username: username.to_string(),
            delta,
            responder,
        })
        .await
    }

    pub async fn claim_daily_reward(
        &self,
        username: &str,
        reward: i64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<i64>> {
        self.call(|responder| DatabaseRequest::ClaimDailyReward {
            username: username.to_string(),
            reward,
            now,
            responder,
        })
        .await
    }

    pub async fn touch_last_active(&self, username: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.call(|responder| DatabaseRequest::TouchLastActive {
            username: username.to_string(),
            now,
            responder,
        })
        .await
    }
}
