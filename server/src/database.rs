use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::sql::{Datetime, Id, Thing};
use surrealdb::{Connection, Result, Surreal};

use crate::config::DatabaseConfig;

const ACCOUNT_TABLE: &str = "account";

const SCHEMA: &str = "DEFINE INDEX account_email ON TABLE account COLUMNS email UNIQUE;";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Record {
    #[allow(dead_code)]
    pub id: Thing,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    balance: i64,
}

/// An account as stored. `balance` is kept in minor units so that every
/// mutation is an exact integer delta.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbAccount {
    pub id: Thing,
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub balance: i64,
    pub created_at: Datetime,
    pub last_active: Option<Datetime>,
    pub last_daily_reward: Option<Datetime>,
}

impl DbAccount {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let username = username.into();
        Self {
            id: account_id(&username),
            username,
            name: name.into(),
            email: email.into(),
            password: password_hash.into(),
            bio: None,
            balance: 0,
            created_at: Datetime::from(Utc::now()),
            last_active: None,
            last_daily_reward: None,
        }
    }
}

impl From<DbAccount> for common::Account {
    fn from(value: DbAccount) -> Self {
        common::Account {
            username: value.username,
            name: value.name,
            email: value.email,
            bio: value.bio,
            balance: common::from_minor_units(value.balance),
            created_at: value.created_at.0,
            last_active: value.last_active.map(|at| at.0),
            last_daily_reward: value.last_daily_reward.map(|at| at.0),
        }
    }
}

impl From<DbAccount> for common::PublicProfile {
    fn from(value: DbAccount) -> Self {
        common::PublicProfile {
            username: value.username,
            name: value.name,
            bio: value.bio,
            created_at: value.created_at.0,
            last_active: value.last_active.map(|at| at.0),
        }
    }
}

pub fn account_id(username: &str) -> Thing {
    Thing {
        tb: ACCOUNT_TABLE.into(),
        id: Id::String(username.into()),
    }
}

pub struct DatabaseConnection<Conn: Connection> {
    connection: Surreal<Conn>,
}

impl DatabaseConnection<Any> {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = any::connect(config.endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        Self::from_surreal(db, &config.namespace, &config.database).await
    }
}

impl<Conn: Connection> DatabaseConnection<Conn> {
    pub async fn from_surreal(db: Surreal<Conn>, namespace: &str, database: &str) -> Result<Self> {
        db.use_ns(namespace).use_db(database).await?;
        db.query(SCHEMA).await?.check()?;

        Ok(Self { connection: db })
    }

    pub async fn add_account(&mut self, account: &DbAccount) -> Result<()> {
        let _: Option<Record> = self
            .connection
            .create((ACCOUNT_TABLE, account.username.as_str()))
            .content(account)
            .await?;

        Ok(())
    }

    pub async fn get_account(&self, username: &str) -> Result<Option<DbAccount>> {
        self.connection.select((ACCOUNT_TABLE, username)).await
    }

    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<DbAccount>> {
        self.connection
            .query("SELECT * FROM account WHERE email = $email LIMIT 1;")
            .bind(("email", email))
            .await?
            .take(0)
    }

    pub async fn get_balance(&self, username: &str) -> Result<Option<i64>> {
        Ok(self.get_account(username).await?.map(|account| account.balance))
    }

    /// Adds `delta` minor units to the balance as a single relative update.
    ///
    /// The update only applies while the result stays non-negative. Returns
    /// the committed balance, or `None` when the account does not exist or
    /// the guard rejected the update.
    ///
    /// Updates address the record directly. The `username != NONE` guard
    /// keeps them from creating a record that does not exist.
    pub async fn apply_balance_delta(&mut self, username: &str, delta: i64) -> Result<Option<i64>> {
        let updated: Option<BalanceRow> = self
            .connection
            .query(
                "UPDATE $account SET balance += $delta \
                 WHERE username != NONE AND balance + $delta >= 0 RETURN AFTER;",
            )
            .bind(("account", account_id(username)))
            .bind(("delta", delta))
            .await?
            .take(0)?;
        Ok(updated.map(|row| row.balance))
    }

    /// Credits `reward` if the last claim is unset or more than a day before `now`.
    pub async fn claim_daily_reward(
        &mut self,
        username: &str,
        reward: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<i64>> {
        let cutoff = now - chrono::Duration::hours(common::DAILY_REWARD_HOURS);
        let updated: Option<BalanceRow> = self
            .connection
            .query(
                "UPDATE $account SET balance += $reward, last_daily_reward = $now \
                 WHERE username != NONE AND (!last_daily_reward OR last_daily_reward < $cutoff) \
                 RETURN AFTER;",
            )
            .bind(("account", account_id(username)))
            .bind(("reward", reward))
            .bind(("now", Datetime::from(now)))
            .bind(("cutoff", Datetime::from(cutoff)))
            .await?
            .take(0)?;
        Ok(updated.map(|row| row.balance))
    }

    pub async fn touch_last_active(&mut self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.connection
            .query("UPDATE $account SET last_active = $now WHERE username != NONE;")
            .bind(("account", account_id(username)))
            .bind(("now", Datetime::from(now)))
            .await?
            .check()?;
        Ok(())
    }
}
