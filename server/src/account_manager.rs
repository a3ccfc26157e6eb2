use anyhow::anyhow;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use common::{Account, AccountFailure, PublicProfile, Session};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::database::DbAccount;
use crate::database_manager::DatabaseHandle;
use crate::session::{Identity, SessionKeys};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

#[derive(Debug, Clone)]
pub struct SignupDetails {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupDetails {
    pub fn validate(&self) -> Result<(), AccountFailure> {
        let username_len = self.username.chars().count();
        let valid = (3..=50).contains(&username_len)
            && self.name.chars().count() <= 255
            && EMAIL.is_match(&self.email)
            && self.password.chars().count() >= 8;
        if valid {
            Ok(())
        } else {
            Err(AccountFailure::InvalidDetails)
        }
    }
}

async fn hash_password(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("failed to hash password: {e}"))
    })
    .await?
}

async fn verify_password(password: String, stored: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        let hash = PasswordHash::new(&stored).map_err(|e| anyhow!("stored hash is unreadable: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok())
    })
    .await?
}

fn storage_failure(context: &str, error: anyhow::Error) -> AccountFailure {
    error!("{context}: {error:#}");
    AccountFailure::StorageFailure
}

/// Signup, login and the balance operations that are not wagers.
#[derive(Clone)]
pub struct AccountManager {
    database: DatabaseHandle,
    sessions: SessionKeys,
    daily_reward: i64,
}

impl AccountManager {
    pub fn new(
        database: DatabaseHandle,
        sessions: SessionKeys,
        daily_reward: Decimal,
    ) -> anyhow::Result<Self> {
        let daily_reward = common::to_minor_units(daily_reward)
            .filter(|reward| *reward > 0)
            .ok_or_else(|| anyhow!("daily reward {daily_reward} is not a positive amount"))?;
        Ok(Self {
            database,
            sessions,
            daily_reward,
        })
    }

    pub fn identify(&self, token: Option<&str>) -> Option<Identity> {
        self.sessions.identify(token)
    }

    fn open_session(&self, account: DbAccount) -> Result<Session, AccountFailure> {
        let token = self
            .sessions
            .issue(&account.username, &account.name)
            .map_err(|e| storage_failure("failed to sign session token", e.into()))?;
        Ok(Session {
            token,
            account: account.into(),
        })
    }

    async fn load(&self, identity: Option<&Identity>) -> Result<DbAccount, AccountFailure> {
        let identity = identity.ok_or(AccountFailure::Unauthorized)?;
        self.database
            .get_account(identity.username())
            .await
            .map_err(|e| storage_failure("failed to load account", e))?
            .ok_or(AccountFailure::Unauthorized)
    }

    async fn is_taken(&self, details: &SignupDetails) -> Result<bool, AccountFailure> {
        let username_taken = self
            .database
            .get_account(&details.username)
            .await
            .map_err(|e| storage_failure("failed to check username", e))?
            .is_some();
        if username_taken {
            return Ok(true);
        }
        Ok(self
            .database
            .get_account_by_email(&details.email)
            .await
            .map_err(|e| storage_failure("failed to check email", e))?
            .is_some())
    }

    pub async fn signup(&self, details: SignupDetails) -> Result<Session, AccountFailure> {
        details.validate()?;
        if self.is_taken(&details).await? {
            return Err(AccountFailure::AccountTaken);
        }

        let hash = hash_password(details.password.clone())
            .await
            .map_err(|e| storage_failure("signup", e))?;
        let account = DbAccount::new(
            details.username.clone(),
            details.name.clone(),
            details.email.clone(),
            hash,
        );
        if let Err(e) = self.database.add_account(account.clone()).await {
            // a concurrent signup may have claimed the username or email since the check
            if self.is_taken(&details).await? {
                return Err(AccountFailure::AccountTaken);
            }
            return Err(storage_failure("failed to create account", e));
        }

        info!(username = %account.username, "account created");
        self.open_session(account)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AccountFailure> {
        let account = self
            .database
            .get_account_by_email(email)
            .await
            .map_err(|e| storage_failure("failed to look up login", e))?
            .ok_or(AccountFailure::InvalidCredentials)?;

        let verified = verify_password(password.to_string(), account.password.clone())
            .await
            .map_err(|e| storage_failure("login", e))?;
        if !verified {
            warn!(username = %account.username, "rejected login");
            return Err(AccountFailure::InvalidCredentials);
        }

        info!(username = %account.username, "logged in");
        self.open_session(account)
    }

    /// Re-attaches a previously issued token.
    pub async fn resume(&self, token: &str) -> Result<Session, AccountFailure> {
        let identity = self.identify(Some(token));
        let account = self.load(identity.as_ref()).await?;
        Ok(Session {
            token: token.to_string(),
            account: account.into(),
        })
    }

    pub async fn profile(&self, identity: Option<&Identity>) -> Result<Account, AccountFailure> {
        Ok(self.load(identity).await?.into())
    }

    /// Public view of any account. Needs no session.
    pub async fn public_profile(&self, username: &str) -> Result<PublicProfile, AccountFailure> {
        self.database
            .get_account(username)
            .await
            .map_err(|e| storage_failure("failed to load profile", e))?
            .map(PublicProfile::from)
            .ok_or(AccountFailure::NotFound)
    }

    pub async fn balance(&self, identity: Option<&Identity>) -> Result<Decimal, AccountFailure> {
        let identity = identity.ok_or(AccountFailure::Unauthorized)?;
        let balance = self
            .database
            .get_balance(identity.username())
            .await
            .map_err(|e| storage_failure("failed to read balance", e))?
            .ok_or(AccountFailure::Unauthorized)?;
        Ok(common::from_minor_units(balance))
    }

    pub async fn claim_daily_reward(
        &self,
        identity: Option<&Identity>,
        now: DateTime<Utc>,
    ) -> Result<Decimal, AccountFailure> {
        let identity = identity.ok_or(AccountFailure::Unauthorized)?;
        let claimed = self
            .database
            .claim_daily_reward(identity.username(), self.daily_reward, now)
            .await
            .map_err(|e| storage_failure("failed to claim daily reward", e))?;

        match claimed {
            Some(balance) => {
                info!(%identity, reward = self.daily_reward, "daily reward claimed");
                Ok(common::from_minor_units(balance))
            }
            None => {
                // nothing was updated: either too early or the account is gone
                self.load(Some(identity)).await?;
                Err(AccountFailure::RewardNotReady)
            }
        }
    }

    pub async fn touch_last_active(&self, identity: &Identity, now: DateTime<Utc>) {
        if let Err(e) = self.database.touch_last_active(identity.username(), now).await {
            warn!(%identity, "failed to record last activity: {e:#}");
        }
    }
}
