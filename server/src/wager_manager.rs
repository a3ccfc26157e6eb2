use common::{CoinFlip, Side, WagerFailure};
use rand::rngs::OsRng;
use rand::Rng;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::database_manager::DatabaseHandle;
use crate::session::Identity;

pub type WagerResponder = oneshot::Sender<Result<CoinFlip, WagerFailure>>;

pub enum WagerRequest {
    CoinFlip {
        identity: Option<Identity>,
        stake: Decimal,
        guess: Side,
        responder: WagerResponder,
    },
}

/// Where the drawn side of a coin flip comes from.
pub trait CoinSource: Send + Sync + 'static {
    fn flip(&self) -> Side;
}

/// Draws from the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCoin;

impl CoinSource for OsCoin {
    fn flip(&self) -> Side {
        if OsRng.gen::<bool>() {
            Side::Heads
        } else {
            Side::Tails
        }
    }
}

/// Accepts only positive stakes with at most two decimal places.
///
/// `Ok(None)` is a well-formed stake too large to hold in minor units, which
/// no balance can cover.
pub fn validate_stake(stake: Decimal) -> Result<Option<i64>, WagerFailure> {
    if stake <= Decimal::ZERO || !common::is_whole_minor_units(stake) {
        return Err(WagerFailure::InvalidStake);
    }
    Ok(common::to_minor_units(stake))
}

fn storage_failure(identity: &Identity, error: anyhow::Error) -> WagerFailure {
    error!(%identity, "coin flip storage failure: {error:#}");
    WagerFailure::StorageFailure
}

/// Resolves one coin flip against the caller's stored balance.
///
/// The outcome is drawn only after validation, and the balance moves by a
/// single signed delta. Whatever the store commits is what gets reported.
pub async fn play_coin_flip(
    database: &DatabaseHandle,
    coin: &impl CoinSource,
    identity: Option<Identity>,
    stake: Decimal,
    guess: Side,
) -> Result<CoinFlip, WagerFailure> {
    let identity = identity.ok_or(WagerFailure::Unauthorized)?;
    let stake_minor = validate_stake(stake)?;

    let balance = database
        .get_balance(identity.username())
        .await
        .map_err(|e| storage_failure(&identity, e))?
        .ok_or(WagerFailure::Unauthorized)?;
    let stake_minor = stake_minor
        .filter(|stake| *stake <= balance)
        .ok_or(WagerFailure::InsufficientFunds)?;

    let result = coin.flip();
    let delta = if result == guess { stake_minor } else { -stake_minor };

    // None means a concurrent debit got there first and the guard refused us
    let committed = database
        .apply_balance_delta(identity.username(), delta)
        .await
        .map_err(|e| storage_failure(&identity, e))?
        .ok_or(WagerFailure::InsufficientFunds)?;

    info!(%identity, %stake, %guess, %result, balance = committed, "coin flip resolved");
    Ok(CoinFlip {
        guess,
        result,
        stake,
        balance: common::from_minor_units(committed),
    })
}

pub struct WagerManager<C: CoinSource> {
    work_queue: mpsc::Receiver<WagerRequest>,
    database: DatabaseHandle,
    coin: Arc<C>,
}

//NOTE: No functions in this impl may crash
impl<C: CoinSource> WagerManager<C> {
    pub fn new(work_queue: mpsc::Receiver<WagerRequest>, database: DatabaseHandle, coin: C) -> Self {
        Self {
            work_queue,
            database,
            coin: Arc::new(coin),
        }
    }

    pub async fn manage(&mut self) {
        while let Some(request) = self.work_queue.recv().await {
            match request {
                WagerRequest::CoinFlip {
                    identity,
                    stake,
                    guess,
                    responder,
                } => {
                    let database = self.database.clone();
                    let coin = Arc::clone(&self.coin);
                    // one task per wager
                    tokio::spawn(async move {
                        let outcome =
                            play_coin_flip(&database, coin.as_ref(), identity, stake, guess).await;
                        // we do not care if the receiver has already disappeared
                        responder.send(outcome).ok();
                    });
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct WagerHandle {
    requester: mpsc::Sender<WagerRequest>,
}

impl WagerHandle {
    pub fn new(requester: mpsc::Sender<WagerRequest>) -> Self {
        Self { requester }
    }

    pub async fn coin_flip(
        &self,
        identity: Option<Identity>,
        stake: Decimal,
        guess: Side,
    ) -> Result<CoinFlip, WagerFailure> {
        let (responder, outcome) = oneshot::channel();
        let request = WagerRequest::CoinFlip {
            identity,
            stake,
            guess,
            responder,
        };
        if self.requester.send(request).await.is_err() {
            error!("wager manager has shut down");
            return Err(WagerFailure::StorageFailure);
        }
        outcome.await.unwrap_or(Err(WagerFailure::StorageFailure))
    }
}
