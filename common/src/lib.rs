use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod network;

/// Number of fractional digits an amount of currency may carry.
pub const CURRENCY_SCALE: u32 = 2;

/// Hours that must pass, strictly, between two daily reward claims.
pub const DAILY_REWARD_HOURS: i64 = 24;

/// True when `amount` has no more fractional digits than [`CURRENCY_SCALE`].
pub fn is_whole_minor_units(amount: Decimal) -> bool {
    amount.normalize().scale() <= CURRENCY_SCALE
}

/// Converts a currency amount into whole minor units (cents).
///
/// Returns `None` when the amount has more fractional digits than
/// [`CURRENCY_SCALE`] or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    if !is_whole_minor_units(amount) {
        return None;
    }
    amount.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, CURRENCY_SCALE)
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Heads => Side::Tails,
            Side::Tails => Side::Heads,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Heads => f.write_str("heads"),
            Side::Tails => f.write_str("tails"),
        }
    }
}

// Public view of an account, never carries the password hash
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Account {
    pub username: String,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
    pub last_daily_reward: Option<DateTime<Utc>>,
}

impl Account {
    /// When the next daily reward can be claimed, `None` if it never was.
    pub fn next_daily_reward(&self) -> Option<DateTime<Utc>> {
        self.last_daily_reward
            .map(|last| last + Duration::hours(DAILY_REWARD_HOURS))
    }

    pub fn daily_reward_ready(&self, now: DateTime<Utc>) -> bool {
        self.next_daily_reward().map_or(true, |next| next < now)
    }
}

/// What anyone may see of an account, looked up by username.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct PublicProfile {
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Session {
    pub token: String,
    pub account: Account,
}

/// A resolved coin flip. `balance` is the balance committed by the store
/// after the stake was credited or debited.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct CoinFlip {
    pub guess: Side,
    pub result: Side,
    pub stake: Decimal,
    pub balance: Decimal,
}

impl CoinFlip {
    pub fn won(&self) -> bool {
        self.guess == self.result
    }
}

#[derive(Error, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum WagerFailure {
    #[error("you must be logged in to play")]
    Unauthorized,
    #[error("the stake must be a positive amount with at most two decimal places")]
    InvalidStake,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("something went wrong, please try again")]
    StorageFailure,
}

#[derive(Error, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum AccountFailure {
    #[error("you must be logged in")]
    Unauthorized,
    #[error("invalid account details")]
    InvalidDetails,
    #[error("that username or email is already taken")]
    AccountTaken,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("the daily reward has already been claimed")]
    RewardNotReady,
    #[error("no such account")]
    NotFound,
    #[error("something went wrong, please try again")]
    StorageFailure,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::str::FromStr;

    #[test]
    fn minor_units_reject_sub_cent_amounts() {
        assert_eq!(to_minor_units(Decimal::from_str("10.00").unwrap()), Some(1000));
        assert_eq!(to_minor_units(Decimal::from_str("0.01").unwrap()), Some(1));
        assert_eq!(to_minor_units(Decimal::from_str("-1.5").unwrap()), Some(-150));
        assert_eq!(to_minor_units(Decimal::from_str("2.500").unwrap()), Some(250));
        assert_eq!(to_minor_units(Decimal::from_str("0.005").unwrap()), None);
    }

    #[test]
    fn oversized_amounts_have_no_minor_units() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
        assert_eq!(to_minor_units(Decimal::MIN), None);
        assert_eq!(to_minor_units(Decimal::from_str("100000000000000000000").unwrap()), None);
        assert!(is_whole_minor_units(Decimal::MAX));
    }

    #[test]
    fn daily_reward_readiness_is_strict() {
        let joined = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let mut account = Account {
            username: "alice".into(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            bio: None,
            balance: Decimal::ZERO,
            created_at: joined,
            last_active: None,
            last_daily_reward: None,
        };
        assert!(account.daily_reward_ready(joined));

        account.last_daily_reward = Some(joined);
        assert!(!account.daily_reward_ready(joined + Duration::hours(24)));
        assert!(account.daily_reward_ready(joined + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn sides_display_lowercase() {
        assert_eq!(Side::Heads.to_string(), "heads");
        assert_eq!(Side::Tails.opposite(), Side::Heads);
    }

    proptest! {
        #[test]
        fn minor_units_survive_conversion(cents in -1_000_000_000i64..1_000_000_000i64) {
            prop_assert_eq!(to_minor_units(from_minor_units(cents)), Some(cents));
        }
    }
}
