mod support;

use chrono::{Duration, TimeZone, Utc};
use server::database::DbAccount;
use support::{account_with_balance, memory_database};

#[tokio::test]
async fn accounts_are_found_by_username_and_email() {
    let mut db = memory_database().await;
    db.add_account(&DbAccount::new("alice", "Alice", "alice@example.com", "hash"))
        .await
        .unwrap();

    let by_name = db.get_account("alice").await.unwrap().unwrap();
    assert_eq!(by_name.email, "alice@example.com");
    assert_eq!(by_name.balance, 0);

    let by_email = db.get_account_by_email("alice@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.username, "alice");

    assert!(db.get_account("bob").await.unwrap().is_none());
    assert!(db.get_account_by_email("bob@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_emails_are_refused() {
    let mut db = memory_database().await;
    db.add_account(&DbAccount::new("alice", "Alice", "shared@example.com", "hash"))
        .await
        .unwrap();

    let duplicate = DbAccount::new("bob", "Bob", "shared@example.com", "hash");
    assert!(db.add_account(&duplicate).await.is_err());
}

#[tokio::test]
async fn balance_deltas_are_relative() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 1000)).await.unwrap();

    assert_eq!(db.apply_balance_delta("alice", 250).await.unwrap(), Some(1250));
    assert_eq!(db.apply_balance_delta("alice", -1250).await.unwrap(), Some(0));
    assert_eq!(db.get_balance("alice").await.unwrap(), Some(0));
}

#[tokio::test]
async fn debits_never_go_below_zero() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 500)).await.unwrap();

    assert_eq!(db.apply_balance_delta("alice", -501).await.unwrap(), None);
    assert_eq!(db.get_balance("alice").await.unwrap(), Some(500));
}

#[tokio::test]
async fn deltas_do_not_conjure_accounts() {
    let mut db = memory_database().await;

    assert_eq!(db.apply_balance_delta("ghost", 100).await.unwrap(), None);
    assert!(db.get_account("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn daily_reward_is_claimable_once_a_day() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 0)).await.unwrap();
    let monday = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    assert_eq!(db.claim_daily_reward("alice", 1, monday).await.unwrap(), Some(1));
    assert_eq!(
        db.claim_daily_reward("alice", 1, monday + Duration::hours(23)).await.unwrap(),
        None
    );
    assert_eq!(
        db.claim_daily_reward("alice", 1, monday + Duration::hours(24)).await.unwrap(),
        None
    );
    assert_eq!(
        db.claim_daily_reward("alice", 1, monday + Duration::hours(25)).await.unwrap(),
        Some(2)
    );
    assert_eq!(db.get_balance("alice").await.unwrap(), Some(2));
}

#[tokio::test]
async fn last_active_is_recorded() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 0)).await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    db.touch_last_active("alice", now).await.unwrap();

    let account = db.get_account("alice").await.unwrap().unwrap();
    assert_eq!(account.last_active.map(|at| at.0), Some(now));
}

#[tokio::test]
async fn rewards_and_activity_do_not_conjure_accounts() {
    let mut db = memory_database().await;
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();

    assert_eq!(db.claim_daily_reward("ghost", 1, now).await.unwrap(), None);
    db.touch_last_active("ghost", now).await.unwrap();
    assert!(db.get_account("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn deltas_only_move_the_named_account() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 1000)).await.unwrap();
    db.add_account(&account_with_balance("bob", 1000)).await.unwrap();

    assert_eq!(db.apply_balance_delta("alice", -300).await.unwrap(), Some(700));
    assert_eq!(db.get_balance("bob").await.unwrap(), Some(1000));
}

#[tokio::test]
async fn stored_timestamps_reach_the_account_view() {
    let mut db = memory_database().await;
    db.add_account(&account_with_balance("alice", 0)).await.unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    db.claim_daily_reward("alice", 1, now).await.unwrap();
    db.touch_last_active("alice", now).await.unwrap();

    let account: common::Account = db.get_account("alice").await.unwrap().unwrap().into();
    assert_eq!(account.last_active, Some(now));
    assert_eq!(account.last_daily_reward, Some(now));
    assert_eq!(account.next_daily_reward(), Some(now + Duration::hours(24)));
    assert!(!account.daily_reward_ready(now + Duration::hours(23)));
}
