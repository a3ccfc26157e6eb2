mod support;

use common::AccountFailure;
use rust_decimal::Decimal;
use server::account_manager::{AccountManager, SignupDetails};
use server::session::SessionKeys;
use std::time::Duration;
use support::database_with;

async fn accounts() -> AccountManager {
    let database = database_with(&[]).await;
    let sessions = SessionKeys::new(b"test-secret", Duration::from_secs(60 * 60));
    AccountManager::new(database, sessions, Decimal::new(1, 2)).unwrap()
}

fn details(username: &str, email: &str) -> SignupDetails {
    SignupDetails {
        username: username.into(),
        name: "Racer".into(),
        email: email.into(),
        password: "hunter2hunter2".into(),
    }
}

fn assert_one_winner(
    first: Result<common::Session, AccountFailure>,
    second: Result<common::Session, AccountFailure>,
) {
    let outcomes = [first.map(|_| ()), second.map(|_| ())];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.contains(&Err(AccountFailure::AccountTaken)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_signups_for_one_username_leave_one_account() {
    let accounts = accounts().await;

    let (first, second) = tokio::join!(
        accounts.signup(details("erin", "erin@example.com")),
        accounts.signup(details("erin", "erin.other@example.com")),
    );

    assert_one_winner(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_signups_for_one_email_leave_one_account() {
    let accounts = accounts().await;

    let (first, second) = tokio::join!(
        accounts.signup(details("frank", "shared@example.com")),
        accounts.signup(details("franky", "shared@example.com")),
    );

    assert_one_winner(first, second);
}

#[tokio::test]
async fn unknown_profiles_are_not_found() {
    let accounts = accounts().await;
    accounts
        .signup(details("gina", "gina@example.com"))
        .await
        .unwrap();

    let profile = accounts.public_profile("gina").await.unwrap();
    assert_eq!(profile.username, "gina");
    assert_eq!(accounts.public_profile("nobody").await, Err(AccountFailure::NotFound));
}
