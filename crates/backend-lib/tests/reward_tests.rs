mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use account_backend::{
    clock::{Clock, ManualClock},
    error::AppError,
    fast_store::MemoryFastStore,
    reward::RewardOutcome,
    storage::MemoryStore,
    Stores,
};
use chrono::Duration;
use common::{
    setup_test_env, start_time, state_with, FailingFastStore, FailingProfileStore, EMAIL, SECRET,
};

#[tokio::test]
async fn test_reward_granted_once_per_day() {
    let env = setup_test_env();
    let id = env.state.auth.register(EMAIL, SECRET).await.unwrap();

    let first = env.state.rewards.grant_daily(id).await.unwrap();
    assert_eq!(first, RewardOutcome::Granted { amount: 3, balance: 3 });

    let second = env.state.rewards.grant_daily(id).await.unwrap();
    assert_eq!(second, RewardOutcome::AlreadyGranted);
    assert_eq!(env.state.profiles.get(id).await.unwrap().balance, 3);
}

#[tokio::test]
async fn test_reward_available_again_next_day() {
    let env = setup_test_env();
    let id = env.state.auth.register(EMAIL, SECRET).await.unwrap();
    env.state.rewards.grant_daily(id).await.unwrap();

    // 12:00 -> 23:59 the same day
    env.clock.advance(Duration::minutes(11 * 60 + 59));
    assert_eq!(
        env.state.rewards.grant_daily(id).await.unwrap(),
        RewardOutcome::AlreadyGranted
    );

    env.clock.advance(Duration::minutes(1));
    assert_eq!(
        env.state.rewards.grant_daily(id).await.unwrap(),
        RewardOutcome::Granted { amount: 3, balance: 6 }
    );
}

#[tokio::test]
async fn test_rewards_are_tracked_per_identity() {
    let env = setup_test_env();
    let alice = env.state.auth.register(EMAIL, SECRET).await.unwrap();
    let bob = env.state.auth.register("bob@example.com", SECRET).await.unwrap();

    env.state.rewards.grant_daily(alice).await.unwrap();
    assert!(matches!(
        env.state.rewards.grant_daily(bob).await.unwrap(),
        RewardOutcome::Granted { .. }
    ));
}

#[tokio::test]
async fn test_concurrent_claims_grant_once() {
    let env = setup_test_env();
    let id = env.state.auth.register(EMAIL, SECRET).await.unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let rewards = env.state.rewards.clone();
            tokio::spawn(async move { rewards.grant_daily(id).await })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        if matches!(task.await.unwrap().unwrap(), RewardOutcome::Granted { .. }) {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(env.state.profiles.get(id).await.unwrap().balance, 3);
}

#[tokio::test]
async fn test_reward_fails_closed_without_fast_store() {
    let env = setup_test_env();
    let id = env.state.auth.register(EMAIL, SECRET).await.unwrap();

    let stores = Stores::new(env.store.clone(), Arc::new(FailingFastStore));
    let state = state_with(stores, &env.clock);

    let err = state.rewards.grant_daily(id).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));
    assert_eq!(state.profiles.get(id).await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_marker_rolled_back_when_balance_update_fails() {
    let clock = ManualClock::new(start_time());
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(MemoryStore::with_clock(shared.clone()));
    let profiles = Arc::new(FailingProfileStore::new(store.clone()));

    let mut stores = Stores::new(store, Arc::new(MemoryFastStore::with_clock(shared)));
    stores.profiles = profiles.clone();
    let state = state_with(stores, &clock);
    let id = state.auth.register(EMAIL, SECRET).await.unwrap();

    profiles.fail_balance.store(true, Ordering::SeqCst);
    let err = state.rewards.grant_daily(id).await.unwrap_err();
    assert!(matches!(err, AppError::Internal(_)));

    // The claim was not consumed
    profiles.fail_balance.store(false, Ordering::SeqCst);
    assert_eq!(
        state.rewards.grant_daily(id).await.unwrap(),
        RewardOutcome::Granted { amount: 3, balance: 3 }
    );
}

#[tokio::test]
async fn test_missing_profile_does_not_consume_claim() {
    let env = setup_test_env();

    let err = env.state.rewards.grant_daily(4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let err = env.state.rewards.grant_daily(4242).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}
