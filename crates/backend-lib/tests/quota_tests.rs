mod common;

use std::sync::Arc;
use std::time::Duration;

use account_backend::quota::{QuotaDecision, QuotaGate, IDENTITY_SCOPE};
use chrono::Duration as ChronoDuration;
use common::{setup_test_env, FailingFastStore, StallingFastStore};

const WINDOW: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_twenty_allowed_then_denied_until_window_passes() {
    let env = setup_test_env();
    let quota = &env.state.quota;

    for i in 0..20u32 {
        let decision = quota
            .check_and_increment(IDENTITY_SCOPE, "token-a", 20, WINDOW)
            .await;
        assert_eq!(
            decision,
            QuotaDecision::Allowed {
                limit: 20,
                remaining: 19 - i
            }
        );
    }

    let decision = quota
        .check_and_increment(IDENTITY_SCOPE, "token-a", 20, WINDOW)
        .await;
    assert_eq!(decision, QuotaDecision::Denied { limit: 20 });
    assert!(!decision.permits());

    // Still inside the window
    env.clock.advance(ChronoDuration::seconds(59));
    let decision = quota
        .check_and_increment(IDENTITY_SCOPE, "token-a", 20, WINDOW)
        .await;
    assert!(!decision.permits());

    env.clock.advance(ChronoDuration::seconds(1));
    let decision = quota
        .check_and_increment(IDENTITY_SCOPE, "token-a", 20, WINDOW)
        .await;
    assert_eq!(
        decision,
        QuotaDecision::Allowed {
            limit: 20,
            remaining: 19
        }
    );
}

#[tokio::test]
async fn test_window_is_fixed_from_first_request() {
    let env = setup_test_env();
    let quota = &env.state.quota;

    quota.check_and_increment("scope", "k", 2, WINDOW).await;
    env.clock.advance(ChronoDuration::seconds(50));
    quota.check_and_increment("scope", "k", 2, WINDOW).await;

    // Later calls do not push the expiry out
    env.clock.advance(ChronoDuration::seconds(10));
    let decision = quota.check_and_increment("scope", "k", 2, WINDOW).await;
    assert!(matches!(decision, QuotaDecision::Allowed { remaining: 1, .. }));
}

#[tokio::test]
async fn test_keys_are_counted_independently() {
    let env = setup_test_env();
    let policy = env.state.ip_policy;

    for _ in 0..policy.limit {
        assert!(env.state.quota.check(&policy, "10.0.0.1").await.permits());
    }
    assert!(!env.state.quota.check(&policy, "10.0.0.1").await.permits());
    assert!(env.state.quota.check(&policy, "10.0.0.2").await.permits());
}

#[tokio::test]
async fn test_concurrent_callers_never_exceed_limit() {
    let env = setup_test_env();
    let quota = env.state.quota.clone();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let quota = quota.clone();
            tokio::spawn(async move {
                quota
                    .check_and_increment(IDENTITY_SCOPE, "shared", 20, WINDOW)
                    .await
            })
        })
        .collect();

    let mut allowed = 0;
    for task in tasks {
        if matches!(task.await.unwrap(), QuotaDecision::Allowed { .. }) {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 20);
}

#[tokio::test]
async fn test_unavailable_store_is_indeterminate() {
    let gate = QuotaGate::new(Arc::new(FailingFastStore), Duration::from_secs(2));

    for _ in 0..30 {
        let decision = gate.check_and_increment(IDENTITY_SCOPE, "k", 20, WINDOW).await;
        assert_eq!(decision, QuotaDecision::Indeterminate);
        assert!(decision.permits());
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_is_indeterminate() {
    let gate = QuotaGate::new(Arc::new(StallingFastStore), Duration::from_millis(500));

    let decision = gate.check_and_increment(IDENTITY_SCOPE, "k", 20, WINDOW).await;
    assert_eq!(decision, QuotaDecision::Indeterminate);
}
