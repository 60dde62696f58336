// Transient-error retry for the long poll

use komari_traffic::telegram_repo::{RetryPolicy, retry_transient};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn instant_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
        jitter: Duration::ZERO,
    }
}

#[test]
fn backoff_doubles_and_caps() {
    let p = RetryPolicy::default();
    assert_eq!(p.backoff(0), Duration::from_secs(1));
    assert_eq!(p.backoff(1), Duration::from_secs(2));
    assert_eq!(p.backoff(3), Duration::from_secs(8));
    assert_eq!(p.backoff(5), Duration::from_secs(20));
    assert_eq!(p.backoff(40), Duration::from_secs(20));
}

#[tokio::test]
async fn retries_transient_errors_until_success() {
    let calls = AtomicU32::new(0);
    let result: Result<u32, String> = retry_transient(&instant_policy(5), |_| true, || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move { if n < 3 { Err("reset".to_string()) } else { Ok(n) } }
    })
    .await;
    assert_eq!(result, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_attempts() {
    let calls = AtomicU32::new(0);
    let result: Result<(), String> = retry_transient(&instant_policy(5), |_| true, || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err("reset".to_string()) }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn permanent_errors_are_not_retried() {
    let calls = AtomicU32::new(0);
    let result: Result<(), String> = retry_transient(
        &instant_policy(5),
        |e: &String| e != "401",
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("401".to_string()) }
        },
    )
    .await;
    assert_eq!(result, Err("401".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
