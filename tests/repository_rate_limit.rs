//! PostgreSQL rate-limit store tests. Run with `cargo test -- --ignored`
//! against a database reachable through `DATABASE_URL`.

use chrono::{DateTime, Duration, Utc};
use forum_guard::domain::repositories::{Admission, RateLimitStore};
use forum_guard::infrastructure::persistence::PgRateLimitStore;
use sqlx::PgPool;
use std::sync::Arc;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_admits_up_to_quota_within_window(pool: PgPool) {
    let store = PgRateLimitStore::new(Arc::new(pool));

    for t in 0..5 {
        let admission = store
            .admit("user:7", 5, at(t) - Duration::seconds(60), at(t))
            .await
            .unwrap();
        assert_eq!(admission, Admission::Accepted { count: (t + 1) as u32 });
    }

    let rejected = store
        .admit("user:7", 5, at(5) - Duration::seconds(60), at(5))
        .await
        .unwrap();
    assert_eq!(rejected, Admission::Rejected { count: 5 });

    let later = store
        .admit("user:7", 5, at(61) - Duration::seconds(60), at(61))
        .await
        .unwrap();
    assert!(matches!(later, Admission::Accepted { .. }));
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_identifiers_are_independent(pool: PgPool) {
    let store = PgRateLimitStore::new(Arc::new(pool));

    store.admit("user:1", 1, at(-60), at(0)).await.unwrap();

    let other = store.admit("user:2", 1, at(-60), at(0)).await.unwrap();
    assert_eq!(other, Admission::Accepted { count: 1 });
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_admissions_never_exceed_quota(pool: PgPool) {
    let store = Arc::new(PgRateLimitStore::new(Arc::new(pool)));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.admit("ip:abc", 5, at(-60), at(0)).await.unwrap()
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), Admission::Accepted { .. }) {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 5);
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_purge_before_removes_old_events(pool: PgPool) {
    let store = PgRateLimitStore::new(Arc::new(pool));

    store.admit("user:1", 10, at(-200), at(0)).await.unwrap();
    store.admit("user:1", 10, at(-200), at(100)).await.unwrap();

    assert_eq!(store.purge_before(at(50)).await.unwrap(), 1);
}
