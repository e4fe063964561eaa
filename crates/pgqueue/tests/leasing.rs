mod common;

use common::{enqueue, insert_job, setup_db};

use chrono::Utc;
use pgqueue::clock::SystemClock;
use pgqueue::jobs::JobsRepo;
use serde_json::json;
use serial_test::serial;
use sqlx::PgPool;
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

async fn status_and_locked_by(pool: &PgPool, id: Uuid) -> (String, Option<String>) {
    sqlx::query_as::<_, (String, Option<String>)>(
        "SELECT status, locked_by FROM jobs WHERE id = $1",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn two_workers_never_claim_the_same_job() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let _job_id = insert_job(&pool).await;

    let repo_a = repo.clone();
    let repo_b = repo.clone();

    let (a, b) = tokio::join!(
        async move { repo_a.claim("worker-a", 30).await.unwrap() },
        async move { repo_b.claim("worker-b", 30).await.unwrap() },
    );

    let got_a = a.is_some();
    let got_b = b.is_some();
    assert!(
        got_a ^ got_b,
        "expected exactly one worker to claim the job, got_a={got_a} got_b={got_b}"
    );

    let (status, locked_by) =
        sqlx::query_as::<_, (String, Option<String>)>("SELECT status, locked_by FROM jobs LIMIT 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "running");
    assert!(locked_by.as_deref() == Some("worker-a") || locked_by.as_deref() == Some("worker-b"));
}

#[tokio::test]
#[serial]
async fn concurrent_claims_over_a_batch_are_all_distinct() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let mut ids = HashSet::new();
    for _ in 0..20 {
        ids.insert(insert_job(&pool).await);
    }

    let mut tasks = Vec::new();
    for i in 0..8 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.claim(&format!("worker-{i}"), 30).await.unwrap()
        }));
    }

    let mut claimed = HashSet::new();
    for task in tasks {
        if let Some(job) = task.await.unwrap() {
            assert!(claimed.insert(job.id), "job {} claimed twice", job.id);
        }
    }

    assert_eq!(claimed.len(), 8.min(ids.len()));
    assert!(claimed.is_subset(&ids));
}

#[tokio::test]
#[serial]
async fn expired_lease_is_reclaimable_by_another_worker() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let job_id = insert_job(&pool).await;

    let leased_a = repo
        .claim("worker-a", 1)
        .await
        .unwrap()
        .expect("worker-a should claim the job");
    assert_eq!(leased_a.id, job_id);

    // A fresh claim immediately after must see the lease as still live (P2).
    let blocked = repo.claim("worker-b", 30).await.unwrap();
    assert!(blocked.is_none(), "lease is still live, nothing should be claimable");

    tokio::time::sleep(Duration::from_millis(1200)).await;

    // Lease has now expired; it must be claimable again (P3), with no
    // explicit unlock step required.
    let leased_b = repo
        .claim("worker-b", 30)
        .await
        .unwrap()
        .expect("worker-b should reclaim after lease expiry");
    assert_eq!(leased_b.id, job_id);
    assert_eq!(leased_b.locked_by.as_deref(), Some("worker-b"));
}

#[tokio::test]
#[serial]
async fn delayed_job_is_not_claimable_before_run_at() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let clock = SystemClock;

    let job = repo
        .enqueue(
            &clock,
            pgqueue::jobs::NewJob {
                job_type: "delayed".to_string(),
                payload: json!({}),
                max_attempts: 5,
            },
        )
        .await
        .unwrap();

    sqlx::query("UPDATE jobs SET run_at = $2 WHERE id = $1")
        .bind(job.id)
        .bind(Utc::now() + chrono::Duration::seconds(2))
        .execute(&pool)
        .await
        .unwrap();

    assert!(repo.claim("worker-a", 30).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(2200)).await;

    let leased = repo
        .claim("worker-a", 30)
        .await
        .unwrap()
        .expect("should be claimable once run_at has passed");
    assert_eq!(leased.id, job.id);
}

#[tokio::test]
#[serial]
async fn fifo_by_created_at_when_uncontested() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());

    let first = enqueue(&pool, "a", json!({}), 5).await;
    let second = enqueue(&pool, "b", json!({}), 5).await;
    let third = enqueue(&pool, "c", json!({}), 5).await;

    let j1 = repo.claim("worker-a", 30).await.unwrap().unwrap();
    let j2 = repo.claim("worker-a", 30).await.unwrap().unwrap();
    let j3 = repo.claim("worker-a", 30).await.unwrap().unwrap();

    assert_eq!((j1.id, j2.id, j3.id), (first, second, third));
}

#[tokio::test]
#[serial]
async fn claim_returns_none_on_an_empty_queue() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    assert!(repo.claim("worker-a", 30).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn terminal_states_are_immune_to_further_transitions() {
    let pool = setup_db().await;
    let repo = JobsRepo::new(pool.clone());
    let clock = SystemClock;
    let job_id = insert_job(&pool).await;

    let leased = repo.claim("worker-a", 30).await.unwrap().unwrap();
    assert_eq!(leased.id, job_id);

    repo.mark_succeeded(job_id, json!({"ok": true})).await.unwrap();
    let (status, _) = status_and_locked_by(&pool, job_id).await;
    assert_eq!(status, "succeeded");

    // Further calls against a terminal job are no-ops, not errors.
    repo.mark_failed(&clock, job_id, "should not matter").await.unwrap();
    let (status_after, _) = status_and_locked_by(&pool, job_id).await;
    assert_eq!(status_after, "succeeded");

    let job = repo.get(job_id).await.unwrap().unwrap();
    assert_eq!(job.result, Some(json!({"ok": true})));
}
