use crate::clock::Clock;
use crate::error::{QueueError, QueueResult};
use crate::jobs::backoff;
use crate::jobs::model::{Job, JobStatus, NewJob};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// The Queue API: the only thing in this crate that touches the database.
///
/// Cheap to clone — it's a handle around a pooled `PgPool`, so every worker
/// task can own one without sharing in-memory state with its peers.
#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new job in the `queued` state, runnable immediately.
    ///
    /// Validates `job_type` and `max_attempts` before writing; a `payload`
    /// that isn't a JSON object is rejected too, since handlers are written
    /// against a key-value shape.
    pub async fn enqueue(&self, clock: &dyn Clock, job: NewJob) -> QueueResult<Job> {
        if job.job_type.is_empty() || job.job_type.len() > 64 {
            return Err(QueueError::Validation(
                "job_type must be 1..=64 characters".into(),
            ));
        }
        if !(1..=25).contains(&job.max_attempts) {
            return Err(QueueError::Validation(
                "max_attempts must be in 1..=25".into(),
            ));
        }
        if !job.payload.is_object() {
            return Err(QueueError::Validation("payload must be a JSON object".into()));
        }

        let now = clock.now();
        let row = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (job_type, status, payload, attempts, max_attempts, run_at, created_at, updated_at)
            VALUES ($1, $2, $3, 0, $4, $5, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&job.job_type)
        .bind(JobStatus::Queued.as_str())
        .bind(&job.payload)
        .bind(job.max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Most-recent-first page of jobs, optionally filtered by status/type.
    /// `limit` is clamped to `[1, 200]` rather than rejected.
    pub async fn list(
        &self,
        limit: i64,
        status: Option<&str>,
        job_type: Option<&str>,
    ) -> QueueResult<Vec<Job>> {
        let limit = limit.clamp(1, 200);

        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR job_type = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(status)
        .bind(job_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> QueueResult<Option<Job>> {
        let row = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Atomically select one runnable job and place it under a lease.
    ///
    /// Runnable: `status = 'queued' AND run_at <= now() AND (locked_until IS
    /// NULL OR locked_until < now())`. The select-and-lock and the
    /// transition to `running` happen inside one transaction: `FOR UPDATE
    /// SKIP LOCKED` lets concurrent callers skip past rows a peer already
    /// holds, so two concurrent `claim` calls can never return the same job.
    ///
    /// A lease that has already expired is indistinguishable from "never
    /// leased" to this query — there is no separate unlock step, crash
    /// recovery falls entirely out of the predicate above.
    pub async fn claim(&self, worker_id: &str, lease_seconds: i64) -> QueueResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'queued'
              AND run_at <= now()
              AND (locked_until IS NULL OR locked_until < now())
            ORDER BY created_at ASC, id ASC
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(candidate) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let leased = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = 'running',
                locked_by = $2,
                locked_until = now() + ($3::bigint * interval '1 second'),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(candidate.id)
        .bind(worker_id)
        .bind(lease_seconds)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(leased))
    }

    /// Terminal success: clears the lease, records `result`, bumps `updated_at`.
    /// A no-op if the row no longer exists or has already reached a terminal
    /// state (`succeeded`/`dead` never transition again).
    pub async fn mark_succeeded(&self, id: Uuid, result: Value) -> QueueResult<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded',
                result = $2,
                locked_by = NULL,
                locked_until = NULL,
                updated_at = now()
            WHERE id = $1
              AND status NOT IN ('succeeded', 'dead')
            "#,
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Increments `attempts`, records `last_error`, clears the lease, and
    /// either reschedules with backoff or dead-letters once the attempt
    /// budget is exhausted. A no-op if the row no longer exists or has
    /// already reached a terminal state.
    ///
    /// Read-then-write rather than a single locked statement: the lease this
    /// job is held under already guarantees no other worker is writing to
    /// it, so there's nothing here for a row lock to protect against.
    pub async fn mark_failed(&self, clock: &dyn Clock, id: Uuid, error: &str) -> QueueResult<()> {
        let Some(job) = self.get(id).await? else {
            return Ok(());
        };
        if matches!(job.status.as_str(), "succeeded" | "dead") {
            return Ok(());
        }

        let attempts = job.attempts + 1;

        if attempts >= job.max_attempts {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'dead',
                    attempts = $2,
                    last_error = $3,
                    locked_by = NULL,
                    locked_until = NULL,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(attempts)
            .bind(error)
            .execute(&self.pool)
            .await?;
        } else {
            let next_run_at =
                clock.now() + chrono::Duration::seconds(backoff::delay_for(attempts));

            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'queued',
                    attempts = $2,
                    last_error = $3,
                    run_at = $4,
                    locked_by = NULL,
                    locked_until = NULL,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(attempts)
            .bind(error)
            .bind(next_run_at)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}
