//! Reference handlers needed by the test corpus. Production deployments
//! register their own handlers the same way; these two exist so `sleep` and
//! `fail_n_times` jobs have somewhere to go.

use pgqueue::error::HandlerError;
use pgqueue::handlers::{boxed, HandlerContext, HandlerRegistry};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Deserialize)]
struct SleepPayload {
    #[serde(default = "default_duration_ms")]
    duration_ms: u64,
}

fn default_duration_ms() -> u64 {
    1000
}

#[derive(Deserialize)]
struct FailNTimesPayload {
    #[serde(default)]
    failures_before_success: i32,
}

pub fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register("sleep", |payload, ctx: &HandlerContext<'_>| {
        let payload = payload.clone();
        boxed(async move {
            let SleepPayload { duration_ms } = serde_json::from_value(payload)
                .map_err(|e| HandlerError::new(format!("bad payload: {e}")))?;

            tokio::time::sleep(Duration::from_millis(duration_ms)).await;

            Ok(json!({
                "slept_ms": duration_ms,
                "finished_at": ctx.clock.now().to_rfc3339(),
            }))
        })
    });

    registry.register("fail_n_times", |payload, ctx: &HandlerContext<'_>| {
        let payload = payload.clone();
        boxed(async move {
            let FailNTimesPayload {
                failures_before_success,
            } = serde_json::from_value(payload)
                .map_err(|e| HandlerError::new(format!("bad payload: {e}")))?;

            let attempts = ctx.attempts;
            if attempts < failures_before_success {
                return Err(HandlerError::new(format!(
                    "intentional failure (attempt={attempts}, need<{failures_before_success})"
                )));
            }

            Ok(json!({
                "ok": true,
                "attempts": attempts,
                "finished_at": ctx.clock.now().to_rfc3339(),
            }))
        })
    });

    registry
}
