//! The process-local `job_type -> handler` table the Worker Loop dispatches
//! through. Defined here so the loop can depend on the abstraction without
//! depending on any concrete handler — those are registered externally (the
//! `worker` binary crate owns the two reference handlers needed by tests).

use crate::clock::Clock;
use crate::error::HandlerError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Auxiliary input every handler receives alongside its payload.
pub struct HandlerContext<'a> {
    /// Attempts recorded *before* this execution — 0 on the first try.
    pub attempts: i32,
    pub clock: &'a dyn Clock,
}

/// A handler capability: `job_type -> async fn(payload, context) -> result`.
pub trait Handler: Send + Sync {
    fn invoke<'a>(
        &'a self,
        payload: &'a Value,
        ctx: &'a HandlerContext<'a>,
    ) -> BoxFuture<'a, Result<Value, HandlerError>>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a Value, &'a HandlerContext<'a>) -> BoxFuture<'a, Result<Value, HandlerError>>
        + Send
        + Sync,
{
    fn invoke<'a>(
        &'a self,
        payload: &'a Value,
        ctx: &'a HandlerContext<'a>,
    ) -> BoxFuture<'a, Result<Value, HandlerError>> {
        (self)(payload, ctx)
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(job_type.into(), Arc::new(handler));
    }

    pub fn handler_for(&self, job_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(job_type).cloned()
    }
}

/// Helper for writing handler closures without spelling out `Pin<Box<...>>`.
pub fn boxed<'a, T>(fut: impl Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
