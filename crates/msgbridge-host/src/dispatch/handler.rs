//! Handler styles.
//!
//! - raw: `(request, context) -> response envelope`; the handler picks the
//!   response type itself.
//! - simple: `(request) -> payload`; the engine wraps the payload using the
//!   `.response` convention.
//!
//! Closures are adapted into the traits so callers can register either form.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use msgbridge_core::error::{MsgBridgeError, Result};
use msgbridge_core::protocol::{Envelope, Request};

use crate::context::ExecutionContext;

#[async_trait]
pub trait RawHandler: Send + Sync {
    async fn handle(&self, request: Envelope, ctx: Arc<ExecutionContext>) -> Result<Envelope>;
}

#[async_trait]
pub trait SimpleHandler: Send + Sync {
    async fn handle(&self, request: Envelope) -> Result<Value>;
}

/// Registry entry.
#[derive(Clone)]
pub enum Handler {
    Raw(Arc<dyn RawHandler>),
    Simple(Arc<dyn SimpleHandler>),
}

impl Handler {
    pub fn style(&self) -> &'static str {
        match self {
            Handler::Raw(_) => "raw",
            Handler::Simple(_) => "simple",
        }
    }
}

pub(crate) struct RawFn<F>(pub(crate) F);

#[async_trait]
impl<F, Fut> RawHandler for RawFn<F>
where
    F: Fn(Envelope, Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Envelope>> + Send + 'static,
{
    async fn handle(&self, request: Envelope, ctx: Arc<ExecutionContext>) -> Result<Envelope> {
        (self.0)(request, ctx).await
    }
}

pub(crate) struct SimpleFn<F>(pub(crate) F);

#[async_trait]
impl<F, Fut> SimpleHandler for SimpleFn<F>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn handle(&self, request: Envelope) -> Result<Value> {
        (self.0)(request).await
    }
}

/// Simple handler bound to one typed request.
pub(crate) struct TypedFn<R, F> {
    f: F,
    _req: PhantomData<fn() -> R>,
}

impl<R, F> TypedFn<R, F> {
    pub(crate) fn new(f: F) -> Self {
        Self {
            f,
            _req: PhantomData,
        }
    }
}

#[async_trait]
impl<R, F, Fut> SimpleHandler for TypedFn<R, F>
where
    R: Request,
    F: Fn(R) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R::Output>> + Send + 'static,
{
    async fn handle(&self, request: Envelope) -> Result<Value> {
        let req = decode_request::<R>(request.into_payload())?;
        let out = (self.f)(req).await?;
        serde_json::to_value(out).map_err(|e| {
            MsgBridgeError::handler(format!("failed to encode {} result: {e}", R::TYPE))
        })
    }
}

/// A missing payload decodes as `{}` so field-less request structs work.
fn decode_request<R: Request>(payload: Value) -> Result<R> {
    let was_null = payload.is_null();
    serde_json::from_value(payload)
        .or_else(|e| {
            if was_null {
                serde_json::from_value(Value::Object(Map::new())).map_err(|_| e)
            } else {
                Err(e)
            }
        })
        .map_err(|e| MsgBridgeError::handler(format!("invalid {} payload: {e}", R::TYPE)))
}
