use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::Instrument;

use msgbridge_core::error::{ErrorCode, MsgBridgeError, Result};
use msgbridge_core::protocol::envelope::peek_type;
use msgbridge_core::protocol::{
    create_convention_response, create_error_response, decode_envelope, Envelope, Request,
};

use crate::context::ExecutionContext;
use crate::obs::ProtocolMetrics;
use crate::transport::{Channel, Intake, Transport};

use super::handler::{Handler, RawFn, RawHandler, SimpleFn, SimpleHandler, TypedFn};
use super::registry::HandlerRegistry;

/// Request/response dispatch over one attached channel.
///
/// Every inbound envelope yields exactly one outbound envelope: the handler's
/// response, or an `error` envelope when no handler is registered or the
/// handler fails. Failures never reach the caller of [`dispatch`](Self::dispatch).
///
/// Cheap to clone; clones share registry, transport and context.
#[derive(Clone)]
pub struct MessageProtocol {
    inner: Arc<ProtocolInner>,
}

struct ProtocolInner {
    registry: HandlerRegistry,
    transport: Transport,
    ctx: Arc<ExecutionContext>,
    metrics: Arc<ProtocolMetrics>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl MessageProtocol {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Self {
            inner: Arc::new(ProtocolInner {
                registry: HandlerRegistry::new(),
                transport: Transport::new(),
                ctx,
                metrics: Arc::new(ProtocolMetrics::default()),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.inner.ctx
    }

    pub fn metrics(&self) -> Arc<ProtocolMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    /// Handle for pushing events/errors without keeping the protocol alive.
    /// Handlers capture this instead of a `MessageProtocol` clone.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // --------------------
    // Transport binding
    // --------------------

    /// Attach `channel` (replacing any previous one) and install the single
    /// intake that feeds inbound messages into dispatch.
    ///
    /// Each inbound message is dispatched on its own tokio task, so intakes
    /// must fire from within a runtime.
    pub fn attach(&self, channel: Arc<dyn Channel>) {
        let generation = self.inner.transport.attach(Arc::clone(&channel));
        let weak = Arc::downgrade(&self.inner);

        let intake: Intake = Arc::new(move |value: Value| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.transport.is_current(generation) {
                tracing::debug!(generation, "inbound message from a detached channel ignored");
                return;
            }
            let protocol = MessageProtocol { inner };
            protocol.spawn_dispatch(value);
        });

        channel.on_did_receive_message(intake);
        tracing::info!(generation, "channel attached");
    }

    pub fn detach(&self) {
        self.inner.transport.detach();
        tracing::info!("channel detached");
    }

    pub fn is_attached(&self) -> bool {
        self.inner.transport.is_attached()
    }

    fn spawn_dispatch(self, value: Value) {
        let rt = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                tracing::error!("inbound message outside a tokio runtime; dropped");
                return;
            }
        };

        let guard = InFlight::enter(Arc::clone(&self.inner));
        let span = tracing::debug_span!("inbound", msg_type = peek_type(&value).unwrap_or("?"));
        rt.spawn(
            async move {
                let _guard = guard;
                self.dispatch_value(value).await;
            }
            .instrument(span),
        );
    }

    /// Resolves once no intake-spawned dispatch is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    // --------------------
    // Registration
    // --------------------

    /// Register a raw handler; it builds the full response envelope itself.
    pub fn on<F, Fut>(&self, msg_type: impl Into<String>, handler: F)
    where
        F: Fn(Envelope, Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope>> + Send + 'static,
    {
        self.install(msg_type.into(), Handler::Raw(Arc::new(RawFn(handler))));
    }

    /// Register a raw handler object.
    pub fn on_handler(&self, msg_type: impl Into<String>, handler: Arc<dyn RawHandler>) {
        self.install(msg_type.into(), Handler::Raw(handler));
    }

    /// Remove whatever handler is registered for `msg_type`.
    /// Returns whether one was present.
    pub fn off(&self, msg_type: &str) -> bool {
        let removed = self.inner.registry.remove(msg_type);
        if let Some(h) = &removed {
            tracing::debug!(msg_type, style = h.style(), "handler removed");
        }
        removed.is_some()
    }

    /// Register a simplified handler; its result is sent as `<type>.response`.
    pub fn register_handler<F, Fut>(&self, msg_type: impl Into<String>, handler: F)
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.install(msg_type.into(), Handler::Simple(Arc::new(SimpleFn(handler))));
    }

    /// Register a simplified handler object.
    pub fn register_simple(&self, msg_type: impl Into<String>, handler: Arc<dyn SimpleHandler>) {
        self.install(msg_type.into(), Handler::Simple(handler));
    }

    /// Register a simplified handler for a typed request under `R::TYPE`.
    /// A payload that does not decode into `R` fails like any handler error.
    pub fn handle<R, F, Fut>(&self, handler: F)
    where
        R: Request,
        F: Fn(R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R::Output>> + Send + 'static,
    {
        self.install(
            R::TYPE.to_owned(),
            Handler::Simple(Arc::new(TypedFn::<R, F>::new(handler))),
        );
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.inner.registry.types()
    }

    // Last registration wins, across styles.
    fn install(&self, msg_type: String, handler: Handler) {
        let style = handler.style();
        if let Some(prev) = self.inner.registry.insert(msg_type.clone(), handler) {
            tracing::debug!(
                msg_type = %msg_type,
                from = prev.style(),
                to = style,
                "handler replaced"
            );
        } else {
            tracing::debug!(msg_type = %msg_type, style, "handler registered");
        }
    }

    // --------------------
    // Dispatch
    // --------------------

    /// Validate a raw inbound value, then dispatch it.
    /// Malformed input is answered with an `INVALID_MESSAGE` error envelope.
    pub async fn dispatch_value(&self, value: Value) {
        let request_type = peek_type(&value).map(str::to_owned);
        match decode_envelope(value) {
            Ok(env) => self.dispatch(env).await,
            Err(e) => {
                tracing::warn!(error = %e, "rejected inbound message");
                self.inner.metrics.invalid_messages.inc(&[]);
                self.send_error(ErrorCode::InvalidMessage, e.to_string(), request_type.as_deref());
            }
        }
    }

    /// Route `request` to its handler and send exactly one outbound envelope.
    pub async fn dispatch(&self, request: Envelope) {
        let msg_type = request.msg_type().to_owned();

        let Some(handler) = self.inner.registry.get(&msg_type) else {
            tracing::warn!(msg_type = %msg_type, "no handler registered");
            self.inner.metrics.unrouted.inc(&[]);
            self.send_error(
                ErrorCode::HandlerNotFound,
                format!("No handler registered for message type: {msg_type}"),
                Some(&msg_type),
            );
            return;
        };

        let started = Instant::now();
        let outcome = self.run_handler(handler, request).await;
        let elapsed = started.elapsed();
        self.inner
            .metrics
            .dispatch_duration
            .observe(&[("type", msg_type.as_str())], elapsed);

        match outcome {
            Ok(response) => {
                tracing::debug!(
                    msg_type = %msg_type,
                    response = %response.msg_type(),
                    ?elapsed,
                    "handled"
                );
                self.inner
                    .metrics
                    .dispatched
                    .inc(&[("type", msg_type.as_str()), ("outcome", "ok")]);
                self.send(&response);
            }
            Err(e) => {
                tracing::warn!(msg_type = %msg_type, error = %e, "handler failed");
                self.inner
                    .metrics
                    .dispatched
                    .inc(&[("type", msg_type.as_str()), ("outcome", "handler_error")]);
                self.send_error(ErrorCode::HandlerError, e.to_string(), Some(&msg_type));
            }
        }
    }

    /// Run `handler`, turning a panic into a handler error.
    async fn run_handler(&self, handler: Handler, request: Envelope) -> Result<Envelope> {
        let ctx = Arc::clone(&self.inner.ctx);
        let fut = async move {
            match handler {
                Handler::Raw(h) => h.handle(request, ctx).await,
                Handler::Simple(h) => {
                    let msg_type = request.msg_type().to_owned();
                    let payload = h.handle(request).await?;
                    Ok(create_convention_response(&msg_type, payload))
                }
            }
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(MsgBridgeError::handler(panic_message(panic.as_ref()))),
        }
    }

    // --------------------
    // Outbound
    // --------------------

    /// Send through the transport; dropped silently when detached.
    pub fn send(&self, envelope: &Envelope) {
        self.inner.send(envelope);
    }

    /// Push an unsolicited event.
    pub fn send_event(&self, envelope: Envelope) {
        self.inner.send(&envelope);
    }

    pub fn send_error(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        request_type: Option<&str>,
    ) {
        self.inner
            .send(&create_error_response(code, message, request_type));
    }
}

impl ProtocolInner {
    fn send(&self, envelope: &Envelope) {
        if !self.transport.send(envelope) {
            self.metrics.dropped_sends.inc(&[]);
        }
    }
}

/// One intake-spawned dispatch; released on drop, including when the task unwinds.
struct InFlight {
    inner: Arc<ProtocolInner>,
}

impl InFlight {
    fn enter(inner: Arc<ProtocolInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        Self { inner }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Weak outbound handle for collaborators outside the dispatch path
/// (background watchers, handlers that push follow-up events).
#[derive(Clone)]
pub struct EventSender {
    inner: Weak<ProtocolInner>,
}

impl EventSender {
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns `false` once the protocol is gone.
    pub fn send_event(&self, envelope: Envelope) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.send(&envelope);
                true
            }
            None => false,
        }
    }

    pub fn send_error(
        &self,
        code: ErrorCode,
        message: impl Into<String>,
        request_type: Option<&str>,
    ) -> bool {
        self.send_event(create_error_response(code, message, request_type))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_owned()
    }
}
