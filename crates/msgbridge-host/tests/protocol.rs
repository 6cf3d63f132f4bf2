#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use msgbridge_core::error::{ErrorCode, MsgBridgeError, Result};
use msgbridge_core::protocol::{Envelope, ErrorPayload};
use msgbridge_host::context::ExecutionContext;
use msgbridge_host::dispatch::{MessageProtocol, RawHandler, SimpleHandler};
use msgbridge_host::transport::{Channel, Intake, MemoryChannel, MemoryPeer};

fn setup() -> (MessageProtocol, MemoryPeer) {
    let protocol = MessageProtocol::new(Arc::new(ExecutionContext::in_memory(None)));
    let (channel, peer) = MemoryChannel::pair();
    protocol.attach(Arc::new(channel));
    (protocol, peer)
}

async fn next(peer: &mut MemoryPeer) -> Envelope {
    tokio::time::timeout(Duration::from_secs(2), peer.recv_envelope())
        .await
        .expect("timed out waiting for the host")
        .expect("host side closed")
}

async fn next_error(peer: &mut MemoryPeer) -> ErrorPayload {
    let env = next(peer).await;
    assert!(env.is_error(), "expected an error envelope, got {}", env.msg_type());
    env.error_payload().expect("error payload shape")
}

async fn assert_silent(peer: &mut MemoryPeer) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(peer.try_recv(), None);
}

async fn shout(req: Envelope) -> Result<Value> {
    let text = req.payload()["text"].as_str().unwrap_or_default().to_uppercase();
    Ok(json!({ "text": text }))
}

async fn fail(_req: Envelope) -> Result<Value> {
    Err(MsgBridgeError::handler("disk on fire"))
}

async fn explode(_req: Envelope) -> Result<Value> {
    panic!("handler blew up");
}

async fn slow(_req: Envelope) -> Result<Value> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok(json!("slow"))
}

async fn fast(_req: Envelope) -> Result<Value> {
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(json!("fast"))
}

#[tokio::test]
async fn simple_handler_answers_with_convention_type() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("text/shout", shout);

    assert!(peer.post(json!({"type": "text/shout", "payload": {"text": "hi"}})));
    let resp = next(&mut peer).await;
    assert_eq!(resp.msg_type(), "text/shout.response");
    assert_eq!(resp.payload(), &json!({"text": "HI"}));
}

#[tokio::test]
async fn raw_handler_builds_its_own_envelope_and_sees_context() {
    let ctx = ExecutionContext::in_memory(Some("/work".into()));
    let protocol = MessageProtocol::new(Arc::new(ctx));
    assert_eq!(
        protocol.context().workspace_root(),
        Some(std::path::Path::new("/work"))
    );
    let (channel, mut peer) = MemoryChannel::pair();
    protocol.attach(Arc::new(channel));

    protocol.on("ctx/root", |_req, ctx| async move {
        let root = ctx.workspace_root().map(|p| p.display().to_string());
        Ok::<_, MsgBridgeError>(Envelope::new("ctx/rootIs", json!(root)))
    });

    peer.post(json!({"type": "ctx/root"}));
    let resp = next(&mut peer).await;
    assert_eq!(resp.msg_type(), "ctx/rootIs");
    assert_eq!(resp.payload(), &json!("/work"));
}

struct BranchLister {
    branches: Vec<&'static str>,
}

#[async_trait]
impl RawHandler for BranchLister {
    async fn handle(&self, request: Envelope, _ctx: Arc<ExecutionContext>) -> Result<Envelope> {
        let remote = request.payload()["remote"].as_bool().unwrap_or(false);
        Ok(Envelope::new(
            "repo/branches",
            json!({ "remote": remote, "branches": self.branches }),
        ))
    }
}

struct Counter {
    hits: AtomicUsize,
}

#[async_trait]
impl SimpleHandler for Counter {
    async fn handle(&self, _request: Envelope) -> Result<Value> {
        Ok(json!(self.hits.fetch_add(1, Ordering::Relaxed) + 1))
    }
}

#[tokio::test]
async fn raw_handler_object_serves_until_removed() {
    let (protocol, mut peer) = setup();
    protocol.on_handler(
        "repo/getBranches",
        Arc::new(BranchLister {
            branches: vec!["main", "dev"],
        }),
    );

    assert!(peer.post_envelope(&Envelope::new("repo/getBranches", json!({"remote": true}))));
    let resp = next(&mut peer).await;
    assert_eq!(resp.msg_type(), "repo/branches");
    assert_eq!(resp.payload(), &json!({"remote": true, "branches": ["main", "dev"]}));

    assert!(protocol.off("repo/getBranches"));
    peer.post_envelope(&Envelope::bare("repo/getBranches"));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerNotFound);
    assert_eq!(err.request_type.as_deref(), Some("repo/getBranches"));
}

#[tokio::test]
async fn simple_handler_object_answers_with_convention_type() {
    let (protocol, mut peer) = setup();
    protocol.register_simple(
        "stats/hit",
        Arc::new(Counter {
            hits: AtomicUsize::new(0),
        }),
    );

    peer.post_envelope(&Envelope::bare("stats/hit"));
    let first = next(&mut peer).await;
    assert_eq!(first.msg_type(), "stats/hit.response");
    assert_eq!(first.payload(), &json!(1));

    peer.post_envelope(&Envelope::bare("stats/hit"));
    assert_eq!(next(&mut peer).await.payload(), &json!(2));
}

#[tokio::test]
async fn off_after_raw_on_unregisters() {
    let (protocol, mut peer) = setup();
    protocol.on("ctx/ping", |_req, _ctx| async move {
        Ok::<_, MsgBridgeError>(Envelope::bare("ctx/pong"))
    });

    peer.post(json!({"type": "ctx/ping"}));
    assert_eq!(next(&mut peer).await.msg_type(), "ctx/pong");

    assert!(protocol.off("ctx/ping"));
    peer.post(json!({"type": "ctx/ping"}));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerNotFound);
    assert_eq!(err.request_type.as_deref(), Some("ctx/ping"));
}

#[tokio::test]
async fn unknown_type_gets_handler_not_found() {
    let (_protocol, mut peer) = setup();
    peer.post(json!({"type": "nope/missing", "payload": {}}));

    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerNotFound);
    assert_eq!(err.request_type.as_deref(), Some("nope/missing"));
    assert_eq!(err.message, "No handler registered for message type: nope/missing");
}

#[tokio::test]
async fn handler_error_is_reported_verbatim() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("disk/check", fail);

    peer.post(json!({"type": "disk/check"}));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerError);
    assert_eq!(err.message, "disk on fire");
    assert_eq!(err.request_type.as_deref(), Some("disk/check"));
}

#[tokio::test]
async fn domain_error_returned_as_err_still_maps_to_handler_error() {
    let (protocol, mut peer) = setup();
    protocol.on("repo/merge", |_req, _ctx| async move {
        Err::<Envelope, _>(MsgBridgeError::domain(ErrorCode::MergeConflict, "conflict in a.txt"))
    });

    peer.post(json!({"type": "repo/merge"}));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerError);
    assert_eq!(err.message, "conflict in a.txt");
}

#[tokio::test]
async fn panicking_handler_yields_error_and_protocol_survives() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("bad/panic", explode);
    protocol.register_handler("text/shout", shout);

    peer.post(json!({"type": "bad/panic"}));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerError);
    assert_eq!(err.message, "handler blew up");

    peer.post(json!({"type": "text/shout", "payload": {"text": "ok"}}));
    assert_eq!(next(&mut peer).await.msg_type(), "text/shout.response");
}

#[tokio::test]
async fn off_unregisters() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("text/shout", shout);
    assert!(protocol.off("text/shout"));
    assert!(!protocol.off("text/shout"));

    peer.post(json!({"type": "text/shout"}));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::HandlerNotFound);
}

#[tokio::test]
async fn later_registration_wins_across_styles() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("x/y", shout);
    protocol.on("x/y", |_req, _ctx| async move {
        Ok::<_, MsgBridgeError>(Envelope::new("x/raw", json!(1)))
    });

    peer.post(json!({"type": "x/y"}));
    assert_eq!(next(&mut peer).await.msg_type(), "x/raw");

    protocol.register_handler("x/y", shout);
    peer.post(json!({"type": "x/y", "payload": {"text": "a"}}));
    assert_eq!(next(&mut peer).await.msg_type(), "x/y.response");
    assert_eq!(protocol.registered_types(), vec!["x/y".to_owned()]);
}

#[tokio::test]
async fn slow_handler_does_not_block_later_requests() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("t/slow", slow);
    protocol.register_handler("t/fast", fast);

    peer.post(json!({"type": "t/slow"}));
    peer.post(json!({"type": "t/fast"}));

    let first = next(&mut peer).await;
    let second = next(&mut peer).await;
    assert_eq!(first.payload(), &json!("fast"));
    assert_eq!(second.payload(), &json!("slow"));
}

#[tokio::test]
async fn wait_idle_resolves_after_in_flight_work() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("t/slow", slow);
    protocol.wait_idle().await;

    peer.post(json!({"type": "t/slow"}));
    protocol.wait_idle().await;
    assert!(peer.try_recv().is_some());
}

#[derive(Default)]
struct BrokenChannel {
    intake: Mutex<Option<Intake>>,
}

impl Channel for BrokenChannel {
    fn post_message(&self, _message: Value) -> Result<()> {
        panic!("webview gone");
    }

    fn on_did_receive_message(&self, intake: Intake) {
        *self.intake.lock() = Some(intake);
    }
}

#[tokio::test]
async fn wait_idle_survives_a_panicking_channel() {
    let protocol = MessageProtocol::new(Arc::new(ExecutionContext::in_memory(None)));
    protocol.register_handler("text/shout", shout);
    let channel = Arc::new(BrokenChannel::default());
    protocol.attach(channel.clone());

    let intake = channel.intake.lock().clone().expect("intake installed");
    intake(json!({"type": "text/shout"}));
    intake(json!({"type": "nope/missing"}));

    tokio::time::timeout(Duration::from_secs(2), protocol.wait_idle())
        .await
        .expect("wait_idle hung after a dispatch task unwound");
}

#[tokio::test]
async fn malformed_input_gets_invalid_message() {
    let (_protocol, mut peer) = setup();

    peer.post(json!("not an envelope"));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::InvalidMessage);
    assert_eq!(err.request_type, None);

    peer.post(json!({"type": 7}));
    assert_eq!(next_error(&mut peer).await.code, ErrorCode::InvalidMessage);

    peer.post(json!({"payload": {}}));
    assert_eq!(next_error(&mut peer).await.code, ErrorCode::InvalidMessage);
}

#[tokio::test]
async fn detached_protocol_drops_sends_and_ignores_intake() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("text/shout", shout);
    protocol.detach();
    assert!(!protocol.is_attached());

    protocol.send_event(Envelope::bare("note/ready"));
    protocol.send_error(ErrorCode::UnknownError, "lost", None);

    peer.post(json!({"type": "text/shout"}));
    assert_silent(&mut peer).await;
    assert_eq!(protocol.metrics().dropped_sends.get(&[]), 2);
}

#[tokio::test]
async fn reattach_routes_only_through_new_channel() {
    let (protocol, mut old_peer) = setup();
    protocol.register_handler("text/shout", shout);

    let (channel, mut new_peer) = MemoryChannel::pair();
    protocol.attach(Arc::new(channel));

    old_peer.post(json!({"type": "text/shout"}));
    assert_silent(&mut old_peer).await;
    assert_silent(&mut new_peer).await;

    new_peer.post(json!({"type": "text/shout", "payload": {"text": "b"}}));
    assert_eq!(next(&mut new_peer).await.payload(), &json!({"text": "B"}));
    assert_eq!(old_peer.try_recv(), None);
}

#[tokio::test]
async fn event_sender_goes_dead_with_protocol() {
    let (protocol, mut peer) = setup();
    let events = protocol.event_sender();

    assert!(events.send_event(Envelope::new("note/hello", json!(1))));
    assert_eq!(next(&mut peer).await.msg_type(), "note/hello");

    assert!(events.send_error(ErrorCode::GithubAuthFailed, "token expired", None));
    let err = next_error(&mut peer).await;
    assert_eq!(err.code, ErrorCode::GithubAuthFailed);
    assert_eq!(err.request_type, None);

    drop(protocol);
    assert!(!events.is_alive());
    assert!(!events.send_event(Envelope::bare("note/late")));
}

#[tokio::test]
async fn metrics_track_outcomes() {
    let (protocol, mut peer) = setup();
    protocol.register_handler("text/shout", shout);
    protocol.register_handler("disk/check", fail);

    peer.post(json!({"type": "text/shout"}));
    next(&mut peer).await;
    peer.post(json!({"type": "disk/check"}));
    next(&mut peer).await;
    peer.post(json!({"type": "nope"}));
    next(&mut peer).await;

    let m = protocol.metrics();
    assert_eq!(m.dispatched.get(&[("type", "text/shout"), ("outcome", "ok")]), 1);
    assert_eq!(m.dispatched.get(&[("type", "disk/check"), ("outcome", "handler_error")]), 1);
    assert_eq!(m.unrouted.get(&[]), 1);
    assert_eq!(m.dispatch_duration.count(&[("type", "text/shout")]), 1);

    let text = m.render();
    assert!(text.contains("msgbridge_unrouted_total 1"));
    assert!(text.contains("msgbridge_dispatched_total{outcome=\"ok\",type=\"text/shout\"} 1"));
}
