//! `repo/getInfo` and the HEAD watcher.
//!
//! Repository problems are domain errors: the handler answers with a
//! `GIT_ERROR` envelope itself instead of failing, so the presentation side
//! sees the specific code rather than `HANDLER_ERROR`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;

use msgbridge_core::error::{ErrorCode, MsgBridgeError, Result};
use msgbridge_core::protocol::mapping::EVENT_REPO_CHANGED;
use msgbridge_core::protocol::{create_error_response, create_response, Envelope, RequestType};

use crate::context::ExecutionContext;
use crate::dispatch::{EventSender, MessageProtocol};

pub fn register(protocol: &MessageProtocol) {
    protocol.on(RequestType::RepoGetInfo.as_str(), |_req, ctx| async move {
        repo_info(&ctx).await
    });
}

async fn repo_info(ctx: &ExecutionContext) -> Result<Envelope> {
    let req = RequestType::RepoGetInfo.as_str();
    let Some(root) = ctx.workspace_root() else {
        return Ok(create_error_response(
            ErrorCode::GitError,
            "No workspace folder is open",
            Some(req),
        ));
    };

    match read_head(root).await? {
        Some(head) => create_response(
            req,
            json!({
                "root": root.display().to_string(),
                "branch": head.branch,
                "detached": head.detached,
                "head": head.target,
            }),
        ),
        None => Ok(create_error_response(
            ErrorCode::GitError,
            format!("Not a git repository: {}", root.display()),
            Some(req),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub branch: Option<String>,
    pub detached: bool,
    /// Full ref name, or the commit id when detached.
    pub target: String,
}

pub fn parse_head(contents: &str) -> Head {
    let contents = contents.trim();
    match contents.strip_prefix("ref: ") {
        Some(r) => Head {
            branch: Some(r.strip_prefix("refs/heads/").unwrap_or(r).to_owned()),
            detached: false,
            target: r.to_owned(),
        },
        None => Head {
            branch: None,
            detached: true,
            target: contents.to_owned(),
        },
    }
}

/// `Ok(None)` when `root` has no `.git/HEAD`.
async fn read_head(root: &Path) -> Result<Option<Head>> {
    let path = root.join(".git").join("HEAD");
    match tokio::fs::read_to_string(&path).await {
        Ok(s) => Ok(Some(parse_head(&s))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MsgBridgeError::handler(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Poll `.git/HEAD` under `root` and push `repo/changed` whenever it moves.
/// Read failures are reported once each as `GIT_ERROR` envelopes without a
/// request type.
/// Stops once the protocol behind `events` is gone.
pub fn spawn_head_watcher(events: EventSender, root: PathBuf, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut last = read_head(&root).await.ok().flatten();
        let mut last_error: Option<String> = None;

        loop {
            tick.tick().await;
            let read = read_head(&root).await;
            if read.is_ok() {
                last_error = None;
            }
            let alive = match read {
                Ok(current) if current != last => {
                    tracing::debug!(root = %root.display(), ?current, "HEAD changed");
                    let sent = events.send_event(Envelope::new(
                        EVENT_REPO_CHANGED,
                        json!({
                            "root": root.display().to_string(),
                            "branch": current.as_ref().and_then(|h| h.branch.clone()),
                            "detached": current.as_ref().is_some_and(|h| h.detached),
                        }),
                    ));
                    last = current;
                    sent
                }
                Ok(_) => events.is_alive(),
                Err(e) => {
                    let msg = e.to_string();
                    if last_error.as_deref() == Some(msg.as_str()) {
                        events.is_alive()
                    } else {
                        let sent = events.send_error(ErrorCode::GitError, msg.clone(), None);
                        last_error = Some(msg);
                        sent
                    }
                }
            };
            if !alive {
                tracing::debug!(root = %root.display(), "protocol dropped; HEAD watcher stopping");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_branch_head() {
        let h = parse_head("ref: refs/heads/feature/x\n");
        assert_eq!(h.branch.as_deref(), Some("feature/x"));
        assert!(!h.detached);
        assert_eq!(h.target, "refs/heads/feature/x");
    }

    #[test]
    fn parse_detached_head() {
        let h = parse_head("3f2a9c1e\n");
        assert_eq!(h.branch, None);
        assert!(h.detached);
        assert_eq!(h.target, "3f2a9c1e");
    }
}
