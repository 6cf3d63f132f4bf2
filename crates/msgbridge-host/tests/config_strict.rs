#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use msgbridge_core::error::{ErrorCode, MsgBridgeError};
use msgbridge_host::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
host:
  max_mesage_bytes: 4096 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(matches!(err, MsgBridgeError::Config(_)));
    assert_eq!(err.error_code(), ErrorCode::UnknownError);
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.host.workspace_root, None);
    assert_eq!(cfg.host.max_message_bytes, 1024 * 1024);
    assert_eq!(cfg.host.watch_interval_ms, 1000);
    assert_eq!(cfg.logging.filter, "info");
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
host:
  workspace_root: "/srv/repo"
  max_message_bytes: 65536
  shutdown_grace_ms: 500
  watch_interval_ms: 0
logging:
  filter: "msgbridge_host=debug"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.host.workspace_root.as_deref(), Some(std::path::Path::new("/srv/repo")));
    assert_eq!(cfg.host.max_message_bytes, 65536);
    assert_eq!(cfg.host.shutdown_grace_ms, 500);
    assert_eq!(cfg.host.watch_interval_ms, 0);
    assert_eq!(cfg.logging.filter, "msgbridge_host=debug");
}

#[test]
fn unsupported_version_rejected() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert!(matches!(err, MsgBridgeError::UnsupportedVersion));
}

#[test]
fn out_of_range_limits_rejected() {
    for bad in [
        "version: 1\nhost:\n  max_message_bytes: 10\n",
        "version: 1\nhost:\n  shutdown_grace_ms: 999999\n",
        "version: 1\nhost:\n  watch_interval_ms: 5\n",
        "version: 1\nhost:\n  workspace_root: \"\"\n",
        "version: 1\nlogging:\n  filter: \"\"\n",
    ] {
        assert!(config::load_from_str(bad).is_err(), "accepted: {bad}");
    }
}
