//! Connection Tests
//!
//! These tests verify, against a scripted loopback server:
//! - Banner handling on connect
//! - Challenge-response authentication
//! - Command dispatch and error reporting
//! - Timeouts and premature close
//! - quit/close resource release

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{banner, challenge, closed_port, exchange, reply, ScriptedServer, Step, CHALLENGE, TIMEOUT};
use varnish_admin::protocol::auth::credential;
use varnish_admin::{AdminError, Connection, ProtocolVersion};

// =============================================================================
// Helper Functions
// =============================================================================

fn client(server: &ScriptedServer) -> Connection {
    Connection::new("127.0.0.1", server.port(), ProtocolVersion::new(3, 0)).unwrap()
}

fn script(parts: Vec<Vec<Step>>) -> Vec<Step> {
    parts.into_iter().flatten().collect()
}

// =============================================================================
// Connect Tests
// =============================================================================

#[test]
fn test_connect_returns_banner_without_auth() {
    let server = ScriptedServer::start(vec![banner(), Step::Drain]);
    let mut conn = client(&server);

    let text = conn.connect(TIMEOUT).unwrap();

    assert!(text.contains("Varnish Cache CLI 1.0"));
    assert_eq!(conn.banner(), Some(text.as_str()));
    assert!(conn.is_connected());

    conn.close();
    assert_eq!(server.finish_one(), "", "no auth exchange expected");
}

#[test]
fn test_connect_refused_is_connection_error() {
    let port = closed_port();
    let mut conn = Connection::new("127.0.0.1", port, ProtocolVersion::new(2, 1)).unwrap();

    let err = conn.connect(TIMEOUT).unwrap_err();

    match err {
        AdminError::Connection { host, port: p, .. } => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(p, port);
        }
        other => panic!("Expected Connection error, got {:?}", other),
    }
    assert!(!conn.is_connected());
}

#[test]
fn test_connect_rejects_unexpected_greeting() {
    let server = ScriptedServer::start(vec![reply(101, "Unknown request"), Step::Drain]);
    let mut conn = client(&server);

    let err = conn.connect(TIMEOUT).unwrap_err();

    assert!(matches!(err, AdminError::Protocol(_)));
    assert!(!conn.is_connected());
    drop(conn);
    server.finish();
}

#[test]
fn test_connect_times_out_on_silent_server() {
    let server = ScriptedServer::start(vec![Step::Hold(Duration::from_millis(800))]);
    let mut conn = client(&server);

    let err = conn.connect(Duration::from_millis(150)).unwrap_err();

    assert!(err.is_timeout(), "got {:?}", err);
    assert!(!conn.is_connected());
    server.finish();
}

#[test]
fn test_connect_eof_before_banner_is_protocol_error() {
    let server = ScriptedServer::start(vec![]);
    let mut conn = client(&server);

    let err = conn.connect(TIMEOUT).unwrap_err();

    assert!(matches!(err, AdminError::Protocol(_)), "got {:?}", err);
    server.finish();
}

#[test]
fn test_zero_timeout_rejected() {
    let mut conn = Connection::new("127.0.0.1", 6082, ProtocolVersion::new(2, 1)).unwrap();
    let err = conn.connect(Duration::ZERO).unwrap_err();
    assert!(matches!(err, AdminError::Config(_)));
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[test]
fn test_challenge_without_secret_writes_nothing() {
    let server = ScriptedServer::start(vec![challenge(), Step::Drain]);
    let mut conn = client(&server);

    let err = conn.connect(TIMEOUT).unwrap_err();

    assert!(matches!(err, AdminError::AuthRequired { .. }), "got {:?}", err);
    assert!(!conn.is_connected());
    assert_eq!(server.finish_one(), "");
}

#[test]
fn test_challenge_with_secret_authenticates() {
    let server = ScriptedServer::start(script(vec![
        vec![challenge()],
        exchange(200, "Welcome after auth"),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server).with_secret("foo\n");

    let text = conn.connect(TIMEOUT).unwrap();

    assert_eq!(text, "Welcome after auth");
    assert_eq!(conn.banner(), Some("Welcome after auth"));
    conn.close();

    let expected = format!("auth {}\n", credential(CHALLENGE.as_bytes(), b"foo\n"));
    assert_eq!(server.finish_one(), expected);
}

#[test]
fn test_rejected_credential_is_auth_failed() {
    let server = ScriptedServer::start(script(vec![
        vec![challenge()],
        exchange(107, "Authentication required."),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server).with_secret("wrong");

    let err = conn.connect(TIMEOUT).unwrap_err();

    match err {
        AdminError::AuthFailed { code, body } => {
            assert_eq!(code, 107);
            assert_eq!(body, b"Authentication required.");
        }
        other => panic!("Expected AuthFailed, got {:?}", other),
    }
    assert!(!conn.is_connected());
    server.finish();
}

// =============================================================================
// Command Tests
// =============================================================================

#[test]
fn test_command_returns_body() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        exchange(200, "PONG 1290000000 1.0"),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    let body = conn.command("ping", 200).unwrap();

    assert_eq!(body, "PONG 1290000000 1.0");
    conn.close();
    assert_eq!(server.finish_one(), "ping\n");
}

#[test]
fn test_command_mismatch_carries_exact_code_and_body() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        exchange(106, "Syntax error\nUnknown field \"req.urll\"\n"),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    let err = conn.command("ban req.urll ~ /", 200).unwrap_err();

    match &err {
        AdminError::Command { verb, code, body } => {
            assert_eq!(verb, "ban req.urll ~ /");
            assert_eq!(*code, 106);
            assert_eq!(body, b"Syntax error\nUnknown field \"req.urll\"\n");
        }
        other => panic!("Expected Command error, got {:?}", other),
    }
    assert!(err.to_string().contains(" > Syntax error\n > Unknown field"));

    drop(conn);
    server.finish();
}

#[test]
fn test_command_error_keeps_non_utf8_body_bytes() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        vec![Step::ReadLine, Step::Raw(b"106 3       \n\xff\xfe!\n".to_vec())],
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    let err = conn.command("ping", 200).unwrap_err();

    match &err {
        AdminError::Command { code, body, .. } => {
            assert_eq!(*code, 106);
            assert_eq!(body, &[0xff, 0xfe, b'!']);
        }
        other => panic!("Expected Command error, got {:?}", other),
    }

    drop(conn);
    server.finish();
}

#[test]
fn test_empty_verb_sends_bare_newline() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        exchange(200, ""),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    assert_eq!(conn.command("", 200).unwrap(), "");

    conn.close();
    assert_eq!(server.finish_one(), "\n");
}

#[test]
fn test_command_read_timeout() {
    let server = ScriptedServer::start(vec![
        banner(),
        Step::ReadLine,
        Step::Hold(Duration::from_millis(800)),
    ]);
    let mut conn = client(&server);
    conn.connect(Duration::from_millis(200)).unwrap();

    let err = conn.command("status", 200).unwrap_err();

    assert!(err.is_timeout(), "got {:?}", err);
    drop(conn);
    server.finish();
}

#[test]
fn test_command_when_not_connected() {
    let mut conn = Connection::new("127.0.0.1", 6082, ProtocolVersion::new(2, 1)).unwrap();
    let err = conn.command("status", 200).unwrap_err();
    assert!(matches!(err, AdminError::NotConnected));
}

// =============================================================================
// Close / Quit Tests
// =============================================================================

#[test]
fn test_close_is_idempotent() {
    let mut never = Connection::new("127.0.0.1", 6082, ProtocolVersion::new(2, 1)).unwrap();
    never.close();
    never.close();
    assert!(!never.is_connected());

    let server = ScriptedServer::start(vec![banner(), Step::Drain]);
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();
    conn.close();
    conn.close();
    assert!(!conn.is_connected());
    server.finish();
}

#[test]
fn test_quit_sends_quit_and_closes() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        exchange(500, "Closing CLI connection"),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    conn.quit();

    assert!(!conn.is_connected());
    assert_eq!(server.finish_one(), "quit\n");
}

#[test]
fn test_quit_closes_on_unexpected_code() {
    let server = ScriptedServer::start(script(vec![
        vec![banner()],
        exchange(200, "not a goodbye"),
        vec![Step::Drain],
    ]));
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();

    conn.quit();

    assert!(!conn.is_connected());
    assert_eq!(server.finish_one(), "quit\n");
}

#[test]
fn test_quit_closes_when_peer_is_gone() {
    let server = ScriptedServer::start(vec![banner()]);
    let mut conn = client(&server);
    conn.connect(TIMEOUT).unwrap();
    server.finish();

    conn.quit();

    assert!(!conn.is_connected());
}

#[test]
fn test_quit_on_unconnected_client() {
    let mut conn = Connection::new("127.0.0.1", 6082, ProtocolVersion::new(2, 1)).unwrap();
    conn.quit();
    assert!(!conn.is_connected());
}
