//! Integration tests for automatic CTCP replies.

mod common;

use common::connected;

#[tokio::test]
async fn test_version_reply() {
    let (client, mut conn, _server) = connected("tester").await.expect("connect");

    conn.send_raw(":alice!a@host PRIVMSG tester :\x01VERSION\x01")
        .await
        .unwrap();
    let reply = conn.recv_command("NOTICE").await.unwrap();

    assert_eq!(reply.param(0), Some("alice"));
    let expected = format!("\x01VERSION {}\x01", client.config().identity.version);
    assert_eq!(reply.param(1), Some(expected.as_str()));
}

#[tokio::test]
async fn test_ping_is_echoed() {
    let (_client, mut conn, _server) = connected("tester").await.expect("connect");

    conn.send_raw(":alice!a@host PRIVMSG #c :\x01PING 1700000000\x01")
        .await
        .unwrap();
    let reply = conn.recv_command("NOTICE").await.unwrap();

    assert_eq!(reply.param(0), Some("alice"));
    assert_eq!(reply.param(1), Some("\x01PING 1700000000\x01"));
}

#[tokio::test]
async fn test_unknown_query_is_truncated() {
    let (_client, mut conn, _server) = connected("tester").await.expect("connect");

    let body = format!("\x01CLIENTINFO {}\x01", "z".repeat(200));
    conn.send_raw(&format!(":alice!a@host PRIVMSG tester :{body}"))
        .await
        .unwrap();
    let reply = conn.recv_command("NOTICE").await.unwrap();
    let text = reply.param(1).unwrap();

    assert!(text.starts_with("\x01ERRMSG CLIENTINFO zzz"));
    assert!(text.ends_with(" :unknown query\x01"));
    assert!(text.len() < body.len());
}

#[tokio::test]
async fn test_action_is_not_answered() {
    let (_client, mut conn, _server) = connected("tester").await.expect("connect");

    conn.send_raw(":alice!a@host PRIVMSG #c :\x01ACTION waves\x01")
        .await
        .unwrap();
    conn.sync().await.unwrap();
    assert!(
        conn.recv_timeout(std::time::Duration::from_millis(100))
            .await
            .is_err()
    );
}
