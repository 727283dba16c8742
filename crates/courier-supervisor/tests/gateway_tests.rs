// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sends through the gateway: lazy connection, bounded waits, and the
//! audit trail written for every attempt.

use std::time::Duration;

use courier_core::traits::transport::{MediaSource, OutboundContent};
use courier_core::{CourierError, MessageKind, SessionStatus, SessionUpdate};
use courier_test_utils::{TestHarness, identity};

const NUMBER: &str = "6281234567890";
const PEER: &str = "6289876543210";

#[tokio::test(start_paused = true)]
async fn successful_send_is_logged_with_receipt() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    let outcome = h
        .supervisor
        .gateway()
        .send_text(&key, "+62 898-7654-3210", "hello there")
        .await
        .unwrap();
    assert_eq!(outcome.to, "6289876543210@s.whatsapp.net");
    assert_eq!(outcome.kind, MessageKind::Text);
    assert_eq!(outcome.message_id.as_deref(), Some("mock-1"));

    let log = h.store.messages_for(&key);
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].id, outcome.log_id);
    assert_eq!(log[0].preview.as_deref(), Some("hello there"));
    assert!(log[0].error.is_none());
    assert!(log[0].payload.as_deref().unwrap().contains("mock-1"));
    assert!(log[0].group_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_send_is_logged_with_error() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    h.transport.client(&key).unwrap().fail_sends(true);

    let err = h
        .supervisor
        .gateway()
        .send_text(&key, PEER, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::TransportSendFailure { .. }));

    let log = h.store.messages_for(&key);
    assert_eq!(log.len(), 1);
    assert!(log[0].error.as_deref().unwrap().contains("mock send rejected"));
}

#[tokio::test(start_paused = true)]
async fn bad_recipient_is_rejected_before_connecting() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.store
        .update_session_now(&key, SessionUpdate::status(SessionStatus::Connected));

    let err = h
        .supervisor
        .gateway()
        .send_text(&key, "not a number", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::InvalidRequest(_)));
    assert_eq!(h.transport.open_count(&key), 0);
    assert!(h.store.messages_for(&key).is_empty());

    let err = h
        .supervisor
        .gateway()
        .send_text(&key, PEER, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::InvalidRequest(_)));
    assert_eq!(h.transport.open_count(&key), 0);
}

#[tokio::test(start_paused = true)]
async fn ensure_client_times_out_while_pairing() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.supervisor.start(&key).await.unwrap();

    let started = tokio::time::Instant::now();
    let err = h
        .supervisor
        .gateway()
        .send(
            &key,
            PEER,
            OutboundContent::Text { body: "hello".into() },
            Some(Duration::from_millis(500)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotRunning { .. }));
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(h.transport.open_count(&key), 1);

    let log = h.store.messages_for(&key);
    assert_eq!(log.len(), 1);
    assert!(log[0].error.as_deref().unwrap().contains("not running"));
}

#[tokio::test(start_paused = true)]
async fn ensure_client_timeout_leaves_no_running_connection() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.store
        .update_session_now(&key, SessionUpdate::status(SessionStatus::Starting));
    h.transport.set_open_delay(Duration::from_secs(5));

    let err = h
        .supervisor
        .ensure_client(&key, Some(Duration::from_millis(300)))
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotRunning { .. }));
    assert!(!h.supervisor.is_running(&key));
    assert_eq!(h.transport.open_count(&key), 1);
}

#[tokio::test(start_paused = true)]
async fn send_brings_a_connected_session_up_lazily() {
    let h = TestHarness::new().unwrap();
    h.transport.auto_open(Some(identity(NUMBER)));
    let key = h.create("sales").await.unwrap();
    h.store
        .update_session_now(&key, SessionUpdate::status(SessionStatus::Connected));

    h.supervisor
        .gateway()
        .send_text(&key, PEER, "wake up")
        .await
        .unwrap();
    assert_eq!(h.transport.open_count(&key), 1);
    assert_eq!(h.transport.client(&key).unwrap().sent_count(), 1);
    assert!(h.supervisor.is_running(&key));
}

#[tokio::test(start_paused = true)]
async fn send_on_idle_session_fails_fast() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();

    let started = tokio::time::Instant::now();
    let err = h
        .supervisor
        .gateway()
        .send_text(&key, PEER, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotRunning { .. }));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(h.transport.open_count(&key), 0);
    assert_eq!(h.store.messages_for(&key).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_session_is_not_found_and_not_logged() {
    let h = TestHarness::new().unwrap();
    let key = h.key("ghost");

    let err = h
        .supervisor
        .gateway()
        .send_text(&key, PEER, "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, CourierError::NotFound { .. }));
    assert!(h.store.messages_for(&key).is_empty());
}

#[tokio::test(start_paused = true)]
async fn group_sends_carry_group_id_and_redact_media() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let group = "120363025246125486@g.us";

    h.supervisor
        .gateway()
        .send_image(
            &key,
            group,
            MediaSource::Base64("aGVsbG8gd29ybGQ=".into()),
            Some("chart".into()),
            Some("image/png".into()),
        )
        .await
        .unwrap();

    let sent = h.transport.client(&key).unwrap().sent();
    assert_eq!(sent[0].0, group);

    let log = h.store.messages_for(&key);
    assert_eq!(log[0].group_id.as_deref(), Some(group));
    assert_eq!(log[0].kind, MessageKind::Image);
    let payload = log[0].payload.as_deref().unwrap();
    assert!(!payload.contains("aGVsbG8gd29ybGQ="));
    assert!(payload.contains("<16 bytes>"));
}

#[tokio::test(start_paused = true)]
async fn audit_failure_does_not_fail_the_send() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    h.store.fail_appends(true);

    let outcome = h
        .supervisor
        .gateway()
        .send_document(
            &key,
            PEER,
            MediaSource::Url("https://files.example/invoice.pdf".into()),
            "invoice.pdf",
            Some("application/pdf".into()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(outcome.kind, MessageKind::Document);
    assert!(h.store.messages_for(&key).is_empty());
}

#[tokio::test(start_paused = true)]
async fn message_history_reads_newest_last() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let gateway = h.supervisor.gateway();
    for body in ["one", "two", "three"] {
        gateway.send_text(&key, PEER, body).await.unwrap();
    }

    let last_two = h.supervisor.messages(&key, Some(2)).await.unwrap();
    let previews: Vec<_> = last_two.iter().filter_map(|m| m.preview.as_deref()).collect();
    assert_eq!(previews, ["two", "three"]);

    let err = h.supervisor.messages(&h.key("ghost"), None).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound { .. }));
}
