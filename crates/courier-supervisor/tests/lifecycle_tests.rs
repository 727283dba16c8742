// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle behaviour: idempotent start, reconnect policy,
//! stop, destroy, heartbeat, and shutdown.

use std::time::Duration;

use courier_core::traits::transport::{InboundMessage, TransportEvent};
use courier_core::{CourierError, Direction, MessageKind, SessionStatus, SessionUpdate};
use courier_test_utils::{TestHarness, identity};

const NUMBER: &str = "6281234567890";

async fn eventually(mut check: impl FnMut() -> bool, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_share_one_connection() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.transport.set_open_delay(Duration::from_millis(100));

    let (a, b) = tokio::join!(h.supervisor.start(&key), h.supervisor.start(&key));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.generation(), b.generation());
    assert_eq!(h.transport.open_count(&key), 1);

    let again = h.supervisor.start(&key).await.unwrap();
    assert_eq!(again.generation(), a.generation());
    assert_eq!(h.transport.open_count(&key), 1);
    assert_eq!(h.supervisor.live_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn pairing_then_open_updates_row_and_cache() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.supervisor.start(&key).await.unwrap();

    let request = h.transport.last_request(&key).unwrap();
    assert!(request.credentials_dir.starts_with(h.credentials_root()));
    assert!(request.credentials_dir.is_dir());

    h.transport.pairing_code(&key, "2@pairing").await;
    assert!(eventually(|| h.supervisor.pairing_code(&key).is_some(), Duration::from_secs(1)).await);
    let row = h.store.session(&key).unwrap();
    assert_eq!(row.status, SessionStatus::Starting);
    assert!(row.last_qr_at.is_some());
    assert!(h.supervisor.status(&key).await.unwrap().has_pairing_code);

    h.transport.authenticate(&key, identity(NUMBER)).await;
    assert!(h.wait_until_open(&key, Duration::from_secs(1)).await);

    let row = h.store.session(&key).unwrap();
    assert_eq!(row.channel_identifier.as_deref(), Some(NUMBER));
    assert_eq!(row.device_label.as_deref(), Some("Mock Device"));
    assert!(row.connected_at.is_some());
    assert!(row.disconnected_at.is_none());
    assert_eq!(row.diagnostics.transport_version.as_deref(), Some("mock-1"));
    assert!(h.supervisor.pairing_code(&key).is_none());
}

#[tokio::test(start_paused = true)]
async fn successful_open_resets_attempt_counter() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport.disconnect(&key, Some(428), "connection lost").await;
    assert!(h.wait_for_status(&key, SessionStatus::Disconnected, Duration::from_secs(1)).await);
    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.retry_count_at_failure, Some(1));
    assert_eq!(diag.retry_eligible, Some(true));
    assert_eq!(diag.last_disconnect_code, Some(428));

    assert!(eventually(|| h.transport.open_count(&key) == 2, Duration::from_secs(10)).await);
    h.transport.authenticate(&key, identity(NUMBER)).await;
    assert!(h.wait_until_open(&key, Duration::from_secs(1)).await);

    h.transport.disconnect(&key, Some(428), "connection lost again").await;
    assert!(h.wait_for_status(&key, SessionStatus::Disconnected, Duration::from_secs(1)).await);
    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.retry_count_at_failure, Some(1));
    assert!(diag.last_attempt_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn terminal_close_is_never_retried() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport.disconnect(&key, Some(401), "logged out").await;
    assert!(h.wait_for_status(&key, SessionStatus::Error, Duration::from_secs(1)).await);
    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.retry_eligible, Some(false));
    assert_eq!(diag.max_attempts_reached, Some(false));
    assert_eq!(diag.last_disconnect_code, Some(401));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.transport.open_count(&key), 1);
    assert!(!h.supervisor.is_running(&key));

    let err = h.supervisor.ensure_client(&key, None).await.unwrap_err();
    assert!(matches!(
        err,
        CourierError::TerminalDisconnect { code: Some(401), .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn fast_class_gives_up_after_its_budget() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    // Each reopen closes again before authenticating.
    for reopened in 2..=4 {
        h.transport.disconnect(&key, Some(515), "restart required").await;
        assert!(
            eventually(|| h.transport.open_count(&key) == reopened, Duration::from_secs(10)).await,
            "expected reopen #{reopened}"
        );
    }
    h.transport.disconnect(&key, Some(515), "restart required").await;
    assert!(h.wait_for_status(&key, SessionStatus::Error, Duration::from_secs(1)).await);

    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.max_attempts_reached, Some(true));
    assert_eq!(diag.retry_count_at_failure, Some(3));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.open_count(&key), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_reopens_exhaust_the_standard_budget() {
    let h = TestHarness::builder()
        .configure(|c| {
            c.reconnect.standard_max_attempts = 4;
            c.reconnect.standard_base_delay_ms = 100;
            c.reconnect.standard_max_delay_ms = 1_000;
        })
        .build()
        .unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport.fail_opens(true);
    h.transport.disconnect(&key, None, "socket lost").await;
    assert!(h.wait_for_status(&key, SessionStatus::Error, Duration::from_secs(30)).await);

    assert_eq!(h.transport.open_count(&key), 5);
    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.max_attempts_reached, Some(true));
    assert_eq!(diag.retry_count_at_failure, Some(4));

    let err = h.supervisor.ensure_client(&key, None).await.unwrap_err();
    assert!(matches!(err, CourierError::RetriesExhausted { attempts: 4, .. }));
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_retry() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport.disconnect(&key, None, "socket lost").await;
    assert!(h.wait_for_status(&key, SessionStatus::Disconnected, Duration::from_secs(1)).await);

    assert!(h.supervisor.stop(&key).await.unwrap());
    assert_eq!(h.store.status(&key), Some(SessionStatus::Stopped));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.transport.open_count(&key), 1);
    assert_eq!(h.store.status(&key), Some(SessionStatus::Stopped));

    assert!(!h.supervisor.stop(&key).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn stop_during_reconnect_reload_wins() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    h.store.set_get_delay(Duration::from_millis(500));

    h.transport.disconnect(&key, None, "socket lost").await;
    assert!(h.wait_for_status(&key, SessionStatus::Disconnected, Duration::from_secs(1)).await);

    // The first standard retry fires at 2 s and then spends 500 ms reloading.
    tokio::time::sleep(Duration::from_millis(2_200)).await;
    assert_eq!(h.transport.open_count(&key), 1);

    assert!(h.supervisor.stop(&key).await.unwrap());
    assert_eq!(h.store.status(&key), Some(SessionStatus::Stopped));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.open_count(&key), 1);
    assert!(!h.supervisor.is_running(&key));
    assert_eq!(h.store.status(&key), Some(SessionStatus::Stopped));
}

#[tokio::test(start_paused = true)]
async fn stop_closes_live_connection() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let client = h.transport.client(&key).unwrap();

    assert!(h.supervisor.stop(&key).await.unwrap());
    assert!(client.is_closed());
    assert!(!h.supervisor.is_running(&key));

    let row = h.store.session(&key).unwrap();
    assert_eq!(row.status, SessionStatus::Stopped);
    assert!(row.disconnected_at.is_some());

    let err = h.supervisor.ensure_client(&key, None).await.unwrap_err();
    assert!(matches!(err, CourierError::NotRunning { .. }));
}

#[tokio::test(start_paused = true)]
async fn lost_event_stream_counts_as_transient_close() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport.sever(&key);
    assert!(h.wait_for_status(&key, SessionStatus::Disconnected, Duration::from_secs(1)).await);
    let diag = h.store.session(&key).unwrap().diagnostics;
    assert_eq!(diag.last_disconnect_code, None);
    assert_eq!(diag.retry_eligible, Some(true));
    assert!(eventually(|| h.transport.open_count(&key) == 2, Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn start_after_error_wipes_credentials() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let dir = h.transport.last_request(&key).unwrap().credentials_dir;
    std::fs::write(dir.join("creds.json"), b"{}").unwrap();

    h.transport.disconnect(&key, Some(440), "replaced").await;
    assert!(h.wait_for_status(&key, SessionStatus::Error, Duration::from_secs(1)).await);
    assert!(dir.join("creds.json").exists());

    h.supervisor.start(&key).await.unwrap();
    assert!(!dir.join("creds.json").exists());
    let row = h.store.session(&key).unwrap();
    assert_eq!(row.status, SessionStatus::Starting);
    assert_eq!(row.diagnostics.max_attempts_reached, Some(false));
    assert_eq!(row.diagnostics.retry_count_at_failure, Some(0));
    assert_eq!(h.transport.open_count(&key), 2);
}

#[tokio::test(start_paused = true)]
async fn destroy_removes_row_credentials_and_log() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let dir = h.transport.last_request(&key).unwrap().credentials_dir;
    h.supervisor
        .gateway()
        .send_text(&key, "6289876543210", "hello")
        .await
        .unwrap();
    assert_eq!(h.store.messages_for(&key).len(), 1);

    h.supervisor.destroy(&key).await.unwrap();
    assert!(h.store.session(&key).is_none());
    assert!(h.store.messages_for(&key).is_empty());
    assert!(!dir.exists());
    assert!(!h.supervisor.is_running(&key));

    let err = h.supervisor.destroy(&key).await.unwrap_err();
    assert!(matches!(err, CourierError::NotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_until_stopped() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let client = h.transport.client(&key).unwrap();

    tokio::time::sleep(Duration::from_secs(95)).await;
    assert!(client.ping_count() >= 3);

    h.supervisor.stop(&key).await.unwrap();
    let pings = client.ping_count();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(client.ping_count(), pings);
}

#[tokio::test(start_paused = true)]
async fn inbound_messages_are_logged() {
    let h = TestHarness::new().unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();

    h.transport
        .emit(
            &key,
            TransportEvent::MessageReceived(InboundMessage {
                message_id: Some("in-1".into()),
                from: "6289876543210@s.whatsapp.net".into(),
                group: None,
                kind: MessageKind::Text,
                text: Some("hi there".into()),
                raw: serde_json::json!({ "id": "in-1" }),
            }),
        )
        .await;

    assert!(eventually(|| h.store.messages_for(&key).len() == 1, Duration::from_secs(1)).await);
    let entry = &h.store.messages_for(&key)[0];
    assert_eq!(entry.direction, Direction::In);
    assert_eq!(entry.preview.as_deref(), Some("hi there"));
    assert_eq!(entry.peer, "6289876543210@s.whatsapp.net");
}

#[tokio::test(start_paused = true)]
async fn connected_notice_goes_to_own_number() {
    let h = TestHarness::builder()
        .configure(|c| c.notify.on_connect = true)
        .build()
        .unwrap();
    let key = h.connect("sales", NUMBER).await.unwrap();
    let client = h.transport.client(&key).unwrap();

    assert!(eventually(|| client.sent_count() == 1, Duration::from_secs(1)).await);
    let (to, _) = &client.sent()[0];
    assert_eq!(to, "6281234567890@s.whatsapp.net");

    assert!(eventually(|| h.store.messages_for(&key).len() == 1, Duration::from_secs(1)).await);
    let entry = &h.store.messages_for(&key)[0];
    assert_eq!(entry.direction, Direction::Out);
    assert!(entry.preview.as_deref().unwrap().contains("sales"));
}

#[tokio::test(start_paused = true)]
async fn status_degrades_connected_without_live_handle() {
    let h = TestHarness::new().unwrap();
    let key = h.create("sales").await.unwrap();
    h.store
        .update_session_now(&key, SessionUpdate::status(SessionStatus::Connected));

    let view = h.supervisor.status(&key).await.unwrap();
    assert_eq!(view.record.status, SessionStatus::Connected);
    assert_eq!(view.actual_status, SessionStatus::Disconnected);
    assert!(!view.is_running);

    let live = h.connect("support", NUMBER).await.unwrap();
    let view = h.supervisor.status(&live).await.unwrap();
    assert_eq!(view.actual_status, SessionStatus::Connected);
    assert!(view.is_running);

    let listed = h.supervisor.list_sessions("acme").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(h.supervisor.list_sessions("other").await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn init_restores_sessions_with_credentials() {
    let h = TestHarness::new().unwrap();
    h.transport.auto_open(Some(identity(NUMBER)));

    let with_creds = h.create("restored").await.unwrap();
    let without_creds = h.create("unpaired").await.unwrap();
    let stopped = h.create("stopped").await.unwrap();
    for key in [&with_creds, &without_creds] {
        h.store
            .update_session_now(key, SessionUpdate::status(SessionStatus::Connected));
    }
    h.store
        .update_session_now(&stopped, SessionUpdate::status(SessionStatus::Stopped));
    for key in [&with_creds, &stopped] {
        let dir = h.credentials_root().join(&key.tenant).join(&key.session);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("creds.json"), b"{}").unwrap();
    }

    assert_eq!(h.supervisor.init().await.unwrap(), 1);
    assert!(h.wait_until_open(&with_creds, Duration::from_secs(1)).await);
    assert_eq!(h.transport.open_count(&without_creds), 0);
    assert_eq!(h.transport.open_count(&stopped), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_everything_and_keeps_status() {
    let h = TestHarness::new().unwrap();
    let a = h.connect("a", NUMBER).await.unwrap();
    let b = h.connect("b", "6289876543210").await.unwrap();
    let clients = [h.transport.client(&a).unwrap(), h.transport.client(&b).unwrap()];

    h.supervisor.shutdown().await;
    assert_eq!(h.supervisor.live_count(), 0);
    assert!(clients.iter().all(|c| c.is_closed()));
    assert_eq!(h.store.status(&a), Some(SessionStatus::Connected));
    assert_eq!(h.store.status(&b), Some(SessionStatus::Connected));

    assert!(h.supervisor.start(&a).await.is_err());
    h.supervisor.shutdown().await;
}
