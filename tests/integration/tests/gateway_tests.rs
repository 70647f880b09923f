//! Gateway integration tests
//!
//! Drive the registry end to end with a scripted protocol connector, local
//! tiers in a temp dir, and a wiremock webhook endpoint. No external services
//! are required.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use integration_tests::*;
use relay_core::{Credentials, DomainError, SessionRecord, SessionStatus};
use std::time::Duration;

fn registered_credentials() -> Credentials {
    let mut credentials = Credentials::new(serde_json::json!({
        "registered": true,
        "me": {"id": "555@s.net"}
    }));
    credentials
        .keys
        .insert("pre-key-1".to_string(), serde_json::json!({"public": "abc"}));
    credentials
}

// ============================================================================
// Pairing and sending
// ============================================================================

#[tokio::test]
async fn test_pairing_to_first_send() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway
        .registry
        .create(tenant.clone(), sink.url(&tenant))
        .await
        .unwrap();
    let socket = gateway.socket(&tenant).unwrap();

    socket.pairing_code("2@PAIRME").await;
    let pairing = sink.wait_for("identity.pairing", 1).await.unwrap();
    assert_eq!(pairing[0]["tenantId"], tenant.as_str());
    assert_eq!(pairing[0]["payload"]["code"], "2@PAIRME");
    assert!(pairing[0]["timestamp"].is_string());
    assert!(gateway
        .registry
        .get_pairing_artifact(&tenant)
        .unwrap()
        .is_some());

    socket.open().await;
    gateway
        .wait_for_status(&tenant, SessionStatus::Connected)
        .await
        .unwrap();

    let err = gateway
        .registry
        .send_text(&tenant, "555@s.net", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::StillInitializing));

    tokio::time::sleep(Duration::from_millis(350)).await;
    let message_id = gateway
        .registry
        .send_text(&tenant, "555@s.net", "hi")
        .await
        .unwrap();

    let sent = sink.wait_for("message.sent", 1).await.unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["payload"]["messageId"], message_id.as_str());
    assert_eq!(sent[0]["payload"]["to"], "555@s.net");

    let statuses: Vec<_> = sink
        .events_of("connection.update")
        .await
        .iter()
        .map(|e| e["payload"]["status"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(statuses.contains(&"requires_pairing".to_string()));
    assert!(statuses.contains(&"connected".to_string()));

    gateway.stop().await;
}

#[tokio::test]
async fn test_rate_limit_rejects_over_budget() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let policy = relay_gateway::SessionPolicy {
        rate_limit_per_minute: 2,
        ..fast_session_policy()
    };
    let gateway = TestGateway::start_with(dir.path(), None, policy, fast_webhook_policy())
        .await
        .unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    gateway.socket(&tenant).unwrap().open().await;
    gateway.wait_for_status(&tenant, SessionStatus::Connected).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    gateway.registry.send_text(&tenant, "555", "1").await.unwrap();
    gateway.registry.send_text(&tenant, "555", "2").await.unwrap();
    let err = gateway.registry.send_text(&tenant, "555", "3").await.unwrap_err();
    assert!(matches!(err, DomainError::RateLimited { .. }));

    gateway.stop().await;
}

// ============================================================================
// Webhook delivery
// ============================================================================

#[tokio::test]
async fn test_repeated_inbound_message_delivered_once() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.open().await;

    socket.message(text_message("M1", "555@s.net", "hello")).await;
    socket.message(text_message("M1", "555@s.net", "hello")).await;
    socket.message(text_message("M2", "555@s.net", "again")).await;

    sink.wait_for("message.received", 2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let received = sink.events_of("message.received").await;
    assert_eq!(received.len(), 2);
    let mut ids: Vec<_> = received
        .iter()
        .map(|e| e["payload"]["messageId"].as_str().unwrap_or_default().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["M1", "M2"]);
    assert!(received[0]["payload"]["mediaUrl"].is_null());

    gateway.stop().await;
}

#[tokio::test]
async fn test_failed_delivery_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::failing_first(2).await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    // The only event so far is the initial connecting update
    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();

    sink.wait_for("connection.update", 3).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let attempts = sink.events_of("connection.update").await;
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|e| e["payload"]["status"] == "connecting"));

    gateway.stop().await;
}

#[tokio::test]
async fn test_delivery_gives_up_after_max_retries() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::failing_first(100).await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();

    sink.wait_for("connection.update", 4).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    // One attempt plus three retries
    assert_eq!(sink.events_of("connection.update").await.len(), 4);

    gateway.stop().await;
}

#[tokio::test]
async fn test_empty_webhook_url_is_never_called() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), "").await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.pairing_code("C").await;
    socket.open().await;
    gateway.wait_for_status(&tenant, SessionStatus::Connected).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(sink.envelopes().await.is_empty());
    gateway.stop().await;
}

// ============================================================================
// Identifier resolution
// ============================================================================

#[tokio::test]
async fn test_opaque_senders_resolved_or_left_empty() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();
    gateway.connector.add_resolution("9@lid", "999@s.net");

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.open().await;

    socket.message(opaque_message("R1", "9@lid", "known")).await;
    socket.message(opaque_message("R2", "7@lid", "unknown")).await;

    let received = sink.wait_for("message.received", 2).await.unwrap();
    let by_id = |id: &str| {
        received
            .iter()
            .find(|e| e["payload"]["messageId"] == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(by_id("R1")["payload"]["from"], "999@s.net");
    assert_eq!(by_id("R2")["payload"]["from"], "");
    assert_eq!(by_id("R2")["payload"]["sender"], "7@lid");

    let resolved = sink.wait_for("identity.resolved", 1).await.unwrap();
    assert_eq!(resolved[0]["payload"]["opaqueId"], "9@lid");
    assert_eq!(resolved[0]["payload"]["address"], "999@s.net");

    let mappings = gateway.registry.list_identifier_mappings(&tenant).unwrap();
    assert_eq!(mappings.len(), 1);

    gateway.stop().await;
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_transient_closes_back_off_monotonically() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();

    let mut delays = Vec::new();
    for round in 1..=3 {
        gateway.socket(&tenant).unwrap().close(428).await;
        gateway.wait_for_opens(&tenant, round + 1).await.unwrap();
        let snapshot = gateway.registry.get_status(&tenant).unwrap();
        delays.push(snapshot.last_reconnect_delay_ms.unwrap());
    }

    assert_eq!(delays, vec![50, 100, 200]);
    assert!(delays.windows(2).all(|pair| pair[1] >= pair[0]));
    assert!(delays.iter().all(|d| *d <= 400));

    gateway.socket(&tenant).unwrap().open().await;
    gateway.wait_for_status(&tenant, SessionStatus::Connected).await.unwrap();
    assert_eq!(gateway.registry.get_status(&tenant).unwrap().reconnect_attempts, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_reconnect_exhaustion_ends_disconnected() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();
    gateway.connector.fail_next_opens(100);

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    gateway
        .wait_for_status(&tenant, SessionStatus::Disconnected)
        .await
        .unwrap();

    let updates = sink.wait_for("connection.update", 1).await.unwrap();
    let last_reasons: Vec<_> = updates
        .iter()
        .filter(|e| e["payload"]["status"] == "disconnected")
        .filter_map(|e| e["payload"]["reason"].as_str().map(str::to_string))
        .collect();
    // Delivery of the final update may still be in flight
    if let Some(reason) = last_reasons.last() {
        assert!(reason.contains("exhausted"));
    }
    assert_eq!(gateway.connector.total_opens(), 0);

    gateway.stop().await;
}

#[tokio::test]
async fn test_fatal_close_wipes_local_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.credentials_updated(registered_credentials()).await;
    socket.open().await;
    let key_file = gateway.tenant_dir(&tenant).join("keys").join("pre-key-1.json");
    let key_file = &key_file;
    assert!(eventually(WAIT, || async move { key_file.exists() }).await);

    socket.close(401).await;
    gateway
        .wait_for_status(&tenant, SessionStatus::Disconnected)
        .await
        .unwrap();
    assert!(!gateway.tenant_dir(&tenant).exists());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(gateway.connector.open_count(&tenant), 1);

    gateway.stop().await;
}

// ============================================================================
// Deletion and restart
// ============================================================================

#[tokio::test]
async fn test_delete_is_final() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.credentials_updated(registered_credentials()).await;
    socket.open().await;
    gateway.wait_for_status(&tenant, SessionStatus::Connected).await.unwrap();

    // Leave a reconnect timer pending, then delete
    socket.close(428).await;
    assert!(gateway.registry.delete(&tenant).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let delivered = sink.envelopes().await.len();

    socket.message(text_message("late", "555@s.net", "x")).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(sink.envelopes().await.len(), delivered);
    assert!(sink.events_of("message.received").await.is_empty());
    assert_eq!(gateway.connector.open_count(&tenant), 1);
    assert!(!gateway.tenant_dir(&tenant).exists());
    assert!(gateway.registry.get(&tenant).is_none());
    assert!(!gateway.registry.delete(&tenant).await);

    gateway.stop().await;
}

#[tokio::test]
async fn test_restart_reopens_with_same_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let gateway = TestGateway::start(dir.path()).await.unwrap();
    let tenant = unique_tenant();

    gateway.registry.create(tenant.clone(), sink.url(&tenant)).await.unwrap();
    let socket = gateway.socket(&tenant).unwrap();
    socket.credentials_updated(registered_credentials()).await;
    let key_file = gateway.tenant_dir(&tenant).join("keys").join("pre-key-1.json");
    let key_file = &key_file;
    assert!(eventually(WAIT, || async move { key_file.exists() }).await);

    let new_url = format!("{}/moved", sink.url(&tenant));
    gateway
        .registry
        .restart(&tenant, Some(&new_url))
        .await
        .unwrap();

    assert_eq!(gateway.connector.open_count(&tenant), 2);
    assert_eq!(gateway.socket(&tenant).unwrap().credentials, registered_credentials());
    assert_eq!(gateway.registry.records()[0].webhook_url, new_url);

    gateway.stop().await;
}

// ============================================================================
// Persistence across process restarts
// ============================================================================

#[tokio::test]
async fn test_bootstrap_restores_and_normalizes() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let tenant = unique_tenant();

    let first = TestGateway::start(dir.path()).await.unwrap();
    first
        .registry
        .create(tenant.clone(), "https://stale.example/hook")
        .await
        .unwrap();
    let socket = first.socket(&tenant).unwrap();
    socket.credentials_updated(registered_credentials()).await;
    let key_file = first.tenant_dir(&tenant).join("keys").join("pre-key-1.json");
    let key_file = &key_file;
    assert!(eventually(WAIT, || async move { key_file.exists() }).await);
    first.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = TestGateway::start_with(
        dir.path(),
        Some(sink.base_url()),
        fast_session_policy(),
        fast_webhook_policy(),
    )
    .await
    .unwrap();
    assert_eq!(second.registry.bootstrap().await, 1);

    let session = second.registry.get(&tenant).unwrap();
    assert_eq!(session.webhook_url(), sink.url(&tenant));
    second.wait_for_opens(&tenant, 1).await.unwrap();
    assert_eq!(
        second.socket(&tenant).unwrap().credentials,
        registered_credentials()
    );

    // The correction was written back to the local record file
    let raw = std::fs::read(second.data_dir().join("instances.json")).unwrap();
    let stored: Vec<SessionRecord> = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].webhook_url, sink.url(&tenant));

    // Events now flow to the normalized URL
    second.socket(&tenant).unwrap().pairing_code("NEW").await;
    sink.wait_for("identity.pairing", 1).await.unwrap();

    second.stop().await;
}

#[tokio::test]
async fn test_shutdown_keeps_sessions_for_next_boot() {
    let dir = tempfile::tempdir().unwrap();
    let sink = WebhookSink::start().await;
    let tenants = [unique_tenant(), unique_tenant()];

    let first = TestGateway::start(dir.path()).await.unwrap();
    for tenant in &tenants {
        first.registry.create(tenant.clone(), sink.url(tenant)).await.unwrap();
    }
    first.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = TestGateway::start(dir.path()).await.unwrap();
    assert_eq!(second.registry.bootstrap().await, 2);
    for tenant in &tenants {
        assert_eq!(second.registry.get(tenant).unwrap().webhook_url(), sink.url(tenant));
    }
    assert_eq!(second.registry.status_counts().total, 2);

    second.stop().await;
}
