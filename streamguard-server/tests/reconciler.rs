//! End-to-end reconciler scenarios (spec §8) driven against a
//! `MemoryStore`-backed `AppState` and a local mock media-server HTTP
//! endpoint, exercising `reconciler::tick` at the I/O-shell level rather
//! than the pure decision function `streamguard_core::reconcile` already
//! covers in isolation.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use streamguard_contracts::ms::{MsKbpsInfo, MsPublishInfo, MsStream, MsStreamsResponse, MsVideoInfo};
use streamguard_core::crypto::CredentialCipher;
use streamguard_core::state::ControllerState;
use streamguard_core::store::memory::MemoryStore;
use streamguard_core::store::{Store, StoredCredentials};
use streamguard_model::channel::{Channel, EncodingProfile};
use streamguard_model::ids::{ChannelId, OrganizationId};
use streamguard_model::log_buffer::LogBuffer;
use streamguard_model::source::Source;

use streamguard_server::app_state::AppState;
use streamguard_server::config::Config;
use streamguard_server::ms_client::MsClient;
use streamguard_server::reconciler::tick;
use streamguard_server::relay_client::RelayClient;
use streamguard_server::supervisor::{ChildKind, Supervisor, SupervisorConfig};

fn channel_fixture(slug: &str) -> Channel {
    Channel {
        id: ChannelId(1),
        organization_id: OrganizationId::new(),
        slug: slug.to_string(),
        primary_token: format!("{slug}-primary-tok"),
        loop_token: format!("{slug}-loop-tok"),
        enabled: true,
        loop_enabled: true,
        primary_override_enabled: true,
        auto_restart_loop: true,
        failover_timeout_seconds: 10,
        stability_window: 1,
        anti_flap_cooldown_seconds: 5,
        encoding: EncodingProfile::default(),
        media_path: format!("{slug}.mp4"),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Serves a mutable `GET /api/v1/streams` so a test can change what's
/// "publishing" between ticks, the way a real media server's state would
/// drift without needing to mock `reqwest` itself.
async fn spawn_mock_ms() -> (String, Arc<Mutex<MsStreamsResponse>>) {
    let shared = Arc::new(Mutex::new(MsStreamsResponse::default()));
    let app = Router::new()
        .route(
            "/api/v1/streams",
            get(|State(shared): State<Arc<Mutex<MsStreamsResponse>>>| async move {
                Json(shared.lock().unwrap().clone())
            }),
        )
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), shared)
}

fn set_streams(shared: &Mutex<MsStreamsResponse>, streams: Vec<MsStream>) {
    *shared.lock().unwrap() = MsStreamsResponse { streams };
}

fn stream(name: &str, active: bool, recv_kbps: u32) -> MsStream {
    MsStream {
        name: name.to_string(),
        publish: MsPublishInfo { active },
        kbps: MsKbpsInfo { recv_30s: recv_kbps },
        video: MsVideoInfo::default(),
    }
}

/// A shell script that just sleeps, standing in for a real `loop-*`/
/// `relay-*` binary so tests that need an actual running (and actually
/// killable) child don't depend on a `tempfile` dependency the workspace
/// doesn't otherwise carry.
fn write_dummy_child_script(dir: &std::path::Path, name: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, "#!/bin/sh\nexec sleep 300\n").unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

struct Harness {
    state: AppState,
    relay_client: RelayClient,
    ms_streams: Arc<Mutex<MsStreamsResponse>>,
}

async fn build_harness(loop_image: String, relay_image: String) -> Harness {
    let (ms_base_url, ms_streams) = spawn_mock_ms().await;

    let cipher = CredentialCipher::from_hex_key(&"0".repeat(64)).unwrap();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

    let config = Arc::new(Config {
        server_host: "127.0.0.1".into(),
        server_port: 0,
        database_url: None,
        ms_api_url: ms_base_url,
        ms_request_timeout: std::time::Duration::from_secs(2),
        relay_request_timeout: std::time::Duration::from_millis(200),
        loop_image,
        relay_image,
        media_root: "./media-test".into(),
        reconcile_interval: std::time::Duration::from_secs(1),
        primary_preempt_requires_stability: false,
        cors_allowed_origins: vec![],
        dev_mode: true,
        jwt_secret: "test-secret".into(),
        jwt_expiry: std::time::Duration::from_secs(3600),
        encryption_key_hex: "0".repeat(64),
        max_media_upload_bytes: 1024,
    });

    let supervisor = Arc::new(Supervisor::new(SupervisorConfig {
        loop_image: config.loop_image.clone(),
        relay_image: config.relay_image.clone(),
        ms_api_url: config.ms_api_url.clone(),
        media_path: config.media_root.clone(),
    }));

    let ms_client = MsClient::new(config.ms_api_url.clone(), config.ms_request_timeout).unwrap();
    let relay_client = RelayClient::new(config.relay_request_timeout).unwrap();

    let state = AppState {
        store,
        controller: Arc::new(ControllerState::new()),
        log_buffer: Arc::new(Mutex::new(LogBuffer::default())),
        cipher,
        supervisor,
        ms_client,
        config,
        tick_stats: Arc::new(Mutex::new(None)),
    };

    Harness {
        state,
        relay_client,
        ms_streams,
    }
}

async fn seed_channel(state: &AppState, channel: Channel) {
    let creds = StoredCredentials {
        primary_hash: CredentialCipher::hash(&channel.primary_token),
        primary_encrypted: state.cipher.encrypt(&channel.primary_token).unwrap(),
        loop_hash: CredentialCipher::hash(&channel.loop_token),
        loop_encrypted: state.cipher.encrypt(&channel.loop_token).unwrap(),
    };
    state.store.create_channel(channel, creds).await.unwrap();
}

/// Scenario 1 (spec §8): cold start, nothing publishing yet, loop only.
#[tokio::test]
async fn cold_start_resolves_to_loop_only() {
    let harness = build_harness("/no/such/loop-binary".into(), "/no/such/relay-binary".into()).await;
    seed_channel(&harness.state, channel_fixture("cold")).await;

    tick(&harness.state, &harness.relay_client).await;

    let snapshot = harness.state.controller.snapshot("cold");
    assert_eq!(snapshot.active_source, Some(Source::Loop));
    assert_eq!(
        harness.state.store.get_active_source(ChannelId(1)).await.unwrap(),
        Some(Source::Loop)
    );
}

/// Scenario 2 (spec §8): primary starts publishing above threshold and
/// preempts a channel that was on loop.
#[tokio::test]
async fn primary_preempts_loop_when_it_starts_publishing() {
    let harness = build_harness("/no/such/loop-binary".into(), "/no/such/relay-binary".into()).await;
    let channel = channel_fixture("preempt");
    seed_channel(&harness.state, channel.clone()).await;

    // First tick: nothing publishing, settles on LOOP.
    tick(&harness.state, &harness.relay_client).await;
    assert_eq!(
        harness.state.controller.snapshot("preempt").active_source,
        Some(Source::Loop)
    );

    // Primary comes up well above THRESHOLD_KBPS.
    set_streams(
        &harness.ms_streams,
        vec![stream(&channel.primary_stream_name(), true, 500)],
    );
    tick(&harness.state, &harness.relay_client).await;

    assert_eq!(
        harness.state.controller.snapshot("preempt").active_source,
        Some(Source::Primary)
    );
    let audit = harness.state.store.list_audit(10).await.unwrap();
    assert!(audit.iter().any(|e| e.action == "auto_switch_to_primary"));
}

/// Regression for the token-as-path publish convention (spec §4.1):
/// `webhooks::resolve_channel` already admits a publish keyed on the raw
/// primary token rather than `{slug}-primary`; the reconciler's stream
/// lookup must apply the same fallback or the channel reads as
/// permanently down once admitted that way.
#[tokio::test]
async fn primary_preempts_via_token_as_path_fallback() {
    let harness = build_harness("/no/such/loop-binary".into(), "/no/such/relay-binary".into()).await;
    let channel = channel_fixture("tokenpath");
    seed_channel(&harness.state, channel.clone()).await;

    tick(&harness.state, &harness.relay_client).await;

    // Published under the raw token as the stream name, not `slug-primary`.
    set_streams(&harness.ms_streams, vec![stream(&channel.primary_token, true, 500)]);
    tick(&harness.state, &harness.relay_client).await;

    assert_eq!(
        harness.state.controller.snapshot("tokenpath").active_source,
        Some(Source::Primary)
    );
}

/// Scenario 4 (spec §8): a manual loop override holds the channel on loop
/// even while primary is publishing above threshold.
#[tokio::test]
async fn manual_loop_override_blocks_auto_preemption() {
    let harness = build_harness("/no/such/loop-binary".into(), "/no/such/relay-binary".into()).await;
    let channel = channel_fixture("manual");
    seed_channel(&harness.state, channel.clone()).await;
    harness.state.controller.set_manual_loop_override("manual", true);

    set_streams(
        &harness.ms_streams,
        vec![stream(&channel.primary_stream_name(), true, 500)],
    );
    tick(&harness.state, &harness.relay_client).await;

    let snapshot = harness.state.controller.snapshot("manual");
    assert_eq!(snapshot.active_source, Some(Source::Loop));
    assert!(snapshot.manual_loop_override);
}

/// Disable boundary (spec §8): "Disabling a channel ... stops both relay
/// and loop." Regression for the bug where disabled channels were
/// skipped entirely in the tick loop, and for the relay/transcoder/pump
/// leaked-process bug, by asserting the dummy children are actually
/// reaped, not merely removed from the registry.
#[tokio::test]
async fn disabling_channel_kills_running_loop_and_relay_children() {
    let dir = std::env::temp_dir().join(format!("streamguard-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let loop_image = write_dummy_child_script(&dir, "dummy-loop.sh");
    let relay_image = write_dummy_child_script(&dir, "dummy-relay.sh");

    let harness = build_harness(loop_image, relay_image).await;
    let channel = channel_fixture("disableme");
    seed_channel(&harness.state, channel.clone()).await;

    tick(&harness.state, &harness.relay_client).await;
    assert_eq!(
        harness.state.supervisor.running_child_count(ChildKind::Loop, "disableme"),
        1
    );
    assert_eq!(
        harness.state.supervisor.running_child_count(ChildKind::Relay, "disableme"),
        1
    );

    let mut disabled = channel;
    disabled.enabled = false;
    harness.state.store.update_channel(disabled).await.unwrap();

    tick(&harness.state, &harness.relay_client).await;

    // Give the reaped children a moment to actually exit after start_kill.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(
        harness.state.supervisor.running_child_count(ChildKind::Loop, "disableme"),
        0
    );
    assert_eq!(
        harness.state.supervisor.running_child_count(ChildKind::Relay, "disableme"),
        0
    );

    let _ = fs::remove_dir_all(&dir);
}
