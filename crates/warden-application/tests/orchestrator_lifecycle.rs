mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use support::{
    FlakyHistory, HangingHistory, SlowHistory, definition, harness, king_definition, test_config,
    wave,
};
use warden_application::EncounterOrchestrator;
use warden_core::definition::PlayerGate;
use warden_core::error::StartError;
use warden_core::event::EncounterEvent;
use warden_core::session::{SessionStatus, WavePhase};

#[tokio::test]
async fn test_king_scenario_runs_to_completion() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    h.world.join("overworld", "bob");

    let id = h.orchestrator.start_session("king", "overworld").await.unwrap();
    assert_eq!(h.world.spawned_handles().len(), 3);
    let snapshot = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(snapshot.phase, WavePhase::InProgress { wave: 0 });

    h.kill_all_alive(&["alice", "alice", "bob"]).await;
    let status = h.orchestrator.poll_session(&id, Utc::now()).await;
    assert_eq!(status, Some(SessionStatus::Active));

    // Zero delay: wave 2 spawned in the same poll, boss included.
    let requests = h.world.spawn_requests();
    assert_eq!(requests.len(), 6);
    let boss = requests.iter().find(|r| r.boss).unwrap();
    assert_eq!(boss.display_name, "King");
    assert_eq!(boss.health_multiplier, 5.0);
    assert_eq!(h.rewards.grants_for("alice"), vec![(500, 100)]);
    assert_eq!(h.rewards.grants_for("bob"), vec![(500, 100)]);

    h.kill_all_alive(&["alice"]).await;
    let status = h.orchestrator.poll_session(&id, Utc::now()).await;
    assert_eq!(status, Some(SessionStatus::Completed));

    assert_eq!(
        h.rewards.grants_for("alice"),
        vec![(500, 100), (500, 100), (2000, 500)]
    );
    assert_eq!(h.rewards.grants_for("bob"), vec![(500, 100), (2000, 500)]);

    let records = h.history.all_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Completed);
    assert_eq!(records[0].waves_cleared, 2);
    assert_eq!(records[0].actors_killed, 6);
    assert_eq!(records[0].top_participant.as_ref().unwrap().player.as_str(), "alice");
    assert!(h.orchestrator.get_active_sessions().await.is_empty());
}

#[tokio::test]
async fn test_waves_advance_in_order() {
    let mut def = definition("steps", vec![wave("ZOMBIE", 1), wave("SKELETON", 1), wave("SPIDER", 1)]);
    def.waves[2].delay_before_start = Duration::from_secs(30);
    let h = harness(vec![def]).await;
    h.world.join("overworld", "alice");
    let mut events = h.orchestrator.subscribe();

    let id = h.orchestrator.start_session("steps", "overworld").await.unwrap();
    let start = Utc::now();
    for _ in 0..3 {
        h.kill_all_alive(&["alice"]).await;
        h.orchestrator.poll_session(&id, start).await;
        // Wave 3 waits 30s; a later clock releases it.
        h.orchestrator
            .poll_session(&id, start + chrono::Duration::seconds(31))
            .await;
    }

    let mut order = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            EncounterEvent::WaveStarted { wave, .. } => order.push(format!("start {wave}")),
            EncounterEvent::WaveCleared { wave, .. } => order.push(format!("clear {wave}")),
            EncounterEvent::Finished { status, .. } => order.push(format!("finish {status}")),
            EncounterEvent::Started { .. } => order.push("begin".to_string()),
        }
    }
    assert_eq!(
        order,
        vec![
            "begin",
            "start 0",
            "clear 0",
            "start 1",
            "clear 1",
            "start 2",
            "clear 2",
            "finish COMPLETED"
        ]
    );
}

#[tokio::test]
async fn test_second_start_in_same_scope_is_refused() {
    let h = harness(vec![king_definition(), definition("other", vec![wave("ZOMBIE", 1)])]).await;
    h.world.join("overworld", "alice");
    h.world.join("nether", "bob");

    let first = h.orchestrator.start_session("king", "overworld").await.unwrap();
    let second = h.orchestrator.start_session("other", "overworld").await;

    assert_eq!(
        second,
        Err(StartError::AlreadyActive {
            scope: "overworld".to_string(),
            session_id: first,
        })
    );
    assert_eq!(h.orchestrator.get_active_sessions().await.len(), 1);
    assert!(h.orchestrator.start_session("other", "nether").await.is_ok());
}

#[tokio::test]
async fn test_start_errors_are_typed() {
    let mut disabled = definition("off", vec![wave("ZOMBIE", 1)]);
    disabled.enabled = false;
    let mut pinned = definition("pinned", vec![wave("ZOMBIE", 1)]);
    pinned.target_scopes.insert("arena".to_string());
    let mut crypt = definition("crypt", vec![wave("SKELETON", 2)]);
    crypt.player_gate = Some(PlayerGate { min: 2, max: 4 });
    let h = harness(vec![disabled, pinned, crypt]).await;
    h.world.join("overworld", "alice");
    h.world.unload("void");

    assert_eq!(
        h.orchestrator.start_session("nope", "overworld").await,
        Err(StartError::UnknownDefinition("nope".to_string()))
    );
    assert_eq!(
        h.orchestrator.start_session("off", "overworld").await,
        Err(StartError::DefinitionDisabled("off".to_string()))
    );
    assert!(matches!(
        h.orchestrator.start_session("pinned", "overworld").await,
        Err(StartError::ScopeNotTargeted { .. })
    ));
    assert!(matches!(
        h.orchestrator.force_start_session("off", "void").await,
        Err(StartError::ScopeUnavailable { .. })
    ));
    assert!(matches!(
        h.orchestrator.start_session("crypt", "overworld").await,
        Err(StartError::PlayerCount { online: 1, min: 2, max: 4, .. })
    ));
    assert!(h.orchestrator.get_active_sessions().await.is_empty());

    assert!(h.orchestrator.force_start_session("off", "overworld").await.is_ok());
}

#[tokio::test]
async fn test_cancel_removes_actors_and_records_once() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    let id = h.orchestrator.start_session("king", "overworld").await.unwrap();
    let spawned = h.world.spawned_handles();

    assert!(h.orchestrator.cancel_session(&id).await);
    assert!(!h.orchestrator.cancel_session(&id).await);

    let mut removed = h.world.removed();
    removed.sort();
    assert_eq!(removed, spawned);
    assert!(h.orchestrator.get_active_sessions().await.is_empty());
    let records = h.history.all_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Cancelled);
    assert_eq!(records[0].waves_cleared, 0);
}

#[tokio::test]
async fn test_reload_leaves_running_session_untouched() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    let id = h.orchestrator.start_session("king", "overworld").await.unwrap();

    let mut changed = king_definition();
    changed.waves[1].count = 10;
    changed.rewards.xp_per_wave = 1;
    h.orchestrator.load_definitions(&vec![changed]).await.unwrap();

    h.kill_all_alive(&["alice"]).await;
    h.orchestrator.poll_session(&id, Utc::now()).await;

    assert_eq!(h.rewards.grants_for("alice"), vec![(500, 100)]);
    // Second wave keeps the original two actors plus boss.
    assert_eq!(h.world.spawned_handles().len(), 6);
    assert_eq!(h.orchestrator.definition("king").await.unwrap().waves[1].count, 10);
}

#[tokio::test]
async fn test_session_over_duration_cap_fails() {
    let mut def = definition("timed", vec![wave("ZOMBIE", 2)]);
    def.max_duration = Some(Duration::from_secs(60));
    let h = harness(vec![def]).await;
    h.world.join("overworld", "alice");
    let id = h.orchestrator.start_session("timed", "overworld").await.unwrap();

    assert_eq!(
        h.orchestrator.poll_session(&id, Utc::now()).await,
        Some(SessionStatus::Active)
    );
    let status = h
        .orchestrator
        .poll_session(&id, Utc::now() + chrono::Duration::seconds(61))
        .await;

    assert_eq!(status, Some(SessionStatus::Failed));
    assert_eq!(h.world.removed().len(), 2);
    let records = h.history.all_records().await;
    assert_eq!(records[0].end_reason.as_deref(), Some("timed out"));
}

#[tokio::test]
async fn test_empty_scope_abandons_session() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    let id = h.orchestrator.start_session("king", "overworld").await.unwrap();

    h.world.clear_players("overworld");
    let status = h.orchestrator.poll_session(&id, Utc::now()).await;

    assert_eq!(status, Some(SessionStatus::Failed));
    let records = h.history.all_records().await;
    assert_eq!(records[0].end_reason.as_deref(), Some("abandoned"));
}

#[tokio::test]
async fn test_history_write_is_retried() {
    let world = Arc::new(support::FakeWorld::default());
    let history = Arc::new(FlakyHistory::new(2));
    let orchestrator = EncounterOrchestrator::new(
        world.clone(),
        Arc::new(support::RecordingSink::default()),
        history.clone(),
        test_config(),
    );
    orchestrator.load_definitions(&vec![king_definition()]).await.unwrap();
    world.join("overworld", "alice");

    let id = orchestrator.start_session("king", "overworld").await.unwrap();
    assert!(orchestrator.cancel_session(&id).await);

    assert_eq!(history.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(history.inner.all_records().await.len(), 1);
}

#[tokio::test]
async fn test_lost_history_record_does_not_block_scope() {
    let world = Arc::new(support::FakeWorld::default());
    let orchestrator = EncounterOrchestrator::new(
        world.clone(),
        Arc::new(support::RecordingSink::default()),
        Arc::new(HangingHistory),
        test_config(),
    );
    orchestrator.load_definitions(&vec![king_definition()]).await.unwrap();
    world.join("overworld", "alice");

    let id = orchestrator.start_session("king", "overworld").await.unwrap();
    assert!(orchestrator.cancel_session(&id).await);

    assert!(orchestrator.get_active_sessions().await.is_empty());
    assert!(orchestrator.start_session("king", "overworld").await.is_ok());
}

#[tokio::test]
async fn test_shutdown_cancels_and_records_every_session() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    h.world.join("nether", "bob");
    h.orchestrator.start_session("king", "overworld").await.unwrap();
    h.orchestrator.start_session("king", "nether").await.unwrap();

    h.orchestrator.shutdown().await;

    let records = h.history.all_records().await;
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.status == SessionStatus::Cancelled && r.end_reason.as_deref() == Some("shutdown")));
    assert_eq!(
        h.orchestrator.start_session("king", "overworld").await,
        Err(StartError::ShuttingDown)
    );
}

#[tokio::test]
async fn test_shutdown_waits_for_stop_in_flight() {
    let world = Arc::new(support::FakeWorld::default());
    let history = Arc::new(SlowHistory::new(Duration::from_millis(150)));
    let orchestrator = EncounterOrchestrator::new(
        world.clone(),
        Arc::new(support::RecordingSink::default()),
        history.clone(),
        test_config(),
    );
    orchestrator.load_definitions(&vec![king_definition()]).await.unwrap();
    world.join("overworld", "alice");
    let id = orchestrator.start_session("king", "overworld").await.unwrap();

    let stopping = orchestrator.clone();
    let stop = tokio::spawn(async move { stopping.cancel_session(&id).await });
    history.entered.notified().await;

    orchestrator.shutdown().await;

    let records = history.inner.all_records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SessionStatus::Cancelled);
    assert_eq!(records[0].end_reason.as_deref(), Some("cancelled"));
    assert!(stop.await.unwrap());
}

#[tokio::test]
async fn test_timed_out_journal_writes_land_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let world = Arc::new(support::FakeWorld::default());
    world.join("overworld", "alice");
    let orchestrator = EncounterOrchestrator::new(
        world,
        Arc::new(support::RecordingSink::default()),
        Arc::new(warden_infrastructure::JsonlHistoryStore::new(path.clone())),
        test_config(),
    );
    orchestrator.load_definitions(&vec![king_definition()]).await.unwrap();
    let id = orchestrator.start_session("king", "overworld").await.unwrap();

    // Another process holds the journal past every write timeout.
    let lock = warden_infrastructure::storage::FileLock::acquire(&path).unwrap();
    let holder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(700));
        drop(lock);
    });

    assert!(orchestrator.cancel_session(&id).await);
    holder.join().unwrap();

    let mut records = Vec::new();
    for _ in 0..50 {
        records = orchestrator.query_history(Some("king"), 10).await.unwrap();
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // Let any abandoned attempt still queued on the lock run to completion.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let records_after = orchestrator.query_history(Some("king"), 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records_after.len(), 1);
}

#[tokio::test]
async fn test_snapshots_are_detached_copies() {
    let h = harness(vec![king_definition()]).await;
    h.world.join("overworld", "alice");
    let id = h.orchestrator.start_session("king", "overworld").await.unwrap();

    let mut active = h.orchestrator.get_active_sessions().await;
    active.get_mut(&id).unwrap().live_actors.clear();

    let fresh = h.orchestrator.get_session(&id).await.unwrap();
    assert_eq!(fresh.live_actors.len(), 3);
}

#[tokio::test]
async fn test_interrupted_sessions_are_recovered_on_startup() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("history.jsonl");
    let world = Arc::new(support::FakeWorld::default());
    world.join("overworld", "alice");

    let crashed = EncounterOrchestrator::new(
        world.clone(),
        Arc::new(support::RecordingSink::default()),
        Arc::new(warden_infrastructure::JsonlHistoryStore::new(path.clone())),
        test_config(),
    );
    crashed.load_definitions(&vec![king_definition()]).await.unwrap();
    crashed.start_session("king", "overworld").await.unwrap();
    // No shutdown: the process "died" here.

    let restarted = EncounterOrchestrator::new(
        world,
        Arc::new(support::RecordingSink::default()),
        Arc::new(warden_infrastructure::JsonlHistoryStore::new(path)),
        test_config(),
    );
    let recovered = restarted.recover_interrupted().await.unwrap();

    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].status, SessionStatus::Failed);
    assert_eq!(restarted.query_history(Some("king"), 10).await.unwrap().len(), 1);
}
