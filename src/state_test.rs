use super::test_helpers::{QueuedUpstream, test_app_state_with_upstream};
use super::*;

#[tokio::test(start_paused = true)]
async fn idle_sessions_are_swept_and_used_ones_kept() {
    let state = test_app_state_with_upstream(QueuedUpstream::new([]));
    let (idle, _) = state.create_session().await.unwrap();
    let (busy, _) = state.create_session().await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    assert!(state.session(busy).await.is_some());
    tokio::time::advance(Duration::from_secs(20)).await;

    assert_eq!(state.sweep_idle(Duration::from_secs(60)).await, 1);
    assert!(state.session(idle).await.is_none());
    assert!(state.session(busy).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn sweeper_task_evicts_on_its_interval() {
    let config = AppConfig {
        sessions: SessionConfig { idle_ttl: Duration::from_secs(30), sweep_interval: Duration::from_secs(10) },
        ..AppConfig::default()
    };
    let state = AppState::new(config, Some(QueuedUpstream::new([])));
    state.create_session().await.unwrap();
    let sweeper = spawn_session_sweeper(state.clone());

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(state.sessions.read().await.len(), 1);
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(state.sessions.read().await.is_empty());
    sweeper.abort();
}

#[test]
fn session_config_reads_env() {
    let _guard = crate::config::ENV_LOCK.lock();
    unsafe {
        std::env::set_var("SESSION_IDLE_TTL_SECS", "120");
        std::env::set_var("SESSION_SWEEP_INTERVAL_SECS", "0");
    }
    let config = SessionConfig::from_env();
    unsafe {
        std::env::remove_var("SESSION_IDLE_TTL_SECS");
        std::env::remove_var("SESSION_SWEEP_INTERVAL_SECS");
    }
    assert_eq!(config.idle_ttl, Duration::from_secs(120));
    assert_eq!(config.sweep_interval, Duration::from_secs(1));
}
