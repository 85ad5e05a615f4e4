use super::*;

/// # Safety
/// Callers hold `ENV_LOCK` so no other test reads the environment concurrently.
unsafe fn clear_app_env() {
    unsafe {
        std::env::remove_var("PORT");
        std::env::remove_var("PIPELINE_MAX_RETRIES");
        std::env::remove_var("PIPELINE_INITIAL_DELAY_MS");
        std::env::remove_var("PIPELINE_COMPONENT_MAX_TOKENS");
        std::env::remove_var("PIPELINE_VISUALIZATION_MAX_TOKENS");
        std::env::remove_var("SANDBOX_FUEL");
        std::env::remove_var("SANDBOX_MAX_CALL_DEPTH");
        std::env::remove_var("SANDBOX_MAX_RERENDERS");
        std::env::remove_var("SESSION_IDLE_TTL_SECS");
        std::env::remove_var("SESSION_SWEEP_INTERVAL_SECS");
        std::env::remove_var("PROMPT_COMPONENT_FILE");
        std::env::remove_var("PROMPT_VISUALIZATION_FILE");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock();
    unsafe { clear_app_env() };

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.pipeline, PipelineConfig::default());
    assert_eq!(cfg.sandbox, SandboxConfig::default());
    assert_eq!(cfg.sessions, SessionConfig::default());
    assert_eq!(cfg.prompts, SystemPrompts::default());
}

#[test]
fn from_env_reads_overrides() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_app_env();
        std::env::set_var("PORT", "8081");
        std::env::set_var("PIPELINE_MAX_RETRIES", "5");
        std::env::set_var("PIPELINE_INITIAL_DELAY_MS", "250");
        std::env::set_var("SANDBOX_FUEL", "5000");
        std::env::set_var("SANDBOX_MAX_RERENDERS", "3");
    }

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, 8081);
    assert_eq!(cfg.pipeline.retry.max_retries, 5);
    assert_eq!(cfg.pipeline.retry.initial_delay, std::time::Duration::from_millis(250));
    assert_eq!(cfg.sandbox.fuel, 5000);
    assert_eq!(cfg.sandbox.max_rerenders, 3);
    assert_eq!(cfg.sandbox.max_call_depth, crate::sandbox::DEFAULT_MAX_CALL_DEPTH);

    unsafe { clear_app_env() };
}

#[test]
fn invalid_port_is_an_error() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_app_env();
        std::env::set_var("PORT", "eighty");
    }

    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    assert_eq!(err.error_code(), "E_CONFIG_INVALID");

    unsafe { clear_app_env() };
}

#[test]
fn unparsable_tuning_knob_falls_back_to_default() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_app_env();
        std::env::set_var("SANDBOX_MAX_CALL_DEPTH", "deep");
    }

    assert_eq!(env_parse("SANDBOX_MAX_CALL_DEPTH", 7usize), 7);
    assert_eq!(env_parse("CODEMYWAY_TEST_UNSET_KNOB", 1.5f64), 1.5);

    unsafe { clear_app_env() };
}

#[test]
fn missing_prompt_file_is_an_error() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_app_env();
        std::env::set_var("PROMPT_COMPONENT_FILE", "/nonexistent/codemyway/component.txt");
    }

    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::PromptFile { var: "PROMPT_COMPONENT_FILE", .. }));

    unsafe { clear_app_env() };
}
