use super::*;
use crate::config::ENV_LOCK;

/// # Safety
/// Callers hold `ENV_LOCK` so no other test reads the environment concurrently.
unsafe fn clear_llm_env() {
    unsafe {
        std::env::remove_var("LLM_MODEL");
        std::env::remove_var("LLM_API_KEY_ENV");
        std::env::remove_var("LLM_BASE_URL");
        std::env::remove_var("LLM_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("LLM_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("CLAUDE_API_KEY");
        std::env::remove_var("TEST_KEY");
    }
}

#[test]
fn from_env_defaults_to_claude_api_key() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_llm_env();
        std::env::set_var("CLAUDE_API_KEY", "secret");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.api_key, "secret");
    assert_eq!(cfg.model, DEFAULT_MODEL);
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.timeouts, LlmTimeouts::default());

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "TEST_KEY");
        std::env::set_var("TEST_KEY", "sk-test");
        std::env::set_var("LLM_MODEL", "claude-test");
        std::env::set_var("LLM_BASE_URL", "https://proxy.example.test/");
        std::env::set_var("LLM_REQUEST_TIMEOUT_SECS", "42");
        std::env::set_var("LLM_CONNECT_TIMEOUT_SECS", "7");
    }

    let cfg = LlmConfig::from_env().unwrap();
    assert_eq!(cfg.api_key, "sk-test");
    assert_eq!(cfg.model, "claude-test");
    assert_eq!(cfg.base_url, "https://proxy.example.test");
    assert_eq!(cfg.timeouts, LlmTimeouts { request_secs: 42, connect_secs: 7 });

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_missing_key_names_the_variable() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_llm_env();
        std::env::set_var("LLM_API_KEY_ENV", "TEST_KEY");
    }

    let err = LlmConfig::from_env().unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey { ref var } if var == "TEST_KEY"));

    unsafe { clear_llm_env() };
}

#[test]
fn from_env_empty_key_is_missing() {
    let _guard = ENV_LOCK.lock();
    unsafe {
        clear_llm_env();
        std::env::set_var("CLAUDE_API_KEY", "  ");
    }

    assert!(LlmConfig::from_env().is_err());

    unsafe { clear_llm_env() };
}
