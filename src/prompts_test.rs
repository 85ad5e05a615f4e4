use super::*;
use crate::config::ENV_LOCK;

#[test]
fn presets_are_distinct_and_non_empty() {
    for preset in PRESET_PROMPTS {
        assert!(!preset.label.is_empty());
        assert!(!preset.prompt.is_empty());
    }
    let mut labels: Vec<_> = PRESET_PROMPTS.iter().map(|p| p.label).collect();
    labels.dedup();
    assert_eq!(labels.len(), PRESET_PROMPTS.len());
}

#[test]
fn system_prompts_name_the_component_symbol() {
    let prompts = SystemPrompts::default();
    assert!(prompts.component.contains(crate::sandbox::COMPONENT_SYMBOL));
    assert!(prompts.visualization.contains(crate::sandbox::COMPONENT_SYMBOL));
}

#[test]
fn prompt_file_replaces_builtin() {
    let _guard = ENV_LOCK.lock();
    let path = std::env::temp_dir().join(format!("codemyway-prompt-{}.txt", std::process::id()));
    std::fs::write(&path, "custom visualization prompt").unwrap();
    unsafe {
        std::env::remove_var("PROMPT_COMPONENT_FILE");
        std::env::set_var("PROMPT_VISUALIZATION_FILE", &path);
    }

    let prompts = SystemPrompts::from_env().unwrap();
    assert_eq!(prompts.component, COMPONENT_GENERATION_PROMPT);
    assert_eq!(prompts.visualization, "custom visualization prompt");

    unsafe { std::env::remove_var("PROMPT_VISUALIZATION_FILE") };
    let _ = std::fs::remove_file(path);
}
