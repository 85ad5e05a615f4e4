//! System prompts and preset user prompts.
//!
//! The system prompts are opaque configuration: the pipeline passes them to
//! the upstream model verbatim. Either one can be replaced at startup by
//! pointing `PROMPT_COMPONENT_FILE` / `PROMPT_VISUALIZATION_FILE` at a file.

use serde::Serialize;

use crate::config::ConfigError;

pub const COMPONENT_GENERATION_PROMPT: &str = r#"You generate React components. Produce a single, self-contained component for the user's request.

RULES:
1. The component MUST be named exactly "Component" (capital C).
2. Style with inline styles only. No CSS classes, Tailwind, or stylesheets.
3. The only hooks available are useState, useEffect, useCallback, useMemo and useRef.
4. Do not import anything. React and the hooks are already in scope.
5. Do not use export statements.
6. Keep everything inside the one component definition.
7. Aim for clean, modern styling and good UX.

OUTPUT:
- Plain JavaScript/JSX only.
- No markdown code fences.
- No explanation before or after the code.
- Begin with "const Component".

EXAMPLE:
const Component = () => {
  const [count, setCount] = useState(0);
  return (
    <div style={{ padding: '20px' }}>
      <p>{count}</p>
      <button onClick={() => setCount(c => c + 1)}>Add</button>
    </div>
  );
};"#;

pub const VISUALIZATION_GENERATION_PROMPT: &str = r#"You build VISUAL, INTERACTIVE explanations of React components for people who have never programmed.

Explain what the code does with visuals, not paragraphs.

PRINCIPLES:
1. Show, don't tell. Shapes, colors and motion instead of text.
2. Make it interactive. Buttons that simulate what the real component does.
3. Use visual metaphors. A timer can be a draining circle; a todo list can be moving boxes.
4. Animate state changes so a changed value is obvious.
5. Show cause and effect: when the user clicks, animate what happens to the data.

TECHNIQUES:
- Colored boxes or circles for state values
- Arrows or lines for data flow
- Progress bars and meters for numbers
- Stacked boxes for lists
- Color coding: cyan for data, amber for user actions, emerald for updates

STRUCTURE:
1. "The Data": a visual picture of the state.
2. "What Happens When...": buttons that animate the changes.
3. Use useState so the explanation itself is interactive.

RULES:
1. The component MUST be named exactly "Component".
2. Inline styles only. No imports, no exports.
3. Use useState and useEffect for the animation.
4. Keep it colorful and under 80 lines.

OUTPUT: JSX only, no markdown, starting with "const Component"."#;

// =============================================================================
// PRESETS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresetPrompt {
    pub label: &'static str,
    pub prompt: &'static str,
}

/// Starter requests offered before the first submission.
pub const PRESET_PROMPTS: [PresetPrompt; 6] = [
    PresetPrompt { label: "Pomodoro Timer", prompt: "Create a pomodoro timer with 25 min work and 5 min break" },
    PresetPrompt { label: "Todo List", prompt: "Build a todo list with add, complete, and delete" },
    PresetPrompt { label: "Calculator", prompt: "Create a simple calculator" },
    PresetPrompt { label: "Dice Roller", prompt: "Build a dice roller with multiple dice" },
    PresetPrompt { label: "Stopwatch", prompt: "Create a stopwatch with lap times" },
    PresetPrompt { label: "Counter", prompt: "Build a counter with increment, decrement, and reset" },
];

// =============================================================================
// SYSTEM PROMPTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompts {
    pub component: String,
    pub visualization: String,
}

impl Default for SystemPrompts {
    fn default() -> Self {
        Self {
            component: COMPONENT_GENERATION_PROMPT.to_owned(),
            visualization: VISUALIZATION_GENERATION_PROMPT.to_owned(),
        }
    }
}

impl SystemPrompts {
    /// Built-in prompts, each optionally replaced by a file.
    ///
    /// - `PROMPT_COMPONENT_FILE`
    /// - `PROMPT_VISUALIZATION_FILE`
    ///
    /// # Errors
    ///
    /// Returns an error if a named file cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            component: read_override("PROMPT_COMPONENT_FILE")?.unwrap_or(defaults.component),
            visualization: read_override("PROMPT_VISUALIZATION_FILE")?.unwrap_or(defaults.visualization),
        })
    }
}

fn read_override(var: &'static str) -> Result<Option<String>, ConfigError> {
    let Ok(path) = std::env::var(var) else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::PromptFile { var, path, source })?;
    tracing::info!(var, bytes = text.len(), "loaded system prompt override");
    Ok(Some(text))
}

#[cfg(test)]
#[path = "prompts_test.rs"]
mod tests;
