//! Per-session pipeline state.
//!
//! DESIGN
//! ======
//! `PipelineState` is the single source the presentation layer reads: the
//! conversation, both stage artifacts, and the two display slots. The
//! orchestrator owns all mutation; every method here is synchronous and
//! assumes the caller already checked that its run is still the active one.
//!
//! ```text
//! Idle ─► GeneratingPrimary ─► PrimaryReady ─► GeneratingSecondary ─► SecondaryReady
//!               │                                     │
//!               └──────────────► Failed ◄─────────────┘
//! ```
//!
//! A failure in stage 2 leaves the primary artifact and slot untouched.

use std::str::FromStr;

use serde::Serialize;

use crate::error::ClassifiedError;
use crate::sandbox::CompiledUnit;
use crate::sandbox::boundary::{RecoveryBoundary, SlotView};

pub const PRIMARY_READY_MESSAGE: &str = "Component generated! Check the Preview panel.";
pub const SECONDARY_READY_MESSAGE: &str = "Code Representation is ready! Toggle to see how the code works.";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub id: u64,
    pub role: Role,
    pub content: String,
}

/// One stage's output, before and after sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeArtifact {
    pub raw: String,
    pub cleaned: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    GeneratingPrimary,
    PrimaryReady,
    GeneratingSecondary,
    SecondaryReady,
    Failed,
}

/// Which display slot: the preview of the generated component, or the
/// visualization that explains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    Primary,
    Secondary,
}

impl SlotId {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl FromStr for SlotId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            other => Err(format!("unknown slot: {other}")),
        }
    }
}

// =============================================================================
// STATE
// =============================================================================

pub struct PipelineState {
    stage: Stage,
    failed_stage: Option<Stage>,
    primary_artifact: Option<CodeArtifact>,
    secondary_artifact: Option<CodeArtifact>,
    turns: Vec<ConversationTurn>,
    next_turn_id: u64,
    primary: RecoveryBoundary,
    secondary: RecoveryBoundary,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            failed_stage: None,
            primary_artifact: None,
            secondary_artifact: None,
            turns: Vec::new(),
            next_turn_id: 0,
            primary: RecoveryBoundary::new(SlotId::Primary.as_str()),
            secondary: RecoveryBoundary::new(SlotId::Secondary.as_str()),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        self.failed_stage
    }

    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    #[must_use]
    pub fn primary_artifact(&self) -> Option<&CodeArtifact> {
        self.primary_artifact.as_ref()
    }

    #[must_use]
    pub fn secondary_artifact(&self) -> Option<&CodeArtifact> {
        self.secondary_artifact.as_ref()
    }

    #[must_use]
    pub fn slot(&self, slot: SlotId) -> &RecoveryBoundary {
        match slot {
            SlotId::Primary => &self.primary,
            SlotId::Secondary => &self.secondary,
        }
    }

    pub fn slot_mut(&mut self, slot: SlotId) -> &mut RecoveryBoundary {
        match slot {
            SlotId::Primary => &mut self.primary,
            SlotId::Secondary => &mut self.secondary,
        }
    }

    /// Append a turn with the next id.
    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) -> u64 {
        let id = self.next_turn_id;
        self.next_turn_id += 1;
        self.turns.push(ConversationTurn { id, role, content: content.into() });
        id
    }

    /// Start a run: record the prompt and clear everything the previous run
    /// produced.
    pub fn begin_run(&mut self, prompt: &str) {
        self.push_turn(Role::User, prompt);
        self.stage = Stage::GeneratingPrimary;
        self.failed_stage = None;
        self.primary_artifact = None;
        self.secondary_artifact = None;
        self.primary.reset();
        self.secondary.reset();
    }

    /// Store the primary artifact, show its unit, and move on to stage 2.
    pub fn primary_ready(&mut self, artifact: CodeArtifact, unit: &CompiledUnit) {
        self.primary_artifact = Some(artifact);
        // Render errors stay in the slot; the pipeline keeps going.
        let _ = self.primary.render(unit);
        self.stage = Stage::PrimaryReady;
        self.push_turn(Role::Assistant, PRIMARY_READY_MESSAGE);
        self.stage = Stage::GeneratingSecondary;
    }

    /// Store the secondary artifact and show its unit.
    pub fn secondary_ready(&mut self, artifact: CodeArtifact, unit: &CompiledUnit) {
        self.secondary_artifact = Some(artifact);
        let _ = self.secondary.render(unit);
        self.push_turn(Role::Assistant, SECONDARY_READY_MESSAGE);
        self.stage = Stage::SecondaryReady;
    }

    /// A stage's compile failed: show it inline on that slot, no turn.
    pub fn fail_inline(&mut self, slot: SlotId, error: ClassifiedError) {
        self.slot_mut(slot).fail_compile(error);
        self.mark_failed();
    }

    /// Any other failure: one assistant turn. Artifacts stay.
    pub fn fail(&mut self, error: &ClassifiedError) {
        self.push_turn(Role::Assistant, format!("Sorry, there was an error: {error}"));
        self.mark_failed();
    }

    fn mark_failed(&mut self) {
        if self.stage != Stage::Failed {
            self.failed_stage = Some(self.stage);
        }
        self.stage = Stage::Failed;
    }

    #[must_use]
    pub fn view(&self) -> PipelineView {
        PipelineView {
            turns: self.turns.clone(),
            primary_code: self.primary_artifact.as_ref().map(|a| a.cleaned.clone()),
            secondary_code: self.secondary_artifact.as_ref().map(|a| a.cleaned.clone()),
            stage: self.stage,
            failed_stage: self.failed_stage,
            is_generating: self.stage == Stage::GeneratingPrimary,
            is_visualizing: self.stage == Stage::GeneratingSecondary,
            primary_ready: self.primary_artifact.is_some(),
            secondary_ready: self.secondary_artifact.is_some(),
            primary: self.primary.view(),
            secondary: self.secondary.view(),
        }
    }
}

/// Snapshot handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineView {
    pub turns: Vec<ConversationTurn>,
    pub primary_code: Option<String>,
    pub secondary_code: Option<String>,
    pub stage: Stage,
    pub failed_stage: Option<Stage>,
    pub is_generating: bool,
    pub is_visualizing: bool,
    pub primary_ready: bool,
    pub secondary_ready: bool,
    pub primary: SlotView,
    pub secondary: SlotView,
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
