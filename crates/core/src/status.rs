//! Status enums for generations, packs, and stage batches, with allowed
//! transitions validated at the mutation boundary.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// GenerationStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one generation request.
///
/// Happy path: `Init → Downloading → Combining → Merging → Done`.
/// `Failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Generation record created, nothing dispatched yet.
    Init,
    /// Source download batch is running.
    Downloading,
    /// Variants are being enumerated and packs created.
    Combining,
    /// Composition batch is running.
    Merging,
    /// Terminal success (possibly with partial output).
    Done,
    /// Terminal unrecoverable failure.
    Failed,
}

impl GenerationStatus {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Downloading => "Downloading",
            Self::Combining => "Combining",
            Self::Merging => "Merging",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    pub fn can_transition(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Init, Self::Downloading) => true,
            (Self::Downloading, Self::Combining) => true,
            (Self::Combining, Self::Merging) => true,
            // A generation with zero combinations finishes straight from
            // the combining stage.
            (Self::Combining, Self::Done) => true,
            (Self::Merging, Self::Done) => true,
            (_, Self::Failed) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PackStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one enumerated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackStatus {
    /// Pack created from one enumerated combination.
    Init,
    /// At least one image size has produced media.
    Processing,
    /// All sizes settled successfully.
    Done,
    /// Composition failed for this pack.
    Failed,
}

impl PackStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::Processing => "Processing",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// Whether moving from `self` to `next` is an allowed transition.
    ///
    /// `Processing` is idempotent: a second size finishing re-applies it.
    pub fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (Self::Init, Self::Processing) => true,
            (Self::Processing, Self::Processing) => true,
            (Self::Init | Self::Processing, Self::Done) => true,
            (Self::Init | Self::Processing, Self::Failed) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchStageStatus
// ---------------------------------------------------------------------------

/// Status of one stage batch (download or merge) of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStageStatus {
    /// No batch dispatched for this stage yet.
    Pending,
    /// Batch dispatched, tasks running.
    Process,
    /// Every task in the batch settled (success or allowed failure).
    Done,
    /// The stage itself failed before or during dispatch.
    Failed,
}

impl BatchStageStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Process => "Process",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    pub fn can_transition(self, next: Self) -> bool {
        match (self, next) {
            (Self::Pending, Self::Process) => true,
            (Self::Process, Self::Done) => true,
            (Self::Pending | Self::Process, Self::Failed) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transition guard
// ---------------------------------------------------------------------------

/// Build the error returned when a status mutation is rejected.
pub fn transition_error(entity: &str, from: &str, to: &str) -> CoreError {
    CoreError::Transition(format!("{entity}: {from} -> {to} is not allowed"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_happy_path_allowed() {
        use GenerationStatus::*;
        assert!(Init.can_transition(Downloading));
        assert!(Downloading.can_transition(Combining));
        assert!(Combining.can_transition(Merging));
        assert!(Merging.can_transition(Done));
    }

    #[test]
    fn generation_empty_result_shortcut_allowed() {
        assert!(GenerationStatus::Combining.can_transition(GenerationStatus::Done));
    }

    #[test]
    fn generation_failure_from_any_active_state() {
        use GenerationStatus::*;
        for s in [Init, Downloading, Combining, Merging] {
            assert!(s.can_transition(Failed), "{} -> Failed", s.label());
        }
    }

    #[test]
    fn generation_terminal_states_are_frozen() {
        use GenerationStatus::*;
        for s in [Done, Failed] {
            for next in [Init, Downloading, Combining, Merging, Done, Failed] {
                assert!(!s.can_transition(next));
            }
        }
    }

    #[test]
    fn generation_skipping_stages_rejected() {
        use GenerationStatus::*;
        assert!(!Init.can_transition(Merging));
        assert!(!Downloading.can_transition(Done));
    }

    #[test]
    fn pack_processing_is_idempotent() {
        assert!(PackStatus::Processing.can_transition(PackStatus::Processing));
    }

    #[test]
    fn pack_cannot_leave_terminal_states() {
        assert!(!PackStatus::Done.can_transition(PackStatus::Processing));
        assert!(!PackStatus::Failed.can_transition(PackStatus::Done));
    }

    #[test]
    fn batch_stage_only_moves_forward() {
        use BatchStageStatus::*;
        assert!(Pending.can_transition(Process));
        assert!(Process.can_transition(Done));
        assert!(!Done.can_transition(Process));
        assert!(!Pending.can_transition(Done));
    }
}
