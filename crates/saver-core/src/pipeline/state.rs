//! Build phases and transition tracking
//!
//! A run moves through these phases in order. A build-tool failure sends the
//! run through cleanup and back to preparation once; everything else ends in
//! one of the two terminal phases.

use std::fmt;

/// Discrete states of one build run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildPhase {
    Idle,
    /// Extension, name and file existence checks
    Validating,
    /// Target templating, cache purge, preview, video staging
    Preparing,
    /// External build tool running
    Building,
    /// Moving the bundle into place
    Installing,
    /// Staged assets removed, caches purged, project restored
    CleaningUp,
    Succeeded,
    Failed,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildPhase::Idle => "idle",
            BuildPhase::Validating => "validating",
            BuildPhase::Preparing => "preparing",
            BuildPhase::Building => "building",
            BuildPhase::Installing => "installing",
            BuildPhase::CleaningUp => "cleaning up",
            BuildPhase::Succeeded => "succeeded",
            BuildPhase::Failed => "failed",
        }
    }

    /// Get all valid phase transitions FROM this phase.
    pub fn valid_next_phases(&self) -> &'static [BuildPhase] {
        use BuildPhase::*;
        match self {
            Idle => &[Validating],
            // Rejections (bad input, busy project, unreadable manifest) end here
            Validating => &[Preparing, Failed],
            Preparing => &[Building, CleaningUp],
            Building => &[Installing, CleaningUp],
            Installing => &[CleaningUp],
            // Back to Preparing on a retried build failure
            CleaningUp => &[Preparing, Succeeded, Failed],
            Succeeded | Failed => &[],
        }
    }

    pub fn can_transition_to(&self, next: BuildPhase) -> bool {
        self.valid_next_phases().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildPhase::Succeeded | BuildPhase::Failed)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase of a run plus the path it took
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: BuildPhase,
    history: Vec<BuildPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: BuildPhase::Idle,
            history: vec![BuildPhase::Idle],
        }
    }

    pub fn current(&self) -> BuildPhase {
        self.current
    }

    pub fn history(&self) -> &[BuildPhase] {
        &self.history
    }

    /// Move to `next`, logging the transition
    pub fn enter(&mut self, next: BuildPhase) {
        debug_assert!(
            self.current.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.current,
            next
        );
        if !self.current.can_transition_to(next) {
            tracing::warn!(from = %self.current, to = %next, "unexpected phase transition");
        }
        tracing::debug!(from = %self.current, to = %next, "phase transition");
        self.current = next;
        self.history.push(next);
    }
}
