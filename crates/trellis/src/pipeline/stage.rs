//! The import run's stage machine.

use crate::domain::EntityKind;
use crate::error::{Error, Result};
use std::fmt;

/// Stages of an import run, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    /// Nothing done yet
    Init,
    /// Product and user found
    SeedLoaded,
    /// Epic pass finished
    EpicsImported,
    /// Feature pass finished
    FeaturesImported,
    /// Task pass finished
    TasksImported,
    /// Reconciliation finished
    Reported,
    /// Terminal
    Done,
}

impl PipelineStage {
    /// The stage that must follow this one, if any.
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            Self::Init => Some(Self::SeedLoaded),
            Self::SeedLoaded => Some(Self::EpicsImported),
            Self::EpicsImported => Some(Self::FeaturesImported),
            Self::FeaturesImported => Some(Self::TasksImported),
            Self::TasksImported => Some(Self::Reported),
            Self::Reported => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// The stage reached once the pass for `kind` finishes.
    pub fn after_pass(kind: EntityKind) -> PipelineStage {
        match kind {
            EntityKind::Epic => PipelineStage::EpicsImported,
            EntityKind::Feature => PipelineStage::FeaturesImported,
            EntityKind::Task => PipelineStage::TasksImported,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Init => "init",
            PipelineStage::SeedLoaded => "seed_loaded",
            PipelineStage::EpicsImported => "epics_imported",
            PipelineStage::FeaturesImported => "features_imported",
            PipelineStage::TasksImported => "tasks_imported",
            PipelineStage::Reported => "reported",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tracks the current stage and rejects anything but the next one.
#[derive(Debug)]
pub struct StageTracker {
    current: PipelineStage,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self {
            current: PipelineStage::Init,
        }
    }
}

impl StageTracker {
    /// Start at [`PipelineStage::Init`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The current stage.
    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns `Error::StageOrder` unless `to` directly follows the current
    /// stage.
    pub fn advance(&mut self, to: PipelineStage) -> Result<()> {
        if self.current.next() != Some(to) {
            return Err(Error::StageOrder {
                from: self.current,
                to,
            });
        }
        tracing::debug!(from = %self.current, to = %to, "Pipeline stage");
        self.current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn walks_the_full_sequence() {
        let mut tracker = StageTracker::new();
        let mut stage = PipelineStage::Init;
        while let Some(next) = stage.next() {
            tracker.advance(next).unwrap();
            stage = next;
        }
        assert_eq!(tracker.current(), PipelineStage::Done);
    }

    #[rstest]
    #[case::skip_seed(PipelineStage::EpicsImported)]
    #[case::repeat(PipelineStage::Init)]
    #[case::jump_to_end(PipelineStage::Done)]
    fn rejects_out_of_order_transitions(#[case] to: PipelineStage) {
        let mut tracker = StageTracker::new();
        let err = tracker.advance(to).unwrap_err();
        assert!(matches!(err, Error::StageOrder { from: PipelineStage::Init, .. }));
        assert_eq!(tracker.current(), PipelineStage::Init);
    }

    #[test]
    fn cannot_re_enter_a_pass() {
        let mut tracker = StageTracker::new();
        tracker.advance(PipelineStage::SeedLoaded).unwrap();
        tracker.advance(PipelineStage::EpicsImported).unwrap();
        assert!(tracker.advance(PipelineStage::EpicsImported).is_err());
        assert!(tracker.advance(PipelineStage::SeedLoaded).is_err());
    }

    #[test]
    fn pass_stages_follow_kind_order() {
        assert_eq!(
            PipelineStage::after_pass(EntityKind::Epic).next(),
            Some(PipelineStage::after_pass(EntityKind::Feature))
        );
        assert_eq!(
            PipelineStage::after_pass(EntityKind::Feature).next(),
            Some(PipelineStage::after_pass(EntityKind::Task))
        );
    }
}
