//! Phase-boundary checkpoint state machine (§6 expansion, grounded in
//! `sool/tools/checkpoint_handler.py`).
//!
//! The core performs no serialisation itself -- writing a checkpoint to disk
//! is an outer-driver concern, same as everything else in §6's "external
//! interfaces" boundary. What the core does own is tracking, for each of the
//! four phase stages, whether that stage was reached, whether it passed, and
//! whether the driver has already dumped a snapshot at or before it, so a
//! resuming driver can ask "what's the deepest stage I can resume from"
//! without the core ever touching a filesystem.

use serde::{Deserialize, Serialize};

/// One phase boundary the outer driver can checkpoint/restore around (§6 CLI
/// surface: `POST_PDSC -> POST_SVD -> POST_MERGE -> POST_ANALYZE`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// PDSC ingest has produced the chip index.
    PostPdsc,
    /// Every SVD has been compiled into draft peripheral trees.
    PostSvd,
    /// Structural merge (intra- and inter-SVD, correctors) has stabilised.
    PostMerge,
    /// The CMSIS cross-check has run.
    PostAnalyze,
}

impl Stage {
    /// All stages, in pipeline order.
    pub const ALL: [Stage; 4] = [Stage::PostPdsc, Stage::PostSvd, Stage::PostMerge, Stage::PostAnalyze];

    /// This stage's position in the pipeline, `0`-based, used to compare
    /// "how deep" two stages are without deriving `Ord` on the public enum.
    pub fn level(self) -> u8 {
        match self {
            Stage::PostPdsc => 0,
            Stage::PostSvd => 1,
            Stage::PostMerge => 2,
            Stage::PostAnalyze => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct StageRecord {
    stage: Stage,
    passed: bool,
    dumped: bool,
}

/// Tracks which phase stages have been reached, whether each passed, and
/// which have been dumped by the driver, so a driver can resume from the
/// deepest stage that was both reached and serialised at or before a
/// requested target.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    records: Vec<StageRecord>,
}

impl Checkpoint {
    /// A fresh checkpoint with no stage reached yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `stage` has been reached, with `passed` reflecting
    /// whether it completed without error. Re-recording the same stage
    /// overwrites its prior record (a re-run after a failed stage looks
    /// like a fresh attempt).
    pub fn record(&mut self, stage: Stage, passed: bool) {
        match self.records.iter_mut().find(|r| r.stage == stage) {
            Some(record) => {
                record.passed = passed;
                record.dumped = false;
            }
            None => self.records.push(StageRecord { stage, passed, dumped: false }),
        }
    }

    /// Marks `stage` as dumped (serialised by the driver). A no-op if
    /// `stage` hasn't been [`Checkpoint::record`]ed yet.
    pub fn mark_dumped(&mut self, stage: Stage) {
        if let Some(record) = self.records.iter_mut().find(|r| r.stage == stage) {
            record.dumped = true;
        }
    }

    /// Whether `stage` was reached and passed.
    pub fn passed(&self, stage: Stage) -> bool {
        self.records.iter().any(|r| r.stage == stage && r.passed)
    }

    /// The deepest stage reached so far, regardless of pass/fail.
    pub fn current_stage(&self) -> Option<Stage> {
        self.records.iter().map(|r| r.stage).max_by_key(|s| s.level())
    }

    /// The deepest passed-and-dumped stage at or before `target`, i.e. the
    /// stage a resuming driver should restore from to reach `target` with
    /// the least repeated work.
    pub fn last_dumped_at_or_before(&self, target: Stage) -> Option<Stage> {
        self.records
            .iter()
            .filter(|r| r.passed && r.dumped && r.stage.level() <= target.level())
            .map(|r| r.stage)
            .max_by_key(|s| s.level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_target_is_deepest_passed_and_dumped_stage() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record(Stage::PostPdsc, true);
        checkpoint.mark_dumped(Stage::PostPdsc);
        checkpoint.record(Stage::PostSvd, true);
        checkpoint.mark_dumped(Stage::PostSvd);
        checkpoint.record(Stage::PostMerge, true);
        // PostMerge reached but not yet dumped.

        assert_eq!(checkpoint.last_dumped_at_or_before(Stage::PostAnalyze), Some(Stage::PostSvd));
        assert_eq!(checkpoint.last_dumped_at_or_before(Stage::PostPdsc), Some(Stage::PostPdsc));
    }

    #[test]
    fn failed_stage_is_not_a_resume_point() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record(Stage::PostPdsc, true);
        checkpoint.mark_dumped(Stage::PostPdsc);
        checkpoint.record(Stage::PostSvd, false);
        checkpoint.mark_dumped(Stage::PostSvd);

        assert!(!checkpoint.passed(Stage::PostSvd));
        assert_eq!(checkpoint.last_dumped_at_or_before(Stage::PostAnalyze), Some(Stage::PostPdsc));
    }

    #[test]
    fn re_recording_a_stage_resets_its_dumped_flag() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record(Stage::PostSvd, true);
        checkpoint.mark_dumped(Stage::PostSvd);
        checkpoint.record(Stage::PostSvd, true);
        assert_eq!(checkpoint.last_dumped_at_or_before(Stage::PostSvd), None);
    }
}
