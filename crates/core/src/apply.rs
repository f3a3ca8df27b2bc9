use crate::planner::{path_occupied, RenameCandidate, RenamePlan, SkipReason, SkippedFile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameOperation {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub operations: Vec<RenameOperation>,
    pub skipped: Vec<SkippedFile>,
}

/// Performs the renames of a plan one file at a time, in plan order.
///
/// Nothing is rolled back: a failure only skips the file it happened on. A target
/// that appeared on disk after planning is left alone.
pub fn apply_plan(plan: &RenamePlan) -> ApplyResult {
    let mut result = ApplyResult::default();

    for candidate in &plan.candidates {
        if !candidate.changed {
            result.unchanged += 1;
            continue;
        }

        match rename_candidate(candidate) {
            Ok(()) => {
                info!(
                    from = %candidate.original_path.display(),
                    to = %candidate.target_path.display(),
                    "renamed"
                );
                result.applied += 1;
                result.operations.push(RenameOperation {
                    from: candidate.original_path.clone(),
                    to: candidate.target_path.clone(),
                });
            }
            Err(reason) => {
                warn!(path = %candidate.original_path.display(), %reason, "skipping file");
                result.skipped.push(SkippedFile {
                    path: candidate.original_path.clone(),
                    reason,
                });
            }
        }
    }

    result
}

fn rename_candidate(candidate: &RenameCandidate) -> Result<(), SkipReason> {
    if !candidate.original_path.exists() {
        return Err(SkipReason::NotFound);
    }
    if path_occupied(&candidate.target_path) {
        return Err(SkipReason::TargetExists(candidate.target_path.clone()));
    }
    fs::rename(&candidate.original_path, &candidate.target_path)
        .map_err(|err| SkipReason::RenameFailed(err.to_string()))
}
