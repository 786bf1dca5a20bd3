//! Maps the platform's mixed tag/code status vocabularies onto canonical states.
//!
//! Every function here is total: values that match nothing fall into an
//! explicit default branch instead of surfacing as errors.

use super::types::RawStatus;
use crate::pipelines::{RunResult, RunState, StageResult, StageState};

/// Canonical run state. Unrecognized or missing values count as completed;
/// the result is normalized on its own so nothing is lost.
pub fn run_state(raw: Option<&RawStatus>) -> RunState {
    let Some(raw) = raw else {
        return RunState::Completed;
    };

    if raw.is("inProgress", 1) {
        RunState::InProgress
    } else if raw.is("completed", 2) {
        RunState::Completed
    } else if raw.is("canceling", 4) {
        RunState::Canceling
    } else if raw.is("canceled", 8) {
        RunState::Canceled
    } else {
        RunState::Completed
    }
}

/// Canonical run result, only ever present for completed runs.
pub fn run_result(state: RunState, raw: Option<&RawStatus>) -> Option<RunResult> {
    if state != RunState::Completed {
        return None;
    }

    let raw = raw?;
    if raw.is("succeeded", 1) {
        Some(RunResult::Succeeded)
    } else if raw.is("failed", 2) {
        Some(RunResult::Failed)
    } else if raw.is("canceled", 4) {
        Some(RunResult::Canceled)
    } else if raw.is_tag("partiallySucceeded") {
        Some(RunResult::PartiallySucceeded)
    } else if raw.is_tag("succeededWithIssues") {
        Some(RunResult::SucceededWithIssues)
    } else {
        None
    }
}

/// Canonical timeline record state. `None` means the record has not started.
pub fn stage_state(raw: Option<&RawStatus>) -> Option<StageState> {
    let raw = raw?;
    if raw.is("pending", 0) {
        Some(StageState::Pending)
    } else if raw.is("inProgress", 1) {
        Some(StageState::InProgress)
    } else if raw.is("completed", 2) {
        Some(StageState::Completed)
    } else {
        None
    }
}

pub fn stage_result(raw: Option<&RawStatus>) -> Option<StageResult> {
    let raw = raw?;
    if raw.is("succeeded", 0) {
        Some(StageResult::Succeeded)
    } else if raw.is("failed", 1) {
        Some(StageResult::Failed)
    } else if raw.is("canceled", 2) {
        Some(StageResult::Canceled)
    } else if raw.is("skipped", 3) {
        Some(StageResult::Skipped)
    } else {
        None
    }
}
