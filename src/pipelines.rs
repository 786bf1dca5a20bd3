use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Timeline node type tag for stage records.
pub const STAGE_RECORD_TYPE: &str = "Stage";

/// Complete point-in-time view of a project's pipelines and their recent runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub organization: String,
    pub project: String,
    pub collected_at: DateTime<Utc>,
    pub pipelines: Vec<PipelineDefinition>,
    /// Runs keyed by pipeline id, in catalog order.
    pub runs: IndexMap<u32, Vec<Run>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: u32,
    pub name: String,
    pub folder: Option<String>,
    pub revision: Option<u32>,
    pub url: Option<String>,
}

/// Denormalized copy of the pipeline a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: u32,
    pub name: String,
    pub folder: Option<String>,
    pub revision: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    InProgress,
    Completed,
    Canceling,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunResult {
    Succeeded,
    Failed,
    Canceled,
    PartiallySucceeded,
    SucceededWithIssues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageState {
    Completed,
    InProgress,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageResult {
    Succeeded,
    Failed,
    Canceled,
    Skipped,
}

/// How a run was linked to the build whose timeline supplied its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correlation {
    /// The build id is known to belong to this run.
    Exact { build_id: u32 },
    /// No match was found; the most recent build of the pipeline was used.
    /// Stages may belong to a nearby run.
    FallbackMostRecent { build_id: u32 },
    Unresolved,
}

impl Correlation {
    pub fn build_id(&self) -> Option<u32> {
        match self {
            Self::Exact { build_id } | Self::FallbackMostRecent { build_id } => Some(*build_id),
            Self::Unresolved => None,
        }
    }

    pub fn is_approximate(&self) -> bool {
        matches!(self, Self::FallbackMostRecent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: u32,
    pub name: String,
    pub state: RunState,
    pub result: Option<RunResult>,
    pub created_date: DateTime<Utc>,
    pub finished_date: Option<DateTime<Utc>>,
    pub url: String,
    pub pipeline: PipelineRef,
    /// Attached stages, sorted by `order`. `None` until the run has been correlated.
    pub stages: Option<Vec<StageRecord>>,
    pub correlation: Option<Correlation>,
    /// Set when a build was found but its timeline could not be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages_error: Option<String>,
}

impl Run {
    pub fn overall_status(&self) -> OverallStatus {
        OverallStatus::from_run(self.state, self.result)
    }

    pub fn with_stages(self, stages: Vec<StageRecord>, correlation: Correlation) -> Self {
        Self {
            stages: Some(stages),
            correlation: Some(correlation),
            stages_error: None,
            ..self
        }
    }

    /// Marks the stages of a correlated run as unavailable.
    pub fn with_unavailable_stages(self, correlation: Correlation, error: String) -> Self {
        Self {
            stages: Some(Vec::new()),
            correlation: Some(correlation),
            stages_error: Some(error),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub state: Option<StageState>,
    pub result: Option<StageResult>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub order: Option<i32>,
    pub parent_id: Option<String>,
    pub error_count: Option<u32>,
    pub warning_count: Option<u32>,
}

impl StageRecord {
    pub fn status(&self) -> StageStatus {
        StageStatus::from_stage(self.state, self.result)
    }

    /// Ordering index, absent treated as zero.
    pub fn sort_key(&self) -> i32 {
        self.order.unwrap_or(0)
    }
}

/// Run-level status derived from canonical state and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
    Partial,
    Unknown,
    NotStarted,
}

impl OverallStatus {
    pub fn from_run(state: RunState, result: Option<RunResult>) -> Self {
        match (state, result) {
            (RunState::InProgress, _) => Self::InProgress,
            (
                RunState::Completed,
                Some(RunResult::Succeeded | RunResult::SucceededWithIssues),
            ) => Self::Succeeded,
            (RunState::Completed, Some(RunResult::Failed)) => Self::Failed,
            (RunState::Completed, Some(RunResult::Canceled)) => Self::Cancelled,
            (RunState::Completed, Some(RunResult::PartiallySucceeded)) => Self::Partial,
            (RunState::Completed, None) => Self::Unknown,
            _ => Self::NotStarted,
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "in progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
            Self::NotStarted => "not started",
        };
        f.write_str(label)
    }
}

/// Stage-level display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    InProgress,
    Cancelled,
    Skipped,
    Unknown,
    NotStarted,
}

impl StageStatus {
    pub fn from_stage(state: Option<StageState>, result: Option<StageResult>) -> Self {
        match (state, result) {
            (Some(StageState::InProgress), _) => Self::InProgress,
            (Some(StageState::Completed), Some(StageResult::Succeeded)) => Self::Succeeded,
            (Some(StageState::Completed), Some(StageResult::Failed)) => Self::Failed,
            (Some(StageState::Completed), Some(StageResult::Canceled)) => Self::Cancelled,
            (Some(StageState::Completed), Some(StageResult::Skipped)) => Self::Skipped,
            (Some(StageState::Completed), None) => Self::Unknown,
            _ => Self::NotStarted,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Succeeded => "✓",
            Self::Failed => "✗",
            Self::InProgress => "⟳",
            Self::Cancelled | Self::Skipped => "⊘",
            Self::Unknown => "?",
            Self::NotStarted => "○",
        }
    }
}
