use log::debug;

use super::status;
use super::types::{AzureTimeline, AzureTimelineRecord};
use crate::pipelines::{StageRecord, STAGE_RECORD_TYPE};

const UNKNOWN_STAGE_NAME: &str = "Unknown Stage";

/// Extracts the stage records of a timeline, normalized and sorted by `order`.
///
/// Jobs, phases, tasks and checkpoints are dropped. Records with equal
/// (or missing, treated as zero) `order` keep their API order.
pub fn extract_stages(timeline: AzureTimeline) -> Vec<StageRecord> {
    let mut stages: Vec<StageRecord> = timeline
        .records
        .unwrap_or_default()
        .into_iter()
        .filter(|record| record.record_type.as_deref() == Some(STAGE_RECORD_TYPE))
        .map(transform_record)
        .collect();

    stages.sort_by_key(StageRecord::sort_key);
    stages
}

fn transform_record(record: AzureTimelineRecord) -> StageRecord {
    let name = record.name.unwrap_or_else(|| {
        debug!(
            "Stage record {:?} has no name, using '{UNKNOWN_STAGE_NAME}'",
            record.id
        );
        UNKNOWN_STAGE_NAME.to_string()
    });

    StageRecord {
        id: record.id.unwrap_or_default(),
        name,
        record_type: STAGE_RECORD_TYPE.to_string(),
        state: status::stage_state(record.state.as_ref()),
        result: status::stage_result(record.result.as_ref()),
        start_time: record.start_time,
        finish_time: record.finish_time,
        order: record.order,
        parent_id: record.parent_id,
        error_count: record.error_count,
        warning_count: record.warning_count,
    }
}
