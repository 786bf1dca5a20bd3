use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::pipelines::{OverallStatus, StageRecord, StageStatus};

pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: OverallStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        OverallStatus::Succeeded => cell.fg(TableColor::Green),
        OverallStatus::Failed => cell.fg(TableColor::Red),
        OverallStatus::Partial | OverallStatus::InProgress => cell.fg(TableColor::Yellow),
        OverallStatus::Cancelled | OverallStatus::Unknown | OverallStatus::NotStarted => {
            cell.fg(TableColor::DarkGrey)
        }
    }
}

/// Stage icons in order, red when any stage failed.
pub fn stages_cell(stages: Option<&[StageRecord]>) -> Cell {
    let Some(records) = stages else {
        return Cell::new("-");
    };

    let text = records
        .iter()
        .map(|stage| format!("{} {}", stage.status().icon(), stage.name))
        .collect::<Vec<_>>()
        .join("  ");

    if records.iter().any(|s| s.status() == StageStatus::Failed) {
        Cell::new(text).fg(TableColor::Red)
    } else {
        Cell::new(text)
    }
}
