use std::fmt::Write as _;

use comfy_table::Cell;

use super::styling::{bright, bright_yellow, cyan, dim};
use super::tables::{create_table, cyan_header, stages_cell, status_cell};
use crate::pipelines::{Correlation, PipelineDefinition, Run, Snapshot};

fn correlation_label(run: &Run) -> &'static str {
    if run.stages_error.is_some() {
        return "stages unavailable";
    }

    match run.correlation {
        Some(Correlation::Exact { .. }) => "exact",
        Some(Correlation::FallbackMostRecent { .. }) => "≈ most recent build",
        Some(Correlation::Unresolved) => "no build found",
        None => "-",
    }
}

pub fn render_pipelines(pipelines: &[PipelineDefinition]) -> String {
    if pipelines.is_empty() {
        return format!("{}\n", bright_yellow("No pipelines found."));
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["ID", "Pipeline", "Folder", "Revision", "Link"]));

    for pipeline in pipelines {
        table.add_row(vec![
            Cell::new(pipeline.id),
            Cell::new(&pipeline.name),
            Cell::new(pipeline.folder.as_deref().unwrap_or("\\")),
            Cell::new(pipeline.revision.map_or_else(String::new, |r| r.to_string())),
            Cell::new(pipeline.url.as_deref().unwrap_or("")),
        ]);
    }

    format!("{table}\n")
}

pub fn render_runs(title: &str, runs: &[Run]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} {}", bright("▶"), bright(title).underlined());

    if runs.is_empty() {
        let _ = writeln!(output, "  {}", dim("No runs available."));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Run", "Status", "Stages", "Created", "Match", "Link"]));

    for run in runs {
        table.add_row(vec![
            Cell::new(&run.name),
            status_cell(run.overall_status()),
            stages_cell(run.stages.as_deref()),
            Cell::new(run.created_date.format("%Y-%m-%d %H:%M")),
            Cell::new(correlation_label(run)),
            Cell::new(&run.url),
        ]);
    }

    let _ = writeln!(output, "{table}");
    output
}

pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{} {}", bright("📊"), bright("Overview").underlined());
    let _ = writeln!(output, "  {} {}", dim("Organization:"), cyan(&snapshot.organization));
    let _ = writeln!(output, "  {} {}", dim("Project:"), cyan(&snapshot.project));
    let _ = writeln!(
        output,
        "  {} {} {}",
        dim("Pipelines:"),
        bright_yellow(snapshot.pipelines.len()),
        dim(format!("({} loaded)", snapshot.runs.len()))
    );
    let _ = writeln!(
        output,
        "  {} {}",
        dim("Collected:"),
        dim(snapshot.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );
    output.push('\n');

    if snapshot.pipelines.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No pipelines found."));
        return output;
    }

    for pipeline in &snapshot.pipelines {
        let Some(runs) = snapshot.runs.get(&pipeline.id) else {
            continue;
        };
        output.push_str(&render_runs(&pipeline.name, runs));
        output.push('\n');
    }

    output
}
