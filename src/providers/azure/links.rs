use url::Url;

/// Web link for a run, used when the API response carries none.
///
/// Runs share their id with the build that executes them, so the build
/// results page is the canonical target.
pub fn run_web_url(project_url: &Url, run_id: u32) -> String {
    project_url
        .join(&format!("_build/results?buildId={run_id}"))
        .map_or_else(|_| String::new(), String::from)
}

/// Web link for a pipeline definition.
pub fn pipeline_web_url(project_url: &Url, pipeline_id: u32) -> String {
    project_url
        .join(&format!("_build?definitionId={pipeline_id}"))
        .map_or_else(|_| String::new(), String::from)
}
