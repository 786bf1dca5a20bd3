use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use log::{info, warn};

use crate::auth::Token;
use crate::error::Result;
use crate::pipelines::{PipelineDefinition, PipelineRef, Run, Snapshot};

use super::client::AzureClient;
use super::correlation::{Resolution, TimelineCorrelator};
use super::progress_bar::PhaseProgress;
use super::timeline::extract_stages;
use super::types::{AzurePipeline, AzureRun};
use super::{links, status};

/// Tunables for talking to one Azure DevOps project.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub api_version: String,
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    /// How many recent builds of a pipeline the correlator searches.
    pub fallback_window: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            api_version: "7.1".to_string(),
            max_concurrent_requests: 32,
            request_timeout: Duration::from_secs(30),
            fallback_window: 50,
        }
    }
}

/// Azure DevOps pipeline status provider.
///
/// Lists pipelines and runs, correlates each run with a build timeline and
/// attaches the normalized stage records. Fan-out happens at two levels
/// (pipelines, then runs) and a failure at either level only empties the
/// affected item.
pub struct AzureProvider {
    pub client: AzureClient,
    pub project: String,
    fallback_window: usize,
}

impl AzureProvider {
    /// Creates a provider for `project` in the organization at `organization_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the organization URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(
        organization_url: &str,
        project: String,
        token: Option<Token>,
        options: &ProviderOptions,
    ) -> Result<Self> {
        let client = AzureClient::new(
            organization_url,
            &project,
            token,
            &options.api_version,
            options.max_concurrent_requests,
            options.request_timeout,
        )?;

        Ok(Self {
            client,
            project,
            fallback_window: options.fallback_window,
        })
    }

    /// Lists every pipeline definition of the project.
    ///
    /// # Errors
    ///
    /// Propagates any remote failure; nothing downstream is meaningful without
    /// the catalog.
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineDefinition>> {
        let pipelines = self.client.list_pipelines().await?;
        info!("Found {} pipelines in {}", pipelines.len(), self.project);

        Ok(pipelines
            .into_iter()
            .map(|p| self.transform_pipeline(p))
            .collect())
    }

    fn transform_pipeline(&self, mut pipeline: AzurePipeline) -> PipelineDefinition {
        let url = pipeline
            .web_url()
            .unwrap_or_else(|| links::pipeline_web_url(&self.client.project_url, pipeline.id));

        PipelineDefinition {
            id: pipeline.id,
            name: pipeline
                .name
                .unwrap_or_else(|| "Unnamed Pipeline".to_string()),
            folder: pipeline.folder,
            revision: pipeline.revision,
            url: Some(url),
        }
    }

    /// Lists the first `limit` runs of a pipeline, without stages.
    ///
    /// The runs endpoint has no server-side paging, so everything is fetched
    /// and truncated locally.
    ///
    /// # Errors
    ///
    /// Propagates any remote failure.
    pub async fn list_runs(&self, pipeline_id: u32, limit: usize) -> Result<Vec<Run>> {
        let runs = self.client.list_runs(pipeline_id).await?;
        let total = runs.len();

        let runs: Vec<Run> = runs
            .into_iter()
            .take(limit)
            .map(|run| self.transform_run(pipeline_id, run))
            .collect();

        info!(
            "Pipeline {pipeline_id}: using {} of {total} runs",
            runs.len()
        );

        Ok(runs)
    }

    fn transform_run(&self, pipeline_id: u32, mut run: AzureRun) -> Run {
        let state = status::run_state(run.state.as_ref());
        let result = status::run_result(state, run.result.as_ref());
        let url = run
            .web_url()
            .unwrap_or_else(|| links::run_web_url(&self.client.project_url, run.id));
        let pipeline = run.pipeline.take();

        Run {
            id: run.id,
            name: run.name.unwrap_or_else(|| format!("Run {}", run.id)),
            state,
            result,
            created_date: run.created_date.unwrap_or_else(Utc::now),
            finished_date: run.finished_date,
            url,
            pipeline: PipelineRef {
                id: pipeline_id,
                name: pipeline
                    .as_ref()
                    .and_then(|p| p.name.clone())
                    .unwrap_or_default(),
                folder: pipeline.as_ref().and_then(|p| p.folder.clone()),
                revision: pipeline.as_ref().and_then(|p| p.revision),
            },
            stages: None,
            correlation: None,
            stages_error: None,
        }
    }

    /// Lists the first `limit` runs of a pipeline with their stages attached.
    ///
    /// Runs are correlated concurrently. A run whose stages cannot be fetched
    /// keeps an empty stage list; it never fails its siblings.
    ///
    /// # Errors
    ///
    /// Propagates failures of the run listing itself.
    pub async fn fetch_runs_with_stages(&self, pipeline_id: u32, limit: usize) -> Result<Vec<Run>> {
        let runs = self.list_runs(pipeline_id, limit).await?;

        let futures: Vec<_> = runs
            .into_iter()
            .map(|run| self.attach_stages(pipeline_id, run))
            .collect();

        let runs = join_all(futures).await;

        let approximate = runs
            .iter()
            .filter(|run| run.correlation.is_some_and(|c| c.is_approximate()))
            .count();
        if approximate > 0 {
            info!("Pipeline {pipeline_id}: {approximate} runs use stages of a nearby build");
        }

        Ok(runs)
    }

    async fn attach_stages(&self, pipeline_id: u32, run: Run) -> Run {
        let correlator = TimelineCorrelator::new(&self.client, self.fallback_window);
        let Resolution {
            correlation,
            prefetched,
        } = correlator.resolve(run.id, pipeline_id).await;

        let timeline = match correlation.build_id() {
            // already requested while resolving
            Some(build_id) if build_id == prefetched.build_id => prefetched.timeline,
            Some(build_id) => self.client.get_build_timeline(build_id).await,
            None => Ok(None),
        };

        match timeline {
            Ok(timeline) => {
                run.with_stages(extract_stages(timeline.unwrap_or_default()), correlation)
            }
            Err(e) => {
                warn!("Could not fetch stages for run {}: {e}", run.id);
                run.with_unavailable_stages(correlation, e.to_string())
            }
        }
    }

    /// Collects a snapshot of the first `pipeline_limit` pipelines with up to
    /// `run_limit` runs each.
    ///
    /// # Errors
    ///
    /// Only a failure to list the pipeline catalog aborts the snapshot. A
    /// pipeline whose runs cannot be listed maps to an empty run list.
    pub async fn collect_snapshot(&self, pipeline_limit: usize, run_limit: usize) -> Result<Snapshot> {
        info!("Starting snapshot collection for project: {}", self.project);

        let progress = PhaseProgress::start_phase_1();

        let pipelines = match self.list_pipelines().await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                progress.abandon(if e.is_remote() {
                    "Phase 1/3: Could not reach Azure DevOps"
                } else {
                    "Phase 1/3: Unexpected pipeline catalog response"
                });
                return Err(e);
            }
        };

        let selected = pipelines.len().min(pipeline_limit);
        let progress = progress.finish_phase_1_start_phase_2(pipelines.len(), selected);

        let futures: Vec<_> = pipelines
            .iter()
            .take(pipeline_limit)
            .map(|pipeline| async move {
                let runs = match self.fetch_runs_with_stages(pipeline.id, run_limit).await {
                    Ok(runs) => runs,
                    Err(e) => {
                        warn!("Error loading runs for pipeline {}: {e}", pipeline.id);
                        Vec::new()
                    }
                };
                (pipeline.id, runs)
            })
            .collect();

        let runs: IndexMap<u32, Vec<Run>> = join_all(futures).await.into_iter().collect();

        let run_count = runs.values().map(Vec::len).sum();
        let progress = progress.finish_phase_2_start_phase_3(run_count);

        let snapshot = Snapshot {
            organization: self.client.organization_url.to_string(),
            project: self.project.clone(),
            collected_at: Utc::now(),
            pipelines,
            runs,
        };

        progress.finish_phase_3();
        info!(
            "Snapshot collected: {} pipelines, {run_count} runs",
            snapshot.runs.len()
        );

        Ok(snapshot)
    }
}
