use log::{debug, warn};

use super::client::{AzureClient, BuildFilter};
use super::types::{AzureBuild, AzureTimeline};
use crate::error::Result;
use crate::pipelines::Correlation;

/// Timeline request already made for `build_id` while resolving.
#[derive(Debug)]
pub struct Prefetched {
    pub build_id: u32,
    pub timeline: Result<Option<AzureTimeline>>,
}

/// Result of resolving a run to a build.
#[derive(Debug)]
pub struct Resolution {
    pub correlation: Correlation,
    /// Outcome of the first step, reused when the chain lands on the same build.
    pub prefetched: Prefetched,
}

/// Links pipeline runs to the builds whose timelines hold their stages.
///
/// The platform exposes no reliable run → build link, so resolution walks a
/// fallback chain and stops at the first hit:
///
/// 1. Fetch the timeline of a build with the run's id.
/// 2. List builds filtered to the run's id.
/// 3. Search the `fallback_window` most recent builds of the pipeline for the id.
/// 4. Take the most recent build of that window (approximate).
///
/// Remote failures inside the chain only end the current step.
pub struct TimelineCorrelator<'a> {
    client: &'a AzureClient,
    fallback_window: usize,
}

impl<'a> TimelineCorrelator<'a> {
    pub fn new(client: &'a AzureClient, fallback_window: usize) -> Self {
        Self {
            client,
            fallback_window,
        }
    }

    pub async fn resolve(&self, run_id: u32, pipeline_id: u32) -> Resolution {
        let prefetched = Prefetched {
            build_id: run_id,
            timeline: self.client.get_build_timeline(run_id).await,
        };

        if let Err(e) = &prefetched.timeline {
            debug!("Run {run_id}: no timeline under the same build id ({e})");
        }
        if prefetched.timeline.is_ok() {
            debug!("Run {run_id}: timeline found under the same build id");
            return Resolution {
                correlation: Correlation::Exact { build_id: run_id },
                prefetched,
            };
        }

        if let Some(build_id) = self.find_by_build_id(run_id).await {
            debug!("Run {run_id}: matched build {build_id} by id filter");
            return Resolution {
                correlation: Correlation::Exact { build_id },
                prefetched,
            };
        }

        let correlation = match self.search_definition_window(run_id, pipeline_id).await {
            Ok(correlation) => correlation,
            Err(e) => {
                warn!("Run {run_id}: recent build lookup for pipeline {pipeline_id} failed: {e}");
                Correlation::Unresolved
            }
        };

        match correlation {
            Correlation::Exact { build_id } => {
                debug!("Run {run_id}: matched build {build_id} in recent builds of pipeline {pipeline_id}");
            }
            Correlation::FallbackMostRecent { build_id } => {
                warn!(
                    "Run {run_id}: no matching build, using most recent build {build_id} of pipeline {pipeline_id}; stages may belong to another run"
                );
            }
            Correlation::Unresolved => {
                warn!("Run {run_id}: no build found for pipeline {pipeline_id}, leaving stages empty");
            }
        }

        Resolution {
            correlation,
            prefetched,
        }
    }

    async fn find_by_build_id(&self, run_id: u32) -> Option<u32> {
        match self.client.list_builds(BuildFilter::Ids(&[run_id])).await {
            Ok(builds) => builds.iter().find(|b| b.id == run_id).map(|b| b.id),
            Err(e) => {
                debug!("Run {run_id}: build id lookup failed ({e})");
                None
            }
        }
    }

    async fn search_definition_window(&self, run_id: u32, pipeline_id: u32) -> Result<Correlation> {
        let filter = BuildFilter::RecentForDefinition {
            definition_id: pipeline_id,
            top: self.fallback_window,
        };

        let builds = self.client.list_builds(filter).await?;
        Ok(pick_from_window(run_id, &builds))
    }
}

/// Picks a build from a newest-first window: exact id match, else the newest.
pub fn pick_from_window(run_id: u32, builds: &[AzureBuild]) -> Correlation {
    if let Some(build) = builds.iter().find(|b| b.id == run_id) {
        return Correlation::Exact { build_id: build.id };
    }

    builds
        .first()
        .map_or(Correlation::Unresolved, |build| {
            Correlation::FallbackMostRecent { build_id: build.id }
        })
}
