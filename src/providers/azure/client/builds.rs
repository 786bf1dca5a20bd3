use super::core::AzureClient;
use crate::error::Result;
use crate::providers::azure::types::{AzureBuild, AzureTimeline, ListResponse};

/// Filters accepted by the build listing endpoint.
#[derive(Debug, Clone, Copy)]
pub enum BuildFilter<'a> {
    /// Builds with exactly these ids.
    Ids(&'a [u32]),
    /// The `top` most recently queued builds of a definition.
    RecentForDefinition { definition_id: u32, top: usize },
}

impl BuildFilter<'_> {
    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Ids(ids) => {
                let ids = ids
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                vec![("buildIds", ids)]
            }
            Self::RecentForDefinition { definition_id, top } => vec![
                ("definitions", definition_id.to_string()),
                ("$top", top.to_string()),
                ("queryOrder", "queueTimeDescending".to_string()),
            ],
        }
    }
}

impl AzureClient {
    pub async fn list_builds(&self, filter: BuildFilter<'_>) -> Result<Vec<AzureBuild>> {
        let url = self.endpoint("_apis/build/builds", &filter.query())?;
        let response: ListResponse<AzureBuild> = self.get_json(url).await?;
        Ok(response.value)
    }

    /// Fetches a build's timeline. `Ok(None)` means the build has no timeline
    /// yet, which is normal for queued builds.
    pub async fn get_build_timeline(&self, build_id: u32) -> Result<Option<AzureTimeline>> {
        let url = self.endpoint(&format!("_apis/build/builds/{build_id}/timeline"), &[])?;
        self.get_optional_json(url).await
    }
}
