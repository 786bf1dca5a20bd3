use std::collections::HashSet;

use log::{debug, warn};

use super::core::AzureClient;
use crate::error::Result;
use crate::providers::azure::types::{AzurePipeline, AzureRun, ListResponse};

impl AzureClient {
    /// Lists every pipeline definition in the project, following continuation tokens.
    pub async fn list_pipelines(&self) -> Result<Vec<AzurePipeline>> {
        let mut all_pipelines = Vec::new();
        let mut continuation: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let mut query = Vec::new();
            if let Some(token) = continuation.take() {
                query.push(("continuationToken", token));
            }

            let url = self.endpoint("_apis/pipelines", &query)?;
            let page = self.get_page::<ListResponse<AzurePipeline>>(url).await?;
            all_pipelines.extend(page.body.value);

            match page.continuation {
                Some(token) if !seen_tokens.insert(token.clone()) => {
                    warn!(
                        "Continuation token repeated, stopping after {} pipelines",
                        all_pipelines.len()
                    );
                    break;
                }
                Some(token) => {
                    debug!("Fetched {} pipelines, continuing", all_pipelines.len());
                    continuation = Some(token);
                }
                None => break,
            }
        }

        Ok(all_pipelines)
    }

    /// Lists the runs of one pipeline in server order (newest first).
    pub async fn list_runs(&self, pipeline_id: u32) -> Result<Vec<AzureRun>> {
        let url = self.endpoint(&format!("_apis/pipelines/{pipeline_id}/runs"), &[])?;
        let response: ListResponse<AzureRun> = self.get_json(url).await?;
        Ok(response.value)
    }
}
