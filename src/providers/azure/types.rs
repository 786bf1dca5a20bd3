use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A state or result field as returned by the REST API.
///
/// Older API versions serialize these enums as integers, newer ones as
/// camelCase strings. Both can show up in the same field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawStatus {
    Code(i64),
    Tag(String),
}

impl RawStatus {
    /// True when the value is either the given tag (case-insensitive) or code.
    pub fn is(&self, tag: &str, code: i64) -> bool {
        match self {
            Self::Code(value) => *value == code,
            Self::Tag(value) => value.eq_ignore_ascii_case(tag),
        }
    }

    /// Match for values that only exist as tags.
    pub fn is_tag(&self, tag: &str) -> bool {
        matches!(self, Self::Tag(value) if value.eq_ignore_ascii_case(tag))
    }
}

/// Collection envelope used by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReferenceLinks {
    pub web: Option<Link>,
}

#[derive(Debug, Deserialize)]
pub struct Link {
    pub href: String,
}

fn web_href(links: Option<ReferenceLinks>) -> Option<String> {
    links.and_then(|l| l.web).map(|w| w.href)
}

#[derive(Debug, Deserialize)]
pub struct AzurePipeline {
    pub id: u32,
    pub name: Option<String>,
    pub folder: Option<String>,
    pub revision: Option<u32>,
    #[serde(rename = "_links")]
    pub links: Option<ReferenceLinks>,
}

impl AzurePipeline {
    pub fn web_url(&mut self) -> Option<String> {
        web_href(self.links.take())
    }
}

#[derive(Debug, Deserialize)]
pub struct AzurePipelineRef {
    pub name: Option<String>,
    pub folder: Option<String>,
    pub revision: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureRun {
    pub id: u32,
    pub name: Option<String>,
    pub state: Option<RawStatus>,
    pub result: Option<RawStatus>,
    pub created_date: Option<DateTime<Utc>>,
    pub finished_date: Option<DateTime<Utc>>,
    #[serde(rename = "_links")]
    pub links: Option<ReferenceLinks>,
    pub pipeline: Option<AzurePipelineRef>,
}

impl AzureRun {
    pub fn web_url(&mut self) -> Option<String> {
        web_href(self.links.take())
    }
}

/// Build summary; only the id is needed for correlation.
#[derive(Debug, Deserialize)]
pub struct AzureBuild {
    pub id: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct AzureTimeline {
    #[serde(default)]
    pub records: Option<Vec<AzureTimelineRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureTimelineRecord {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub state: Option<RawStatus>,
    pub result: Option<RawStatus>,
    pub order: Option<i32>,
    pub error_count: Option<u32>,
    pub warning_count: Option<u32>,
}
