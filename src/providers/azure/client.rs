mod builds;
mod core;
mod pipelines;

pub use self::builds::BuildFilter;
pub use self::core::AzureClient;
