pub mod azure;

pub use azure::{AzureProvider, ProviderOptions};
