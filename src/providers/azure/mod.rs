mod client;
mod correlation;
mod links;
mod progress_bar;
pub mod provider;
mod status;
mod timeline;
mod types;

#[cfg(test)]
mod tests;

pub use provider::{AzureProvider, ProviderOptions};
