use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{AzureConfig, Config, OutputFormat};
use crate::output;
use crate::providers::AzureProvider;

#[derive(Parser)]
#[command(name = "stagescope")]
#[command(author, version, about = "Pipeline stage status for Azure DevOps", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./stagescope.toml and friends)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,
}

#[derive(Args)]
struct Connection {
    /// Organization URL, e.g. https://dev.azure.com/contoso
    #[arg(long, env = "AZURE_DEVOPS_ORG_URL")]
    org: Option<String>,

    #[arg(short = 'P', long)]
    project: Option<String>,

    #[arg(short, long, env = "AZURE_DEVOPS_EXT_PAT", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List pipeline definitions
    Pipelines {
        #[command(flatten)]
        connection: Connection,
    },
    /// Show recent runs of one pipeline with their stages
    Runs {
        #[command(flatten)]
        connection: Connection,

        #[arg(long)]
        pipeline: u32,

        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Collect runs and stages for the first pipelines of the project
    Snapshot {
        #[command(flatten)]
        connection: Connection,

        #[arg(long)]
        pipelines: Option<usize>,

        #[arg(long)]
        runs: Option<usize>,
    },
}

impl Connection {
    fn provider(&self, settings: &AzureConfig) -> Result<AzureProvider> {
        let organization_url = self
            .org
            .as_deref()
            .or(settings.organization_url.as_deref())
            .context("No organization URL given (use --org or azure.organization-url)")?;

        let project = self
            .project
            .clone()
            .or_else(|| settings.project.clone())
            .context("No project given (use --project or azure.project)")?;

        let token = self
            .token
            .as_deref()
            .or(settings.token.as_deref())
            .map(Token::from);

        info!("Connecting to {organization_url} project {project}");

        Ok(AzureProvider::new(
            organization_url,
            project,
            token,
            &settings.provider_options(),
        )?)
    }
}

impl Cli {
    fn emit(
        &self,
        config: &Config,
        rendered: impl FnOnce(OutputFormat, bool) -> Result<String>,
    ) -> Result<()> {
        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;
        let text = rendered(format, pretty)?;

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, text)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Output written to: {}", output_path.display());
        } else {
            println!("{text}");
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let settings = &config.azure;

        match &self.command {
            Commands::Pipelines { connection } => {
                let provider = connection.provider(settings)?;
                let pipelines = provider.list_pipelines().await?;

                self.emit(&config, |format, pretty| match format {
                    OutputFormat::Json => Ok(output::to_json(&pipelines, pretty)?),
                    OutputFormat::Summary => Ok(output::render_pipelines(&pipelines)),
                })
            }
            Commands::Runs {
                connection,
                pipeline,
                limit,
            } => {
                let provider = connection.provider(settings)?;
                let limit = limit.unwrap_or(settings.run_limit);
                let runs = provider.fetch_runs_with_stages(*pipeline, limit).await?;

                let title = runs
                    .first()
                    .map(|run| run.pipeline.name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("Pipeline {pipeline}"));

                self.emit(&config, |format, pretty| match format {
                    OutputFormat::Json => Ok(output::to_json(&runs, pretty)?),
                    OutputFormat::Summary => Ok(output::render_runs(&title, &runs)),
                })
            }
            Commands::Snapshot {
                connection,
                pipelines,
                runs,
            } => {
                let provider = connection.provider(settings)?;
                let snapshot = provider
                    .collect_snapshot(
                        pipelines.unwrap_or(settings.pipeline_limit),
                        runs.unwrap_or(settings.run_limit),
                    )
                    .await?;

                self.emit(&config, |format, pretty| match format {
                    OutputFormat::Json => Ok(output::to_json(&snapshot, pretty)?),
                    OutputFormat::Summary => Ok(output::render_snapshot(&snapshot)),
                })
            }
        }
    }
}
