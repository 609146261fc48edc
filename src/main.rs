mod cache;
mod config;
mod gitlab;
mod metrics;
mod pipeline;
mod report;
mod score;
mod wizard;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::cache::FileCacheStore;
use crate::gitlab::GitLabClient;
use crate::pipeline::{PipelineError, PipelineSettings};
use crate::report::SortOrder;
use crate::wizard::{DataSource, InquirePrompter, RunMode, Wizard, WizardError, WizardOptions};

/// MR Dashboard: lists the merge requests of a GitLab project and scores
/// each one so that old, large and quiet merge requests stand out.
#[derive(Parser, Debug)]
#[command(name = "mr-dashboard", version, about)]
struct Cli {
    /// Config file (defaults to .mr-dashboard.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show the previous run without asking
    #[arg(long, conflicts_with_all = ["refresh", "project"])]
    cached: bool,

    /// Fetch fresh data without asking
    #[arg(long)]
    refresh: bool,

    /// Project ID to score, skipping group and project selection
    #[arg(short, long)]
    project: Option<u64>,

    /// Row order of the table
    #[arg(long, value_enum, default_value_t = SortOrder::Api)]
    sort: SortOrder,

    /// Optional output file path for a markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn wizard_options(&self) -> WizardOptions {
        let mode = if self.cached {
            Some(RunMode::LoadCached)
        } else if self.refresh || self.project.is_some() {
            Some(RunMode::Rerun)
        } else {
            None
        };
        WizardOptions {
            mode,
            project_id: self.project,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("mr_dashboard").entered();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    debug!(group_scope = ?config.gitlab.group_scope, states = ?config.gitlab.fetch_mr_states, "configuration loaded");

    // Only a fresh run needs GitLab; a cached run works without credentials.
    let client = build_client(&config);
    if let Err(reason) = &client {
        debug!(%reason, "GitLab client unavailable");
    }

    let cache = FileCacheStore::new(&config.cache.dir);
    let prompter = InquirePrompter;
    let settings = PipelineSettings {
        states: config.gitlab.fetch_mr_states.clone(),
        thresholds: config.thresholds,
        formula: config.score.formula,
        concurrency: config.gitlab.concurrency,
    };

    let wizard = Wizard::new(
        client.as_ref().map_err(|reason| reason.clone()),
        &cache,
        &prompter,
        settings,
        config.gitlab.group_scope,
        cli.wizard_options(),
    );

    let outcome = match wizard.run(Utc::now()).await {
        Ok(outcome) => outcome,
        Err(WizardError::Pipeline(PipelineError::Aborted {
            mr_iid,
            completed,
            source,
        })) => {
            warn!(mr_iid, rows = completed.len(), "run aborted; partial rows were not cached");
            eprintln!(
                "{}",
                format!("Run aborted at merge request !{mr_iid}; showing {} rows scored before the failure", completed.len())
                    .yellow()
            );
            let partial = report::build(
                &completed,
                "Merge Requests (partial)".to_string(),
                Utc::now(),
                config.score.formula,
                cli.sort,
            );
            report::output(&partial, None)?;
            return Err(source.into());
        }
        Err(err) => return Err(err.into()),
    };

    let heading = match &outcome.source {
        DataSource::Cached => "Merge Requests (previous run)".to_string(),
        DataSource::Fresh { label, .. } => format!("Merge Requests: {label}"),
    };
    info!(rows = outcome.table.len(), "generating report");
    let built_report = report::build(
        &outcome.table,
        heading,
        outcome.produced_at,
        outcome.formula,
        cli.sort,
    );
    report::output(&built_report, cli.output.as_deref())?;
    info!("done");

    Ok(())
}

/// Build the HTTP client, or explain why it cannot be built.
fn build_client(config: &config::Config) -> Result<GitLabClient, String> {
    let base_url = config.base_url().map_err(|e| e.to_string())?;
    let token = config.token().map_err(|e| e.to_string())?;
    GitLabClient::new(
        base_url,
        token,
        Duration::from_secs(config.gitlab.timeout_secs),
    )
    .map_err(|e| e.to_string())
}
