use async_trait::async_trait;
use chrono::{DateTime, Utc};
use colored::Colorize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStore};
use crate::gitlab::{GitLabError, Group, GroupScope, Project, RemoteSource};
use crate::pipeline::{self, PipelineError, PipelineSettings};
use crate::report::types::ResultTable;
use crate::score::ScoreFormula;

const LOAD_PREVIOUS: &str = "Load previous data";
const RERUN: &str = "Re-run";

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("GitLab is not available: {0}")]
    RemoteUnavailable(String),

    #[error(transparent)]
    Remote(#[from] GitLabError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Nothing to select: no {0} found")]
    NothingToSelect(String),

    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Asks the user to pick from a list.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Returns the index of the chosen option. `options` is never empty.
    async fn select(&self, message: &str, options: Vec<String>) -> Result<usize, WizardError>;

    /// Show an informational line.
    fn notice(&self, message: &str);
}

/// Terminal prompter backed by `inquire`.
pub struct InquirePrompter;

#[async_trait]
impl Prompter for InquirePrompter {
    async fn select(&self, message: &str, options: Vec<String>) -> Result<usize, WizardError> {
        // inquire blocks on stdin
        let message = message.to_string();
        let choice = tokio::task::spawn_blocking(move || {
            inquire::Select::new(&message, options)
                .with_help_message("Use arrow keys to navigate, Enter to select")
                .raw_prompt()
        })
        .await
        .map_err(|e| WizardError::Prompt(format!("prompt task failed: {e}")))?
        .map_err(|e| WizardError::Prompt(e.to_string()))?;

        Ok(choice.index)
    }

    fn notice(&self, message: &str) {
        eprintln!("{}", message.cyan());
    }
}

/// How the user wants the table produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    LoadCached,
    Rerun,
}

/// Where the final table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Cached,
    Fresh { project_id: u64, label: String },
}

/// Wizard stages. Each carries only what is valid at that point, so the
/// selection stage cannot be entered without a fetched group list.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Init { last_run: Option<DateTime<Utc>> },
    Select { groups: Vec<Group> },
    Data { source: DataSource },
}

/// Answers supplied up front (from the command line) skip their prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct WizardOptions {
    pub mode: Option<RunMode>,
    pub project_id: Option<u64>,
}

#[derive(Debug)]
pub struct WizardOutcome {
    pub table: ResultTable,
    pub source: DataSource,
    /// When the shown data was produced
    pub produced_at: DateTime<Utc>,
    /// Formula the scores were computed with, which for a cached table may
    /// differ from the configured one
    pub formula: ScoreFormula,
}

pub struct Wizard<'a, R: ?Sized, C: ?Sized, P: ?Sized> {
    remote: Result<&'a R, String>,
    cache: &'a C,
    prompter: &'a P,
    settings: PipelineSettings,
    group_scope: GroupScope,
    options: WizardOptions,
}

impl<'a, R, C, P> Wizard<'a, R, C, P>
where
    R: RemoteSource + ?Sized,
    C: CacheStore + ?Sized,
    P: Prompter + ?Sized,
{
    /// `remote` is `Err(reason)` when GitLab is not configured; only a
    /// cached run is possible then.
    pub fn new(
        remote: Result<&'a R, String>,
        cache: &'a C,
        prompter: &'a P,
        settings: PipelineSettings,
        group_scope: GroupScope,
        options: WizardOptions,
    ) -> Self {
        Self {
            remote,
            cache,
            prompter,
            settings,
            group_scope,
            options,
        }
    }

    /// Drive the stages from `Init` to `Data` and produce the table.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<WizardOutcome, WizardError> {
        let mut stage = Stage::Init {
            last_run: self.previous_run()?,
        };
        loop {
            debug!(?stage, "wizard stage");
            stage = match stage {
                Stage::Init { last_run } => self.leave_init(last_run).await?,
                Stage::Select { groups } => self.select_project(groups).await?,
                Stage::Data { source } => return self.produce(source, now).await,
            };
        }
    }

    /// An unreadable cache only blocks loading it; a fresh run replaces it.
    fn previous_run(&self) -> Result<Option<DateTime<Utc>>, WizardError> {
        match self.cache.has_previous_run() {
            Ok(last_run) => Ok(last_run),
            Err(err @ (CacheError::Corrupt { .. } | CacheError::Io { .. }))
                if self.options.mode != Some(RunMode::LoadCached) =>
            {
                warn!(error = %err, "ignoring unreadable cache");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn remote(&self) -> Result<&'a R, WizardError> {
        match &self.remote {
            Ok(remote) => Ok(*remote),
            Err(reason) => Err(WizardError::RemoteUnavailable(reason.clone())),
        }
    }

    async fn leave_init(&self, last_run: Option<DateTime<Utc>>) -> Result<Stage, WizardError> {
        let mode = match (self.options.mode, last_run) {
            (Some(RunMode::LoadCached), None) => return Err(CacheError::NotFound.into()),
            (Some(mode), _) => mode,
            (None, Some(last_run)) => {
                self.prompter.notice(&format!(
                    "Last run: {}",
                    last_run.format("%Y-%m-%d %H:%M:%S UTC")
                ));
                let options = vec![LOAD_PREVIOUS.to_string(), RERUN.to_string()];
                match self.prompter.select("Choose an option", options).await? {
                    0 => RunMode::LoadCached,
                    _ => RunMode::Rerun,
                }
            }
            (None, None) => {
                self.prompter
                    .notice("No previous run found. Data will be fetched.");
                RunMode::Rerun
            }
        };

        match mode {
            RunMode::LoadCached => Ok(Stage::Data {
                source: DataSource::Cached,
            }),
            RunMode::Rerun => match self.options.project_id {
                Some(project_id) => Ok(Stage::Data {
                    source: DataSource::Fresh {
                        project_id,
                        label: format!("project {project_id}"),
                    },
                }),
                None => {
                    let groups = self.remote()?.list_groups(self.group_scope).await?;
                    if groups.is_empty() {
                        return Err(WizardError::NothingToSelect("groups".to_string()));
                    }
                    Ok(Stage::Select { groups })
                }
            },
        }
    }

    /// Group, then optionally a subgroup, then a project.
    async fn select_project(&self, groups: Vec<Group>) -> Result<Stage, WizardError> {
        let remote = self.remote()?;

        let names = groups.iter().map(group_label).collect();
        let group = &groups[self.prompter.select("Group", names).await?];

        let subgroups = remote.list_subgroups(group.id).await?;
        let target = if subgroups.is_empty() {
            group.clone()
        } else {
            let mut names = vec![format!("{} (group itself)", group.name)];
            names.extend(subgroups.iter().map(group_label));
            match self.prompter.select("Subgroup", names).await? {
                0 => group.clone(),
                i => subgroups[i - 1].clone(),
            }
        };

        let projects = remote.list_projects(target.id).await?;
        if projects.is_empty() {
            return Err(WizardError::NothingToSelect(format!(
                "projects in {}",
                target.name
            )));
        }
        let names = projects.iter().map(project_label).collect();
        let project = &projects[self.prompter.select("Project", names).await?];
        info!(project_id = project.id, project = %project.name, "selected project");

        Ok(Stage::Data {
            source: DataSource::Fresh {
                project_id: project.id,
                label: project_label(project),
            },
        })
    }

    async fn produce(
        &self,
        source: DataSource,
        now: DateTime<Utc>,
    ) -> Result<WizardOutcome, WizardError> {
        match source {
            DataSource::Cached => {
                let table = self.cache.load_last()?;
                let meta = self.cache.last_run()?;
                info!(rows = table.len(), formula = ?meta.map(|m| m.formula), "loaded cached run");
                Ok(WizardOutcome {
                    table,
                    source: DataSource::Cached,
                    produced_at: meta.map_or(now, |m| m.last_run),
                    formula: meta.map_or(self.settings.formula, |m| m.formula),
                })
            }
            DataSource::Fresh { project_id, label } => {
                let table =
                    pipeline::build_table(self.remote()?, project_id, &self.settings, now).await?;
                let produced_at = self.cache.save(&table, self.settings.formula)?;
                Ok(WizardOutcome {
                    table,
                    source: DataSource::Fresh { project_id, label },
                    produced_at,
                    formula: self.settings.formula,
                })
            }
        }
    }
}

fn group_label(group: &Group) -> String {
    group.full_path.clone().unwrap_or_else(|| group.name.clone())
}

fn project_label(project: &Project) -> String {
    project
        .path_with_namespace
        .clone()
        .unwrap_or_else(|| project.name.clone())
}
