use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::gitlab::{GitLabError, MergeRequest, RemoteSource};
use crate::metrics::{self, MergeRequestMetrics};
use crate::report::types::{ResultTable, ScoreRow};
use crate::score::{ScoreFormula, Thresholds};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to list merge requests for project {project_id}: {source}")]
    ListMergeRequests {
        project_id: u64,
        #[source]
        source: GitLabError,
    },

    /// A per-merge-request call failed. Rows finished before it are kept.
    #[error("Run aborted at merge request !{mr_iid} after {} scored rows: {source}", .completed.len())]
    Aborted {
        mr_iid: u64,
        completed: ResultTable,
        #[source]
        source: GitLabError,
    },
}

/// Everything a run needs besides the project and the remote source.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub states: Vec<String>,
    pub thresholds: Thresholds,
    pub formula: ScoreFormula,
    /// Merge requests in flight at once (values below 1 are treated as 1)
    pub concurrency: usize,
}

/// Fetch, measure, and score every merge request of a project.
///
/// Rows come back in the order the API listed the merge requests. The diff
/// and notes calls of one merge request run together, and at most
/// `settings.concurrency` merge requests are processed at a time.
#[instrument(skip(source, settings), fields(states = ?settings.states, formula = ?settings.formula))]
pub async fn build_table<S>(
    source: &S,
    project_id: u64,
    settings: &PipelineSettings,
    now: DateTime<Utc>,
) -> Result<ResultTable, PipelineError>
where
    S: RemoteSource + ?Sized,
{
    let merge_requests = source
        .list_merge_requests(project_id, &settings.states)
        .await
        .map_err(|source| PipelineError::ListMergeRequests { project_id, source })?;
    info!(count = merge_requests.len(), "fetched merge requests");

    let mut scored = stream::iter(merge_requests.iter())
        .map(|mr| async move {
            score_merge_request(source, mr, settings, now)
                .await
                .map_err(|err| (mr.iid, err))
        })
        .buffered(settings.concurrency.max(1));

    let mut rows = Vec::with_capacity(merge_requests.len());
    while let Some(result) = scored.next().await {
        match result {
            Ok(row) => rows.push(row),
            Err((mr_iid, source)) => {
                warn!(mr_iid, completed = rows.len(), error = %source, "aborting run");
                return Err(PipelineError::Aborted {
                    mr_iid,
                    completed: ResultTable::new(rows),
                    source,
                });
            }
        }
    }

    info!(rows = rows.len(), "scored merge requests");
    Ok(ResultTable::new(rows))
}

/// Gather the three metrics of one merge request.
pub async fn collect_metrics<S>(
    source: &S,
    mr: &MergeRequest,
    now: DateTime<Utc>,
) -> Result<MergeRequestMetrics, GitLabError>
where
    S: RemoteSource + ?Sized,
{
    let (lines_changed, comments) = tokio::try_join!(
        source.diff_size(mr.project_id, mr.iid),
        source.non_system_comment_count(mr.project_id, mr.iid),
    )?;

    Ok(MergeRequestMetrics {
        age_days: metrics::age_in_days(mr, now),
        lines_changed,
        comments,
    })
}

async fn score_merge_request<S>(
    source: &S,
    mr: &MergeRequest,
    settings: &PipelineSettings,
    now: DateTime<Utc>,
) -> Result<ScoreRow, GitLabError>
where
    S: RemoteSource + ?Sized,
{
    let metrics = collect_metrics(source, mr, now).await?;
    let score = settings.formula.score(&metrics, &settings.thresholds);
    debug!(
        mr_iid = mr.iid,
        age_days = metrics.age_days,
        lines_changed = metrics.lines_changed,
        comments = metrics.comments,
        score,
        "scored merge request"
    );
    Ok(ScoreRow::new(mr, score))
}
