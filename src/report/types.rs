use serde::{Deserialize, Serialize};

use crate::gitlab::MergeRequest;

/// Titles longer than this many characters are cut and suffixed with "..."
pub const TITLE_LIMIT: usize = 40;

/// Whether anyone is assigned to a merge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentState {
    Assigned,
    Unassigned,
}

impl std::fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentState::Assigned => write!(f, "Assigned"),
            AssignmentState::Unassigned => write!(f, "Unassigned"),
        }
    }
}

/// One line of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Merge request iid
    pub id: u64,
    /// Possibly truncated title
    pub title: String,
    pub url: String,
    pub assignment_state: AssignmentState,
    /// Comma-joined display names, or "-"
    pub assignee_names: String,
    pub score: f64,
}

impl ScoreRow {
    pub fn new(mr: &MergeRequest, score: f64) -> Self {
        let (assignment_state, assignee_names) = if mr.assignees.is_empty() {
            (AssignmentState::Unassigned, "-".to_string())
        } else {
            let names: Vec<&str> = mr.assignees.iter().map(|a| a.name.as_str()).collect();
            (AssignmentState::Assigned, names.join(", "))
        };

        Self {
            id: mr.iid,
            title: truncate_title(&mr.title),
            url: mr.web_url.clone(),
            assignment_state,
            assignee_names,
            score,
        }
    }
}

/// Cut a title to [`TITLE_LIMIT`] characters plus "..." when it is longer.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_LIMIT {
        let head: String = title.chars().take(TITLE_LIMIT).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

/// Rows in the order the API returned the merge requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    pub rows: Vec<ScoreRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<ScoreRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::tests::sample_merge_request;
    use crate::gitlab::Assignee;

    fn assignee(name: &str) -> Assignee {
        Assignee {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_title_of_exactly_limit_is_kept() {
        let title = "a".repeat(40);
        assert_eq!(truncate_title(&title), title);
    }

    #[test]
    fn test_title_over_limit_is_truncated() {
        let title = "b".repeat(41);
        let truncated = truncate_title(&title);
        assert_eq!(truncated, format!("{}...", "b".repeat(40)));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let title = "é".repeat(41);
        assert_eq!(truncate_title(&title).chars().count(), 43);
        assert_eq!(truncate_title(&"é".repeat(40)), "é".repeat(40));
    }

    #[test]
    fn test_assigned_row() {
        let mut mr = sample_merge_request(4, "Fix flaky test");
        mr.assignees = vec![assignee("Alice"), assignee("Bob")];
        let row = ScoreRow::new(&mr, 0.5);
        assert_eq!(row.assignee_names, "Alice, Bob");
        assert_eq!(row.assignment_state, AssignmentState::Assigned);
        assert_eq!(row.assignment_state.to_string(), "Assigned");
        assert_eq!(row.id, 4);
    }

    #[test]
    fn test_unassigned_row() {
        let mr = sample_merge_request(5, "Bump deps");
        let row = ScoreRow::new(&mr, 0.25);
        assert_eq!(row.assignee_names, "-");
        assert_eq!(row.assignment_state.to_string(), "Unassigned");
        assert_eq!(row.url, mr.web_url);
    }

    #[test]
    fn test_table_serializes_as_plain_array() {
        let mr = sample_merge_request(1, "x");
        let table = ResultTable::new(vec![ScoreRow::new(&mr, 0.1)]);
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["assignment_state"], "Unassigned");
    }
}
