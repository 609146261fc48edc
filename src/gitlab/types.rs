use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A group (or subgroup) as returned by `/groups` and `/groups/:id/subgroups`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_path: Option<String>,
}

/// A project as returned by `/groups/:id/projects`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
}

/// Merge request state. Unknown values (e.g. `locked`) are passed through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MergeRequestState {
    Opened,
    Merged,
    Closed,
    Other(String),
}

impl From<String> for MergeRequestState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "opened" => MergeRequestState::Opened,
            "merged" => MergeRequestState::Merged,
            "closed" => MergeRequestState::Closed,
            _ => MergeRequestState::Other(value),
        }
    }
}

impl std::fmt::Display for MergeRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeRequestState::Opened => write!(f, "opened"),
            MergeRequestState::Merged => write!(f, "merged"),
            MergeRequestState::Closed => write!(f, "closed"),
            MergeRequestState::Other(other) => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Assignee {
    /// Display name
    pub name: String,
}

/// A merge request from `/projects/:id/merge_requests`.
/// Identified by `(project_id, iid)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped number shown in the UI (`!42`)
    pub iid: u64,
    pub project_id: u64,
    pub title: String,
    pub web_url: String,
    pub state: MergeRequestState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub assignees: Vec<Assignee>,
}

/// One changed file in a `/merge_requests/:iid/changes` response.
#[derive(Debug, Clone, Deserialize)]
pub struct FileChange {
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_path: Option<String>,
    /// Unified diff body for this file, starting at the first hunk header
    #[serde(default)]
    pub diff: String,
    /// Some GitLab versions report per-file counts directly
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
}

impl FileChange {
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("<unknown>")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestChanges {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub changes: Vec<FileChange>,
}

/// A note (comment) on a merge request.
#[derive(Debug, Clone, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub system: Option<bool>,
}

impl Note {
    /// System notes are generated by GitLab ("assigned to @x", "added 1 commit").
    pub fn is_system(&self) -> bool {
        self.system == Some(true)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// A minimal open merge request for tests in other modules.
    pub fn sample_merge_request(iid: u64, title: &str) -> MergeRequest {
        MergeRequest {
            iid,
            project_id: 7,
            title: title.to_string(),
            web_url: format!("https://gitlab.example.com/acme/api/-/merge_requests/{iid}"),
            state: MergeRequestState::Opened,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            merged_at: None,
            closed_at: None,
            assignees: vec![],
        }
    }

    #[test]
    fn test_deserialize_merge_request() {
        let json = r#"{
            "id": 311,
            "iid": 12,
            "project_id": 7,
            "title": "Add rate limiter",
            "web_url": "https://gitlab.example.com/acme/api/-/merge_requests/12",
            "state": "merged",
            "created_at": "2024-04-02T09:15:30.123Z",
            "merged_at": "2024-04-05T10:00:00.000+02:00",
            "closed_at": null,
            "assignees": [{"id": 3, "name": "Alice", "username": "alice"}]
        }"#;
        let mr: MergeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(mr.iid, 12);
        assert_eq!(mr.state, MergeRequestState::Merged);
        assert_eq!(
            mr.merged_at,
            Some(Utc.with_ymd_and_hms(2024, 4, 5, 8, 0, 0).unwrap())
        );
        assert!(mr.closed_at.is_none());
        assert_eq!(mr.assignees[0].name, "Alice");
    }

    #[test]
    fn test_null_assignees_and_unknown_state() {
        let json = r#"{
            "id": 1, "iid": 2, "project_id": 3,
            "title": "t", "web_url": "u",
            "state": "locked",
            "created_at": "2024-04-02T09:15:30Z",
            "assignees": null
        }"#;
        let mr: MergeRequest = serde_json::from_str(json).unwrap();
        assert!(mr.assignees.is_empty());
        assert_eq!(mr.state, MergeRequestState::Other("locked".to_string()));
        assert_eq!(mr.state.to_string(), "locked");
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let json = r#"{"id": 1, "iid": 2, "project_id": 3, "web_url": "u",
            "state": "opened", "created_at": "2024-04-02T09:15:30Z"}"#;
        assert!(serde_json::from_str::<MergeRequest>(json).is_err());
    }

    #[test]
    fn test_note_system_flag() {
        let notes: Vec<Note> =
            serde_json::from_str(r#"[{"id": 1, "system": true}, {"id": 2, "system": false}, {"id": 3}]"#)
                .unwrap();
        let flags: Vec<bool> = notes.iter().map(Note::is_system).collect();
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_file_change_path_prefers_new_path() {
        let change: FileChange =
            serde_json::from_str(r#"{"old_path": "a.rs", "new_path": "b.rs", "diff": ""}"#).unwrap();
        assert_eq!(change.path(), "b.rs");
        let deleted: FileChange = serde_json::from_str(r#"{"old_path": "a.rs"}"#).unwrap();
        assert_eq!(deleted.path(), "a.rs");
    }
}
