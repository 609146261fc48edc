use super::types::FileChange;
use super::GitLabError;

/// Added and deleted line counts for one file or a whole merge request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub additions: u64,
    pub deletions: u64,
}

impl LineCounts {
    pub fn total(&self) -> u64 {
        self.additions + self.deletions
    }
}

impl std::ops::Add for LineCounts {
    type Output = LineCounts;

    fn add(self, other: LineCounts) -> LineCounts {
        LineCounts {
            additions: self.additions + other.additions,
            deletions: self.deletions + other.deletions,
        }
    }
}

/// Line counts for one changed file. Server-reported counts are used when
/// both are present, otherwise the diff body is counted.
pub fn file_line_counts(change: &FileChange) -> Result<LineCounts, GitLabError> {
    if let (Some(additions), Some(deletions)) = (change.additions, change.deletions) {
        return Ok(LineCounts {
            additions,
            deletions,
        });
    }
    count_diff_lines(&change.diff)
        .map_err(|reason| GitLabError::DiffParse(format!("{}: {}", change.path(), reason)))
}

/// Total lines changed across every file of a merge request.
pub fn total_lines_changed(changes: &[FileChange]) -> Result<u64, GitLabError> {
    let mut counts = LineCounts::default();
    for change in changes {
        counts = counts + file_line_counts(change)?;
    }
    Ok(counts.total())
}

/// Count added and deleted lines in the diff body GitLab returns per file.
///
/// The body starts at the first `@@ -a,b +c,d @@` header. Lines outside a
/// hunk (`---`/`+++` file headers, binary notices) are ignored, as is the
/// `\ No newline at end of file` marker.
pub fn count_diff_lines(raw_diff: &str) -> Result<LineCounts, String> {
    let mut counts = LineCounts::default();
    let mut in_hunk = false;

    for line in raw_diff.lines() {
        if line.starts_with("@@") {
            parse_hunk_header(line)?;
            in_hunk = true;
            continue;
        }

        if !in_hunk {
            continue;
        }

        if line.starts_with('+') {
            counts.additions += 1;
        } else if line.starts_with('-') {
            counts.deletions += 1;
        }
    }

    Ok(counts)
}

fn parse_hunk_header(line: &str) -> Result<(u64, u64, u64, u64), String> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| "Invalid hunk header".to_string())?;
    // Anything after the closing @@ is section context (e.g. a function name)
    let header = header
        .split_once("@@")
        .map(|(ranges, _)| ranges)
        .unwrap_or(header)
        .trim();
    let mut parts = header.split_whitespace();
    let old_part = parts.next().ok_or_else(|| "Missing old range".to_string())?;
    let new_part = parts.next().ok_or_else(|| "Missing new range".to_string())?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;

    Ok((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str, prefix: char) -> Result<(u64, u64), String> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| format!("Invalid range prefix in {}", part))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str
        .parse::<u64>()
        .map_err(|_| format!("Invalid range start in {}", part))?;
    let count = count_str
        .parse::<u64>()
        .map_err(|_| format!("Invalid range count in {}", part))?;
    Ok((start, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = "@@ -1,5 +1,7 @@ fn main() {\n \
fn main() {\n\
-    println!(\"old\");\n\
+    println!(\"new\");\n\
+    // Added a comment\n \
}\n";

    fn change(diff: &str) -> FileChange {
        FileChange {
            old_path: Some("src/main.rs".to_string()),
            new_path: Some("src/main.rs".to_string()),
            diff: diff.to_string(),
            additions: None,
            deletions: None,
        }
    }

    #[test]
    fn test_count_single_hunk() {
        let counts = count_diff_lines(SAMPLE_DIFF).unwrap();
        assert_eq!(counts.additions, 2);
        assert_eq!(counts.deletions, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_count_new_file() {
        let diff = "--- /dev/null\n+++ b/new_file.txt\n@@ -0,0 +1,2 @@\n+hello\n+world\n";
        let counts = count_diff_lines(diff).unwrap();
        assert_eq!(counts, LineCounts { additions: 2, deletions: 0 });
    }

    #[test]
    fn test_count_deleted_file_with_no_newline_marker() {
        let diff = "@@ -1,2 +0,0 @@\n-hello\n-world\n\\ No newline at end of file\n";
        let counts = count_diff_lines(diff).unwrap();
        assert_eq!(counts, LineCounts { additions: 0, deletions: 2 });
    }

    #[test]
    fn test_count_multiple_hunks() {
        let diff = "@@ -1 +1 @@\n-a\n+b\n@@ -10,2 +10,3 @@ impl Foo {\n x\n+y\n+z\n";
        let counts = count_diff_lines(diff).unwrap();
        assert_eq!(counts, LineCounts { additions: 3, deletions: 1 });
    }

    #[test]
    fn test_empty_and_binary_diffs() {
        assert_eq!(count_diff_lines("").unwrap(), LineCounts::default());
        assert_eq!(
            count_diff_lines("Binary files a/logo.png and b/logo.png differ\n").unwrap(),
            LineCounts::default()
        );
    }

    #[test]
    fn test_malformed_hunk_header() {
        assert!(count_diff_lines("@@ -x,1 +1 @@\n+a\n").is_err());
        assert!(count_diff_lines("@@ 1,1 +1 @@\n+a\n").is_err());
    }

    #[test]
    fn test_reported_counts_take_precedence() {
        let mut reported = change(SAMPLE_DIFF);
        reported.additions = Some(40);
        reported.deletions = Some(2);
        assert_eq!(file_line_counts(&reported).unwrap().total(), 42);
    }

    #[test]
    fn test_total_lines_changed_sums_files() {
        let changes = vec![change(SAMPLE_DIFF), change("@@ -0,0 +1 @@\n+x\n")];
        assert_eq!(total_lines_changed(&changes).unwrap(), 4);
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = total_lines_changed(&[change("@@ garbage @@\n")]).unwrap_err();
        assert!(err.to_string().contains("src/main.rs"));
    }
}
