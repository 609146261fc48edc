use chrono::{DateTime, Utc};

use crate::gitlab::{MergeRequest, MergeRequestState};

/// The three inputs the score is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRequestMetrics {
    /// Whole days the merge request has been (or was) open, never negative
    pub age_days: i64,
    /// Added plus deleted lines across all changed files
    pub lines_changed: u64,
    /// Notes written by people, system notes excluded
    pub comments: u64,
}

/// The instant a merge request stopped aging.
///
/// Open merge requests age until `now`. Otherwise the merge timestamp wins
/// over the close timestamp, and `now` is the fallback when neither exists.
pub fn end_of_life(mr: &MergeRequest, now: DateTime<Utc>) -> DateTime<Utc> {
    if mr.state == MergeRequestState::Opened {
        return now;
    }
    mr.merged_at.or(mr.closed_at).unwrap_or(now)
}

/// Whole days between creation and end of life, floored at 0.
pub fn age_in_days(mr: &MergeRequest, now: DateTime<Utc>) -> i64 {
    let end = end_of_life(mr, now);
    (end - mr.created_at).num_days().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitlab::types::tests::sample_merge_request;
    use chrono::{Duration, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_opened_uses_now() {
        let mut mr = sample_merge_request(1, "Open");
        mr.created_at = at(2024, 3, 1, 12);
        // a stale merge timestamp must not stop an open MR from aging
        mr.merged_at = Some(at(2024, 3, 2, 0));
        assert_eq!(age_in_days(&mr, at(2024, 3, 11, 12)), 10);
        assert_eq!(age_in_days(&mr, at(2024, 3, 21, 12)), 20);
    }

    #[test]
    fn test_opened_age_grows_with_now() {
        let mut mr = sample_merge_request(1, "Open");
        mr.created_at = at(2024, 1, 1, 0);
        let mut previous = 0;
        for day in 0..90 {
            let age = age_in_days(&mr, mr.created_at + Duration::hours(day * 13));
            assert!(age >= previous);
            previous = age;
        }
        assert_eq!(previous, 48);
    }

    #[test]
    fn test_merged_age_is_fixed() {
        let mut mr = sample_merge_request(2, "Merged");
        mr.state = MergeRequestState::Merged;
        mr.created_at = at(2024, 5, 1, 9);
        mr.merged_at = Some(at(2024, 5, 8, 8));
        mr.closed_at = Some(at(2024, 6, 1, 0));
        // 6 days 23 hours is 6 whole days
        assert_eq!(age_in_days(&mr, at(2024, 7, 1, 0)), 6);
        assert_eq!(age_in_days(&mr, at(2030, 1, 1, 0)), 6);
    }

    #[test]
    fn test_closed_uses_close_timestamp() {
        let mut mr = sample_merge_request(3, "Closed");
        mr.state = MergeRequestState::Closed;
        mr.created_at = at(2024, 5, 1, 0);
        mr.closed_at = Some(at(2024, 5, 4, 0));
        assert_eq!(age_in_days(&mr, at(2024, 9, 1, 0)), 3);
    }

    #[test]
    fn test_unknown_state_without_timestamps_uses_now() {
        let mut mr = sample_merge_request(4, "Locked");
        mr.state = MergeRequestState::Other("locked".to_string());
        mr.created_at = at(2024, 5, 1, 0);
        assert_eq!(age_in_days(&mr, at(2024, 5, 6, 0)), 5);
    }

    #[test]
    fn test_age_never_negative() {
        let mut mr = sample_merge_request(5, "Clock skew");
        mr.state = MergeRequestState::Merged;
        mr.created_at = at(2024, 5, 10, 0);
        mr.merged_at = Some(at(2024, 5, 1, 0));
        assert_eq!(age_in_days(&mr, at(2024, 6, 1, 0)), 0);
    }
}
