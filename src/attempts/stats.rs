//! Practice statistics over the attempt history.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::{AttemptStatus, AttemptSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeStats {
    pub total_attempts: usize,
    pub average_accuracy: u8,
    pub passed_count: usize,
    pub needs_review_count: usize,
    pub unique_surahs: usize,
    pub streak_days: u32,
    pub last_practice: Option<DateTime<Utc>>,
}

/// Aggregate the history as of `today` (UTC).
///
/// The streak counts consecutive practice days backwards from the latest
/// one, and is zero unless that day is today or yesterday.
pub fn compute_stats(attempts: &[AttemptSummary], today: NaiveDate) -> PracticeStats {
    if attempts.is_empty() {
        return PracticeStats {
            total_attempts: 0,
            average_accuracy: 0,
            passed_count: 0,
            needs_review_count: 0,
            unique_surahs: 0,
            streak_days: 0,
            last_practice: None,
        };
    }

    let total = attempts.len();
    let sum: u64 = attempts.iter().map(|a| a.accuracy as u64).sum();
    let average_accuracy = (sum as f64 / total as f64).round() as u8;

    let days: BTreeSet<NaiveDate> = attempts.iter().map(|a| a.created_at.date_naive()).collect();
    let mut streak_days = 0;
    if let Some(&latest) = days.iter().next_back() {
        if latest == today || latest == today - Duration::days(1) {
            let mut expected = latest;
            for day in days.iter().rev() {
                if *day != expected {
                    break;
                }
                streak_days += 1;
                expected = expected - Duration::days(1);
            }
        }
    }

    PracticeStats {
        total_attempts: total,
        average_accuracy,
        passed_count: attempts.iter().filter(|a| a.status == AttemptStatus::Passed).count(),
        needs_review_count: attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::NeedsReview)
            .count(),
        unique_surahs: attempts.iter().map(|a| a.surah_number).collect::<HashSet<_>>().len(),
        streak_days,
        last_practice: attempts.iter().map(|a| a.created_at).max(),
    }
}
