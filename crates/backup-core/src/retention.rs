//! Keep/delete decisions over a set of timestamped backups.
//!
//! Pure calendar arithmetic: the clock is an explicit argument and nothing
//! here touches the filesystem. Recent backups survive unconditionally for a
//! configurable number of days; beyond that, only backups taken on the
//! anchor weekday survive, up to a weekly quota, oldest culled first.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

use crate::archive::Archive;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Calendar days during which every backup is kept.
    pub daily_count: u32,
    /// Older backups kept at weekly cadence beyond the daily window.
    pub weekly_count: u32,
    /// Day of week that qualifies a backup for a weekly slot.
    pub weekly_anchor: Weekday,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            daily_count: 7,
            weekly_count: 4,
            weekly_anchor: Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionTier {
    WithinDailyWindow,
    WeeklyQuotaSlot,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionDecision {
    pub verdict: Verdict,
    pub tier: RetentionTier,
}

/// Decide the fate of every archive, one decision per input, same order.
///
/// `archives` must be sorted by `taken_at` descending (newest first), which
/// is how [`crate::ArchiveStore::list`] returns them. The daily cutoff is
/// calendar-date granular: a backup taken any time on a day strictly after
/// `now - daily_count` days is inside the window.
pub fn evaluate(
    archives: &[Archive],
    now: DateTime<Utc>,
    config: &RetentionConfig,
) -> Vec<RetentionDecision> {
    let daily_cutoff = (now - Duration::days(i64::from(config.daily_count))).date_naive();
    let mut weekly_spared = 0u32;

    archives
        .iter()
        .map(|archive| {
            let date = archive.taken_at.date_naive();
            if date > daily_cutoff {
                RetentionDecision {
                    verdict: Verdict::Keep,
                    tier: RetentionTier::WithinDailyWindow,
                }
            } else if date.weekday() == config.weekly_anchor && weekly_spared < config.weekly_count
            {
                weekly_spared += 1;
                RetentionDecision {
                    verdict: Verdict::Keep,
                    tier: RetentionTier::WeeklyQuotaSlot,
                }
            } else {
                RetentionDecision {
                    verdict: Verdict::Delete,
                    tier: RetentionTier::Expired,
                }
            }
        })
        .collect()
}
