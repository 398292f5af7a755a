//! Daily completion rule.
//!
//! A check-in fires at most once per cooldown window, and only once the
//! user has spent enough time in the app on the current calendar day while
//! the campaign is still running.

use crate::clock::{MS_PER_DAY, MS_PER_HOUR};
use crate::storage::SessionConfig;

/// Thresholds for the daily check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckinRules {
    pub cooldown_ms: i64,
    pub min_daily_seconds: i64,
    /// Number of campaign days; valid indices are `0..campaign_days`.
    pub campaign_days: i64,
}

impl Default for CheckinRules {
    fn default() -> Self {
        Self {
            cooldown_ms: 22 * MS_PER_HOUR,
            min_daily_seconds: 180,
            campaign_days: 14,
        }
    }
}

impl From<&SessionConfig> for CheckinRules {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            cooldown_ms: cfg.checkin_cooldown_hours as i64 * MS_PER_HOUR,
            min_daily_seconds: cfg.min_daily_seconds,
            campaign_days: cfg.campaign_days,
        }
    }
}

/// Outcome of evaluating the check-in rule at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinDecision {
    Eligible { day_index: i64 },
    CampaignNotStarted,
    OutsideWindow { day_index: i64 },
    CooldownActive { remaining_ms: i64 },
    BelowThreshold { daily_seconds: i64 },
}

impl CheckinDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, CheckinDecision::Eligible { .. })
    }
}

/// Zero-based campaign day for `now_ms`; `None` if the campaign has no start.
pub fn campaign_day_index(campaign_start_ms: i64, now_ms: i64) -> Option<i64> {
    if campaign_start_ms <= 0 {
        return None;
    }
    Some((now_ms - campaign_start_ms).div_euclid(MS_PER_DAY))
}

impl CheckinRules {
    pub fn evaluate(
        &self,
        now_ms: i64,
        last_checkin_ms: i64,
        daily_seconds: i64,
        campaign_start_ms: i64,
    ) -> CheckinDecision {
        let Some(day_index) = campaign_day_index(campaign_start_ms, now_ms) else {
            return CheckinDecision::CampaignNotStarted;
        };
        if day_index < 0 || day_index >= self.campaign_days {
            return CheckinDecision::OutsideWindow { day_index };
        }

        let since_last = now_ms - last_checkin_ms;
        if since_last < self.cooldown_ms {
            return CheckinDecision::CooldownActive {
                remaining_ms: self.cooldown_ms - since_last,
            };
        }

        if daily_seconds < self.min_daily_seconds {
            return CheckinDecision::BelowThreshold { daily_seconds };
        }

        CheckinDecision::Eligible { day_index }
    }
}
