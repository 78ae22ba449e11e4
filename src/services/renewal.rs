//! Renewal date policy

use chrono::{Duration, NaiveDate};

use crate::error::RenewalError;

/// Default loan period in days, offered as the pre-filled renewal date
pub const DEFAULT_LOAN_DAYS: i64 = 14;

/// Furthest a due date may be set from today, in days
pub const MAX_RENEWAL_DAYS: i64 = 21;

/// Decides whether a proposed due date is acceptable.
///
/// Both bounds are inclusive: a date equal to today or exactly
/// three weeks ahead is accepted.
#[derive(Debug, Clone, Copy)]
pub struct RenewalPolicy {
    pub default_period: Duration,
    pub max_window: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            default_period: Duration::days(DEFAULT_LOAN_DAYS),
            max_window: Duration::days(MAX_RENEWAL_DAYS),
        }
    }
}

impl RenewalPolicy {
    pub fn validate(&self, proposed: NaiveDate, today: NaiveDate) -> Result<NaiveDate, RenewalError> {
        if proposed < today {
            return Err(RenewalError::PastDate);
        }
        if proposed > today + self.max_window {
            return Err(RenewalError::TooFarAhead);
        }
        Ok(proposed)
    }

    pub fn proposed_due_back(&self, today: NaiveDate) -> NaiveDate {
        today + self.default_period
    }
}
