//! Source of "today" for due-date and overdue computations

use std::sync::{PoisonError, RwLock};

use chrono::{Duration, Local, NaiveDate};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the server
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and demos
#[derive(Debug)]
pub struct ManualClock {
    today: RwLock<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self { today: RwLock::new(today) }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.write().unwrap_or_else(PoisonError::into_inner) = today;
    }

    pub fn advance(&self, by: Duration) {
        let mut today = self.today.write().unwrap_or_else(PoisonError::into_inner);
        *today = *today + by;
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.read().unwrap_or_else(PoisonError::into_inner)
    }
}
