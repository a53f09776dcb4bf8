//! Per-subject daily rate limiting
//!
//! Counts model-backed requests per `(calendar day, subject)`. The counter is
//! incremented before the threshold check, so a rejected request still
//! consumes capacity. Counters for days older than the retention window are
//! swept the first time a new day is seen.

use chrono::{Days, Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Counters {
    by_day: HashMap<(NaiveDate, i64), u32>,
    swept_on: Option<NaiveDate>,
}

/// Daily request limiter with an allow-list bypass
#[derive(Debug)]
pub struct RateLimiter {
    daily_limit: u32,
    bypass: HashSet<i64>,
    retention_days: u32,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    /// Create a limiter allowing `daily_limit` requests per subject per day
    ///
    /// # Arguments
    ///
    /// * `daily_limit` - Highest admitted count per day
    /// * `bypass` - Subjects that are always admitted
    /// * `retention_days` - How many past days of counters to keep
    #[must_use]
    pub fn new(daily_limit: u32, bypass: HashSet<i64>, retention_days: u32) -> Self {
        Self {
            daily_limit,
            bypass,
            retention_days,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Count a request for `subject_id` today and decide whether it may proceed
    pub fn check_and_increment(&self, subject_id: i64) -> bool {
        self.check_and_increment_on(subject_id, Local::now().date_naive())
    }

    /// Same as [`Self::check_and_increment`] for an explicit day.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use oxide_lingo_core::rate_limit::RateLimiter;
    /// use std::collections::HashSet;
    ///
    /// let limiter = RateLimiter::new(1, HashSet::new(), 2);
    /// let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// assert!(limiter.check_and_increment_on(7, day));
    /// assert!(!limiter.check_and_increment_on(7, day));
    /// ```
    pub fn check_and_increment_on(&self, subject_id: i64, today: NaiveDate) -> bool {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        if counters.swept_on != Some(today) {
            self.sweep(&mut counters, today);
        }

        let count = counters.by_day.entry((today, subject_id)).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;
        drop(counters);

        if self.bypass.contains(&subject_id) {
            return true;
        }

        let allowed = count <= self.daily_limit;
        if !allowed {
            warn!(
                "Rate limit exceeded for subject {subject_id}: {count}/{} today",
                self.daily_limit
            );
        }
        allowed
    }

    /// Requests counted for `subject_id` on `day`
    #[must_use]
    pub fn usage_on(&self, subject_id: i64, day: NaiveDate) -> u32 {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .by_day
            .get(&(day, subject_id))
            .copied()
            .unwrap_or(0)
    }

    /// Number of live `(day, subject)` counters
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.by_day.len()
    }

    fn sweep(&self, counters: &mut Counters, today: NaiveDate) {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(self.retention_days)))
            .unwrap_or(NaiveDate::MIN);
        let before = counters.by_day.len();
        counters.by_day.retain(|(day, _), _| *day > cutoff);
        counters.swept_on = Some(today);

        let evicted = before - counters.by_day.len();
        if evicted > 0 {
            debug!("Evicted {evicted} stale rate-limit counters");
        }
    }
}
