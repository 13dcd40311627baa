//! Business-hours calendar.
//!
//! A weekly template of working days, each with one `[start, end)` window,
//! interpreted at a fixed UTC offset. Holidays remove whole days.

use std::collections::BTreeSet;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc, Weekday,
};

use crate::error::DeskError;

/// Weekly business-hours template plus holidays.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    workdays: Vec<Weekday>,
    start: NaiveTime,
    end: NaiveTime,
    holidays: BTreeSet<NaiveDate>,
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Create a calendar.
    ///
    /// # Errors
    ///
    /// Returns `DeskError::Config` if there are no working days or the daily
    /// window is empty.
    pub fn new(
        workdays: Vec<Weekday>,
        start: NaiveTime,
        end: NaiveTime,
        offset: FixedOffset,
    ) -> Result<Self, DeskError> {
        if workdays.is_empty() {
            return Err(DeskError::Config(
                "business hours need at least one working day".to_string(),
            ));
        }
        if start >= end {
            return Err(DeskError::Config(format!(
                "business day start {start} must be before end {end}"
            )));
        }

        Ok(Self {
            workdays,
            start,
            end,
            holidays: BTreeSet::new(),
            offset,
        })
    }

    /// Monday to Friday, 09:00 to 17:00 UTC.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            workdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            holidays: BTreeSet::new(),
            offset: Utc.fix(),
        }
    }

    /// Add holidays.
    #[must_use]
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    /// Whether a local date is a working day.
    #[must_use]
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        self.workdays.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Whether `instant` falls inside a business window.
    #[must_use]
    pub fn is_business_moment(&self, instant: DateTime<Utc>) -> bool {
        let local = self.to_local(instant);
        let time = local.time();
        self.is_business_day(local.date()) && time >= self.start && time < self.end
    }

    /// Add business minutes to `start`.
    ///
    /// Minutes are consumed only inside business windows. A start outside
    /// business hours is first moved to the next window start.
    #[must_use]
    pub fn add_business_minutes(&self, start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        self.add_business_time(start, Duration::minutes(minutes))
    }

    /// Add a span of business time to `start`.
    #[must_use]
    pub fn add_business_time(&self, start: DateTime<Utc>, amount: Duration) -> DateTime<Utc> {
        let mut remaining = amount.max(Duration::zero());
        let mut cursor = self.to_local(start);

        loop {
            let (from, until) = self.window_at_or_after(cursor);
            let available = until - from;

            // A window ending on the boundary rolls over so the result is
            // never the (non-business) end instant itself.
            if remaining < available || available <= Duration::zero() {
                return self.to_utc(from + remaining);
            }

            remaining = remaining - available;
            cursor = until;
        }
    }

    /// Whole business minutes elapsed between two instants.
    #[must_use]
    pub fn business_minutes_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        self.business_time_between(from, to).num_minutes()
    }

    /// Business time elapsed between two instants.
    #[must_use]
    pub fn business_time_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
        if to <= from {
            return Duration::zero();
        }

        let end = self.to_local(to);
        let mut cursor = self.to_local(from);
        let mut total = Duration::zero();

        loop {
            let (window_start, window_end) = self.window_at_or_after(cursor);
            if window_start >= end || window_end <= window_start {
                return total;
            }

            total = total + (window_end.min(end) - window_start);
            if window_end >= end {
                return total;
            }
            cursor = window_end;
        }
    }

    /// The business window containing `local`, or the next one after it,
    /// clipped so it starts no earlier than `local`.
    fn window_at_or_after(&self, local: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        let mut date = local.date();

        loop {
            if self.is_business_day(date) {
                let window_start = date.and_time(self.start);
                let window_end = date.and_time(self.end);
                if local < window_end {
                    return (local.max(window_start), window_end);
                }
            }

            match date.succ_opt() {
                Some(next) => date = next,
                None => return (local, local),
            }
        }
    }

    fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::standard()
    }
}
