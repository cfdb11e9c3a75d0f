//! SLA clock: business-hours-aware deadline arithmetic.
//!
//! All deadlines are computed in UTC with minute granularity. The clock is a
//! pure function of `(start, hours, calendar)`: the same inputs always yield
//! the same deadline, which is what makes due dates reproducible in audit.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// Business calendar settings taken from a template or SLA configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    /// When false, deadlines are plain wall-clock offsets.
    pub business_hours_only: bool,
    /// First counted hour of the working day (0-23).
    pub start_hour: u32,
    /// First hour past the working day (1-24, exclusive).
    pub end_hour: u32,
    pub exclude_weekends: bool,
}

impl BusinessCalendar {
    /// Wall-clock calendar: every hour counts.
    #[must_use]
    pub fn wall_clock() -> Self {
        Self {
            business_hours_only: false,
            start_hour: 0,
            end_hour: 24,
            exclude_weekends: false,
        }
    }

    fn is_working_day(&self, date: chrono::NaiveDate) -> bool {
        if !self.exclude_weekends {
            return true;
        }
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn hours_valid(&self) -> bool {
        self.start_hour < 24 && self.end_hour >= 1 && self.end_hour <= 24
            && self.start_hour < self.end_hour
    }
}

/// Compute the deadline `hours` business hours after `start`.
///
/// With business hours disabled (or a degenerate hour range) this is a plain
/// `start + hours`. Otherwise the remaining budget is consumed minute by
/// working minute: time before the working day starts counting at
/// `start_hour`, time after it spills to the next working day, weekends are
/// skipped when excluded.
#[must_use]
pub fn compute_due_at(
    start: DateTime<Utc>,
    hours: i64,
    calendar: &BusinessCalendar,
) -> DateTime<Utc> {
    compute_deadline_minutes(start, hours.max(0) * 60, calendar)
}

/// Compute the warning timestamp at `percent` of the SLA budget.
///
/// Uses the same business-minutes walk as [`compute_due_at`], so the warning
/// always lands at or before the deadline.
#[must_use]
pub fn compute_warning_at(
    start: DateTime<Utc>,
    hours: i64,
    percent: i64,
    calendar: &BusinessCalendar,
) -> DateTime<Utc> {
    let minutes = hours.max(0) * 60 * percent.clamp(0, 100) / 100;
    compute_deadline_minutes(start, minutes, calendar)
}

fn compute_deadline_minutes(
    start: DateTime<Utc>,
    budget_minutes: i64,
    calendar: &BusinessCalendar,
) -> DateTime<Utc> {
    if !calendar.business_hours_only || !calendar.hours_valid() {
        return start + Duration::minutes(budget_minutes);
    }

    let mut remaining = budget_minutes;
    let mut cursor = start;

    loop {
        let date = cursor.date_naive();
        if !calendar.is_working_day(date) {
            cursor = match date.succ_opt() {
                Some(next) => at_hour(next, calendar.start_hour),
                None => return cursor + Duration::minutes(remaining),
            };
            continue;
        }

        let day_start = at_hour(date, calendar.start_hour);
        let day_end = at_hour(date, calendar.end_hour);

        if cursor < day_start {
            cursor = day_start;
        }
        if cursor >= day_end {
            cursor = match date.succ_opt() {
                Some(next) => at_hour(next, calendar.start_hour),
                None => return cursor + Duration::minutes(remaining),
            };
            continue;
        }

        let available = (day_end - cursor).num_minutes();
        if remaining <= available {
            return cursor + Duration::minutes(remaining);
        }
        remaining -= available;
        cursor = match date.succ_opt() {
            Some(next) => at_hour(next, calendar.start_hour),
            None => return day_end + Duration::minutes(remaining),
        };
    }
}

fn at_hour(date: chrono::NaiveDate, hour: u32) -> DateTime<Utc> {
    // end_hour == 24 means midnight of the following day.
    let (date, hour) = if hour >= 24 {
        match date.succ_opt() {
            Some(next) => (next, 0),
            None => (date, 23),
        }
    } else {
        (date, hour)
    };
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Duration of one pause window, clamped non-negative.
///
/// A resume timestamp behind the pause timestamp (clock skew, replayed
/// resume) counts as a zero-length pause rather than pulling deadlines
/// backward.
#[must_use]
pub fn paused_duration(paused_at: DateTime<Utc>, resumed_at: DateTime<Utc>) -> Duration {
    (resumed_at - paused_at).max(Duration::zero())
}

/// Shift a deadline forward by one paused duration.
///
/// Applied once per resume, this keeps the deadline equal to the original
/// deadline plus the sum of every paused duration accumulated so far.
#[must_use]
pub fn shifted_deadline(due: DateTime<Utc>, paused: Duration) -> DateTime<Utc> {
    due + paused.max(Duration::zero())
}

/// Check whether an instant falls within working hours.
#[must_use]
pub fn is_business_time(at: DateTime<Utc>, calendar: &BusinessCalendar) -> bool {
    if !calendar.business_hours_only || !calendar.hours_valid() {
        return true;
    }
    if !calendar.is_working_day(at.date_naive()) {
        return false;
    }
    let hour = at.hour();
    hour >= calendar.start_hour && hour < calendar.end_hour
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nine_to_five() -> BusinessCalendar {
        BusinessCalendar {
            business_hours_only: true,
            start_hour: 9,
            end_hour: 17,
            exclude_weekends: true,
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn wall_clock_is_plain_offset() {
        let start = utc(2025, 3, 7, 16, 0);
        assert_eq!(
            compute_due_at(start, 3, &BusinessCalendar::wall_clock()),
            utc(2025, 3, 7, 19, 0)
        );
    }

    #[test]
    fn friday_afternoon_spills_to_monday() {
        // 2025-03-07 is a Friday. 16:00 + 3 business hours: one hour left on
        // Friday, two more consumed Monday from 09:00, landing at 11:00.
        let start = utc(2025, 3, 7, 16, 0);
        assert_eq!(
            compute_due_at(start, 3, &nine_to_five()),
            utc(2025, 3, 10, 11, 0)
        );
    }

    #[test]
    fn start_before_working_day_snaps_forward() {
        let start = utc(2025, 3, 5, 6, 30);
        assert_eq!(
            compute_due_at(start, 2, &nine_to_five()),
            utc(2025, 3, 5, 11, 0)
        );
    }

    #[test]
    fn start_on_weekend_begins_monday() {
        // 2025-03-08 is a Saturday.
        let start = utc(2025, 3, 8, 12, 0);
        assert_eq!(
            compute_due_at(start, 4, &nine_to_five()),
            utc(2025, 3, 10, 13, 0)
        );
    }

    #[test]
    fn multi_day_budget_walks_working_days() {
        // 24 business hours at 8h/day from Monday 09:00 lands Thursday 09:00.
        let start = utc(2025, 3, 10, 9, 0);
        assert_eq!(
            compute_due_at(start, 24, &nine_to_five()),
            utc(2025, 3, 13, 9, 0)
        );
    }

    #[test]
    fn zero_hours_is_identity_within_working_hours() {
        let start = utc(2025, 3, 10, 10, 0);
        assert_eq!(compute_due_at(start, 0, &nine_to_five()), start);
    }

    #[test]
    fn deterministic_and_monotone_in_budget() {
        let start = utc(2025, 3, 7, 15, 15);
        let cal = nine_to_five();
        let mut prev = compute_due_at(start, 0, &cal);
        for hours in 1..=40 {
            let due = compute_due_at(start, hours, &cal);
            assert_eq!(due, compute_due_at(start, hours, &cal));
            assert!(due > prev, "budget {hours}h must push deadline forward");
            prev = due;
        }
    }

    #[test]
    fn warning_lands_at_or_before_due() {
        let start = utc(2025, 3, 7, 14, 0);
        let cal = nine_to_five();
        let due = compute_due_at(start, 16, &cal);
        let warning = compute_warning_at(start, 16, 80, &cal);
        assert!(warning <= due);
        assert!(warning > start);
    }

    #[test]
    fn warning_percent_scales_budget() {
        let start = utc(2025, 3, 10, 9, 0);
        let cal = nine_to_five();
        // 75% of 8 business hours is 6 hours.
        assert_eq!(
            compute_warning_at(start, 8, 75, &cal),
            utc(2025, 3, 10, 15, 0)
        );
    }

    #[test]
    fn end_hour_24_counts_until_midnight() {
        let cal = BusinessCalendar {
            business_hours_only: true,
            start_hour: 0,
            end_hour: 24,
            exclude_weekends: true,
        };
        // Friday 22:00 + 4h: 2h to midnight, weekend skipped, 2h into Monday.
        let start = utc(2025, 3, 7, 22, 0);
        assert_eq!(compute_due_at(start, 4, &cal), utc(2025, 3, 10, 2, 0));
    }

    #[test]
    fn degenerate_hours_fall_back_to_wall_clock() {
        let cal = BusinessCalendar {
            business_hours_only: true,
            start_hour: 17,
            end_hour: 9,
            exclude_weekends: true,
        };
        let start = utc(2025, 3, 7, 16, 0);
        assert_eq!(compute_due_at(start, 3, &cal), utc(2025, 3, 7, 19, 0));
    }

    #[test]
    fn resume_shifts_deadline_by_accumulated_pauses() {
        let due = utc(2025, 3, 14, 17, 0);
        let cycles = [
            (utc(2025, 3, 10, 10, 0), utc(2025, 3, 10, 12, 30)),
            (utc(2025, 3, 11, 9, 0), utc(2025, 3, 12, 9, 0)),
            (utc(2025, 3, 13, 16, 45), utc(2025, 3, 13, 17, 0)),
        ];

        let mut shifted = due;
        let mut total = Duration::zero();
        for (paused_at, resumed_at) in cycles {
            let pause = paused_duration(paused_at, resumed_at);
            shifted = shifted_deadline(shifted, pause);
            total = total + pause;
        }

        // Deadline after every resume equals the original plus the sum of
        // the paused durations.
        assert_eq!(
            total,
            Duration::minutes(150) + Duration::hours(24) + Duration::minutes(15)
        );
        assert_eq!(shifted, due + total);
    }

    #[test]
    fn skewed_resume_never_moves_deadline_backward() {
        let due = utc(2025, 3, 14, 17, 0);
        let pause = paused_duration(utc(2025, 3, 10, 12, 0), utc(2025, 3, 10, 11, 0));
        assert_eq!(pause, Duration::zero());
        assert_eq!(shifted_deadline(due, pause), due);
    }

    #[test]
    fn is_business_time_boundaries() {
        let cal = nine_to_five();
        assert!(is_business_time(utc(2025, 3, 10, 9, 0), &cal));
        assert!(is_business_time(utc(2025, 3, 10, 16, 59), &cal));
        assert!(!is_business_time(utc(2025, 3, 10, 17, 0), &cal));
        assert!(!is_business_time(utc(2025, 3, 8, 12, 0), &cal));
    }
}
