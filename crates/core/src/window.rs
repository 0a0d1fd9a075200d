// crates/core/src/window.rs
//! Daily submission windows anchored to a session's cycle anchor.
//!
//! Window `i` covers `[anchor + i·DAY, anchor + (i+1)·DAY)`. Everything here is
//! a pure function of the anchor and a caller-supplied `now`; nothing is
//! cached, so missed-window counts can never drift from the stored segments.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};

/// Length of one submission window.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Delay after a window's end before it can be reported as missed.
pub const GRACE_MS: i64 = 15 * 60 * 1000;

/// A half-open `[start, end)` interval in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Build a window, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Whole days elapsed between `anchor` and `at`, or `-1` before the anchor.
fn buckets_between(anchor: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let elapsed = (at - anchor).num_milliseconds();
    if elapsed >= 0 {
        elapsed / DAY_MS
    } else {
        -1
    }
}

fn day_offset(anchor: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let ms = days.checked_mul(DAY_MS)?;
    anchor.checked_add_signed(TimeDelta::try_milliseconds(ms)?)
}

/// The day schedule of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSchedule {
    anchor: DateTime<Utc>,
    segments_expected: i64,
}

impl CycleSchedule {
    pub fn new(anchor: DateTime<Utc>, segments_expected: i64) -> Self {
        Self {
            anchor,
            segments_expected,
        }
    }

    pub fn anchor(&self) -> DateTime<Utc> {
        self.anchor
    }

    pub fn segments_expected(&self) -> i64 {
        self.segments_expected
    }

    /// Window for day `day`. `None` only if the instant overflows chrono's range.
    pub fn window(&self, day: u32) -> Option<Window> {
        let start = day_offset(self.anchor, i64::from(day))?;
        let end = day_offset(self.anchor, i64::from(day) + 1)?;
        Some(Window { start, end })
    }

    /// Whole days elapsed since the anchor at `at` (no grace), `-1` before it.
    pub fn buckets_passed(&self, at: DateTime<Utc>) -> i64 {
        buckets_between(self.anchor, at)
    }

    /// The next window to open after `now`.
    ///
    /// Before the anchor this is window 0 itself. Uses the un-graced `now`.
    pub fn next_window(&self, now: DateTime<Utc>) -> Option<Window> {
        let k = self.buckets_passed(now);
        let start = if k >= 0 {
            day_offset(self.anchor, k + 1)?
        } else {
            self.anchor
        };
        let end = day_offset(start, 1)?;
        Some(Window { start, end })
    }

    /// Latest day whose window has fully ended, after subtracting the grace
    /// period from `now`, capped at the last expected day.
    pub fn latest_ended_day(&self, now: DateTime<Utc>) -> i64 {
        let graced = now - TimeDelta::milliseconds(GRACE_MS);
        let buckets = buckets_between(self.anchor, graced);
        (self.segments_expected - 1).min(buckets - 1)
    }

    /// Count of days in `[1, latest_ended_day]` with no data-bearing segment.
    ///
    /// Day 0 is the join day and is never reported as missed.
    pub fn missed_windows(&self, now: DateTime<Utc>, fulfilled: &BTreeSet<u32>) -> u32 {
        let latest = self.latest_ended_day(now);
        if latest < 1 {
            return 0;
        }
        let latest = u32::try_from(latest).unwrap_or(u32::MAX);
        (1..=latest).filter(|day| !fulfilled.contains(day)).count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    fn days(n: i64) -> TimeDelta {
        TimeDelta::milliseconds(n * DAY_MS)
    }

    fn minutes(n: i64) -> TimeDelta {
        TimeDelta::minutes(n)
    }

    #[test]
    fn test_window_zero_starts_at_anchor() {
        let schedule = CycleSchedule::new(t0(), 5);
        let w = schedule.window(0).unwrap();
        assert_eq!(w.start, t0());
        assert_eq!(w.end, t0() + days(1));
        assert_eq!(w.duration(), days(1));
    }

    #[test]
    fn test_window_is_half_open() {
        let w = CycleSchedule::new(t0(), 5).window(2).unwrap();
        assert!(w.contains(t0() + days(2)));
        assert!(!w.contains(t0() + days(3)));
    }

    #[test]
    fn test_window_new_rejects_inverted() {
        assert!(Window::new(t0(), t0()).is_none());
        assert!(Window::new(t0() + days(1), t0()).is_none());
        assert!(Window::new(t0(), t0() + minutes(1)).is_some());
    }

    #[test]
    fn test_buckets_before_anchor() {
        let schedule = CycleSchedule::new(t0(), 5);
        assert_eq!(schedule.buckets_passed(t0() - minutes(1)), -1);
        assert_eq!(schedule.buckets_passed(t0()), 0);
        assert_eq!(schedule.buckets_passed(t0() + days(1) - minutes(1)), 0);
        assert_eq!(schedule.buckets_passed(t0() + days(1)), 1);
    }

    #[test]
    fn test_next_window_before_anchor_is_window_zero() {
        let schedule = CycleSchedule::new(t0(), 5);
        let next = schedule.next_window(t0() - days(2)).unwrap();
        assert_eq!(next, schedule.window(0).unwrap());
    }

    #[test]
    fn test_next_window_inside_day_two() {
        let schedule = CycleSchedule::new(t0(), 5);
        let next = schedule.next_window(t0() + days(2) + minutes(30)).unwrap();
        assert_eq!(next, schedule.window(3).unwrap());
    }

    #[test]
    fn test_next_window_ignores_grace() {
        // One minute into day 3: the next window is day 4 even though the
        // graced clock still sits in day 2.
        let schedule = CycleSchedule::new(t0(), 10);
        let next = schedule.next_window(t0() + days(3) + minutes(1)).unwrap();
        assert_eq!(next.start, t0() + days(4));
    }

    #[test]
    fn test_missed_scenario_day_one_skipped() {
        // Days 0 and 2 submitted, day 1 skipped, now = T0 + 3 days + 1 min.
        // Graced clock is T0 + 3d - 14min, so two whole days have passed and
        // the latest ended day is 1.
        let schedule = CycleSchedule::new(t0(), 5);
        let now = t0() + days(3) + minutes(1);
        let fulfilled: BTreeSet<u32> = [0, 2].into_iter().collect();

        assert_eq!(schedule.buckets_passed(now), 3);
        assert_eq!(schedule.latest_ended_day(now), 1);
        assert_eq!(schedule.missed_windows(now, &fulfilled), 1);
    }

    #[test]
    fn test_missed_after_grace_expires() {
        let schedule = CycleSchedule::new(t0(), 5);
        let fulfilled: BTreeSet<u32> = [0, 2].into_iter().collect();

        // 16 minutes past the end of day 2: day 2 has ended but was fulfilled.
        let now = t0() + days(3) + minutes(16);
        assert_eq!(schedule.latest_ended_day(now), 2);
        assert_eq!(schedule.missed_windows(now, &fulfilled), 1);

        // Past day 3's end + grace with nothing for day 3.
        let now = t0() + days(4) + minutes(16);
        assert_eq!(schedule.missed_windows(now, &fulfilled), 2);
    }

    #[test]
    fn test_day_zero_never_missed() {
        let schedule = CycleSchedule::new(t0(), 5);
        let now = t0() + days(2) + minutes(20);
        // Nothing submitted at all; only day 1 can be missed.
        assert_eq!(schedule.missed_windows(now, &BTreeSet::new()), 1);
    }

    #[test]
    fn test_missed_capped_at_expected_days() {
        let schedule = CycleSchedule::new(t0(), 3);
        let now = t0() + days(30);
        assert_eq!(schedule.latest_ended_day(now), 2);
        assert_eq!(schedule.missed_windows(now, &BTreeSet::new()), 2);
    }

    #[test]
    fn test_missed_inside_grace_period() {
        let schedule = CycleSchedule::new(t0(), 5);
        // Day 1 ended 10 minutes ago: still inside the grace period.
        let now = t0() + days(2) + minutes(10);
        assert_eq!(schedule.missed_windows(now, &BTreeSet::new()), 0);
    }

    #[test]
    fn test_single_day_schedule_never_misses() {
        let schedule = CycleSchedule::new(t0(), 1);
        assert_eq!(schedule.missed_windows(t0() + days(100), &BTreeSet::new()), 0);
    }

    proptest! {
        #[test]
        fn prop_windows_are_contiguous_and_disjoint(day in 0u32..20_000, offset_ms in -DAY_MS * 365..DAY_MS * 365) {
            let anchor = t0() + TimeDelta::milliseconds(offset_ms);
            let schedule = CycleSchedule::new(anchor, 30);
            let w = schedule.window(day).unwrap();
            let next = schedule.window(day + 1).unwrap();
            prop_assert_eq!(w.start, anchor + days(i64::from(day)));
            prop_assert_eq!(w.duration(), days(1));
            prop_assert_eq!(w.end, next.start);
            prop_assert!(!next.contains(w.start));
            prop_assert!(!w.contains(next.start));
        }

        #[test]
        fn prop_missed_zero_until_two_buckets(elapsed_ms in -DAY_MS..2 * DAY_MS + GRACE_MS, expected in 1i64..40) {
            let schedule = CycleSchedule::new(t0(), expected);
            let now = t0() + TimeDelta::milliseconds(elapsed_ms);
            let graced_buckets = schedule.buckets_passed(now - TimeDelta::milliseconds(GRACE_MS));
            prop_assert!(graced_buckets <= 1);
            prop_assert_eq!(schedule.missed_windows(now, &BTreeSet::new()), 0);
        }

        #[test]
        fn prop_missed_never_exceeds_expected(elapsed_days in 0i64..400, expected in 1i64..60) {
            let schedule = CycleSchedule::new(t0(), expected);
            let now = t0() + days(elapsed_days);
            let missed = schedule.missed_windows(now, &BTreeSet::new());
            prop_assert!(i64::from(missed) <= (expected - 1).max(0));
        }
    }
}
