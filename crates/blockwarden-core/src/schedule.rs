//! Weekly blocking windows and boundary scheduling.
//!
//! Pure functions over local wall-clock time: given an instant and the
//! configured weekly windows, decide whether blocking is active and when the
//! decision can next change. No state, no I/O -- the controller owns both.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One recurring weekly blocking interval.
///
/// `start <= end` is a same-day interval `[start, end)`. `start > end` wraps
/// past midnight and is active when the minute-of-day is at or after `start`
/// or strictly before `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    /// 0 = Sunday .. 6 = Saturday
    pub day: u8,
    /// "HH:MM", 24h local time
    pub start: String,
    /// "HH:MM"
    pub end: String,
}

/// Parse "HH:MM" into minutes since midnight. Malformed input yields `None`.
pub fn minute_of_day(hhmm: &str) -> Option<u32> {
    let (h, m) = hhmm.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// True iff any window matches `now`'s weekday and minute-of-day.
///
/// Windows with malformed times never match.
pub fn is_within_any_window(now: NaiveDateTime, windows: &[BlockWindow]) -> bool {
    let day = now.weekday().num_days_from_sunday() as u8;
    let minutes = now.hour() * 60 + now.minute();
    windows.iter().any(|w| {
        if w.day != day {
            return false;
        }
        let (Some(start), Some(end)) = (minute_of_day(&w.start), minute_of_day(&w.end)) else {
            return false;
        };
        if start <= end {
            minutes >= start && minutes < end
        } else {
            minutes >= start || minutes < end
        }
    })
}

/// The earliest window start or end instant strictly after `now`.
///
/// Scans day offsets 0..=7 so that a wraparound window anchored on the
/// current weekday is caught a full week out. With no windows at all,
/// returns `now + 24h` so the caller always has a re-check instant.
pub fn next_boundary_after(now: NaiveDateTime, windows: &[BlockWindow]) -> NaiveDateTime {
    let mut best: Option<NaiveDateTime> = None;
    for offset in 0..=7i64 {
        let date = now.date() + Duration::days(offset);
        let day = date.weekday().num_days_from_sunday() as u8;
        for w in windows.iter().filter(|w| w.day == day) {
            for mins in [minute_of_day(&w.start), minute_of_day(&w.end)]
                .into_iter()
                .flatten()
            {
                let candidate = date.and_time(NaiveTime::MIN) + Duration::minutes(mins as i64);
                if candidate > now && best.map_or(true, |b| candidate < b) {
                    best = Some(candidate);
                }
            }
        }
    }
    best.unwrap_or(now + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn window(day: u8, start: &str, end: &str) -> BlockWindow {
        BlockWindow {
            day,
            start: start.into(),
            end: end.into(),
        }
    }

    #[test]
    fn parses_and_rejects_times() {
        assert_eq!(minute_of_day("09:30"), Some(570));
        assert_eq!(minute_of_day("00:00"), Some(0));
        assert_eq!(minute_of_day("23:59"), Some(1439));
        assert_eq!(minute_of_day("24:00"), None);
        assert_eq!(minute_of_day("12:60"), None);
        assert_eq!(minute_of_day("nope"), None);
        assert_eq!(minute_of_day(""), None);
    }

    #[test]
    fn same_day_window_is_half_open() {
        // 2026-08-03 is a Monday (weekday 1).
        let windows = [window(1, "09:00", "17:00")];
        assert!(!is_within_any_window(at(2026, 8, 3, 8, 59), &windows));
        assert!(is_within_any_window(at(2026, 8, 3, 9, 0), &windows));
        assert!(is_within_any_window(at(2026, 8, 3, 16, 59), &windows));
        assert!(!is_within_any_window(at(2026, 8, 3, 17, 0), &windows));
        // Same minutes, wrong weekday.
        assert!(!is_within_any_window(at(2026, 8, 4, 10, 0), &windows));
    }

    #[test]
    fn overnight_window_wraps_midnight() {
        let windows = [window(1, "22:00", "06:00")];
        assert!(is_within_any_window(at(2026, 8, 3, 23, 30), &windows));
        assert!(is_within_any_window(at(2026, 8, 3, 0, 30), &windows));
        assert!(is_within_any_window(at(2026, 8, 3, 5, 59), &windows));
        assert!(!is_within_any_window(at(2026, 8, 3, 6, 0), &windows));
        assert!(!is_within_any_window(at(2026, 8, 3, 21, 59), &windows));
    }

    #[test]
    fn malformed_window_never_matches() {
        let windows = [window(1, "9am", "17:00")];
        assert!(!is_within_any_window(at(2026, 8, 3, 10, 0), &windows));
    }

    #[test]
    fn boundary_is_end_of_current_window() {
        let windows = [window(1, "09:00", "17:00")];
        let next = next_boundary_after(at(2026, 8, 3, 10, 0), &windows);
        assert_eq!(next, at(2026, 8, 3, 17, 0));
    }

    #[test]
    fn boundary_skips_to_next_week_when_today_is_done() {
        let windows = [window(1, "09:00", "17:00")];
        let next = next_boundary_after(at(2026, 8, 3, 18, 0), &windows);
        assert_eq!(next, at(2026, 8, 10, 9, 0));
    }

    #[test]
    fn boundary_without_windows_falls_back_to_24h() {
        let now = at(2026, 8, 3, 10, 0);
        assert_eq!(next_boundary_after(now, &[]), now + Duration::days(1));
    }

    #[test]
    fn boundary_at_exact_start_moves_to_end() {
        let windows = [window(1, "09:00", "17:00")];
        let next = next_boundary_after(at(2026, 8, 3, 9, 0), &windows);
        assert_eq!(next, at(2026, 8, 3, 17, 0));
    }

    proptest! {
        #[test]
        fn within_matches_minute_interval(
            day in 0u8..7,
            start_min in 0u32..1440,
            end_min in 0u32..1440,
            probe_day in 0u8..7,
            probe_min in 0u32..1440,
        ) {
            let fmt = |m: u32| format!("{:02}:{:02}", m / 60, m % 60);
            let windows = [window(day, &fmt(start_min), &fmt(end_min))];
            // 2026-08-02 is a Sunday; offset by weekday to probe any day.
            let base = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap() + Duration::days(probe_day as i64);
            let now = base.and_time(NaiveTime::MIN) + Duration::minutes(probe_min as i64);

            let expected = probe_day == day && if start_min <= end_min {
                probe_min >= start_min && probe_min < end_min
            } else {
                probe_min >= start_min || probe_min < end_min
            };
            prop_assert_eq!(is_within_any_window(now, &windows), expected);
        }

        #[test]
        fn boundary_is_future_and_tight(
            day in 0u8..7,
            start_min in 0u32..1440,
            end_min in 0u32..1440,
            probe_min in 0u32..(1440 * 7),
        ) {
            let fmt = |m: u32| format!("{:02}:{:02}", m / 60, m % 60);
            let windows = [window(day, &fmt(start_min), &fmt(end_min))];
            let base = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
            let now = base.and_time(NaiveTime::MIN) + Duration::minutes(probe_min as i64);

            let next = next_boundary_after(now, &windows);
            prop_assert!(next > now);

            // No boundary instant falls strictly between now and next.
            for offset in 0..=7i64 {
                let date = now.date() + Duration::days(offset);
                if date.weekday().num_days_from_sunday() as u8 != day {
                    continue;
                }
                for mins in [start_min, end_min] {
                    let instant = date.and_time(NaiveTime::MIN) + Duration::minutes(mins as i64);
                    prop_assert!(!(instant > now && instant < next));
                }
            }
        }
    }
}
