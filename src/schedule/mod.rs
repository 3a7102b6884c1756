//! Opening-hours view building
//!
//! Drugstores persist one row per weekday. Reads group those rows by identical
//! open/close times and this module turns each group into compact weekday
//! ranges ("MONDAY-FRIDAY 08:00-18:00") plus the list of days the drugstore
//! is closed. Everything here is pure and recomputed on every read.

mod time;
mod weekday;

pub use time::{normalize_time, parse_time_of_day, storage_time};
pub use weekday::{index_of, Weekday};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failures while building a drugstore's schedule view
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unknown weekday: {0:?}")]
    UnknownWeekday(String),
    #[error("invalid time format: {0:?}")]
    InvalidTimeFormat(String),
    #[error("schedule group has no weekdays")]
    EmptyScheduleGroup,
}

/// Raw schedule group as read from storage: weekdays sharing one open/close time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleGroup {
    pub weekdays: Vec<String>,
    pub open_time: String,
    pub close_time: String,
}

/// Contiguous weekday run within one group (`start == end` for a single day)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInterval {
    pub start: Weekday,
    pub end: Weekday,
}

impl fmt::Display for DayInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Normalized group with its compressed day ranges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSchedule {
    pub open_time: String,
    pub close_time: String,
    pub weekdays: Vec<Weekday>,
    pub day_intervals: Vec<DayInterval>,
}

impl fmt::Display for WorkSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<String> = self.day_intervals.iter().map(ToString::to_string).collect();
        write!(f, "{} {}-{}", ranges.join(", "), self.open_time, self.close_time)
    }
}

/// Schedule attached to every drugstore view returned by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub work_schedule: Vec<WorkSchedule>,
    pub closed_days: Vec<Weekday>,
}

/// Split a group's weekdays into maximal runs of adjacent days.
///
/// Runs never wrap from SUNDAY to MONDAY.
pub fn compress_weekdays(days: &[Weekday]) -> Result<Vec<DayInterval>, ScheduleError> {
    let mut days = days.to_vec();
    days.sort();
    days.dedup();

    let (&first, rest) = days.split_first().ok_or(ScheduleError::EmptyScheduleGroup)?;

    let mut intervals = Vec::new();
    let mut start = first;
    let mut prev = first;
    for &day in rest {
        if day.index() - prev.index() != 1 {
            intervals.push(DayInterval { start, end: prev });
            start = day;
        }
        prev = day;
    }
    intervals.push(DayInterval { start, end: prev });

    Ok(intervals)
}

/// Weekdays covered by none of the given open days, in weekly order
pub fn closed_days<'a, I>(open: I) -> Vec<Weekday>
where
    I: IntoIterator<Item = &'a Weekday>,
{
    let mut covered = [false; 7];
    for day in open {
        covered[day.index()] = true;
    }

    Weekday::ALL
        .into_iter()
        .filter(|day| !covered[day.index()])
        .collect()
}

/// Build the schedule view for one drugstore from its stored groups
pub fn assemble(groups: &[ScheduleGroup]) -> Result<ScheduleView, ScheduleError> {
    let mut work_schedule = Vec::with_capacity(groups.len());

    for group in groups {
        let mut weekdays = group
            .weekdays
            .iter()
            .map(|name| name.parse::<Weekday>())
            .collect::<Result<Vec<_>, _>>()?;
        weekdays.sort();
        weekdays.dedup();

        let day_intervals = compress_weekdays(&weekdays)?;

        work_schedule.push(WorkSchedule {
            open_time: normalize_time(&group.open_time)?,
            close_time: normalize_time(&group.close_time)?,
            weekdays,
            day_intervals,
        });
    }

    // Storage returns groups in time order; present them by first open day
    work_schedule.sort_by_key(|group| group.weekdays.first().copied());

    let closed_days = closed_days(work_schedule.iter().flat_map(|group| group.weekdays.iter()));

    Ok(ScheduleView {
        work_schedule,
        closed_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::schedule::Weekday::*;

    fn group(days: &[&str], open: &str, close: &str) -> ScheduleGroup {
        ScheduleGroup {
            weekdays: days.iter().map(|d| d.to_string()).collect(),
            open_time: open.to_string(),
            close_time: close.to_string(),
        }
    }

    fn interval(start: Weekday, end: Weekday) -> DayInterval {
        DayInterval { start, end }
    }

    #[test]
    fn test_contiguous_run_is_one_interval() {
        let runs: [&[Weekday]; 4] = [
            &[Monday, Tuesday, Wednesday, Thursday, Friday],
            &[Saturday, Sunday],
            &[Tuesday, Wednesday],
            &Weekday::ALL,
        ];
        for days in runs {
            let intervals = compress_weekdays(days).unwrap();
            assert_eq!(intervals, vec![interval(days[0], days[days.len() - 1])]);
        }
    }

    #[test]
    fn test_split_runs_in_weekly_order() {
        let intervals = compress_weekdays(&[Monday, Tuesday, Thursday, Saturday, Sunday]).unwrap();
        assert_eq!(
            intervals,
            vec![
                interval(Monday, Tuesday),
                interval(Thursday, Thursday),
                interval(Saturday, Sunday),
            ]
        );
    }

    #[test]
    fn test_unsorted_and_duplicate_days() {
        let intervals = compress_weekdays(&[Friday, Monday, Wednesday, Thursday, Monday]).unwrap();
        assert_eq!(intervals, vec![interval(Monday, Monday), interval(Wednesday, Friday)]);
    }

    #[test]
    fn test_sunday_monday_does_not_wrap() {
        let intervals = compress_weekdays(&[Sunday, Monday]).unwrap();
        assert_eq!(intervals, vec![interval(Monday, Monday), interval(Sunday, Sunday)]);
    }

    #[test]
    fn test_empty_group_fails() {
        assert_eq!(compress_weekdays(&[]), Err(ScheduleError::EmptyScheduleGroup));
        assert_eq!(
            assemble(&[group(&[], "08:00:00", "18:00:00")]),
            Err(ScheduleError::EmptyScheduleGroup)
        );
    }

    #[test]
    fn test_closed_days_complement() {
        let open = [Monday, Wednesday, Sunday];
        let closed = closed_days(open.iter());
        assert_eq!(closed, vec![Tuesday, Thursday, Friday, Saturday]);

        for day in Weekday::ALL {
            assert!(open.contains(&day) ^ closed.contains(&day));
        }
    }

    #[test]
    fn test_every_weekday_set() {
        for mask in 1u8..128 {
            let days: Vec<Weekday> = Weekday::ALL
                .into_iter()
                .filter(|d| mask & (1 << d.index()) != 0)
                .collect();
            let intervals = compress_weekdays(&days).unwrap();

            let runs = (0..7)
                .filter(|&i| mask & (1 << i) != 0 && (i == 0 || mask & (1 << (i - 1)) == 0))
                .count();
            assert_eq!(intervals.len(), runs, "mask {:07b}", mask);

            let mut expanded: Vec<Weekday> = Vec::new();
            for interval in &intervals {
                assert!(interval.start <= interval.end);
                expanded.extend(&Weekday::ALL[interval.start.index()..=interval.end.index()]);
            }
            assert_eq!(expanded, days, "mask {:07b}", mask);
            for pair in intervals.windows(2) {
                assert!(pair[1].start.index() > pair[0].end.index() + 1);
            }

            let closed = closed_days(days.iter());
            assert_eq!(closed.len() + days.len(), 7);
            assert!(closed.iter().all(|d| !days.contains(d)));
        }
    }

    #[test]
    fn test_no_groups_means_closed_all_week() {
        let view = assemble(&[]).unwrap();
        assert!(view.work_schedule.is_empty());
        assert_eq!(view.closed_days, Weekday::ALL.to_vec());
    }

    #[test]
    fn test_weekdays_block() {
        let view = assemble(&[group(
            &["MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY"],
            "08:00:00",
            "18:00:00",
        )])
        .unwrap();

        assert_eq!(view.work_schedule.len(), 1);
        let schedule = &view.work_schedule[0];
        assert_eq!(schedule.open_time, "08:00");
        assert_eq!(schedule.close_time, "18:00");
        assert_eq!(schedule.day_intervals, vec![interval(Monday, Friday)]);
        assert_eq!(view.closed_days, vec![Saturday, Sunday]);
        assert_eq!(schedule.to_string(), "MONDAY-FRIDAY 08:00-18:00");
    }

    #[test]
    fn test_alternate_days() {
        let view = assemble(&[group(&["MONDAY", "WEDNESDAY", "FRIDAY"], "09:00", "17:00")]).unwrap();
        assert_eq!(
            view.work_schedule[0].day_intervals,
            vec![
                interval(Monday, Monday),
                interval(Wednesday, Wednesday),
                interval(Friday, Friday),
            ]
        );
        assert_eq!(view.closed_days, vec![Tuesday, Thursday, Saturday, Sunday]);
    }

    #[test]
    fn test_single_day_group() {
        let view = assemble(&[group(&["SUNDAY"], "10:00", "14:00")]).unwrap();
        assert_eq!(view.work_schedule[0].day_intervals, vec![interval(Sunday, Sunday)]);
    }

    #[test]
    fn test_multiple_groups_ordered_by_first_day() {
        let view = assemble(&[
            group(&["SATURDAY"], "10:00:00", "14:00:00"),
            group(&["MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY"], "08:00:00", "20:00:00"),
        ])
        .unwrap();

        let firsts: Vec<_> = view.work_schedule.iter().map(|g| g.weekdays[0]).collect();
        assert_eq!(firsts, vec![Monday, Saturday]);
        assert_eq!(view.closed_days, vec![Sunday]);
    }

    #[test]
    fn test_malformed_input_errors() {
        assert_eq!(
            assemble(&[group(&["MONDAY"], "9", "17:00")]),
            Err(ScheduleError::InvalidTimeFormat("9".to_string()))
        );
        assert_eq!(
            assemble(&[group(&["MONDAY", "FUNDAY"], "09:00", "17:00")]),
            Err(ScheduleError::UnknownWeekday("FUNDAY".to_string()))
        );
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let groups = vec![
            group(&["FRIDAY", "MONDAY", "TUESDAY"], "08:00:00", "18:00:00"),
            group(&["SUNDAY"], "10:00:00", "13:00:00"),
        ];
        let snapshot = groups.clone();

        let first = assemble(&groups).unwrap();
        let second = assemble(&groups).unwrap();

        assert_eq!(first, second);
        assert_eq!(groups, snapshot);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = assemble(&[group(&["SATURDAY", "SUNDAY"], "10:00", "16:00")]).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "workSchedule": [{
                    "openTime": "10:00",
                    "closeTime": "16:00",
                    "weekdays": ["SATURDAY", "SUNDAY"],
                    "dayIntervals": [{"start": "SATURDAY", "end": "SUNDAY"}],
                }],
                "closedDays": ["MONDAY", "TUESDAY", "WEDNESDAY", "THURSDAY", "FRIDAY"],
            })
        );
    }
}
