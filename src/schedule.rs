//! Daily switch schedule
//!
//! Switch times are spread evenly over the day starting from the main time
//! and folded back onto a single calendar date, so `21:15` with three switches
//! gives `05:15`, `13:15` and `21:15`.

use crate::config::TIME_FORMAT;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;

const DAY_MICROS: i64 = 86_400_000_000;

/// Switch times on `date`, sorted
pub fn switch_times(main: NaiveTime, switches: u32, date: NaiveDate) -> Vec<NaiveDateTime> {
    let switches = switches.max(1);
    let interval = TimeDelta::microseconds(DAY_MICROS / i64::from(switches));

    let mut times: Vec<NaiveDateTime> = (0..switches)
        .map(|i| {
            let (time, _) = main.overflowing_add_signed(interval * i as i32);
            date.and_time(time)
        })
        .collect();
    times.sort();
    times
}

/// The next switch after a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextSwitch {
    pub at: NaiveDateTime,
    pub tomorrow: bool,
}

impl fmt::Display for NextSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.at.format(TIME_FORMAT))?;
        if self.tomorrow {
            f.write_str(" (tomorrow)")?;
        }
        Ok(())
    }
}

/// Earliest switch strictly after `now`, or the first one tomorrow
pub fn next_switch(main: NaiveTime, switches: u32, now: NaiveDateTime) -> NextSwitch {
    let today = switch_times(main, switches, now.date());
    if let Some(at) = today.iter().find(|t| **t > now) {
        return NextSwitch { at: *at, tomorrow: false };
    }

    let tomorrow = now.date().checked_add_days(Days::new(1)).unwrap_or(now.date());
    let first = switch_times(main, switches, tomorrow)
        .first()
        .copied()
        .unwrap_or_else(|| tomorrow.and_time(main));
    NextSwitch { at: first, tomorrow: true }
}

/// Switch that fell due in `(since, now]`, if any
pub fn due_between(
    main: NaiveTime,
    switches: u32,
    since: NaiveDateTime,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if now <= since {
        return None;
    }

    let mut date = since.date();
    while date <= now.date() {
        if let Some(due) = switch_times(main, switches, date)
            .into_iter()
            .find(|t| *t > since && *t <= now)
        {
            return Some(due);
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    None
}

/// Remembers the last check so every switch fires once
#[derive(Debug, Clone)]
pub struct Scheduler {
    main: NaiveTime,
    switches: u32,
    last_check: NaiveDateTime,
}

impl Scheduler {
    pub fn new(main: NaiveTime, switches: u32, now: NaiveDateTime) -> Self {
        Self { main, switches, last_check: now }
    }

    /// Advance to `now`, returning the switch that fell due since the last tick
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let due = due_between(self.main, self.switches, self.last_check, now);
        if now > self.last_check {
            self.last_check = now;
        }
        due
    }

    pub fn next(&self, now: NaiveDateTime) -> NextSwitch {
        next_switch(self.main, self.switches, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, TIME_FORMAT).unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn formatted(times: &[NaiveDateTime]) -> Vec<String> {
        times.iter().map(|t| t.format(TIME_FORMAT).to_string()).collect()
    }

    #[test]
    fn test_switch_times_wrap_onto_one_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let times = switch_times(time("21:15"), 3, date);
        assert_eq!(formatted(&times), vec!["05:15", "13:15", "21:15"]);
        assert!(times.iter().all(|t| t.date() == date));
    }

    #[test]
    fn test_single_switch() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(formatted(&switch_times(time("07:30"), 1, date)), vec!["07:30"]);
    }

    #[test]
    fn test_uneven_interval() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let times = switch_times(time("00:00"), 7, date);
        assert_eq!(times.len(), 7);
        assert_eq!(times[1].format("%H:%M:%S").to_string(), "03:25:42");
    }

    #[test]
    fn test_next_switch() {
        let next = next_switch(time("21:15"), 3, at("2024-03-01 10:00"));
        assert_eq!(next.to_string(), "13:15");
        assert!(!next.tomorrow);

        // Strictly after now
        let next = next_switch(time("21:15"), 3, at("2024-03-01 13:15"));
        assert_eq!(next.to_string(), "21:15");
    }

    #[test]
    fn test_next_switch_tomorrow() {
        let next = next_switch(time("21:15"), 3, at("2024-03-01 22:00"));
        assert_eq!(next.to_string(), "05:15 (tomorrow)");
        assert_eq!(next.at, at("2024-03-02 05:15"));
    }

    #[test]
    fn test_due_between() {
        let main = time("21:15");
        assert_eq!(
            due_between(main, 3, at("2024-03-01 13:00"), at("2024-03-01 13:15")),
            Some(at("2024-03-01 13:15"))
        );
        assert_eq!(due_between(main, 3, at("2024-03-01 13:15"), at("2024-03-01 13:16")), None);
        // Across midnight
        assert_eq!(
            due_between(main, 3, at("2024-03-01 22:00"), at("2024-03-02 05:30")),
            Some(at("2024-03-02 05:15"))
        );
    }

    #[test]
    fn test_scheduler_fires_once() {
        let mut scheduler = Scheduler::new(time("08:00"), 1, at("2024-03-01 07:58"));
        assert_eq!(scheduler.tick(at("2024-03-01 07:59")), None);
        assert_eq!(scheduler.tick(at("2024-03-01 08:00")), Some(at("2024-03-01 08:00")));
        assert_eq!(scheduler.tick(at("2024-03-01 08:01")), None);
        assert_eq!(scheduler.next(at("2024-03-01 08:01")).to_string(), "08:00 (tomorrow)");
    }
}
