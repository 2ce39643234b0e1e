//! Weekly view of a list of schedule entries.

use crate::types::{Schedule, Weekday};

/// Tab shown when there is nothing scheduled at all.
pub const DEFAULT_TAB: &str = "Monday";

/// Entries of one day, ordered by start time.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: String,
    pub entries: Vec<Schedule>,
}

/// Schedule entries bucketed by day in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSchedule {
    pub days: Vec<DayGroup>,
    pub initial_tab: String,
}

impl WeekSchedule {
    pub fn get(&self, day: &str) -> Option<&[Schedule]> {
        self.days
            .iter()
            .find(|g| g.day == day)
            .map(|g| g.entries.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn len(&self) -> usize {
        self.days.iter().map(|g| g.entries.len()).sum()
    }

    /// The requested tab if it exists, otherwise the initial one.
    pub fn active_tab<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(day) if self.get(day).is_some() => day,
            _ => &self.initial_tab,
        }
    }
}

/// Sort rank of a day bucket: Monday..Sunday, unknown labels last.
fn day_rank(label: &str) -> usize {
    Weekday::from_name(label)
        .map(|d| d as usize)
        .unwrap_or(Weekday::ALL.len())
}

/// Groups entries by weekday.
///
/// Entries keep their arrival order until sorted by `startTime`, which is
/// compared as a plain string: zero-padded `HH:MM` sorts chronologically and
/// anything else still gets a stable position instead of an error. Day labels
/// that aren't weekday names keep their own bucket after Sunday.
pub fn group_by_weekday(entries: impl IntoIterator<Item = Schedule>) -> WeekSchedule {
    let mut days: Vec<DayGroup> = Vec::new();

    for entry in entries {
        let day = match Weekday::from_name(&entry.weekday) {
            Some(weekday) => weekday.name().to_string(),
            None => entry.weekday.clone(),
        };
        match days.iter_mut().find(|g| g.day == day) {
            Some(group) => group.entries.push(entry),
            None => days.push(DayGroup {
                day,
                entries: vec![entry],
            }),
        }
    }

    for group in &mut days {
        group.entries.sort_by(|a, b| a.start_time.cmp(&b.start_time));
    }
    // Stable, so unknown labels stay in arrival order
    days.sort_by_key(|g| day_rank(&g.day));

    let initial_tab = days
        .first()
        .map(|g| g.day.clone())
        .unwrap_or_else(|| DEFAULT_TAB.to_string());

    WeekSchedule { days, initial_tab }
}

/// Formats `HH:MM` as a 12-hour clock time ("13:05" -> "1:05 PM").
///
/// Anything that doesn't parse is returned as is.
pub fn format_time(time: &str) -> String {
    match chrono::NaiveTime::parse_from_str(time.trim(), "%H:%M") {
        Ok(t) => t.format("%-I:%M %p").to_string(),
        Err(_) => time.to_string(),
    }
}
