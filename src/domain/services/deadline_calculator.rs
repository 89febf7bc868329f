//! Business-hours aware deadline arithmetic.
//!
//! Walks the calendar one day at a time, spending the requested minutes only
//! inside each day's open window. Holidays and closed weekdays consume no
//! time. The function is pure: no I/O, no shared state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::domain::entities::{BusinessHours, DayHours, HolidayEntry};
use crate::domain::errors::BusinessHoursError;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Extra loop iterations on top of one week per requested day, so that a
/// year of holidays still fits.
const ITERATION_HEADROOM: usize = 366;

/// Calculate the instant at which `minutes` of business time have elapsed
/// after `start`.
///
/// `timezone` is the resolved IANA zone for the calendar; when empty the
/// calendar's own timezone is used.
pub fn calculate_deadline(
    start: DateTime<Utc>,
    minutes: i64,
    business_hours: &BusinessHours,
    timezone: &str,
) -> Result<DateTime<Utc>, BusinessHoursError> {
    if minutes <= 0 {
        return Err(BusinessHoursError::InvalidDuration);
    }

    if business_hours.is_always_open {
        return Ok(start + Duration::minutes(minutes));
    }

    let tz_name = if timezone.trim().is_empty() {
        business_hours.timezone.as_deref().unwrap_or_default()
    } else {
        timezone
    };
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| BusinessHoursError::InvalidTimeZone(tz_name.to_string()))?;

    let schedule = parse_schedule(&business_hours.hours)?;
    let holidays = parse_holidays(&business_hours.holidays)?;
    let max_iterations = max_iterations(minutes);

    let mut current = start.with_timezone(&tz);
    let mut remaining = minutes;
    let mut iterations = 0usize;

    loop {
        iterations += 1;
        if iterations > max_iterations {
            return Err(BusinessHoursError::MaxIterationsExceeded(max_iterations));
        }

        let date = current.date_naive();

        if holidays.contains(&date) {
            current = start_of_next_day(&tz, date)?;
            continue;
        }

        let day = match schedule.get(&date.weekday()) {
            Some(day) if !day.closed_all_day => day,
            _ => {
                current = start_of_next_day(&tz, date)?;
                continue;
            }
        };

        let (open, close) = day_window(day)?;
        let window_start = local_instant(&tz, date, open)?;
        let window_end = local_instant(&tz, date, close)?;

        if current < window_start {
            current = window_start;
        }

        // Equality with the window end falls through with zero minutes available
        if current > window_end {
            current = start_of_next_day(&tz, date)?;
            continue;
        }

        let available = (window_end - current).num_minutes();
        if available > remaining {
            return Ok((current + Duration::minutes(remaining)).with_timezone(&Utc));
        }

        remaining -= available;
        current = start_of_next_day(&tz, date)?;
    }
}

/// One week of iterations per requested day plus headroom.
fn max_iterations(minutes: i64) -> usize {
    let days = minutes.saturating_add(MINUTES_PER_DAY - 1) / MINUTES_PER_DAY;
    usize::try_from(days)
        .unwrap_or(usize::MAX)
        .saturating_mul(7)
        .saturating_add(ITERATION_HEADROOM)
}

fn parse_schedule(hours_json: &str) -> Result<HashMap<Weekday, DayHours>, BusinessHoursError> {
    if hours_json.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let raw: HashMap<String, DayHours> = serde_json::from_str(hours_json)
        .map_err(|e| BusinessHoursError::InvalidData(format!("hours: {}", e)))?;

    raw.into_iter()
        .map(|(day, hours)| {
            day.parse::<Weekday>()
                .map(|weekday| (weekday, hours))
                .map_err(|_| BusinessHoursError::InvalidData(format!("unknown weekday: {}", day)))
        })
        .collect()
}

fn parse_holidays(holidays_json: &str) -> Result<HashSet<NaiveDate>, BusinessHoursError> {
    if holidays_json.trim().is_empty() {
        return Ok(HashSet::new());
    }

    let entries: Vec<HolidayEntry> = serde_json::from_str(holidays_json)
        .map_err(|e| BusinessHoursError::InvalidData(format!("holidays: {}", e)))?;

    entries
        .iter()
        .map(|entry| {
            NaiveDate::parse_from_str(entry.date(), "%Y-%m-%d").map_err(|_| {
                BusinessHoursError::InvalidData(format!("invalid holiday date: {}", entry.date()))
            })
        })
        .collect()
}

fn day_window(day: &DayHours) -> Result<(NaiveTime, NaiveTime), BusinessHoursError> {
    if day.open_all_day {
        return Ok((hms(0, 0, 0)?, hms(23, 59, 59)?));
    }
    Ok((parse_time_of_day(&day.open)?, parse_time_of_day(&day.close)?))
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, BusinessHoursError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| BusinessHoursError::InvalidTime(value.to_string()))
}

fn hms(hour: u32, minute: u32, second: u32) -> Result<NaiveTime, BusinessHoursError> {
    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| BusinessHoursError::InvalidTime(format!("{:02}:{:02}:{:02}", hour, minute, second)))
}

/// Wall-clock time on a calendar date in the zone, resolving DST folds to the
/// earlier instant and DST gaps to the first valid instant after them.
fn local_instant(
    tz: &Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<DateTime<Tz>, BusinessHoursError> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(instant) => Ok(instant),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .ok_or_else(|| BusinessHoursError::InvalidTime(naive.to_string())),
    }
}

fn start_of_next_day(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>, BusinessHoursError> {
    let next = date
        .succ_opt()
        .ok_or_else(|| BusinessHoursError::InvalidData(format!("date out of range: {}", date)))?;
    local_instant(tz, next, hms(0, 0, 0)?)
}
