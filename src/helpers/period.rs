use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// Label of the calendar month containing `date`, e.g. `Mar-2024`.
///
/// Month names come from chrono's fixed English table, not the process locale.
pub fn period_label(date: NaiveDate) -> String {
    date.format("%b-%Y").to_string()
}

/// Any day of the month before the one containing `date`.
pub fn previous_month(date: NaiveDate) -> Result<NaiveDate> {
    date.with_day(1)
        .and_then(|first| first.pred_opt())
        .with_context(|| format!("Failed to compute month before {}", date))
}

/// The whole calendar day before `now` in `now`'s timezone, as an inclusive
/// UTC window from 00:00:00 to 23:59:59.999999999.
pub fn yesterday_window<Tz: TimeZone>(now: &DateTime<Tz>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let today = now.date_naive();
    let yesterday = today
        .pred_opt()
        .with_context(|| format!("Failed to compute day before {}", today))?;

    let start = start_of_day(&now.timezone(), yesterday)?;
    let end = start_of_day(&now.timezone(), today)? - Duration::nanoseconds(1);

    Ok((start, end))
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .context("Failed to set hour, minute, and second")?;
    let local = tz
        .from_local_datetime(&midnight)
        .earliest()
        .with_context(|| format!("Failed to resolve local midnight of {}", day))?;

    Ok(local.with_timezone(&Utc))
}
