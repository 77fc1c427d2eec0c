//! Pentad calendar.
//!
//! Each month has six pentads starting on days 1, 6, 11, 16, 21 and 26. The
//! first five last five days; the sixth runs to the end of the month.

use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate};

use crate::filename::PENTADS_PER_YEAR;

/// Start and end date (inclusive) of a pentad of the year.
pub fn pentad_window(year: i32, pentad: u32) -> Result<(NaiveDate, NaiveDate)> {
    if !(1..=PENTADS_PER_YEAR).contains(&pentad) {
        return Err(anyhow!("pentad {} out of range", pentad));
    }

    let month = (pentad - 1) / 6 + 1;
    let start_day = (pentad_of_month(pentad) - 1) * 5 + 1;
    let start = NaiveDate::from_ymd_opt(year, month, start_day)
        .ok_or_else(|| anyhow!("invalid date {}-{}-{}", year, month, start_day))?;

    let end = if pentad_of_month(pentad) < 6 {
        start + Duration::days(4)
    } else {
        last_day_of_month(start)?
    };

    Ok((start, end))
}

/// Pentad of the month (1 to 6) for a pentad of the year.
pub fn pentad_of_month(pentad: u32) -> u32 {
    (pentad - 1) % 6 + 1
}

fn last_day_of_month(date: NaiveDate) -> Result<NaiveDate> {
    let (year, month) = match date.month() {
        12 => (date.year() + 1, 1),
        m => (date.year(), m + 1),
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| anyhow!("no month end for {}", date))
}

// -- Tests -------------------------------------------------------------------
