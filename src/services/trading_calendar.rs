//! Trading Calendar
//!
//! Answers "is the market open on this day" questions for the technical
//! computation: stepping by trading days, counting them, finding weekly closes
//! and the most recent completed session.
//!
//! `NyseCalendar` covers the regular NYSE holiday schedule. One-off closures
//! (national days of mourning, weather) are not modelled.

use chrono::{Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

const MARKET_CLOSE_HOUR: u32 = 16;

pub trait TradingCalendar: Send + Sync {
    fn is_trading_day(&self, day: NaiveDate) -> bool;

    /// Most recent trading day whose session has closed.
    fn latest_trading_day(&self) -> NaiveDate;

    /// Moves `n` trading days forward (or back when negative). `day` itself does
    /// not have to be a trading day; `n == 0` returns it unchanged.
    ///
    /// Stops at the last representable date instead of overflowing.
    fn add_trading_days(&self, day: NaiveDate, n: i64) -> NaiveDate {
        let step = if n >= 0 { Duration::days(1) } else { Duration::days(-1) };
        let mut remaining = n.abs();
        let mut current = day;
        while remaining > 0 {
            match current.checked_add_signed(step) {
                Some(next) => current = next,
                None => break,
            }
            if self.is_trading_day(current) {
                remaining -= 1;
            }
        }
        current
    }

    /// Number of trading days in `[from, to]`, zero when `from > to`.
    fn trading_day_count(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        from.iter_days()
            .take_while(|day| *day <= to)
            .filter(|day| self.is_trading_day(*day))
            .count() as i64
    }

    /// True for the last trading day of an ISO week.
    fn is_weekly_close(&self, day: NaiveDate) -> bool {
        if !self.is_trading_day(day) {
            return false;
        }
        let next = self.add_trading_days(day, 1);
        next.iso_week() != day.iso_week()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NyseCalendar {
    as_of: Option<NaiveDate>,
}

impl NyseCalendar {
    /// Calendar whose latest trading day follows the wall clock in New York.
    pub fn new() -> Self {
        Self { as_of: None }
    }

    /// Calendar pinned to `day`: the latest trading day is the last one on or
    /// before it. Used for backfills and deterministic tests.
    pub fn as_of(day: NaiveDate) -> Self {
        Self { as_of: Some(day) }
    }

    fn last_trading_day_on_or_before(&self, day: NaiveDate) -> NaiveDate {
        if self.is_trading_day(day) {
            day
        } else {
            self.add_trading_days(day, -1)
        }
    }
}

impl TradingCalendar for NyseCalendar {
    fn is_trading_day(&self, day: NaiveDate) -> bool {
        !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) && !is_nyse_holiday(day)
    }

    fn latest_trading_day(&self) -> NaiveDate {
        if let Some(day) = self.as_of {
            return self.last_trading_day_on_or_before(day);
        }

        let now = Utc::now().with_timezone(&New_York);
        let today = now.date_naive();
        if self.is_trading_day(today) && now.hour() >= MARKET_CLOSE_HOUR {
            today
        } else {
            self.add_trading_days(today, -1)
        }
    }
}

fn is_nyse_holiday(day: NaiveDate) -> bool {
    let year = day.year();
    let mut holidays = Vec::with_capacity(10);

    // New Year's Day falling on a Saturday is not observed on the prior Friday.
    let new_year = ymd(year, 1, 1);
    if new_year.weekday() != Weekday::Sat {
        holidays.push(observed(new_year));
    }
    holidays.extend(nth_weekday(year, 1, Weekday::Mon, 3));
    holidays.extend(nth_weekday(year, 2, Weekday::Mon, 3));
    holidays.extend(easter_sunday(year).checked_sub_signed(Duration::days(2)));
    holidays.push(last_weekday(year, 5, Weekday::Mon));
    if year >= 2022 {
        holidays.push(observed(ymd(year, 6, 19)));
    }
    holidays.push(observed(ymd(year, 7, 4)));
    holidays.extend(nth_weekday(year, 9, Weekday::Mon, 1));
    holidays.extend(nth_weekday(year, 11, Weekday::Thu, 4));
    holidays.push(observed(ymd(year, 12, 25)));

    holidays.contains(&day)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    // Only called with fixed, valid month/day pairs.
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Weekend holidays move to the adjacent weekday.
fn observed(day: NaiveDate) -> NaiveDate {
    match day.weekday() {
        Weekday::Sat => day.pred_opt().unwrap_or(day),
        Weekday::Sun => day.succ_opt().unwrap_or(day),
        _ => day,
    }
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month = if month == 12 { ymd(year + 1, 1, 1) } else { ymd(year, month + 1, 1) };
    let mut day = next_month.pred_opt().unwrap_or(next_month);
    while day.weekday() != weekday {
        day -= Duration::days(1);
    }
    day
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}
