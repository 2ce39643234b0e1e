//! Request handlers and page markup, one module per screen family.

pub mod account;
pub mod attendance;
pub mod home;
pub mod manage;
pub mod reports;
pub mod schedules;
pub mod settings;

use axum::response::Html;
use chrono::{Datelike, Local, NaiveDate};
use maud::Markup;

use crate::html::{self, Chrome};

/// Wraps page content in the shared layout.
pub fn render(title: &str, chrome: &Chrome, content: Markup) -> Html<String> {
    Html(html::page(title, chrome, content).into_string())
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Parses a `YYYY-MM-DD` query value; blank or malformed values are ignored.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

/// First and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next_month.and_then(|d| d.pred_opt()).unwrap_or(date);
    (first, last)
}

/// Whole-day timestamp bounds for the attendance history endpoint.
pub fn day_range(from: NaiveDate, to: NaiveDate) -> (String, String) {
    (
        format!("{}T00:00:00.000Z", from.format("%Y-%m-%d")),
        format!("{}T23:59:59.999Z", to.format("%Y-%m-%d")),
    )
}

/// Trims a submitted form value, treating blank as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
