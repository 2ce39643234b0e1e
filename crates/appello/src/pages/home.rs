use axum::extract::{Query, State};
use axum::response::Html;
use maud::{html, Markup};
use serde::Deserialize;

use super::{month_bounds, parse_date, render, today};
use crate::permissions::Resource;
use crate::server::{or_notice, AppError, CurrentSession, SharedState};
use crate::types::{AttendanceStatus, DailySummary, StudentTally};

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    date: Option<String>,
}

/// Daily overview for staff, a short welcome for everyone else.
pub async fn index(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, AppError> {
    let mut chrome = current.chrome(&state).await;

    if !current.session.can(Resource::Dashboard) {
        let role = current.session.role().map(|r| r.as_str()).unwrap_or("guest");
        let content = html! {
            p { "You're logged in as a " (role) "." }
        };
        return Ok(render("Welcome", &chrome, content));
    }

    let date = parse_date(query.date.as_deref()).unwrap_or_else(today);
    let day = date.format("%Y-%m-%d").to_string();
    let month = date.format("%B %Y").to_string();
    let (first, last) = month_bounds(date);
    let (start, end) = (
        first.format("%Y-%m-%d").to_string(),
        last.format("%Y-%m-%d").to_string(),
    );

    let backend = current.backend(&state);
    let (summary, absentees, perfect) = tokio::join!(
        backend.daily_summary(&day),
        backend.top_absentees(&start, &end),
        backend.perfect_attendance(&start, &end),
    );
    let summary = or_notice(summary, "Failed to fetch attendance data.", &mut chrome.notices)?;
    let absentees = or_notice(absentees, "Failed to fetch attendance data.", &mut chrome.notices)?;
    let perfect = or_notice(perfect, "Failed to fetch attendance data.", &mut chrome.notices)?;
    chrome.notices.dedup();

    let content = html! {
        form.filters method="get" action="/" {
            label { "Date" input type="date" name="date" value=(day); }
            button type="submit" { "Show" }
        }
        (summary_cards(&summary))
        h2 { "Top absentees in " (month) }
        (tally_table(&absentees, "Absences", "No absences this month."))
        h2 { "Perfect attendance in " (month) }
        (tally_table(&perfect, "Days present", "No students with perfect attendance yet."))
    };
    Ok(render("Daily Attendance", &chrome, content))
}

fn summary_cards(summary: &DailySummary) -> Markup {
    html! {
        div.cards {
            @for status in AttendanceStatus::ALL {
                div.card {
                    div { (status.as_str()) }
                    div.value { (summary.count(status)) }
                }
            }
        }
    }
}

fn tally_table(rows: &[StudentTally], count_label: &str, empty: &str) -> Markup {
    html! {
        @if rows.is_empty() {
            (crate::html::empty_state(empty))
        } @else {
            table {
                thead { tr { th { "Student" } th { (count_label) } } }
                tbody {
                    @for row in rows {
                        tr { td { (row.full_name) } td { (row.count) } }
                    }
                }
            }
        }
    }
}
