use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, Redirect};
use chrono::NaiveDate;
use maud::{html, Markup};
use serde::Deserialize;
use tracing::{debug, info};

use super::{day_range, non_blank, parse_date, render, today};
use crate::filter::{visible_entities, RefField};
use crate::html::{empty_state, href, value_options};
use crate::permissions::Resource;
use crate::server::{finish_mutation, or_notice, AppError, CurrentSession, SharedState};
use crate::session::{AttendanceFilters, Notice};
use crate::types::{
    AttendancePayload, AttendanceRecord, AttendanceStatus, Id, RosterEntry, ATTENDANCE_CLASS_MODES,
};

#[derive(Debug, Default, Deserialize)]
pub struct AttendanceQuery {
    subject: Option<String>,
    section: Option<String>,
    date: Option<String>,
}

/// Query values win over the filters remembered in the session.
fn merge_filters(stored: &AttendanceFilters, query: &AttendanceQuery) -> AttendanceFilters {
    AttendanceFilters {
        subject: non_blank(&query.subject)
            .map(Id::from)
            .or_else(|| stored.subject.clone()),
        section: non_blank(&query.section)
            .map(Id::from)
            .or_else(|| stored.section.clone()),
        date: parse_date(query.date.as_deref()).or(stored.date),
    }
}

fn filters_link(filters: &AttendanceFilters, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d").to_string();
    href(
        "/attendance",
        &[
            ("subject", filters.subject.as_ref().map(Id::as_str).unwrap_or("")),
            ("section", filters.section.as_ref().map(Id::as_str).unwrap_or("")),
            ("date", &date),
        ],
    )
}

/// Roster for one subject, section and day.
pub async fn index(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<AttendanceQuery>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::Attendance)?;
    let mut chrome = current.chrome(&state).await;

    let filters = merge_filters(&current.session.attendance, &query);
    let remembered = filters.clone();
    state
        .sessions
        .update(&current.sid, |s| s.attendance = remembered)
        .await;
    let date = filters.date.unwrap_or_else(today);
    let day = date.format("%Y-%m-%d").to_string();

    let backend = current.backend(&state);
    let (subjects, sections) = tokio::join!(backend.subjects(), backend.sections());
    let subjects = or_notice(subjects, "Failed to load data.", &mut chrome.notices)?;
    let sections = or_notice(sections, "Failed to load data.", &mut chrome.notices)?;
    chrome.notices.dedup();

    let roster = match (&filters.subject, &filters.section) {
        (Some(subject), Some(section)) => {
            let roster = or_notice(
                backend.roster(subject, section, &day).await,
                "Failed to load attendance data.",
                &mut chrome.notices,
            )?;
            debug!(subject = %subject, section = %section, count = roster.students.len(), "Loaded roster");
            Some(roster.students)
        }
        _ => None,
    };

    let subject_choices = visible_entities(&subjects, &[], RefField::Subject, None);
    let section_choices = visible_entities(&sections, &[], RefField::Section, None);

    let content = html! {
        form.filters method="get" action="/attendance" {
            label {
                "Subject"
                select name="subject" {
                    option value="" { "Select subject" }
                    @for subject in &subject_choices {
                        option value=(subject.id.as_str()) selected[filters.subject.as_ref() == Some(&subject.id)] {
                            (subject.subject_name)
                        }
                    }
                }
            }
            label {
                "Section"
                select name="section" {
                    option value="" { "Select section" }
                    @for section in &section_choices {
                        option value=(section.id.as_str()) selected[filters.section.as_ref() == Some(&section.id)] {
                            (section.label())
                        }
                    }
                }
            }
            label { "Date" input type="date" name="date" value=(day); }
            button type="submit" { "Show" }
        }
        @if let Some(students) = &roster {
            @if students.is_empty() {
                (empty_state("No students found."))
            } @else {
                (roster_table(students, &day))
            }
        } @else {
            (empty_state("Select a subject and a section to take attendance."))
        }
    };
    Ok(render("Attendance", &chrome, content))
}

fn roster_table(students: &[RosterEntry], day: &str) -> Markup {
    let statuses: Vec<&str> = AttendanceStatus::ALL.iter().map(|s| s.as_str()).collect();
    html! {
        table {
            thead {
                tr {
                    th { "Student" }
                    th { "Class Mode" }
                    th { "Status" }
                    th { "Record" }
                }
            }
            tbody {
                @for student in students {
                    tr {
                        td { (student.full_name) }
                        td { (student.class_mode_label()) }
                        td { (student.attendance_status.map(|s| s.as_str()).unwrap_or("Not recorded")) }
                        td {
                            form.inline method="post" action=(format!("/attendance/{}", student.id)) {
                                input type="hidden" name="date" value=(day);
                                @if let Some(id) = &student.attendance_id {
                                    input type="hidden" name="attendanceID" value=(id.as_str());
                                }
                                @if let Some(id) = &student.schedule_id {
                                    input type="hidden" name="scheduleID" value=(id.as_str());
                                }
                                select name="status" required {
                                    (value_options(&statuses, student.attendance_status.map(|s| s.as_str()), Some("Status")))
                                }
                                select name="classMode" {
                                    (value_options(&ATTENDANCE_CLASS_MODES, student.class_mode.as_deref(), Some("Class mode")))
                                }
                                input type="text" name="remarks" placeholder="Remarks" value=(student.remarks.as_deref().unwrap_or(""));
                                button type="submit" { "Save" }
                            }
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordForm {
    status: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "attendanceID", default)]
    attendance_id: Option<String>,
    #[serde(rename = "scheduleID", default)]
    schedule_id: Option<String>,
    #[serde(rename = "classMode", default)]
    class_mode: Option<String>,
    #[serde(default)]
    remarks: Option<String>,
}

/// Creates or corrects one student's attendance for the day.
pub async fn record(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(student): Path<String>,
    Form(form): Form<RecordForm>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Attendance)?;
    let filters = &current.session.attendance;
    let date = parse_date(form.date.as_deref())
        .or(filters.date)
        .unwrap_or_else(today);
    let back = filters_link(filters, date);

    let Some(status) = AttendanceStatus::parse(&form.status) else {
        current
            .flash(&state, Notice::error("Please choose a valid status."))
            .await;
        return Ok(Redirect::to(&back));
    };

    let payload = AttendancePayload {
        status,
        student_id: Id::new(student),
        schedule_id: non_blank(&form.schedule_id).map(Id::from),
        date: date.format("%Y-%m-%d").to_string(),
        class_mode: non_blank(&form.class_mode).map(str::to_string),
        remarks: non_blank(&form.remarks).map(str::to_string),
    };

    let backend = current.backend(&state);
    let (result, success) = match non_blank(&form.attendance_id).map(Id::from) {
        Some(id) => (
            backend.update_attendance(&id, &payload).await,
            "Attendance updated successfully.",
        ),
        None => (
            backend.record_attendance(&payload).await.map(|created| {
                debug!(attendance = %created.id, "Attendance created");
            }),
            "Attendance created successfully.",
        ),
    };
    if result.is_ok() {
        info!(student = %payload.student_id, status = %payload.status, date = %payload.date, "Attendance saved");
    }
    finish_mutation(&state, &current, result, success, "Failed to save attendance.", &back).await
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    child: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

impl HistoryQuery {
    /// Requested range, defaulting to today; a reversed range is swapped.
    fn range(&self) -> (NaiveDate, NaiveDate) {
        let from = parse_date(self.from.as_deref()).unwrap_or_else(today);
        let to = parse_date(self.to.as_deref()).unwrap_or(from);
        if to < from {
            (to, from)
        } else {
            (from, to)
        }
    }
}

fn range_form(action: &str, from: NaiveDate, to: NaiveDate, extra: Markup) -> Markup {
    html! {
        form.filters method="get" action=(action) {
            (extra)
            label { "From" input type="date" name="from" value=(from.format("%Y-%m-%d").to_string()); }
            label { "To" input type="date" name="to" value=(to.format("%Y-%m-%d").to_string()); }
            button type="submit" { "Show" }
        }
    }
}

fn history_table(records: &[AttendanceRecord]) -> Markup {
    if records.is_empty() {
        return empty_state("No attendance records in this period.");
    }
    html! {
        table {
            thead {
                tr {
                    th { "Date" }
                    th { "Subject" }
                    th { "Status" }
                    th { "Class Mode" }
                    th { "Remarks" }
                }
            }
            tbody {
                @for record in records {
                    tr {
                        td {
                            @match record.day() {
                                Some(day) => (day.format("%Y-%m-%d").to_string()),
                                None => (record.date.as_deref().unwrap_or("-")),
                            }
                        }
                        td { (record.subject_name.as_deref().or(record.subject.as_deref()).unwrap_or("-")) }
                        td { (record.status.as_deref().unwrap_or("-")) }
                        td { (record.class_mode.as_deref().unwrap_or("-")) }
                        td { (record.remarks.as_deref().unwrap_or("")) }
                    }
                }
            }
        }
    }
}

/// The signed-in student's own attendance history.
pub async fn my_attendance(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<HistoryQuery>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::MyAttendance)?;
    let mut chrome = current.chrome(&state).await;

    let (from, to) = query.range();
    let (start, end) = day_range(from, to);
    let records = or_notice(
        current
            .backend(&state)
            .student_attendance(&current.session.user.id, &start, &end)
            .await,
        "Failed to fetch attendance.",
        &mut chrome.notices,
    )?;

    let content = html! {
        (range_form("/my-attendance", from, to, html! {}))
        (history_table(&records))
    };
    Ok(render("My Attendance", &chrome, content))
}

/// Attendance history of the signed-in parent's children.
pub async fn parent_attendance(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<HistoryQuery>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::ParentAttendance)?;
    let mut chrome = current.chrome(&state).await;
    let backend = current.backend(&state);

    let children = or_notice(
        backend.students_by_parent(&current.session.user.id).await,
        "Failed to load children list.",
        &mut chrome.notices,
    )?;

    // A single child is picked without asking
    let selected = match non_blank(&query.child) {
        Some(id) => children.iter().find(|c| c.id.as_str() == id),
        None if children.len() == 1 => children.first(),
        None => None,
    };

    let (from, to) = query.range();
    let records = match selected {
        Some(child) => {
            let (start, end) = day_range(from, to);
            Some(or_notice(
                backend.student_attendance(&child.id, &start, &end).await,
                "Failed to fetch attendance.",
                &mut chrome.notices,
            )?)
        }
        None => None,
    };

    let child_select = html! {
        label {
            "Child"
            select name="child" {
                option value="" { "Select child" }
                @for child in &children {
                    option value=(child.id.as_str()) selected[selected.map(|c| &c.id) == Some(&child.id)] {
                        (child.full_name())
                    }
                }
            }
        }
    };

    let content = html! {
        (range_form("/parent-attendance", from, to, child_select))
        @if let Some(records) = &records {
            (history_table(records))
        } @else if children.is_empty() {
            (empty_state("No children are linked to your account."))
        } @else {
            (empty_state("Select a child to see their attendance."))
        }
    };
    Ok(render("Child Attendance", &chrome, content))
}
