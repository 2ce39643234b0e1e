use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Redirect, Response};
use maud::{html, Markup};
use tracing::{info, warn};

use super::render;
use crate::api::ApiError;
use crate::filter::{visible_entities, RefField};
use crate::html::{empty_state, href, value_options};
use crate::permissions::Resource;
use crate::server::{or_notice, AppError, CurrentSession, SharedState};
use crate::session::{Notice, ReportFilters, Session};
use crate::types::{AttendanceRecord, QUARTERS};

const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportKind {
    /// Filtered by section.
    Subject,
    /// Filtered by a single student.
    Student,
}

impl ReportKind {
    fn title(self) -> &'static str {
        match self {
            ReportKind::Subject => "Subject-Based Attendance Overview",
            ReportKind::Student => "Student-Based Attendance Overview",
        }
    }

    fn path(self) -> &'static str {
        match self {
            ReportKind::Subject => "/reports/attendance",
            ReportKind::Student => "/reports/students",
        }
    }

    fn filename(self) -> &'static str {
        match self {
            ReportKind::Subject => "attendance_report.xlsx",
            ReportKind::Student => "attendance_report_student_based.xlsx",
        }
    }

    fn stored(self, session: &Session) -> &ReportFilters {
        match self {
            ReportKind::Subject => &session.subject_report,
            ReportKind::Student => &session.student_report,
        }
    }

    fn store(self, session: &mut Session, filters: ReportFilters) {
        match self {
            ReportKind::Subject => session.subject_report = filters,
            ReportKind::Student => session.student_report = filters,
        }
    }

    /// Keeps only the filters this report offers.
    fn scope(self, mut filters: ReportFilters) -> ReportFilters {
        match self {
            ReportKind::Subject => filters.student = None,
            ReportKind::Student => filters.section = None,
        }
        filters
    }
}

/// A submitted filter form replaces the remembered filters; a bare visit
/// reuses them.
async fn resolve_filters(
    state: &SharedState,
    current: &CurrentSession,
    kind: ReportKind,
    query: ReportFilters,
) -> ReportFilters {
    if query == ReportFilters::default() {
        return kind.stored(&current.session).clone();
    }
    let filters = kind.scope(query.normalized());
    let remembered = filters.clone();
    state
        .sessions
        .update(&current.sid, |s| kind.store(s, remembered))
        .await;
    filters
}

fn export_link(kind: ReportKind, filters: &ReportFilters) -> String {
    let params = [
        ("section", filters.section.as_deref()),
        ("student", filters.student.as_deref()),
        ("subject", filters.subject.as_deref()),
        ("month", filters.month.as_deref()),
        ("year", filters.school_year.as_deref()),
        ("quarter", filters.quarter.as_deref()),
    ];
    let params: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(key, value)| value.map(|v| (*key, v)))
        .collect();
    href(&format!("{}/export", kind.path()), &params)
}

pub async fn subject_report(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<ReportFilters>,
) -> Result<Html<String>, AppError> {
    report_page(state, current, ReportKind::Subject, query).await
}

pub async fn student_report(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<ReportFilters>,
) -> Result<Html<String>, AppError> {
    report_page(state, current, ReportKind::Student, query).await
}

async fn report_page(
    state: SharedState,
    current: CurrentSession,
    kind: ReportKind,
    query: ReportFilters,
) -> Result<Html<String>, AppError> {
    current.require(Resource::Reports)?;
    let mut chrome = current.chrome(&state).await;
    let filters = resolve_filters(&state, &current, kind, query).await;

    let backend = current.backend(&state);
    let (sections, subjects, students, years) = tokio::join!(
        backend.sections(),
        backend.subjects(),
        backend.students(true),
        backend.school_years(),
    );
    let failure = "Failed to load filter data.";
    let sections = or_notice(sections, failure, &mut chrome.notices)?;
    let subjects = or_notice(subjects, failure, &mut chrome.notices)?;
    let students = or_notice(students, failure, &mut chrome.notices)?;
    let years = or_notice(years, failure, &mut chrome.notices)?;
    chrome.notices.dedup();

    let records = match kind {
        ReportKind::Subject => backend.subject_report(&filters).await,
        ReportKind::Student => backend.student_report(&filters).await,
    };
    let records = or_notice(records, "Failed to fetch attendance data.", &mut chrome.notices)?;

    let year_labels: Vec<&str> = years.iter().map(|y| y.label.as_str()).collect();
    let section_choices = visible_entities(&sections, &[], RefField::Section, None);
    let subject_choices = visible_entities(&subjects, &[], RefField::Subject, None);

    let content = html! {
        form.filters method="get" action=(kind.path()) {
            @if kind == ReportKind::Subject {
                label {
                    "Section"
                    select name="section" {
                        option value="" { "All sections" }
                        @for section in &section_choices {
                            option value=(section.id.as_str()) selected[filters.section.as_deref() == Some(section.id.as_str())] {
                                (section.label())
                            }
                        }
                    }
                }
            } @else {
                label {
                    "Student"
                    select name="student" {
                        option value="" { "All students" }
                        @for student in &students {
                            option value=(student.id.as_str()) selected[filters.student.as_deref() == Some(student.id.as_str())] {
                                (student.full_name())
                            }
                        }
                    }
                }
            }
            label {
                "Subject"
                select name="subject" {
                    option value="" { "All subjects" }
                    @for subject in &subject_choices {
                        option value=(subject.id.as_str()) selected[filters.subject.as_deref() == Some(subject.id.as_str())] {
                            (subject.subject_name)
                        }
                    }
                }
            }
            label {
                "Month"
                input type="month" name="month" value=(filters.month.as_deref().unwrap_or(""));
            }
            label {
                "School Year"
                select name="year" {
                    (value_options(&year_labels, filters.school_year.as_deref(), Some("Any year")))
                }
            }
            label {
                "Quarter"
                select name="quarter" {
                    (value_options(&QUARTERS, filters.quarter.as_deref(), Some("Any quarter")))
                }
            }
            button type="submit" { "Apply" }
            a.button href=(export_link(kind, &filters)) { "Export to Excel" }
        }
        (report_table(&records))
    };
    Ok(render(kind.title(), &chrome, content))
}

fn report_table(records: &[AttendanceRecord]) -> Markup {
    if records.is_empty() {
        return empty_state("No attendance records match these filters.");
    }
    html! {
        table {
            thead {
                tr {
                    th { "Student Name" }
                    th { "Section" }
                    th { "Subject" }
                    th { "Date" }
                    th { "Status" }
                    th { "Class Mode" }
                }
            }
            tbody {
                @for record in records {
                    tr {
                        td { (record.full_name.as_deref().unwrap_or("")) }
                        td { (record.section_name.as_deref().unwrap_or("")) }
                        td { (record.subject_name.as_deref().unwrap_or("")) }
                        td { (record.day().map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()) }
                        td { (record.status.as_deref().unwrap_or("")) }
                        td { (record.class_mode.as_deref().unwrap_or("")) }
                    }
                }
            }
        }
    }
}

pub async fn export_subject_report(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<ReportFilters>,
) -> Result<Response, AppError> {
    export(state, current, ReportKind::Subject, query).await
}

pub async fn export_student_report(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<ReportFilters>,
) -> Result<Response, AppError> {
    export(state, current, ReportKind::Student, query).await
}

/// Proxies the backend spreadsheet as a download.
async fn export(
    state: SharedState,
    current: CurrentSession,
    kind: ReportKind,
    query: ReportFilters,
) -> Result<Response, AppError> {
    current.require(Resource::Reports)?;
    let filters = resolve_filters(&state, &current, kind, query).await;

    match current.backend(&state).export_report(&filters).await {
        Ok(download) => {
            info!(file = kind.filename(), bytes = download.bytes.len(), "Report exported");
            let content_type = download.content_type.unwrap_or_else(|| XLSX.to_string());
            let disposition = format!("attachment; filename=\"{}\"", kind.filename());
            Ok((
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                download.bytes,
            )
                .into_response())
        }
        Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized.into()),
        Err(err) => {
            warn!(error = %err, "Failed to download report");
            current
                .flash(&state, Notice::error("Failed to download report."))
                .await;
            Ok(Redirect::to(kind.path()).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::*;
    use axum::extract::Query as AxumQuery;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn backend() -> Router {
        Router::new()
            .route(
                "/api/sections",
                get(|| async {
                    Json(json!([{"_id": "sec1", "name": "Rizal", "grade": "7", "isActive": true}]))
                }),
            )
            .route(
                "/api/subjects",
                get(|| async { Json(json!([{"_id": "sub1", "subjectName": "Math", "isActive": true}])) }),
            )
            .route(
                "/api/students",
                get(|| async { Json(json!([{"_id": "st1", "firstName": "Ana", "lastName": "Reyes"}])) }),
            )
            .route(
                "/api/school-years",
                get(|| async { Json(json!([{"_id": "y1", "label": "2024-2025", "isCurrent": true}])) }),
            )
            .route(
                "/api/attendance/report",
                get(|AxumQuery(q): AxumQuery<HashMap<String, String>>| async move {
                    let section = q.get("sectionID").cloned().unwrap_or_else(|| "all".to_string());
                    Json(json!([{
                        "fullName": format!("Ana Reyes in {}", section),
                        "sectionName": "Rizal",
                        "subjectName": "Math",
                        "date": "2025-01-15T00:00:00.000Z",
                        "status": "Present",
                        "classMode": "Online"
                    }]))
                }),
            )
    }

    #[test]
    fn test_scope_drops_foreign_filters() {
        let filters = ReportFilters {
            section: Some("sec1".to_string()),
            student: Some("st1".to_string()),
            ..Default::default()
        };
        assert_eq!(ReportKind::Subject.scope(filters.clone()).student, None);
        assert_eq!(ReportKind::Student.scope(filters).section, None);
    }

    #[test]
    fn test_export_link_carries_filters() {
        let filters = ReportFilters {
            section: Some("sec1".to_string()),
            school_year: Some("2024-2025".to_string()),
            ..Default::default()
        };
        assert_eq!(
            export_link(ReportKind::Subject, &filters),
            "/reports/attendance/export?section=sec1&year=2024-2025"
        );
    }

    #[tokio::test]
    async fn test_subject_report_filters_stick() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let body = body_text(
            app.get(
                "/reports/attendance?section=sec1&subject=&month=2025-01&year=&quarter=",
                Some(&cookie),
            )
            .await,
        )
        .await;
        assert!(body.contains("Ana Reyes in sec1"));
        assert!(body.contains("2025-01-15"));

        let body = body_text(app.get("/reports/attendance", Some(&cookie)).await).await;
        assert!(body.contains("Ana Reyes in sec1"));
        assert!(body.contains(r#"value="2025-01""#));

        // Submitting a cleared form resets the filters
        let body = body_text(
            app.get("/reports/attendance?section=&month=", Some(&cookie))
                .await,
        )
        .await;
        assert!(body.contains("Ana Reyes in all"));
    }

    #[tokio::test]
    async fn test_student_report_failure_is_a_notice() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let body = body_text(app.get("/reports/students?student=st1", Some(&cookie)).await).await;
        assert!(body.contains("Failed to fetch attendance data."));
        assert!(body.contains(r#"<option value="st1" selected>Ana Reyes</option>"#));
    }

    #[tokio::test]
    async fn test_export_is_an_attachment() {
        let backend = Router::new().route(
            "/api/attendance/report/export",
            get(|| async { ([(header::CONTENT_TYPE, "application/octet-stream")], vec![1u8, 2, 3]) }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;

        let response = app.get("/reports/students/export?student=st1", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert_eq!(
            disposition,
            r#"attachment; filename="attendance_report_student_based.xlsx""#
        );
        assert_eq!(body_text(response).await.as_bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_export_failure_flashes() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let response = app.get("/reports/attendance/export", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/reports/attendance"));
        let body = body_text(app.get("/reports/attendance", Some(&cookie)).await).await;
        assert!(body.contains("Failed to download report."));
    }

    #[tokio::test]
    async fn test_reports_are_admin_only() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("faculty").await;
        let response = app.get("/reports/attendance", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/"));
    }
}
