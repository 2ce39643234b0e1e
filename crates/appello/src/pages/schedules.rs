//! Class schedules: the admin grid with its create/edit form, plus the
//! read-only weekly views for students and faculty.

use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use maud::{html, Markup};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{non_blank, render};
use crate::api::{ApiError, ScheduleQuery};
use crate::filter::{select_options, validate_choice, visible_entities, RefField};
use crate::html::{empty_state, entity_options, href, value_options};
use crate::permissions::Resource;
use crate::schedule::{format_time, group_by_weekday, WeekSchedule};
use crate::server::{finish_mutation, or_notice, AppError, CurrentSession, SharedState};
use crate::session::Notice;
use crate::types::{
    current_school_year, Id, Schedule, ScheduleForm, SchoolYear, Section, Subject, Teacher, Weekday,
    CLASS_MODES, QUARTERS,
};

const FALLBACK_YEAR: &str = "2024-2025";
const FALLBACK_QUARTER: &str = "First";
const SAVE_FAILED: &str = "Failed to save schedule.";

/// Section, school year and quarter the grid is showing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleFilters {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
}

impl ScheduleFilters {
    fn is_unset(&self) -> bool {
        non_blank(&self.section).is_none()
            && non_blank(&self.year).is_none()
            && non_blank(&self.quarter).is_none()
    }

    fn query(&self) -> ScheduleQuery<'_> {
        ScheduleQuery {
            section_id: non_blank(&self.section),
            academic_year: non_blank(&self.year),
            quarter: non_blank(&self.quarter),
            ..Default::default()
        }
    }

    fn link(&self, path: &str, day: Option<&str>) -> String {
        href(
            path,
            &[
                ("section", non_blank(&self.section).unwrap_or("")),
                ("year", non_blank(&self.year).unwrap_or("")),
                ("quarter", non_blank(&self.quarter).unwrap_or("")),
                ("day", day.unwrap_or("")),
            ],
        )
    }
}

/// Fills unset filters from the backend's defaults.
async fn resolve_filters(
    current: &CurrentSession,
    state: &SharedState,
    mut filters: ScheduleFilters,
    notices: &mut Vec<Notice>,
) -> Result<ScheduleFilters, AppError> {
    if !filters.is_unset() {
        return Ok(filters);
    }
    let defaults = or_notice(
        current.backend(state).default_schedule().await,
        "Failed to initialize data.",
        notices,
    )?;
    filters.section = defaults.section_id.map(|id| id.to_string());
    filters.year = Some(
        defaults
            .academic_year
            .unwrap_or_else(|| FALLBACK_YEAR.to_string()),
    );
    filters.quarter = Some(
        defaults
            .quarter
            .unwrap_or_else(|| FALLBACK_QUARTER.to_string()),
    );
    Ok(filters)
}

fn subject_label(entry: &Schedule) -> &str {
    entry
        .subject_name
        .as_deref()
        .or_else(|| entry.subject.as_ref().and_then(|r| r.field("subjectName")))
        .unwrap_or("-")
}

fn teacher_label(entry: &Schedule) -> &str {
    entry
        .teacher_name
        .as_deref()
        .or_else(|| entry.teacher.as_ref().and_then(|r| r.field("name")))
        .unwrap_or("-")
}

fn week_tabs(week: &WeekSchedule, active: &str, link: impl Fn(&str) -> String) -> Markup {
    html! {
        div.tabs {
            @for group in &week.days {
                a class=(if group.day == active { "active" } else { "" }) href=(link(&group.day)) {
                    (group.day) " (" (group.entries.len()) ")"
                }
            }
        }
    }
}

/// One day's entries. Rows get edit and delete controls when `manage` holds
/// the filters to come back to.
fn day_table(entries: &[Schedule], manage: Option<&ScheduleFilters>) -> Markup {
    html! {
        table {
            thead {
                tr {
                    th { "Start" }
                    th { "End" }
                    th { "Subject" }
                    th { "Class Mode" }
                    th { "Room" }
                    th { "Teacher" }
                    @if manage.is_some() { th { "Actions" } }
                }
            }
            tbody {
                @for entry in entries {
                    tr {
                        td { (format_time(&entry.start_time)) }
                        td { (format_time(&entry.end_time)) }
                        td {
                            (subject_label(entry))
                            @if let Some(section) = entry.section_label() {
                                br; small { (section) }
                            }
                        }
                        td { (entry.class_mode.as_deref().unwrap_or("-")) }
                        td { (entry.room.as_deref().unwrap_or("-")) }
                        td { (teacher_label(entry)) }
                        @if let Some(filters) = manage {
                            td.actions {
                                a href=(filters.link(&format!("/schedules/{}/edit", entry.id), None)) { "Edit" }
                                form.inline method="post" action=(format!("/schedules/{}/delete", entry.id)) {
                                    (filter_fields(filters))
                                    button.danger type="submit" { "Delete" }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn filter_fields(filters: &ScheduleFilters) -> Markup {
    html! {
        input type="hidden" name="section" value=(non_blank(&filters.section).unwrap_or(""));
        input type="hidden" name="year" value=(non_blank(&filters.year).unwrap_or(""));
        input type="hidden" name="quarter" value=(non_blank(&filters.quarter).unwrap_or(""));
    }
}

fn week_view(week: &WeekSchedule, requested: Option<&str>, link: impl Fn(&str) -> String, manage: Option<&ScheduleFilters>) -> Markup {
    if week.is_empty() {
        return empty_state("No classes scheduled.");
    }
    let active = week.active_tab(requested);
    html! {
        (week_tabs(week, active, link))
        @if let Some(entries) = week.get(active) {
            (day_table(entries, manage))
        }
    }
}

fn year_labels(years: &[SchoolYear], selected: Option<&str>) -> Vec<String> {
    let mut labels: Vec<String> = years.iter().map(|sy| sy.label.clone()).collect();
    if let Some(selected) = selected {
        if !labels.iter().any(|l| l == selected) {
            labels.push(selected.to_string());
        }
    }
    labels
}

/// The schedule grid for one section, year and quarter.
pub async fn index(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(filters): Query<ScheduleFilters>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::Schedules)?;
    let mut chrome = current.chrome(&state).await;
    let filters = resolve_filters(&current, &state, filters, &mut chrome.notices).await?;

    let backend = current.backend(&state);
    let query = filters.query();
    let (sections, years, schedules) = tokio::join!(
        backend.sections(),
        backend.school_years(),
        backend.schedules(&query),
    );
    let sections = or_notice(sections, "Failed to initialize data.", &mut chrome.notices)?;
    let years = or_notice(years, "Failed to fetch school years.", &mut chrome.notices)?;
    let schedules = or_notice(schedules, "Failed to fetch schedules.", &mut chrome.notices)?;
    debug!(count = schedules.len(), "Loaded schedules");

    let section_choices = visible_entities(&sections, &schedules, RefField::Section, None);
    let selected_section = non_blank(&filters.section);
    let selected_year = non_blank(&filters.year);
    let years = year_labels(&years, selected_year);
    let year_refs: Vec<&str> = years.iter().map(String::as_str).collect();

    let week = group_by_weekday(schedules);
    let content = html! {
        form.filters method="get" action="/schedules" {
            label {
                "Grade Level & Section"
                select name="section" {
                    option value="" { "All sections" }
                    @for section in &section_choices {
                        option value=(section.id.as_str()) selected[selected_section == Some(section.id.as_str())] {
                            (section.label())
                        }
                    }
                }
            }
            label {
                "Academic Year"
                select name="year" { (value_options(&year_refs, selected_year, None)) }
            }
            label {
                "Quarter"
                select name="quarter" { (value_options(&QUARTERS, non_blank(&filters.quarter), None)) }
            }
            button type="submit" { "Filter" }
        }
        p { a href=(filters.link("/schedules/new", None)) { "Create Schedule" } }
        (week_view(&week, non_blank(&filters.day), |day| filters.link("/schedules", Some(day)), Some(&filters)))
    };
    Ok(render("Grade-level Schedule", &chrome, content))
}

struct FormData {
    teachers: Vec<Teacher>,
    subjects: Vec<Subject>,
    sections: Vec<Section>,
    schedules: Vec<Schedule>,
}

async fn load_form_data(
    current: &CurrentSession,
    state: &SharedState,
    filters: &ScheduleFilters,
    notices: &mut Vec<Notice>,
) -> Result<FormData, AppError> {
    let backend = current.backend(state);
    let query = filters.query();
    let (teachers, subjects, sections, schedules) = tokio::join!(
        backend.teachers(),
        backend.subjects(),
        backend.sections(),
        backend.schedules(&query),
    );
    Ok(FormData {
        teachers: or_notice(teachers, "Failed to load teachers.", notices)?,
        subjects: or_notice(subjects, "Failed to fetch subjects. Please try again.", notices)?,
        sections: or_notice(sections, "Failed to load sections.", notices)?,
        schedules: or_notice(schedules, "Failed to fetch schedules.", notices)?,
    })
}

fn schedule_form(
    data: &FormData,
    filters: &ScheduleFilters,
    editing: Option<&Schedule>,
) -> Markup {
    let teachers = select_options(&data.teachers, &data.schedules, RefField::Teacher, editing);
    let subjects = select_options(&data.subjects, &data.schedules, RefField::Subject, editing);
    let sections = select_options(&data.sections, &data.schedules, RefField::Section, editing);

    let action = match editing {
        Some(entry) => format!("/schedules/{}", entry.id),
        None => "/schedules".to_string(),
    };
    let section = editing
        .and_then(|e| RefField::Section.of(e).cloned())
        .or_else(|| non_blank(&filters.section).map(Id::from));
    let year = editing
        .and_then(|e| e.academic_year.as_deref())
        .or(non_blank(&filters.year))
        .unwrap_or("");
    let quarter = editing
        .and_then(|e| e.quarter.as_deref())
        .or(non_blank(&filters.quarter))
        .unwrap_or("");
    let day_names: Vec<&str> = Weekday::SCHOOL_DAYS.iter().map(|d| d.name()).collect();

    html! {
        form.stacked method="post" action=(action) {
            label {
                "Section"
                select name="sectionID" required { (entity_options(&sections, section.as_ref(), "Select section")) }
            }
            label {
                "Academic Year"
                input type="text" name="academicYear" value=(year) required;
            }
            label {
                "Quarter"
                select name="quarter" required { (value_options(&QUARTERS, Some(quarter), Some("Select quarter"))) }
            }
            label {
                "Start Time"
                input type="time" name="startTime" value=(editing.map(|e| e.start_time.as_str()).unwrap_or("")) required;
            }
            label {
                "End Time"
                input type="time" name="endTime" value=(editing.map(|e| e.end_time.as_str()).unwrap_or("")) required;
            }
            label {
                "Subject"
                select name="subjectID" required {
                    (entity_options(&subjects, editing.and_then(|e| RefField::Subject.of(e)), "Select subject"))
                }
            }
            label {
                "Class Mode"
                select name="classMode" {
                    (value_options(&CLASS_MODES, editing.and_then(|e| e.class_mode.as_deref()), Some("Select class mode")))
                }
            }
            label {
                "Day"
                select name="week" required {
                    (value_options(&day_names, editing.map(|e| e.weekday.as_str()), Some("Select day")))
                }
            }
            label {
                "Room"
                input type="text" name="room" value=(editing.and_then(|e| e.room.as_deref()).unwrap_or(""));
            }
            label {
                "Teacher"
                select name="teacherID" required {
                    (entity_options(&teachers, editing.and_then(|e| RefField::Teacher.of(e)), "Select teacher"))
                }
            }
            div.actions {
                button type="submit" { @if editing.is_some() { "Update" } @else { "Create" } }
                a href=(filters.link("/schedules", None)) { "Cancel" }
            }
        }
    }
}

pub async fn new_form(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(filters): Query<ScheduleFilters>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::Schedules)?;
    let mut chrome = current.chrome(&state).await;
    let data = load_form_data(&current, &state, &filters, &mut chrome.notices).await?;
    Ok(render("Create Schedule", &chrome, schedule_form(&data, &filters, None)))
}

pub async fn edit_form(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Query(filters): Query<ScheduleFilters>,
) -> Result<Response, AppError> {
    current.require(Resource::Schedules)?;
    let mut chrome = current.chrome(&state).await;
    let mut data = load_form_data(&current, &state, &filters, &mut chrome.notices).await?;

    let id = Id::new(id);
    if !data.schedules.iter().any(|s| s.id == id) {
        // Edited from outside the current filters
        let found = or_notice(
            find_schedule(&current, &state, &id).await,
            "Failed to fetch schedules.",
            &mut chrome.notices,
        )?;
        if let Some(entry) = found {
            data.schedules.push(entry);
        }
    }
    let Some(editing) = data.schedules.iter().find(|s| s.id == id) else {
        current.flash(&state, Notice::error("Schedule not found.")).await;
        return Ok(Redirect::to(&filters.link("/schedules", None)).into_response());
    };

    let content = schedule_form(&data, &filters, Some(editing));
    Ok(render("Edit Schedule", &chrome, content).into_response())
}

async fn find_schedule(
    current: &CurrentSession,
    state: &SharedState,
    id: &Id,
) -> Result<Option<Schedule>, ApiError> {
    let all = current
        .backend(state)
        .schedules(&ScheduleQuery::default())
        .await?;
    Ok(all.into_iter().find(|s| &s.id == id))
}

/// The grid showing the entry that was just saved.
fn saved_link(form: &ScheduleForm) -> String {
    let filters = ScheduleFilters {
        section: Some(form.section_id.clone()),
        year: Some(form.academic_year.clone()),
        quarter: Some(form.quarter.clone()),
        day: None,
    };
    filters.link("/schedules", Some(&form.week))
}

fn missing_fields(form: &ScheduleForm) -> bool {
    [
        &form.section_id,
        &form.academic_year,
        &form.quarter,
        &form.start_time,
        &form.end_time,
        &form.subject_id,
        &form.week,
        &form.teacher_id,
    ]
    .iter()
    .any(|v| v.trim().is_empty())
}

/// Rejects a teacher, subject or section that may not be newly assigned.
async fn check_choices(
    current: &CurrentSession,
    state: &SharedState,
    form: &ScheduleForm,
    editing: Option<&Schedule>,
) -> Result<Option<String>, AppError> {
    if missing_fields(form) {
        return Ok(Some("Please fill in all required fields.".to_string()));
    }

    let backend = current.backend(state);
    let (teachers, subjects, sections) =
        tokio::join!(backend.teachers(), backend.subjects(), backend.sections());
    let (teachers, subjects, sections) = match (teachers, subjects, sections) {
        (Ok(teachers), Ok(subjects), Ok(sections)) => (teachers, subjects, sections),
        (teachers, subjects, sections) => {
            let errors = [teachers.err(), subjects.err(), sections.err()];
            for err in errors.into_iter().flatten() {
                if matches!(err, ApiError::Unauthorized) {
                    return Err(err.into());
                }
                warn!(error = %err, "Could not load schedule choices");
            }
            return Ok(Some(SAVE_FAILED.to_string()));
        }
    };

    let checks = [
        validate_choice(&teachers, RefField::Teacher, &Id::from(form.teacher_id.as_str()), editing),
        validate_choice(&subjects, RefField::Subject, &Id::from(form.subject_id.as_str()), editing),
        validate_choice(&sections, RefField::Section, &Id::from(form.section_id.as_str()), editing),
    ];
    Ok(checks
        .into_iter()
        .find_map(Result::err)
        .map(|err| format!("Failed to save schedule: {}.", err)))
}

pub async fn create(
    State(state): State<SharedState>,
    current: CurrentSession,
    Form(form): Form<ScheduleForm>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Schedules)?;
    let back = saved_link(&form);

    if let Some(problem) = check_choices(&current, &state, &form, None).await? {
        warn!(problem = %problem, "Schedule rejected");
        current.flash(&state, Notice::error(problem)).await;
        return Ok(Redirect::to(&back));
    }

    let result = current.backend(&state).create_schedule(&form).await;
    if result.is_ok() {
        info!(section = %form.section_id, week = %form.week, "Schedule created");
    }
    finish_mutation(
        &state,
        &current,
        result,
        "Schedule created successfully.",
        SAVE_FAILED,
        &back,
    )
    .await
}

pub async fn update(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Form(form): Form<ScheduleForm>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Schedules)?;
    let back = saved_link(&form);
    let id = Id::new(id);

    let editing = match find_schedule(&current, &state, &id).await {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            current.flash(&state, Notice::error("Schedule not found.")).await;
            return Ok(Redirect::to(&back));
        }
        Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized.into()),
        Err(err) => {
            warn!(schedule = %id, error = %err, "Could not load schedule");
            current.flash(&state, Notice::error(SAVE_FAILED)).await;
            return Ok(Redirect::to(&back));
        }
    };

    if let Some(problem) = check_choices(&current, &state, &form, Some(&editing)).await? {
        warn!(schedule = %id, problem = %problem, "Schedule update rejected");
        current.flash(&state, Notice::error(problem)).await;
        return Ok(Redirect::to(&back));
    }

    let result = current
        .backend(&state)
        .update_schedule(&id, &form)
        .await;
    finish_mutation(
        &state,
        &current,
        result,
        "Schedule updated successfully.",
        SAVE_FAILED,
        &back,
    )
    .await
}

pub async fn delete(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Form(filters): Form<ScheduleFilters>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Schedules)?;
    let id = Id::new(id);
    let result = current.backend(&state).delete_schedule(&id).await;
    finish_mutation(
        &state,
        &current,
        result,
        "Schedule deleted successfully.",
        "Failed to delete schedule.",
        &filters.link("/schedules", None),
    )
    .await
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    day: Option<String>,
}

/// Current school year label and quarter, or a notice explaining what is missing.
async fn current_term(
    current: &CurrentSession,
    state: &SharedState,
    notices: &mut Vec<Notice>,
) -> Result<Option<(String, String)>, AppError> {
    let backend = current.backend(state);
    let (years, settings) = tokio::join!(backend.school_years(), backend.settings());
    let years = or_notice(years, "Failed to get academic year or quarter.", notices)?;
    let settings = or_notice(settings, "Failed to get academic year or quarter.", notices)?;
    notices.dedup();

    let year = current_school_year(&years).map(|sy| sy.label.clone());
    Ok(year.zip(settings.current_quarter))
}

/// The signed-in student's weekly classes for the current term.
pub async fn my_schedule(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<DayQuery>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::MySchedule)?;
    let mut chrome = current.chrome(&state).await;

    let term = current_term(&current, &state, &mut chrome.notices).await?;
    let section = current.session.user.section_id.clone();
    let week = match (section, term) {
        (Some(section), Some((year, quarter))) => {
            let query = ScheduleQuery {
                section_id: Some(section.as_str()),
                academic_year: Some(&year),
                quarter: Some(&quarter),
                ..Default::default()
            };
            let schedules = or_notice(
                current.backend(&state).schedules(&query).await,
                "Failed to load your schedule.",
                &mut chrome.notices,
            )?;
            group_by_weekday(schedules)
        }
        _ => {
            chrome
                .notices
                .push(Notice::error("Missing section ID, academic year, or quarter."));
            group_by_weekday(Vec::new())
        }
    };

    let content = week_view(
        &week,
        non_blank(&query.day),
        |day| href("/my-schedule", &[("day", day)]),
        None,
    );
    Ok(render("My Class Schedule", &chrome, content))
}

/// Classes taught by the signed-in faculty member this term.
pub async fn my_faculty_schedule(
    State(state): State<SharedState>,
    current: CurrentSession,
    Query(query): Query<DayQuery>,
) -> Result<Html<String>, AppError> {
    current.require(Resource::MyFacultySchedule)?;
    let mut chrome = current.chrome(&state).await;

    let term = current_term(&current, &state, &mut chrome.notices).await?;
    let week = match term {
        Some((year, quarter)) => {
            let teacher = current.session.user.id.clone();
            let query = ScheduleQuery {
                teacher_id: Some(teacher.as_str()),
                academic_year: Some(&year),
                quarter: Some(&quarter),
                ..Default::default()
            };
            let schedules = or_notice(
                current.backend(&state).schedules(&query).await,
                "Failed to fetch schedules.",
                &mut chrome.notices,
            )?;
            group_by_weekday(schedules)
        }
        None => {
            chrome
                .notices
                .push(Notice::error("Failed to fetch school year or settings."));
            group_by_weekday(Vec::new())
        }
    };

    let content = week_view(
        &week,
        non_blank(&query.day),
        |day| href("/my-faculty-schedule", &[("day", day)]),
        None,
    );
    Ok(render("My Teaching Schedule", &chrome, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::*;
    use axum::extract::Query as AxumQuery;
    use axum::http::StatusCode;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn entities_backend() -> Router {
        lookups_backend().route(
            "/api/teachers",
            get(|| async {
                Json(json!([
                    {"_id": "t1", "name": "Ms. Active", "isActive": true},
                    {"_id": "t2", "name": "Mr. Retired", "isActive": false},
                    {"_id": "t3", "name": "Mr. Gone", "isActive": false}
                ]))
            }),
        )
    }

    /// Everything but the teacher list.
    fn lookups_backend() -> Router {
        Router::new()
            .route(
                "/api/subjects",
                get(|| async {
                    Json(json!([{"_id": "sub1", "subjectName": "Math", "isActive": true}]))
                }),
            )
            .route(
                "/api/sections",
                get(|| async {
                    Json(json!([{"_id": "sec1", "name": "Rizal", "grade": 7, "isActive": true}]))
                }),
            )
            .route(
                "/api/school-years",
                get(|| async { Json(json!([{"_id": "y1", "label": "2024-2025", "isCurrent": true}])) }),
            )
            .route(
                "/api/defaultSchedule",
                get(|| async {
                    Json(json!({"sectionId": "sec1", "academicYear": "2024-2025", "quarter": "First"}))
                }),
            )
    }

    fn schedules_json() -> Value {
        json!([
            {"_id": "s1", "week": "Tuesday", "startTime": "13:00", "endTime": "14:00",
             "teacherID": "t2", "subjectID": "sub1", "sectionID": "sec1",
             "subjectName": "Math", "teacherName": "Mr. Retired"},
            {"_id": "s2", "week": "Monday", "startTime": "09:30", "endTime": "10:30",
             "teacherID": "t1", "subjectID": "sub1", "sectionID": "sec1",
             "subjectName": "Science", "teacherName": "Ms. Active"},
            {"_id": "s3", "week": "Monday", "startTime": "08:00", "endTime": "09:00",
             "teacherID": {"_id": "t1", "name": "Ms. Active"}, "subjectID": "sub1", "sectionID": "sec1",
             "subjectName": "English"}
        ])
    }

    fn backend() -> Router {
        entities_backend().route("/api/schedules", get(|| async { Json(schedules_json()) }))
    }

    #[test]
    fn test_filters_link() {
        let filters = ScheduleFilters {
            section: Some("sec1".to_string()),
            year: Some("2024-2025".to_string()),
            quarter: Some(" ".to_string()),
            day: None,
        };
        assert_eq!(
            filters.link("/schedules", Some("Friday")),
            "/schedules?section=sec1&year=2024-2025&day=Friday"
        );
        assert!(!filters.is_unset());
        assert!(ScheduleFilters::default().is_unset());
    }

    #[test]
    fn test_missing_fields() {
        let mut form = ScheduleForm {
            section_id: "sec1".to_string(),
            academic_year: "2024-2025".to_string(),
            quarter: "First".to_string(),
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            subject_id: "sub1".to_string(),
            class_mode: String::new(),
            week: "Monday".to_string(),
            room: String::new(),
            teacher_id: "t1".to_string(),
        };
        assert!(!missing_fields(&form));
        form.teacher_id = "  ".to_string();
        assert!(missing_fields(&form));
    }

    #[tokio::test]
    async fn test_grid_groups_by_day_and_sorts() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let response = app.get("/schedules", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;

        // Monday comes first, so it is the active tab, sorted by start time
        let english = body.find("English").unwrap();
        let science = body.find("Science").unwrap();
        assert!(english < science);
        assert!(body.contains("8:00 AM"));
        assert!(!body.contains("1:00 PM"));
        assert!(body.contains("Monday (2)"));
        assert!(body.contains("Tuesday (1)"));
    }

    #[tokio::test]
    async fn test_grid_day_query_selects_tab() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("faculty").await;

        let body = body_text(app.get("/schedules?section=sec1&day=Tuesday", Some(&cookie)).await).await;
        assert!(body.contains("1:00 PM"));
        assert!(!body.contains("8:00 AM"));
    }

    #[tokio::test]
    async fn test_grid_forbidden_for_students() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("student").await;
        let response = app.get("/schedules", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/"));
    }

    #[tokio::test]
    async fn test_new_form_options() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let body = body_text(app.get("/schedules/new?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains(r#"<option value="t1">Ms. Active</option>"#));
        // Still referenced by s1, so shown but not selectable
        assert!(body.contains(r#"<option value="t2" disabled>Mr. Retired (inactive)</option>"#));
        // Inactive and unreferenced
        assert!(!body.contains("Mr. Gone"));
    }

    #[tokio::test]
    async fn test_edit_form_keeps_current_inactive_teacher_selectable() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let body = body_text(app.get("/schedules/s1/edit?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains(r#"<option value="t2" selected>Mr. Retired (inactive)</option>"#));
        assert!(body.contains(r#"action="/schedules/s1""#));
    }

    #[tokio::test]
    async fn test_edit_unknown_schedule_redirects() {
        let app = app_with_backend(backend()).await;
        let cookie = app.login("admin").await;

        let response = app.get("/schedules/nope/edit?section=sec1", Some(&cookie)).await;
        assert!(is_redirect(&response));
        let body = body_text(app.get("/schedules?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains("Schedule not found."));
    }

    fn form_body(teacher: &str) -> String {
        format!(
            "sectionID=sec1&academicYear=2024-2025&quarter=First&startTime=08%3A00&endTime=09%3A00\
             &subjectID=sub1&classMode=Online&week=Monday&room=101&teacherID={}",
            teacher
        )
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_teacher() {
        let posted = Arc::new(Mutex::new(0));
        let counter = posted.clone();
        let backend = backend().route(
            "/api/schedules",
            post(move || {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    StatusCode::CREATED
                }
            }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;

        let response = app.post_form("/schedules", Some(&cookie), &form_body("t2")).await;
        assert!(is_redirect(&response));
        assert_eq!(*posted.lock().unwrap(), 0);

        let response = app.post_form("/schedules", Some(&cookie), &form_body("t1")).await;
        assert!(is_redirect(&response));
        assert_eq!(
            location(&response),
            Some("/schedules?section=sec1&year=2024-2025&quarter=First&day=Monday")
        );
        assert_eq!(*posted.lock().unwrap(), 1);

        let body = body_text(app.get("/schedules?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains("Schedule created successfully."));
    }

    #[tokio::test]
    async fn test_update_allows_keeping_inactive_teacher() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let backend = backend().route(
            "/api/schedules/{id}",
            put(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body["teacherID"].as_str().unwrap_or("").to_string());
                    StatusCode::OK
                }
            }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;

        let response = app.post_form("/schedules/s1", Some(&cookie), &form_body("t2")).await;
        assert!(is_redirect(&response));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_save_with_failing_teacher_list_flashes_error() {
        let saved = Arc::new(Mutex::new(0));
        let (post_count, put_count) = (saved.clone(), saved.clone());
        let backend = lookups_backend()
            .route(
                "/api/teachers",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/api/schedules",
                get(|| async { Json(schedules_json()) }).post(move || {
                    let count = post_count.clone();
                    async move {
                        *count.lock().unwrap() += 1;
                        StatusCode::CREATED
                    }
                }),
            )
            .route(
                "/api/schedules/{id}",
                put(move || {
                    let count = put_count.clone();
                    async move {
                        *count.lock().unwrap() += 1;
                        StatusCode::OK
                    }
                }),
            );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;
        let back = "/schedules?section=sec1&year=2024-2025&quarter=First&day=Monday";

        let response = app.post_form("/schedules", Some(&cookie), &form_body("t1")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some(back));
        let body = body_text(app.get("/schedules?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains("Failed to save schedule."));

        let response = app.post_form("/schedules/s1", Some(&cookie), &form_body("t1")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some(back));
        let body = body_text(app.get("/schedules?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains("Failed to save schedule."));

        assert_eq!(*saved.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_with_failing_lookup_flashes_error() {
        let backend = entities_backend().route(
            "/api/schedules",
            get(|| async { (StatusCode::BAD_GATEWAY, "down") }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;

        let response = app.post_form("/schedules/s1", Some(&cookie), &form_body("t1")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let body = body_text(app.get("/schedules?section=sec1", Some(&cookie)).await).await;
        assert!(body.contains("Failed to save schedule."));
    }

    #[tokio::test]
    async fn test_backend_401_logs_out() {
        let backend = entities_backend().route(
            "/api/schedules/{id}",
            axum::routing::delete(|| async { StatusCode::UNAUTHORIZED }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("admin").await;

        let response = app.post_form("/schedules/s1/delete", Some(&cookie), "section=sec1").await;
        assert_eq!(location(&response), Some("/logout?expired=1"));
    }

    #[tokio::test]
    async fn test_my_schedule_uses_current_term() {
        let backend = Router::new()
            .route(
                "/api/school-years",
                get(|| async {
                    Json(json!([
                        {"_id": "y0", "label": "2023-2024"},
                        {"_id": "y1", "label": "2024-2025", "isCurrent": true}
                    ]))
                }),
            )
            .route("/api/settings", get(|| async { Json(json!({"currentQuarter": "Second"})) }))
            .route(
                "/api/schedules",
                get(|AxumQuery(q): AxumQuery<HashMap<String, String>>| async move {
                    let ok = q.get("sectionID").map(String::as_str) == Some("sec1")
                        && q.get("academicYear").map(String::as_str) == Some("2024-2025")
                        && q.get("quarter").map(String::as_str) == Some("Second");
                    if ok {
                        Json(json!([{"_id": "s1", "week": "Wednesday", "startTime": "10:00",
                                     "endTime": "11:00", "subjectName": "History"}]))
                    } else {
                        Json(json!([]))
                    }
                }),
            );
        let app = app_with_backend(backend).await;
        let cookie = app.login("student").await;

        let body = body_text(app.get("/my-schedule", Some(&cookie)).await).await;
        assert!(body.contains("History"));
        assert!(body.contains("10:00 AM"));
    }

    #[tokio::test]
    async fn test_my_schedule_without_term() {
        let backend = Router::new()
            .route("/api/school-years", get(|| async { Json(json!([])) }))
            .route("/api/settings", get(|| async { Json(Value::Null) }));
        let app = app_with_backend(backend).await;
        let cookie = app.login("student").await;

        let body = body_text(app.get("/my-schedule", Some(&cookie)).await).await;
        assert!(body.contains("Missing section ID, academic year, or quarter."));
        assert!(body.contains("No classes scheduled."));
    }

    #[tokio::test]
    async fn test_faculty_schedule_filters_by_teacher() {
        let backend = Router::new()
            .route(
                "/api/school-years",
                get(|| async { Json(json!([{"_id": "y1", "label": "2024-2025", "isCurrent": true}])) }),
            )
            .route("/api/settings", get(|| async { Json(json!({"currentQuarter": "First"})) }))
            .route(
                "/api/schedules",
                get(|AxumQuery(q): AxumQuery<HashMap<String, String>>| async move {
                    let teacher = q.get("teacherID").cloned().unwrap_or_default();
                    Json(json!([{"_id": "s1", "week": "Friday", "startTime": "07:30",
                                 "subjectName": format!("Taught by {}", teacher)}]))
                }),
            );
        let app = app_with_backend(backend).await;
        let cookie = app.login("faculty").await;

        let body = body_text(app.get("/my-faculty-schedule", Some(&cookie)).await).await;
        assert!(body.contains("Taught by u1"));
        assert!(body.contains("Friday (1)"));
    }
}
