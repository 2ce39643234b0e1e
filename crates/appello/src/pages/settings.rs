use axum::extract::{Form, State};
use axum::response::{Html, Redirect};
use maud::html;
use serde::Deserialize;
use tracing::debug;

use super::{non_blank, render};
use crate::api::ApiError;
use crate::html::{empty_state, value_options};
use crate::permissions::Resource;
use crate::server::{finish_mutation, or_notice, AppError, CurrentSession, SharedState};
use crate::session::Notice;
use crate::types::{current_school_year, Id, QUARTERS};

const BACK: &str = "/settings";

/// The backend's explanation when it gave one, else `fallback`.
fn failure_message<T>(result: &Result<T, ApiError>, fallback: &str) -> String {
    result
        .as_ref()
        .err()
        .and_then(ApiError::backend_message)
        .unwrap_or(fallback)
        .to_string()
}

pub async fn index(
    State(state): State<SharedState>,
    current: CurrentSession,
) -> Result<Html<String>, AppError> {
    current.require(Resource::Settings)?;
    let mut chrome = current.chrome(&state).await;

    let backend = current.backend(&state);
    let (years, settings) = tokio::join!(backend.school_years(), backend.settings());
    let years = or_notice(years, "Failed to fetch school years.", &mut chrome.notices)?;
    let settings = or_notice(settings, "Failed to fetch settings.", &mut chrome.notices)?;
    let current_year = current_school_year(&years);

    let content = html! {
        section {
            h2 { "School Years" }
            @if years.is_empty() {
                (empty_state("No school years yet."))
            } @else {
                table {
                    thead { tr { th { "School Year" } th { "Status" } } }
                    tbody {
                        @for year in &years {
                            tr {
                                td { (year.label) }
                                td { @if year.is_current { strong { "Current" } } }
                            }
                        }
                    }
                }
            }
            form.inline method="post" action="/settings/school-years" {
                input type="text" name="label" placeholder="e.g. 2025-2026" required;
                button type="submit" { "Add School Year" }
            }
        }
        section {
            h2 { "Academic Settings" }
            form.stacked method="post" action="/settings/school-year" {
                label {
                    "Current School Year"
                    select name="id" required {
                        option value="" { "Select school year" }
                        @for year in &years {
                            option value=(year.id.as_str()) selected[current_year.map(|c| &c.id) == Some(&year.id)] {
                                (year.label)
                            }
                        }
                    }
                }
                button type="submit" { "Set School Year" }
            }
            form.stacked method="post" action="/settings/quarter" {
                label {
                    "Current Quarter"
                    select name="quarter" required {
                        (value_options(&QUARTERS, settings.current_quarter.as_deref(), Some("Select quarter")))
                    }
                }
                button type="submit" { "Set Quarter" }
            }
        }
    };
    Ok(render("Settings", &chrome, content))
}

#[derive(Debug, Deserialize)]
pub struct NewSchoolYear {
    #[serde(default)]
    label: Option<String>,
}

pub async fn add_school_year(
    State(state): State<SharedState>,
    current: CurrentSession,
    Form(form): Form<NewSchoolYear>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Settings)?;
    let Some(label) = non_blank(&form.label) else {
        current
            .flash(&state, Notice::error("Please enter a school year."))
            .await;
        return Ok(Redirect::to(BACK));
    };

    let result = current.backend(&state).add_school_year(label).await;
    let failure = failure_message(&result, "Failed to add school year.");
    if let Ok(created) = &result {
        debug!(id = %created.id, label, "School year added");
    }
    finish_mutation(
        &state,
        &current,
        result.map(|_| ()),
        "New school year added.",
        &failure,
        BACK,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct CurrentYearForm {
    #[serde(default)]
    id: Option<String>,
}

pub async fn set_school_year(
    State(state): State<SharedState>,
    current: CurrentSession,
    Form(form): Form<CurrentYearForm>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Settings)?;
    let Some(id) = non_blank(&form.id).map(Id::from) else {
        current
            .flash(&state, Notice::error("Please select a school year."))
            .await;
        return Ok(Redirect::to(BACK));
    };

    let result = current.backend(&state).set_current_school_year(&id).await;
    let failure = failure_message(&result, "Failed to update school year.");
    finish_mutation(
        &state,
        &current,
        result,
        "School year updated successfully.",
        &failure,
        BACK,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct QuarterForm {
    #[serde(default)]
    quarter: Option<String>,
}

pub async fn set_quarter(
    State(state): State<SharedState>,
    current: CurrentSession,
    Form(form): Form<QuarterForm>,
) -> Result<Redirect, AppError> {
    current.require(Resource::Settings)?;
    let quarter = non_blank(&form.quarter).filter(|q| QUARTERS.contains(q));
    let Some(quarter) = quarter else {
        current
            .flash(&state, Notice::error("Please select a quarter."))
            .await;
        return Ok(Redirect::to(BACK));
    };

    let result = current.backend(&state).set_current_quarter(quarter).await;
    finish_mutation(
        &state,
        &current,
        result,
        "Quarter updated successfully.",
        "Failed to update quarter.",
        BACK,
    )
    .await
}
