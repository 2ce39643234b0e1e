//! Table and form screens for the plain record collections.
//!
//! Every collection is described by a static [`Kind`]: which backend endpoint
//! it lives under, which columns the table shows and which fields the form
//! edits. Records travel as raw JSON so the backend may carry fields these
//! screens do not know about.

use axum::extract::{Form, Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use maud::{html, Markup};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use super::render;
use crate::html::{empty_state, value_options};
use crate::permissions::Resource;
use crate::server::{finish_mutation, or_notice, AppError, CurrentSession, SharedState};
use crate::session::Notice;
use crate::types::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Parents,
    Sections,
}

impl Lookup {
    fn collection(self) -> &'static str {
        match self {
            Lookup::Parents => "parents",
            Lookup::Sections => "sections",
        }
    }

    fn label(self, record: &Value) -> String {
        let text = |key: &str| match record.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        match self {
            Lookup::Parents => format!("{} {}", text("firstName"), text("lastName")),
            Lookup::Sections => format!("{} - {}", text("grade"), text("name")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Text,
    Email,
    Date,
    Choice(&'static [&'static str]),
    /// A reference to a record of another collection.
    Lookup(Lookup),
}

#[derive(Debug)]
struct Field {
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    required: bool,
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        label,
        kind,
        required: true,
    }
}

#[derive(Debug)]
struct Column {
    key: &'static str,
    title: &'static str,
}

const fn column(key: &'static str, title: &'static str) -> Column {
    Column { key, title }
}

#[derive(Debug)]
struct Kind {
    slug: &'static str,
    collection: &'static str,
    resource: Resource,
    singular: &'static str,
    plural: &'static str,
    title: &'static str,
    columns: &'static [Column],
    fields: &'static [Field],
}

const STATUSES: &[&str] = &["Active", "Inactive"];

static KINDS: &[Kind] = &[
    Kind {
        slug: "users",
        collection: "users",
        resource: Resource::Users,
        singular: "User",
        plural: "users",
        title: "User Management",
        columns: &[
            column("name", "Name"),
            column("email", "Email"),
            column("role", "Role"),
        ],
        fields: &[
            field("name", "Name", FieldKind::Text),
            field("email", "Email", FieldKind::Email),
            field(
                "role",
                "Role",
                FieldKind::Choice(&["Admin", "Faculty", "Student", "Parent"]),
            ),
        ],
    },
    Kind {
        slug: "students",
        collection: "students",
        resource: Resource::Students,
        singular: "Student",
        plural: "students",
        title: "Student Management",
        columns: &[
            column("firstName", "First Name"),
            column("lastName", "Last Name"),
            column("emailAddress", "Email"),
            column("program", "Program"),
            column("status", "Status"),
        ],
        fields: &[
            field("firstName", "First Name", FieldKind::Text),
            field("lastName", "Last Name", FieldKind::Text),
            field("emailAddress", "Email", FieldKind::Email),
            field("gender", "Gender", FieldKind::Choice(&["Male", "Female"])),
            field("dateEnrolled", "Date Enrolled", FieldKind::Date),
            field(
                "program",
                "Program",
                FieldKind::Choice(&["Homeschooling", "Online", "Face-to-Face"]),
            ),
            field("parent", "Parent", FieldKind::Lookup(Lookup::Parents)),
            field("section", "Section", FieldKind::Lookup(Lookup::Sections)),
            field("status", "Status", FieldKind::Choice(STATUSES)),
        ],
    },
    Kind {
        slug: "parents",
        collection: "parents",
        resource: Resource::Parents,
        singular: "Parent",
        plural: "parents",
        title: "Parent Management",
        columns: &[
            column("firstName", "First Name"),
            column("lastName", "Last Name"),
            column("emailAddress", "Email"),
            column("contactNumber", "Contact Number"),
            column("status", "Status"),
        ],
        fields: &[
            field("firstName", "First Name", FieldKind::Text),
            field("lastName", "Last Name", FieldKind::Text),
            field("emailAddress", "Email", FieldKind::Email),
            field("contactNumber", "Contact Number", FieldKind::Text),
            Field {
                required: false,
                ..field("status", "Status", FieldKind::Choice(STATUSES))
            },
        ],
    },
    Kind {
        slug: "faculty",
        collection: "teachers",
        resource: Resource::Faculty,
        singular: "Teacher",
        plural: "teachers",
        title: "Faculty Management",
        columns: &[
            column("name", "Name"),
            column("email", "Email"),
            column("specialization", "Specialization"),
        ],
        fields: &[
            field("name", "Name", FieldKind::Text),
            field("email", "Email", FieldKind::Email),
            field("specialization", "Specialization", FieldKind::Text),
        ],
    },
    Kind {
        slug: "sections",
        collection: "sections",
        resource: Resource::Sections,
        singular: "Section",
        plural: "sections",
        title: "Section Management",
        columns: &[
            column("sectionId", "Section ID"),
            column("name", "Section"),
            column("grade", "Grade"),
        ],
        fields: &[
            field("sectionId", "Section ID", FieldKind::Text),
            field("name", "Section", FieldKind::Text),
            field("grade", "Grade", FieldKind::Text),
        ],
    },
    Kind {
        slug: "subjects",
        collection: "subjects",
        resource: Resource::Subjects,
        singular: "Subject",
        plural: "subjects",
        title: "Subjects",
        columns: &[
            column("subjectName", "Subject Name"),
            column("gradeLevel", "Grade Level"),
            column("status", "Status"),
            column("dateCreated", "Date Created"),
        ],
        fields: &[
            field("subjectName", "Subject Name", FieldKind::Text),
            field("gradeLevel", "Grade Level", FieldKind::Text),
            field("status", "Status", FieldKind::Choice(STATUSES)),
        ],
    },
];

fn find_kind(slug: &str) -> Result<&'static Kind, AppError> {
    KINDS
        .iter()
        .find(|k| k.slug == slug)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown record type: {slug}")))
}

impl Kind {
    fn list_path(&self) -> String {
        format!("/manage/{}", self.slug)
    }

    fn lookups(&self) -> Vec<Lookup> {
        let mut lookups: Vec<Lookup> = self
            .fields
            .iter()
            .filter_map(|f| match f.kind {
                FieldKind::Lookup(lookup) => Some(lookup),
                _ => None,
            })
            .collect();
        lookups.dedup();
        lookups
    }
}

fn record_id(record: &Value) -> Option<Id> {
    match record.get("_id").or_else(|| record.get("id"))? {
        Value::String(s) => Some(Id::from(s.as_str())),
        Value::Number(n) => Some(Id::new(n.to_string())),
        _ => None,
    }
}

/// Display text of a record field. Populated references show their name.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "Yes".to_string(),
        Some(Value::Bool(false)) => "No".to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(object) if object.is_object() => object
            .get("name")
            .map(|v| cell_text(Some(v)))
            .or_else(|| record_id(object).map(|id| id.to_string()))
            .unwrap_or_default(),
        Some(other) => other.to_string(),
    }
}

/// Current form value of `field` on an existing record.
fn field_value(record: &Value, field: &Field) -> String {
    match field.kind {
        // Students carry the reference as `parentID` / `sectionID`, often
        // populated
        FieldKind::Lookup(_) => {
            let wire = format!("{}ID", field.name);
            record
                .get(&wire)
                .or_else(|| record.get(field.name))
                .and_then(|v| match v {
                    Value::Object(_) => record_id(v),
                    Value::String(s) => Some(Id::from(s.as_str())),
                    _ => None,
                })
                .map(|id| id.to_string())
                .unwrap_or_default()
        }
        FieldKind::Date => {
            let text = cell_text(record.get(field.name));
            text.get(..10).map(str::to_string).unwrap_or(text)
        }
        _ => cell_text(record.get(field.name)),
    }
}

/// Builds the JSON body for the backend from submitted form values.
fn to_record(kind: &Kind, form: &HashMap<String, String>) -> Result<Value, String> {
    let mut record = Map::new();
    for field in kind.fields {
        let value = form.get(field.name).map(|v| v.trim()).unwrap_or("");
        if value.is_empty() {
            if field.required {
                return Err(format!("{} is required.", field.label));
            }
            continue;
        }
        if let FieldKind::Choice(choices) = field.kind {
            if !choices.contains(&value) {
                return Err(format!("{} has an unknown value.", field.label));
            }
        }
        record.insert(field.name.to_string(), Value::String(value.to_string()));
        if let FieldKind::Lookup(_) = field.kind {
            record.insert(format!("{}ID", field.name), Value::String(value.to_string()));
        }
    }
    Ok(Value::Object(record))
}

pub async fn index(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;
    let mut chrome = current.chrome(&state).await;

    let records = or_notice(
        current.backend(&state).list(kind.collection).await,
        &format!("Failed to load {}.", kind.plural),
        &mut chrome.notices,
    )?;
    debug!(kind = kind.slug, count = records.len(), "Loaded records");

    let content = html! {
        p { a.button href=(format!("{}/new", kind.list_path())) { "Add " (kind.singular) } }
        @if records.is_empty() {
            (empty_state(&format!("No {} yet.", kind.plural)))
        } @else {
            (records_table(kind, &records))
        }
    };
    Ok(render(kind.title, &chrome, content))
}

fn records_table(kind: &Kind, records: &[Value]) -> Markup {
    html! {
        table {
            thead {
                tr {
                    @for column in kind.columns {
                        th { (column.title) }
                    }
                    th { "Actions" }
                }
            }
            tbody {
                @for record in records {
                    tr {
                        @for column in kind.columns {
                            @let text = cell_text(record.get(column.key));
                            td {
                                @if column.key.starts_with("date") {
                                    (text.get(..10).unwrap_or(&text))
                                } @else {
                                    (text)
                                }
                            }
                        }
                        td.actions {
                            @if let Some(id) = record_id(record) {
                                a href=(format!("{}/{}/edit", kind.list_path(), id)) { "Edit" }
                                form.inline method="post" action=(format!("{}/{}/delete", kind.list_path(), id)) {
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

/// Option lists for the reference fields, keyed by lookup.
async fn load_lookups(
    state: &SharedState,
    current: &CurrentSession,
    kind: &Kind,
    notices: &mut Vec<Notice>,
) -> Result<Vec<(Lookup, Vec<Value>)>, AppError> {
    let backend = current.backend(state);
    let mut loaded = Vec::new();
    for lookup in kind.lookups() {
        let records = or_notice(
            backend.list(lookup.collection()).await,
            "Failed to load data.",
            notices,
        )?;
        loaded.push((lookup, records));
    }
    notices.dedup();
    Ok(loaded)
}

fn record_form(
    kind: &Kind,
    action: &str,
    existing: Option<&Value>,
    lookups: &[(Lookup, Vec<Value>)],
) -> Markup {
    let current = |field: &Field| existing.map(|r| field_value(r, field)).unwrap_or_default();
    html! {
        form.stacked method="post" action=(action) {
            @for field in kind.fields {
                @let value = current(field);
                label {
                    (field.label)
                    @match field.kind {
                        FieldKind::Text => {
                            input type="text" name=(field.name) value=(value) required[field.required];
                        }
                        FieldKind::Email => {
                            input type="email" name=(field.name) value=(value) required[field.required];
                        }
                        FieldKind::Date => {
                            input type="date" name=(field.name) value=(value) required[field.required];
                        }
                        FieldKind::Choice(choices) => {
                            select name=(field.name) required[field.required] {
                                (value_options(choices, Some(value.as_str()), Some("Select")))
                            }
                        }
                        FieldKind::Lookup(lookup) => {
                            select name=(field.name) required[field.required] {
                                option value="" { "Select" }
                                @for (_, records) in lookups.iter().filter(|(l, _)| *l == lookup) {
                                    @for record in records {
                                        @if let Some(id) = record_id(record) {
                                            option value=(id.as_str()) selected[id.as_str() == value] {
                                                (lookup.label(record))
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            div.actions {
                button type="submit" { "Save" }
                a href=(kind.list_path()) { "Cancel" }
            }
        }
    }
}

pub async fn new_form(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(slug): Path<String>,
) -> Result<Html<String>, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;
    let mut chrome = current.chrome(&state).await;
    let lookups = load_lookups(&state, &current, kind, &mut chrome.notices).await?;

    let content = record_form(kind, &kind.list_path(), None, &lookups);
    Ok(render(&format!("Add {}", kind.singular), &chrome, content))
}

pub async fn edit_form(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;
    let mut chrome = current.chrome(&state).await;

    let records = or_notice(
        current.backend(&state).list(kind.collection).await,
        &format!("Failed to load {}.", kind.plural),
        &mut chrome.notices,
    )?;
    let id = Id::new(id);
    let Some(record) = records.iter().find(|r| record_id(r).as_ref() == Some(&id)) else {
        current
            .flash(&state, Notice::error(format!("{} not found.", kind.singular)))
            .await;
        return Ok(Redirect::to(&kind.list_path()).into_response());
    };
    let lookups = load_lookups(&state, &current, kind, &mut chrome.notices).await?;

    let action = format!("{}/{}", kind.list_path(), id);
    let content = record_form(kind, &action, Some(record), &lookups);
    Ok(render(&format!("Edit {}", kind.singular), &chrome, content).into_response())
}

pub async fn create(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path(slug): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;

    let record = match to_record(kind, &form) {
        Ok(record) => record,
        Err(message) => {
            current.flash(&state, Notice::error(message)).await;
            return Ok(Redirect::to(&format!("{}/new", kind.list_path())));
        }
    };
    let result = current.backend(&state).create(kind.collection, &record).await;
    finish_mutation(
        &state,
        &current,
        result,
        &format!("{} added successfully.", kind.singular),
        &format!("Failed to save {}.", kind.singular.to_lowercase()),
        &kind.list_path(),
    )
    .await
}

pub async fn update(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path((slug, id)): Path<(String, String)>,
    Form(form): Form<HashMap<String, String>>,
) -> Result<Redirect, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;
    let id = Id::new(id);

    let record = match to_record(kind, &form) {
        Ok(record) => record,
        Err(message) => {
            current.flash(&state, Notice::error(message)).await;
            return Ok(Redirect::to(&format!("{}/{}/edit", kind.list_path(), id)));
        }
    };
    let result = current
        .backend(&state)
        .update(kind.collection, &id, &record)
        .await;
    finish_mutation(
        &state,
        &current,
        result,
        &format!("{} updated successfully.", kind.singular),
        &format!("Failed to save {}.", kind.singular.to_lowercase()),
        &kind.list_path(),
    )
    .await
}

pub async fn delete(
    State(state): State<SharedState>,
    current: CurrentSession,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Redirect, AppError> {
    let kind = find_kind(&slug)?;
    current.require(kind.resource)?;

    let result = current
        .backend(&state)
        .delete(kind.collection, &Id::new(id))
        .await;
    finish_mutation(
        &state,
        &current,
        result,
        &format!("{} deleted successfully.", kind.singular),
        &format!("Failed to delete {}.", kind.singular.to_lowercase()),
        &kind.list_path(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::*;
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_every_kind_is_reachable_by_slug() {
        for kind in KINDS {
            assert_eq!(find_kind(kind.slug).unwrap().collection, kind.collection);
            assert!(!kind.columns.is_empty());
            assert!(!kind.fields.is_empty());
        }
        assert!(find_kind("grades").is_err());
        assert_eq!(find_kind("faculty").unwrap().collection, "teachers");
    }

    #[test]
    fn test_student_record_copies_references() {
        let kind = find_kind("students").unwrap();
        let form: HashMap<String, String> = [
            ("firstName", "Ana"),
            ("lastName", "Reyes"),
            ("emailAddress", "ana@school.example"),
            ("gender", "Female"),
            ("dateEnrolled", "2024-06-03"),
            ("program", "Online"),
            ("parent", "p1"),
            ("section", "sec1"),
            ("status", "Active"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let record = to_record(kind, &form).unwrap();
        assert_eq!(record["parentID"], "p1");
        assert_eq!(record["sectionID"], "sec1");
        assert_eq!(record["parent"], "p1");
    }

    #[test]
    fn test_record_validation() {
        let kind = find_kind("subjects").unwrap();
        let mut form = HashMap::new();
        form.insert("subjectName".to_string(), "Math".to_string());
        form.insert("gradeLevel".to_string(), " ".to_string());
        assert_eq!(to_record(kind, &form), Err("Grade Level is required.".to_string()));

        form.insert("gradeLevel".to_string(), "7".to_string());
        form.insert("status".to_string(), "Retired".to_string());
        assert_eq!(to_record(kind, &form), Err("Status has an unknown value.".to_string()));

        // Optional fields may be left blank
        let kind = find_kind("parents").unwrap();
        let form: HashMap<String, String> = [
            ("firstName", "Rosa"),
            ("lastName", "Reyes"),
            ("emailAddress", "rosa@example.com"),
            ("contactNumber", "0917"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let record = to_record(kind, &form).unwrap();
        assert!(record.get("status").is_none());
    }

    #[test]
    fn test_field_value_of_populated_reference() {
        let kind = find_kind("students").unwrap();
        let record = json!({
            "_id": "st1",
            "parentID": {"_id": "p1", "firstName": "Rosa"},
            "sectionID": "sec1",
            "dateEnrolled": "2024-06-03T00:00:00.000Z"
        });
        let by_name = |name: &str| kind.fields.iter().find(|f| f.name == name).unwrap();
        assert_eq!(field_value(&record, by_name("parent")), "p1");
        assert_eq!(field_value(&record, by_name("section")), "sec1");
        assert_eq!(field_value(&record, by_name("dateEnrolled")), "2024-06-03");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(Some(&json!({"_id": "s1", "name": "Rizal"}))), "Rizal");
        assert_eq!(cell_text(Some(&json!({"_id": 4}))), "4");
        assert_eq!(cell_text(Some(&json!(true))), "Yes");
        assert_eq!(cell_text(None), "");
    }

    fn subjects_backend(log: Arc<Mutex<Vec<String>>>) -> Router {
        let (post_log, put_log) = (log.clone(), log.clone());
        Router::new()
            .route(
                "/api/subjects",
                get(|| async {
                    Json(json!([{"_id": "sub1", "subjectName": "Math", "gradeLevel": "7",
                                 "status": "Active", "dateCreated": "2024-06-01T08:00:00.000Z"}]))
                })
                .post(move |Json(body): Json<serde_json::Value>| {
                    let log = post_log.clone();
                    async move {
                        log.lock().unwrap().push(format!("POST {}", body["subjectName"]));
                        StatusCode::CREATED
                    }
                }),
            )
            .route(
                "/api/subjects/{id}",
                put(move |axum::extract::Path(id): axum::extract::Path<String>| {
                    let log = put_log.clone();
                    async move {
                        log.lock().unwrap().push(format!("PUT {}", id));
                        StatusCode::OK
                    }
                })
                .delete(|| async { (StatusCode::CONFLICT, "in use") }),
            )
    }

    #[tokio::test]
    async fn test_list_and_edit_subjects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = app_with_backend(subjects_backend(log)).await;
        let cookie = app.login("admin").await;

        let body = body_text(app.get("/manage/subjects", Some(&cookie)).await).await;
        assert!(body.contains("Math"));
        assert!(body.contains("2024-06-01"));
        assert!(!body.contains("T08:00"));
        assert!(body.contains("/manage/subjects/sub1/edit"));

        let body = body_text(app.get("/manage/subjects/sub1/edit", Some(&cookie)).await).await;
        assert!(body.contains(r#"action="/manage/subjects/sub1""#));
        assert!(body.contains(r#"<option value="Active" selected>Active</option>"#));

        let response = app.get("/manage/subjects/nope/edit", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/manage/subjects"));
    }

    #[tokio::test]
    async fn test_subject_mutations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = app_with_backend(subjects_backend(log.clone())).await;
        let cookie = app.login("admin").await;

        let response = app
            .post_form(
                "/manage/subjects",
                Some(&cookie),
                "subjectName=Science&gradeLevel=8&status=Active",
            )
            .await;
        assert_eq!(location(&response), Some("/manage/subjects"));
        let body = body_text(app.get("/manage/subjects", Some(&cookie)).await).await;
        assert!(body.contains("Subject added successfully."));

        app.post_form(
            "/manage/subjects/sub1",
            Some(&cookie),
            "subjectName=Math&gradeLevel=7&status=Inactive",
        )
        .await;

        app.post_form("/manage/subjects/sub1/delete", Some(&cookie), "")
            .await;
        let body = body_text(app.get("/manage/subjects", Some(&cookie)).await).await;
        assert!(body.contains("Failed to delete subject."));

        assert_eq!(
            log.lock().unwrap().clone(),
            vec![r#"POST "Science""#.to_string(), "PUT sub1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_invalid_submission_goes_back_to_form() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let app = app_with_backend(subjects_backend(log.clone())).await;
        let cookie = app.login("admin").await;

        let response = app
            .post_form("/manage/subjects", Some(&cookie), "subjectName=Science")
            .await;
        assert_eq!(location(&response), Some("/manage/subjects/new"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_student_form_lists_parents_and_sections() {
        let backend = Router::new()
            .route(
                "/api/parents",
                get(|| async { Json(json!([{"_id": "p1", "firstName": "Rosa", "lastName": "Reyes"}])) }),
            )
            .route(
                "/api/sections",
                get(|| async { Json(json!([{"_id": "sec1", "name": "Rizal", "grade": 7}])) }),
            );
        let app = app_with_backend(backend).await;
        let cookie = app.login("faculty").await;

        let body = body_text(app.get("/manage/students/new", Some(&cookie)).await).await;
        assert!(body.contains(r#"<option value="p1">Rosa Reyes</option>"#));
        assert!(body.contains(r#"<option value="sec1">7 - Rizal</option>"#));
    }

    #[tokio::test]
    async fn test_kind_permissions() {
        let app = app_with_backend(Router::new()).await;
        let cookie = app.login("faculty").await;

        let response = app.get("/manage/users", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/"));

        let response = app.get("/manage/grades", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
