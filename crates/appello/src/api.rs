//! Typed client for the attendance REST backend.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::session::{ReportFilters, SessionUser};
use crate::types::{
    AttendancePayload, AttendanceRecord, Created, DailySummary, DefaultSchedule, Id, Roster,
    Schedule, ScheduleForm, SchoolYear, Section, Settings, Student, StudentTally, Subject, Teacher,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session expired or not authorized")]
    Unauthorized,

    #[error("backend returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ApiError {
    /// The backend's own message when it sent one.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

/// Pulls `message` out of a JSON error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        message: error_message(&body),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "token")]
    pub access_token: String,
    pub user: SessionUser,
}

/// A file handed through to the browser.
#[derive(Debug, Clone)]
pub struct Download {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Schedule listing filters; unset fields are left out of the query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleQuery<'a> {
    #[serde(rename = "sectionID", skip_serializing_if = "Option::is_none")]
    pub section_id: Option<&'a str>,
    #[serde(rename = "teacherID", skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<&'a str>,
    #[serde(rename = "academicYear", skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<&'a str>,
}

const NO_QUERY: &[(&str, &str)] = &[];

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Calls made on behalf of a signed-in user.
    pub fn with_token<'a>(&'a self, token: &'a str) -> Backend<'a> {
        Backend {
            client: self,
            token,
        }
    }

    /// Exchanges a Google ID token for a backend session.
    pub async fn login_google(&self, credential: &str) -> Result<LoginResponse, ApiError> {
        debug!("Exchanging Google credential");
        let response = self
            .http
            .post(self.url("/api/auth/google"))
            .json(&serde_json::json!({ "token": credential }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// The user an access token belongs to.
    pub async fn me(&self, token: &str) -> Result<SessionUser, ApiError> {
        self.with_token(token).get("/api/auth/me", NO_QUERY).await
    }

    /// Checks that the backend answers at all. Any reply short of a server
    /// error counts, since the root path may well be a 404.
    pub async fn ping(&self) -> Result<(), ApiError> {
        let response = self.http.get(self.url("/")).send().await?;
        let status = response.status();
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status,
                message: error_message(&body),
            });
        }
        Ok(())
    }
}

/// Backend calls carrying a bearer token.
#[derive(Debug, Clone, Copy)]
pub struct Backend<'a> {
    client: &'a ApiClient,
    token: &'a str,
}

impl<'a> Backend<'a> {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .http
            .request(method, self.client.url(path))
            .bearer_auth(self.token)
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        debug!(path, "GET");
        let response = self.request(Method::GET, path).query(query).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(path, %method, "Sending");
        let response = self.request(method, path).json(body).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Like [`Backend::send`] for calls whose response body is irrelevant.
    async fn send_ignoring_body<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        debug!(path, %method, "Sending");
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        check(request.send().await?).await?;
        Ok(())
    }

    async fn download<Q>(&self, path: &str, query: &Q) -> Result<Download, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let response = check(self.request(Method::GET, path).query(query).send().await?).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(Download {
            content_type,
            bytes,
        })
    }

    // ----- referenced entities -----

    pub async fn teachers(&self) -> Result<Vec<Teacher>, ApiError> {
        self.get("/api/teachers", NO_QUERY).await
    }

    pub async fn subjects(&self) -> Result<Vec<Subject>, ApiError> {
        self.get("/api/subjects", NO_QUERY).await
    }

    pub async fn sections(&self) -> Result<Vec<Section>, ApiError> {
        self.get("/api/sections", NO_QUERY).await
    }

    pub async fn students(&self, active_only: bool) -> Result<Vec<Student>, ApiError> {
        if active_only {
            self.get("/api/students", &[("active", "true")]).await
        } else {
            self.get("/api/students", NO_QUERY).await
        }
    }

    pub async fn students_by_parent(&self, parent_id: &Id) -> Result<Vec<Student>, ApiError> {
        self.get("/api/students/by-parent", &[("parentID", parent_id.as_str())])
            .await
    }

    // ----- schedules -----

    pub async fn default_schedule(&self) -> Result<DefaultSchedule, ApiError> {
        self.get("/api/defaultSchedule", NO_QUERY).await
    }

    pub async fn schedules(&self, query: &ScheduleQuery<'_>) -> Result<Vec<Schedule>, ApiError> {
        self.get("/api/schedules", query).await
    }

    pub async fn create_schedule(&self, form: &ScheduleForm) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::POST, "/api/schedules", Some(form))
            .await
    }

    pub async fn update_schedule(&self, id: &Id, form: &ScheduleForm) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::PUT, &format!("/api/schedules/{id}"), Some(form))
            .await
    }

    pub async fn delete_schedule(&self, id: &Id) -> Result<(), ApiError> {
        self.send_ignoring_body::<Value>(Method::DELETE, &format!("/api/schedules/{id}"), None)
            .await
    }

    // ----- school years and settings -----

    pub async fn school_years(&self) -> Result<Vec<SchoolYear>, ApiError> {
        self.get("/api/school-years", NO_QUERY).await
    }

    pub async fn add_school_year(&self, label: &str) -> Result<Created, ApiError> {
        self.send(
            Method::POST,
            "/api/school-years",
            &serde_json::json!({ "label": label }),
        )
        .await
    }

    pub async fn set_current_school_year(&self, id: &Id) -> Result<(), ApiError> {
        self.send_ignoring_body::<Value>(
            Method::PATCH,
            &format!("/api/school-years/{id}/set-current"),
            None,
        )
        .await
    }

    pub async fn settings(&self) -> Result<Settings, ApiError> {
        // A fresh install answers with `null` until settings are saved once
        let settings: Option<Settings> = self.get("/api/settings", NO_QUERY).await?;
        Ok(settings.unwrap_or_default())
    }

    pub async fn set_current_quarter(&self, quarter: &str) -> Result<(), ApiError> {
        self.send_ignoring_body(
            Method::PUT,
            "/api/settings",
            Some(&serde_json::json!({ "currentQuarter": quarter })),
        )
        .await
    }

    // ----- attendance -----

    pub async fn roster(&self, subject: &Id, section: &Id, date: &str) -> Result<Roster, ApiError> {
        self.get(
            "/api/attendance",
            &[
                ("subjectID", subject.as_str()),
                ("sectionID", section.as_str()),
                ("date", date),
            ],
        )
        .await
    }

    pub async fn record_attendance(&self, payload: &AttendancePayload) -> Result<Created, ApiError> {
        self.send(Method::POST, "/api/attendance", payload).await
    }

    pub async fn update_attendance(
        &self,
        id: &Id,
        payload: &AttendancePayload,
    ) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::PUT, &format!("/api/attendance/{id}"), Some(payload))
            .await
    }

    pub async fn daily_summary(&self, date: &str) -> Result<DailySummary, ApiError> {
        self.get("/api/attendance/daily-summary", &[("date", date)])
            .await
    }

    pub async fn top_absentees(&self, start: &str, end: &str) -> Result<Vec<StudentTally>, ApiError> {
        self.get(
            "/api/attendance/top-absentees",
            &[("startDate", start), ("endDate", end)],
        )
        .await
    }

    pub async fn perfect_attendance(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<StudentTally>, ApiError> {
        self.get(
            "/api/attendance/perfect",
            &[("startDate", start), ("endDate", end)],
        )
        .await
    }

    pub async fn student_attendance(
        &self,
        student: &Id,
        start: &str,
        end: &str,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get(
            "/api/attendance/student-attendance",
            &[
                ("studentID", student.as_str()),
                ("startDate", start),
                ("endDate", end),
            ],
        )
        .await
    }

    pub async fn subject_report(
        &self,
        filters: &ReportFilters,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get("/api/attendance/report", &filters.to_query()).await
    }

    pub async fn student_report(
        &self,
        filters: &ReportFilters,
    ) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get("/api/attendance/report/student-based", &filters.to_query())
            .await
    }

    pub async fn export_report(&self, filters: &ReportFilters) -> Result<Download, ApiError> {
        self.download("/api/attendance/report/export", &filters.to_query())
            .await
    }

    // ----- generic records for the management screens -----

    pub async fn list(&self, collection: &str) -> Result<Vec<Value>, ApiError> {
        self.get(&format!("/api/{collection}"), NO_QUERY).await
    }

    pub async fn create(&self, collection: &str, record: &Value) -> Result<(), ApiError> {
        self.send_ignoring_body(Method::POST, &format!("/api/{collection}"), Some(record))
            .await
    }

    pub async fn update(&self, collection: &str, id: &Id, record: &Value) -> Result<(), ApiError> {
        self.send_ignoring_body(
            Method::PUT,
            &format!("/api/{collection}/{id}"),
            Some(record),
        )
        .await
    }

    pub async fn delete(&self, collection: &str, id: &Id) -> Result<(), ApiError> {
        self.send_ignoring_body::<Value>(Method::DELETE, &format!("/api/{collection}/{id}"), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_backend;
    use axum::extract::Query;
    use axum::http::HeaderMap;
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn client(url: &str) -> ApiClient {
        ApiClient::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Duplicate label"}"#), "Duplicate label");
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(error_message(r#"{"error":"x"}"#), r#"{"error":"x"}"#);
    }

    #[test]
    fn test_schedule_query_skips_unset() {
        let query = ScheduleQuery {
            section_id: Some("sec1"),
            quarter: Some("First"),
            ..Default::default()
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json, json!({"sectionID": "sec1", "quarter": "First"}));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token_and_query() {
        let app = Router::new().route(
            "/api/schedules",
            get(
                |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!([{
                        "_id": "s1",
                        "week": q.get("quarter").cloned().unwrap_or_default(),
                        "room": auth,
                        "sectionID": q.get("sectionID").cloned().unwrap_or_default(),
                    }]))
                },
            ),
        );
        let url = spawn_backend(app).await;
        let api = client(&url);

        let schedules = api
            .with_token("secret")
            .schedules(&ScheduleQuery {
                section_id: Some("sec9"),
                quarter: Some("Second"),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].weekday, "Second");
        assert_eq!(schedules[0].room.as_deref(), Some("Bearer secret"));
        assert_eq!(
            schedules[0].section.as_ref().map(|r| r.id().as_str()),
            Some("sec9")
        );
    }

    #[tokio::test]
    async fn test_ping_accepts_missing_root() {
        let url = spawn_backend(Router::new()).await;
        assert!(client(&url).ping().await.is_ok());

        let url = spawn_backend(Router::new().route(
            "/",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;
        assert!(client(&url).ping().await.is_err());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_variant() {
        let app = Router::new().route(
            "/api/teachers",
            get(|| async { (axum::http::StatusCode::UNAUTHORIZED, "expired") }),
        );
        let url = spawn_backend(app).await;
        let err = client(&url).with_token("t").teachers().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn test_backend_message_is_surfaced() {
        let app = Router::new().route(
            "/api/school-years",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"message": "School year already exists"})),
                )
            }),
        );
        let url = spawn_backend(app).await;
        let err = client(&url)
            .with_token("t")
            .add_school_year("2024-2025")
            .await
            .unwrap_err();
        assert_eq!(err.backend_message(), Some("School year already exists"));
    }

    #[tokio::test]
    async fn test_update_sends_json_body() {
        let app = Router::new().route(
            "/api/schedules/{id}",
            put(
                |axum::extract::Path(id): axum::extract::Path<String>, Json(body): Json<Value>| async move {
                    if id == "s1" && body["teacherID"] == "t2" {
                        axum::http::StatusCode::OK
                    } else {
                        axum::http::StatusCode::BAD_REQUEST
                    }
                },
            ),
        );
        let url = spawn_backend(app).await;
        let form = ScheduleForm {
            teacher_id: "t2".to_string(),
            ..Default::default()
        };
        client(&url)
            .with_token("t")
            .update_schedule(&Id::from("s1"), &form)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_login_google() {
        let app = Router::new().route(
            "/api/auth/google",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "accessToken": format!("tok-{}", body["token"].as_str().unwrap_or("")),
                    "user": {"_id": "u1", "name": "Ana", "role": "Admin"}
                }))
            }),
        );
        let url = spawn_backend(app).await;
        let login = client(&url).login_google("cred").await.unwrap();
        assert_eq!(login.access_token, "tok-cred");
        assert_eq!(login.user.role, Some(crate::permissions::Role::Admin));
    }

    #[tokio::test]
    async fn test_settings_null_is_default() {
        let app = Router::new().route("/api/settings", get(|| async { Json(Value::Null) }));
        let url = spawn_backend(app).await;
        let settings = client(&url).with_token("t").settings().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_download_keeps_content_type() {
        let app = Router::new().route(
            "/api/attendance/report/export",
            get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, "application/vnd.ms-excel")],
                    vec![1u8, 2, 3],
                )
            }),
        );
        let url = spawn_backend(app).await;
        let download = client(&url)
            .with_token("t")
            .export_report(&ReportFilters::default())
            .await
            .unwrap();
        assert_eq!(download.bytes, vec![1, 2, 3]);
        assert_eq!(download.content_type.as_deref(), Some("application/vnd.ms-excel"));
    }
}
