//! Server-side sessions.
//!
//! The browser only holds an opaque session id cookie. Everything else the
//! screens need between requests (backend token, signed-in user, sticky
//! filters, the one-shot notice) lives here.

use axum::http::{header, HeaderMap};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::permissions::{deserialize_role, has_access, Resource, Role};
use crate::types::{Id, Reference};

pub const COOKIE_NAME: &str = "appello_session";

/// The signed-in user as reported by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawUser")]
pub struct SessionUser {
    pub id: Id,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    /// Students carry the section their schedule is read from.
    pub section_id: Option<Id>,
}

// The backend is inconsistent about `_id` vs `id` on user objects, and
// sometimes sends both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    #[serde(rename = "_id", default)]
    underscore_id: Option<Id>,
    #[serde(default)]
    id: Option<Id>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, deserialize_with = "deserialize_role")]
    role: Option<Role>,
    #[serde(rename = "sectionID", default)]
    section_id: Option<Reference>,
}

impl TryFrom<RawUser> for SessionUser {
    type Error = String;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.underscore_id)
            .ok_or_else(|| "user without id".to_string())?;
        Ok(Self {
            id,
            name: raw.name,
            email: raw.email,
            role: raw.role,
            section_id: raw.section_id.map(|r| r.id().clone()),
        })
    }
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("User")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A message shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Attendance screen filters, remembered for the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFilters {
    pub subject: Option<Id>,
    pub section: Option<Id>,
    pub date: Option<NaiveDate>,
}

/// Report screen filters, remembered for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub student: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    /// `YYYY-MM`
    #[serde(default)]
    pub month: Option<String>,
    /// School year label, e.g. `2024-2025`.
    #[serde(rename = "year", default)]
    pub school_year: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ReportFilters {
    /// Drops blank values left by untouched form fields.
    pub fn normalized(self) -> Self {
        Self {
            section: non_empty(self.section),
            student: non_empty(self.student),
            subject: non_empty(self.subject),
            month: non_empty(self.month),
            school_year: non_empty(self.school_year),
            quarter: non_empty(self.quarter),
        }
    }

    /// Backend query parameters for the report endpoints.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        [
            ("sectionID", &self.section),
            ("studentID", &self.student),
            ("subjectID", &self.subject),
            ("month", &self.month),
            ("schoolYear", &self.school_year),
            ("quarter", &self.quarter),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub attendance: AttendanceFilters,
    pub subject_report: ReportFilters,
    pub student_report: ReportFilters,
    flash: Option<Notice>,
}

impl Session {
    pub fn new(token: String, user: SessionUser) -> Self {
        Self {
            token,
            user,
            attendance: AttendanceFilters::default(),
            subject_report: ReportFilters::default(),
            student_report: ReportFilters::default(),
            flash: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user.role
    }

    pub fn can(&self, resource: Resource) -> bool {
        has_access(self.role(), resource)
    }
}

struct Entry {
    session: Session,
    last_seen: Instant,
}

impl Entry {
    fn is_idle(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() >= ttl
    }
}

/// In-memory session table keyed by the cookie value. Sessions idle for
/// longer than the ttl are treated as gone.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::default(),
            ttl,
        }
    }

    /// Stores a session and returns its new id. Idle sessions are swept
    /// out at the same time.
    pub async fn create(&self, session: Session) -> String {
        let sid = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(self.ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "Expired idle sessions");
        }
        sessions.insert(
            sid.clone(),
            Entry {
                session,
                last_seen: Instant::now(),
            },
        );
        sid
    }

    /// Live session for `sid`, counting the lookup as activity.
    async fn touch<R>(&self, sid: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        let idle = sessions.get(sid)?.is_idle(self.ttl);
        if idle {
            sessions.remove(sid);
            debug!("Session expired");
            return None;
        }
        let entry = sessions.get_mut(sid)?;
        entry.last_seen = Instant::now();
        Some(f(&mut entry.session))
    }

    pub async fn get(&self, sid: &str) -> Option<Session> {
        self.touch(sid, |session| session.clone()).await
    }

    pub async fn remove(&self, sid: &str) -> Option<Session> {
        let removed = self.sessions.write().await.remove(sid);
        if removed.is_some() {
            debug!("Session removed");
        }
        removed.map(|entry| entry.session)
    }

    /// Applies `f` to the session, returning false if it no longer exists.
    pub async fn update(&self, sid: &str, f: impl FnOnce(&mut Session)) -> bool {
        self.touch(sid, f).await.is_some()
    }

    pub async fn flash(&self, sid: &str, notice: Notice) {
        self.update(sid, |s| s.flash = Some(notice)).await;
    }

    pub async fn take_flash(&self, sid: &str) -> Option<Notice> {
        self.touch(sid, |s| s.flash.take()).await.flatten()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Reads a non-empty cookie from the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, cookie: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, COOKIE_NAME)
}

pub fn session_cookie(sid: &str) -> String {
    format!("{COOKIE_NAME}={sid}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
