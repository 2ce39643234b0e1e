use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, Backend};
use crate::config::Config;
use crate::html::{self, Chrome};
use crate::pages;
use crate::permissions::Resource;
use crate::session::{session_id, Notice, Session, SessionStore};

/// Application state shared across requests
pub struct AppState {
    pub api: ApiClient,
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let api = ApiClient::new(&config.api_url, config.request_timeout)?;
        Ok(Self {
            api,
            sessions: SessionStore::new(config.session_ttl),
            config,
        })
    }
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(pages::home::index))
        .route(
            "/login",
            get(pages::account::login_page).post(pages::account::login_google),
        )
        .route("/login/token", post(pages::account::login_token))
        .route("/logout", get(pages::account::logout))
        .route("/my-profile", get(pages::account::my_profile))
        .route(
            "/schedules",
            get(pages::schedules::index).post(pages::schedules::create),
        )
        .route("/schedules/new", get(pages::schedules::new_form))
        .route("/schedules/{id}", post(pages::schedules::update))
        .route("/schedules/{id}/edit", get(pages::schedules::edit_form))
        .route("/schedules/{id}/delete", post(pages::schedules::delete))
        .route("/my-schedule", get(pages::schedules::my_schedule))
        .route(
            "/my-faculty-schedule",
            get(pages::schedules::my_faculty_schedule),
        )
        .route("/attendance", get(pages::attendance::index))
        .route("/attendance/{student}", post(pages::attendance::record))
        .route("/my-attendance", get(pages::attendance::my_attendance))
        .route(
            "/parent-attendance",
            get(pages::attendance::parent_attendance),
        )
        .route("/reports/attendance", get(pages::reports::subject_report))
        .route(
            "/reports/attendance/export",
            get(pages::reports::export_subject_report),
        )
        .route("/reports/students", get(pages::reports::student_report))
        .route(
            "/reports/students/export",
            get(pages::reports::export_student_report),
        )
        .route(
            "/manage/{kind}",
            get(pages::manage::index).post(pages::manage::create),
        )
        .route("/manage/{kind}/new", get(pages::manage::new_form))
        .route("/manage/{kind}/{id}", post(pages::manage::update))
        .route("/manage/{kind}/{id}/edit", get(pages::manage::edit_form))
        .route("/manage/{kind}/{id}/delete", post(pages::manage::delete))
        .route("/settings", get(pages::settings::index))
        .route(
            "/settings/school-years",
            post(pages::settings::add_school_year),
        )
        .route(
            "/settings/school-year",
            post(pages::settings::set_school_year),
        )
        .route("/settings/quarter", post(pages::settings::set_quarter))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the web server
pub async fn serve(addr: SocketAddr, state: SharedState) -> anyhow::Result<()> {
    info!(backend = %state.api.base_url(), "Using backend");

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server running");

    axum::serve(listener, app).await?;
    Ok(())
}

/// The signed-in user's session, or a redirect to the login page.
pub struct CurrentSession {
    pub sid: String,
    pub session: Session,
}

impl FromRequestParts<SharedState> for CurrentSession {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let sid = session_id(&parts.headers).ok_or_else(|| Redirect::to("/login"))?;
        let session = state
            .sessions
            .get(&sid)
            .await
            .ok_or_else(|| Redirect::to("/login"))?;
        Ok(Self { sid, session })
    }
}

impl CurrentSession {
    pub fn backend<'a>(&'a self, state: &'a AppState) -> Backend<'a> {
        state.api.with_token(&self.session.token)
    }

    /// Route guard: users without access are sent back to the home page.
    pub fn require(&self, resource: Resource) -> Result<(), AppError> {
        if self.session.can(resource) {
            Ok(())
        } else {
            let role = self.session.role().map(|r| r.as_str()).unwrap_or("none");
            debug!(resource = resource.slug(), role, "Access denied");
            Err(AppError::Forbidden)
        }
    }

    /// Page chrome for this request, consuming the pending notice.
    pub async fn chrome(&self, state: &AppState) -> Chrome {
        let mut notices = Vec::new();
        if let Some(notice) = state.sessions.take_flash(&self.sid).await {
            notices.push(notice);
        }
        Chrome {
            user_name: self.session.user.display_name().to_string(),
            role: self.session.role(),
            notices,
        }
    }

    pub async fn flash(&self, state: &AppState, notice: Notice) {
        state.sessions.flash(&self.sid, notice).await;
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not allowed")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Drop the server-side session too, then back to login
            AppError::Api(ApiError::Unauthorized) => {
                Redirect::to("/logout?expired=1").into_response()
            }
            AppError::Forbidden => Redirect::to("/").into_response(),
            AppError::Api(err) => {
                warn!(error = %err, "Backend request failed");
                let markup = html::error_page("The attendance service is not available right now.");
                (StatusCode::BAD_GATEWAY, Html(markup.into_string())).into_response()
            }
            AppError::BadRequest(message) => {
                let markup = html::error_page(&message);
                (StatusCode::BAD_REQUEST, Html(markup.into_string())).into_response()
            }
        }
    }
}

/// Unwraps a page's data fetch. A failure becomes an error notice and
/// `T::default()` so the rest of the page still renders; an expired session
/// is still propagated.
pub fn or_notice<T: Default>(
    result: Result<T, ApiError>,
    failure: &str,
    notices: &mut Vec<Notice>,
) -> Result<T, AppError> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => Err(AppError::Api(ApiError::Unauthorized)),
        Err(err) => {
            warn!(error = %err, "{}", failure);
            notices.push(Notice::error(failure));
            Ok(T::default())
        }
    }
}

/// Flashes the outcome of a mutation and redirects back to `back`.
pub async fn finish_mutation(
    state: &AppState,
    current: &CurrentSession,
    result: Result<(), ApiError>,
    success: &str,
    failure: &str,
    back: &str,
) -> Result<Redirect, AppError> {
    match result {
        Ok(()) => {
            info!(outcome = success, "Mutation applied");
            current.flash(state, Notice::success(success)).await;
        }
        Err(ApiError::Unauthorized) => return Err(AppError::Api(ApiError::Unauthorized)),
        Err(err) => {
            warn!(error = %err, "{}", failure);
            current.flash(state, Notice::error(failure)).await;
        }
    }
    Ok(Redirect::to(back))
}
