use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use maud::{html, Markup};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::render;
use crate::api::{ApiError, LoginResponse};
use crate::html::{self, bare_page};
use crate::permissions::Resource;
use crate::server::{or_notice, AppError, CurrentSession, SharedState};
use crate::session::{
    cookie_value, expired_cookie, session_cookie, session_id, Notice, Session,
};
use crate::types::Student;

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    expired: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleLogin {
    credential: String,
    /// Double-submit token, also set as a cookie by Google Identity Services.
    #[serde(default)]
    g_csrf_token: Option<String>,
}

const GOOGLE_CSRF_COOKIE: &str = "g_csrf_token";

#[derive(Debug, Deserialize)]
pub struct TokenLogin {
    token: String,
}

fn login_markup(google_client_id: Option<&str>, notices: &[Notice]) -> Markup {
    bare_page(
        "Sign in",
        html! {
            h1 { "Appello" }
            p { "School attendance" }
            (html::notices(notices))
            @if let Some(client_id) = google_client_id {
                script src="https://accounts.google.com/gsi/client" defer {}
                div #"g_id_onload"
                    data-client_id=(client_id)
                    data-login_uri="/login"
                    data-ux_mode="redirect"
                    data-auto_prompt="false" {}
                div.g_id_signin data-type="standard" data-text="signin_with" {}
                noscript { p { "Google sign-in needs JavaScript." } }
            } @else {
                div.notice.error { "Google sign-in is not configured." }
                form.stacked method="post" action="/login/token" {
                    label {
                        "Access token"
                        input type="password" name="token" required;
                    }
                    button type="submit" { "Sign in with token" }
                }
            }
        },
    )
}

pub async fn login_page(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(sid) = session_id(&headers) {
        if state.sessions.get(&sid).await.is_some() {
            return Redirect::to("/").into_response();
        }
    }

    let mut notices = Vec::new();
    if query.expired.is_some() {
        notices.push(Notice::error("Your session has expired. Please sign in again."));
    }
    let markup = login_markup(state.config.google_client_id.as_deref(), &notices);
    Html(markup.into_string()).into_response()
}

/// Starts a session from a successful backend login.
async fn start_session(state: &SharedState, login: LoginResponse) -> Response {
    let role = login.user.role.map(|r| r.as_str()).unwrap_or("none");
    info!(user = %login.user.id, role, "Signed in");
    let sid = state
        .sessions
        .create(Session::new(login.access_token, login.user))
        .await;
    let active = state.sessions.len().await;
    debug!(active, "Session created");
    (
        [(header::SET_COOKIE, session_cookie(&sid))],
        Redirect::to("/"),
    )
        .into_response()
}

fn login_failed(state: &SharedState, err: ApiError) -> Response {
    warn!(error = %err, "Sign-in failed");
    let message = match err {
        ApiError::Unauthorized => "Sign-in was rejected.",
        _ => "Sign-in failed. Please try again.",
    };
    login_rejected(state, message)
}

fn login_rejected(state: &SharedState, message: &str) -> Response {
    let markup = login_markup(
        state.config.google_client_id.as_deref(),
        &[Notice::error(message)],
    );
    (StatusCode::UNAUTHORIZED, Html(markup.into_string())).into_response()
}

/// Google Identity Services posts the ID token here.
pub async fn login_google(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(form): Form<GoogleLogin>,
) -> Response {
    let cookie = cookie_value(&headers, GOOGLE_CSRF_COOKIE);
    let posted = form.g_csrf_token.as_deref().filter(|t| !t.is_empty());
    if cookie.is_none() || cookie.as_deref() != posted {
        warn!("Sign-in CSRF token mismatch");
        return login_rejected(&state, "Sign-in was rejected.");
    }

    match state.api.login_google(&form.credential).await {
        Ok(login) => start_session(&state, login).await,
        Err(err) => login_failed(&state, err),
    }
}

/// Signs in with an access token issued by the backend.
pub async fn login_token(
    State(state): State<SharedState>,
    Form(form): Form<TokenLogin>,
) -> Response {
    let token = form.token.trim().to_string();
    match state.api.me(&token).await {
        Ok(user) => {
            let login = LoginResponse {
                access_token: token,
                user,
            };
            start_session(&state, login).await
        }
        Err(err) => login_failed(&state, err),
    }
}

pub async fn logout(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    if let Some(sid) = session_id(&headers) {
        if state.sessions.remove(&sid).await.is_some() {
            info!(expired = query.expired.is_some(), "Signed out");
        }
    }
    let target = if query.expired.is_some() {
        "/login?expired=1"
    } else {
        "/login"
    };
    ([(header::SET_COOKIE, expired_cookie())], Redirect::to(target)).into_response()
}

/// Read-only profile of the signed-in student, matched by email address.
pub async fn my_profile(
    State(state): State<SharedState>,
    current: CurrentSession,
) -> Result<Html<String>, AppError> {
    current.require(Resource::MyProfile)?;
    let mut chrome = current.chrome(&state).await;

    let students = or_notice(
        current.backend(&state).students(true).await,
        "Error loading student profile.",
        &mut chrome.notices,
    )?;
    let email = current.session.user.email.as_deref();
    let student = students
        .iter()
        .find(|s| email.is_some() && s.email_address.as_deref() == email);

    let content = match student {
        Some(student) => profile(student),
        None => html::empty_state("No student record matches your account."),
    };
    Ok(render("Student Profile", &chrome, content))
}

fn profile(student: &Student) -> Markup {
    let reference_label = |r: &crate::types::Reference| {
        r.field("name")
            .map(str::to_string)
            .unwrap_or_else(|| r.id().to_string())
    };
    let section = student.section.as_ref().map(reference_label);
    let parent = student.parent.as_ref().map(|r| {
        match (r.field("firstName"), r.field("lastName")) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            _ => reference_label(r),
        }
    });
    let enrolled = student
        .date_enrolled
        .as_deref()
        .map(|d| d.get(..10).unwrap_or(d));

    let rows: [(&str, Option<&str>); 9] = [
        ("First Name", Some(student.first_name.as_str())),
        ("Middle Name", student.middle_name.as_deref()),
        ("Last Name", Some(student.last_name.as_str())),
        ("Gender", student.gender.as_deref()),
        ("Program", student.program.as_deref()),
        ("Section", section.as_deref()),
        ("Date Enrolled", enrolled),
        ("Email Address", student.email_address.as_deref()),
        ("Parent", parent.as_deref()),
    ];

    html! {
        dl.profile {
            @for (label, value) in rows {
                dt { (label) }
                dd { (value.unwrap_or("-")) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pages::test_support::*;
    use axum::http::{header, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[tokio::test]
    async fn test_login_page_without_google_shows_token_form() {
        let app = app_with_backend(Router::new()).await;
        let response = app.get("/login?expired=1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("/login/token"));
        assert!(body.contains("Your session has expired"));
    }

    #[tokio::test]
    async fn test_login_page_redirects_signed_in_users() {
        let app = app_with_backend(Router::new()).await;
        let cookie = app.login("admin").await;
        let response = app.get("/login", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/"));
    }

    #[tokio::test]
    async fn test_token_login_creates_session() {
        let backend = Router::new().route(
            "/api/auth/me",
            get(|| async { Json(json!({"_id": "u9", "name": "Ms. Cruz", "role": "Faculty"})) }),
        );
        let app = app_with_backend(backend).await;

        let response = app.post_form("/login/token", None, "token=abc").await;
        assert!(is_redirect(&response));
        assert_eq!(location(&response), Some("/"));
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("appello_session="));
        assert_eq!(app.state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_rejected_token_stays_on_login() {
        let backend = Router::new().route(
            "/api/auth/me",
            get(|| async { (StatusCode::UNAUTHORIZED, "bad token") }),
        );
        let app = app_with_backend(backend).await;

        let response = app.post_form("/login/token", None, "token=nope").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Sign-in was rejected."));
        assert_eq!(app.state.sessions.len().await, 0);
    }

    fn google_backend() -> Router {
        Router::new().route(
            "/api/auth/google",
            axum::routing::post(|| async {
                Json(json!({
                    "accessToken": "tok",
                    "user": {"_id": "u7", "name": "Mr. Reyes", "role": "Admin"}
                }))
            }),
        )
    }

    #[tokio::test]
    async fn test_google_login_checks_csrf_token() {
        let app = app_with_backend(google_backend()).await;

        let response = app
            .post_form("/login", Some("g_csrf_token=abc"), "credential=jwt&g_csrf_token=xyz")
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("Sign-in was rejected."));

        // Token posted without the matching cookie
        let response = app
            .post_form("/login", None, "credential=jwt&g_csrf_token=abc")
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.state.sessions.len().await, 0);

        let response = app
            .post_form("/login", Some("g_csrf_token=abc"), "credential=jwt&g_csrf_token=abc")
            .await;
        assert_eq!(location(&response), Some("/"));
        assert_eq!(app.state.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_logout_drops_session() {
        let app = app_with_backend(Router::new()).await;
        let cookie = app.login("admin").await;

        let response = app.get("/logout?expired=1", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/login?expired=1"));
        assert_eq!(app.state.sessions.len().await, 0);

        let response = app.get("/", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/login"));
    }

    #[tokio::test]
    async fn test_profile_matches_email() {
        let backend = Router::new().route(
            "/api/students",
            get(|| async {
                Json(json!([
                    {"_id": "a", "firstName": "Other", "lastName": "Kid", "emailAddress": "other@school.example"},
                    {"_id": "b", "firstName": "Test", "lastName": "Student",
                     "emailAddress": "test@school.example", "program": "Online",
                     "section": {"_id": "sec1", "name": "Rizal"}}
                ]))
            }),
        );
        let app = app_with_backend(backend).await;
        let cookie = app.login("student").await;

        let body = body_text(app.get("/my-profile", Some(&cookie)).await).await;
        assert!(body.contains("test@school.example"));
        assert!(body.contains("Rizal"));
        assert!(!body.contains("Other"));
    }

    #[tokio::test]
    async fn test_profile_forbidden_for_parents() {
        let app = app_with_backend(Router::new()).await;
        let cookie = app.login("parent").await;
        let response = app.get("/my-profile", Some(&cookie)).await;
        assert_eq!(location(&response), Some("/"));
    }
}
