use maud::{html, Markup, PreEscaped, DOCTYPE};
use reqwest::Url;

use crate::filter::{Referencable, SelectOption};
use crate::permissions::{has_access, Resource, Role};
use crate::session::{Notice, NoticeLevel};
use crate::types::Id;

/// Per-request data for the shared layout.
#[derive(Debug, Clone, Default)]
pub struct Chrome {
    pub user_name: String,
    pub role: Option<Role>,
    pub notices: Vec<Notice>,
}

/// Navigation entries in display order
const NAV: &[(Resource, &str, &str)] = &[
    (Resource::Dashboard, "Dashboard", "/"),
    (Resource::Attendance, "Attendance", "/attendance"),
    (Resource::Schedules, "Schedules", "/schedules"),
    (Resource::MyFacultySchedule, "My Classes", "/my-faculty-schedule"),
    (Resource::Reports, "Subject Report", "/reports/attendance"),
    (Resource::Reports, "Student Report", "/reports/students"),
    (Resource::Sections, "Sections", "/manage/sections"),
    (Resource::Subjects, "Subjects", "/manage/subjects"),
    (Resource::Faculty, "Faculty", "/manage/faculty"),
    (Resource::Students, "Students", "/manage/students"),
    (Resource::Parents, "Parents", "/manage/parents"),
    (Resource::Users, "Users", "/manage/users"),
    (Resource::Settings, "Settings", "/settings"),
    (Resource::MyProfile, "My Profile", "/my-profile"),
    (Resource::MySchedule, "My Schedule", "/my-schedule"),
    (Resource::MyAttendance, "My Attendance", "/my-attendance"),
    (Resource::ParentAttendance, "Attendance", "/parent-attendance"),
];

/// Navigation links the role may follow.
pub fn nav_links(role: Option<Role>) -> Vec<(&'static str, &'static str)> {
    NAV.iter()
        .filter(|(resource, _, _)| has_access(role, *resource))
        .map(|(_, label, href)| (*label, *href))
        .collect()
}

fn head(title: &str) -> Markup {
    html! {
        head {
            meta charset="UTF-8";
            meta name="viewport" content="width=device-width, initial-scale=1.0";
            title { (title) " | Appello" }
            style { (PreEscaped(CSS)) }
        }
    }
}

/// Full page with navigation for a signed-in user.
pub fn page(title: &str, chrome: &Chrome, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(title))
            body {
                header.topbar {
                    a.brand href="/" { "Appello" }
                    nav {
                        @for (label, href) in nav_links(chrome.role) {
                            a href=(href) { (label) }
                        }
                    }
                    div.user {
                        span { (chrome.user_name) }
                        @if let Some(role) = chrome.role {
                            span.role { (role.as_str()) }
                        }
                        a href="/logout" { "Sign out" }
                    }
                }
                main.container {
                    h1 { (title) }
                    (notices(&chrome.notices))
                    (content)
                }
            }
        }
    }
}

/// Page without navigation, for the login and error screens.
pub fn bare_page(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            (head(title))
            body {
                main.container.narrow {
                    (content)
                }
            }
        }
    }
}

pub fn error_page(message: &str) -> Markup {
    bare_page(
        "Error",
        html! {
            h1 { "Something went wrong" }
            p { (message) }
            p { a href="/" { "Back to the start page" } }
        },
    )
}

fn notice_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Success => "notice success",
        NoticeLevel::Error => "notice error",
    }
}

pub fn notices(list: &[Notice]) -> Markup {
    html! {
        @for notice in list {
            div class=(notice_class(notice.level)) role="status" { (notice.message) }
        }
    }
}

/// `<option>`s for an entity selector. Options that may not be chosen stay
/// visible but disabled.
pub fn entity_options<E: Referencable>(
    options: &[SelectOption<'_, E>],
    current: Option<&Id>,
    placeholder: &str,
) -> Markup {
    html! {
        option value="" { (placeholder) }
        @for opt in options {
            @let id = opt.entity.id();
            option value=(id.as_str())
                selected[current == Some(id)]
                disabled[!opt.selectable] {
                (opt.entity.label())
                @if !opt.entity.is_active() { " (inactive)" }
            }
        }
    }
}

/// `<option>`s for a fixed list of values.
pub fn value_options(values: &[&str], current: Option<&str>, placeholder: Option<&str>) -> Markup {
    html! {
        @if let Some(placeholder) = placeholder {
            option value="" { (placeholder) }
        }
        @for value in values {
            option value=(value) selected[current == Some(*value)] { (value) }
        }
    }
}

/// Builds a local link with a query string, skipping empty values.
pub fn href(path: &str, params: &[(&str, &str)]) -> String {
    let mut url = match Url::parse("http://appello.local") {
        Ok(url) => url,
        Err(_) => return path.to_string(),
    };
    url.set_path(path);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params.iter().filter(|(_, v)| !v.is_empty()) {
            pairs.append_pair(key, value);
        }
    }
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    }
}

pub fn empty_state(message: &str) -> Markup {
    html! {
        div.empty-state { p { (message) } }
    }
}

const CSS: &str = r#"
* {
    margin: 0;
    padding: 0;
    box-sizing: border-box;
}

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
    background: #f4f6f8;
    color: #1f2933;
    line-height: 1.5;
}

a {
    color: #1d4ed8;
    text-decoration: none;
}

.topbar {
    display: flex;
    align-items: center;
    gap: 24px;
    padding: 12px 24px;
    background: #102a43;
    color: #fff;
    flex-wrap: wrap;
}

.topbar a {
    color: #d9e2ec;
}

.topbar .brand {
    font-weight: 800;
    font-size: 1.2em;
    color: #fff;
}

.topbar nav {
    display: flex;
    gap: 16px;
    flex: 1;
    flex-wrap: wrap;
}

.topbar .user {
    display: flex;
    gap: 12px;
    align-items: center;
}

.role {
    text-transform: uppercase;
    font-size: 0.75em;
    letter-spacing: 0.08em;
    padding: 2px 6px;
    border: 1px solid #829ab1;
    border-radius: 4px;
}

.container {
    max-width: 1100px;
    margin: 0 auto;
    padding: 32px 24px 60px;
}

.container.narrow {
    max-width: 480px;
}

h1 {
    font-size: 1.8em;
    margin-bottom: 20px;
}

h2 {
    font-size: 1.2em;
    margin: 24px 0 12px;
}

.notice {
    padding: 10px 14px;
    border-radius: 6px;
    margin-bottom: 16px;
}

.notice.success {
    background: #e3f9e5;
    color: #0e5814;
}

.notice.error {
    background: #ffe3e3;
    color: #8a1c1c;
}

form.filters, form.inline {
    display: flex;
    gap: 12px;
    align-items: flex-end;
    flex-wrap: wrap;
    margin-bottom: 20px;
}

form.inline {
    margin-bottom: 0;
}

form.stacked {
    display: grid;
    gap: 12px;
    max-width: 520px;
}

label {
    display: grid;
    gap: 4px;
    font-size: 0.9em;
    color: #486581;
}

input, select, textarea, button {
    font: inherit;
    padding: 6px 10px;
    border: 1px solid #bcccdc;
    border-radius: 4px;
    background: #fff;
}

button {
    background: #1d4ed8;
    border-color: #1d4ed8;
    color: #fff;
    cursor: pointer;
}

button.danger {
    background: #c53030;
    border-color: #c53030;
}

table {
    width: 100%;
    border-collapse: collapse;
    background: #fff;
}

th, td {
    text-align: left;
    padding: 8px 10px;
    border-bottom: 1px solid #e4e7eb;
    vertical-align: top;
}

.tabs {
    display: flex;
    gap: 4px;
    margin-bottom: 12px;
    flex-wrap: wrap;
}

.tabs a {
    padding: 6px 14px;
    border-radius: 4px 4px 0 0;
    background: #d9e2ec;
}

.tabs a.active {
    background: #102a43;
    color: #fff;
}

.cards {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
    gap: 16px;
    margin-bottom: 24px;
}

.card {
    background: #fff;
    padding: 16px;
    border-radius: 8px;
    box-shadow: 0 1px 2px rgba(0,0,0,0.08);
}

.card .value {
    font-size: 2em;
    font-weight: 800;
}

.actions {
    display: flex;
    gap: 8px;
}

.empty-state {
    padding: 40px 20px;
    text-align: center;
    color: #829ab1;
}

dl.profile {
    display: grid;
    grid-template-columns: 180px 1fr;
    gap: 8px 16px;
}

dl.profile dt {
    color: #486581;
}

@media (max-width: 768px) {
    .container {
        padding: 20px 12px 40px;
    }

    dl.profile {
        grid-template-columns: 1fr;
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Teacher;

    #[test]
    fn test_nav_links_follow_role() {
        let student: Vec<_> = nav_links(Some(Role::Student))
            .into_iter()
            .map(|(_, href)| href)
            .collect();
        assert_eq!(student, vec!["/my-profile", "/my-schedule", "/my-attendance"]);

        assert_eq!(nav_links(Some(Role::Parent)), vec![("Attendance", "/parent-attendance")]);
        assert!(nav_links(None).is_empty());
        assert!(nav_links(Some(Role::Admin)).contains(&("Users", "/manage/users")));
        assert!(!nav_links(Some(Role::Faculty)).contains(&("Users", "/manage/users")));
    }

    #[test]
    fn test_href_encodes_and_skips_empty() {
        assert_eq!(href("/schedules", &[]), "/schedules");
        assert_eq!(
            href("/schedules", &[("section", "s1"), ("year", ""), ("day", "Monday")]),
            "/schedules?section=s1&day=Monday"
        );
        assert_eq!(href("/x", &[("q", "a b&c")]), "/x?q=a+b%26c");
    }

    #[test]
    fn test_entity_options_disable_unselectable() {
        let teachers = vec![
            Teacher {
                id: Id::from("1"),
                name: "Ana".to_string(),
                email: None,
                specialization: None,
                is_active: true,
            },
            Teacher {
                id: Id::from("2"),
                name: "Ben".to_string(),
                email: None,
                specialization: None,
                is_active: false,
            },
        ];
        let options = vec![
            SelectOption {
                entity: &teachers[0],
                selectable: true,
            },
            SelectOption {
                entity: &teachers[1],
                selectable: false,
            },
        ];
        let markup = entity_options(&options, Some(&Id::from("1")), "Select teacher").into_string();
        assert!(markup.contains(r#"<option value="1" selected>Ana</option>"#));
        assert!(markup.contains(r#"<option value="2" disabled>Ben (inactive)</option>"#));
    }

    #[test]
    fn test_notices_escape_messages() {
        let markup = notices(&[Notice::error("<b>nope</b>")]).into_string();
        assert!(markup.contains("notice error"));
        assert!(markup.contains("&lt;b&gt;nope&lt;/b&gt;"));
    }
}
