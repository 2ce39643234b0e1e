//! Role-based access to screens.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
    Parent,
}

impl Role {
    /// Case-insensitive role name lookup.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            "parent" => Some(Role::Parent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
            Role::Parent => "parent",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role names deserialize to `None` instead of failing the login.
pub fn deserialize_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Role::parse))
}

/// Screens guarded by a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Dashboard,
    Attendance,
    Schedules,
    Sections,
    Subjects,
    Users,
    Settings,
    Reports,
    Faculty,
    Students,
    Parents,
    MyFacultySchedule,
    MyProfile,
    MySchedule,
    MyAttendance,
    ParentAttendance,
}

impl Resource {
    pub fn slug(self) -> &'static str {
        match self {
            Resource::Dashboard => "dashboard",
            Resource::Attendance => "attendance",
            Resource::Schedules => "schedules",
            Resource::Sections => "sections",
            Resource::Subjects => "subjects",
            Resource::Users => "users",
            Resource::Settings => "settings",
            Resource::Reports => "reports",
            Resource::Faculty => "faculty",
            Resource::Students => "students",
            Resource::Parents => "parents",
            Resource::MyFacultySchedule => "my-faculty-schedule",
            Resource::MyProfile => "my-profile",
            Resource::MySchedule => "my-schedule",
            Resource::MyAttendance => "my-attendance",
            Resource::ParentAttendance => "parent-attendance",
        }
    }
}

const ADMIN: &[Resource] = &[
    Resource::Dashboard,
    Resource::Attendance,
    Resource::Schedules,
    Resource::Sections,
    Resource::Subjects,
    Resource::Users,
    Resource::Settings,
    Resource::Reports,
    Resource::Faculty,
    Resource::Students,
    Resource::Parents,
];

const FACULTY: &[Resource] = &[
    Resource::Dashboard,
    Resource::Attendance,
    Resource::Schedules,
    Resource::Sections,
    Resource::Students,
    Resource::MyFacultySchedule,
];

const STUDENT: &[Resource] = &[
    Resource::MyProfile,
    Resource::MySchedule,
    Resource::MyAttendance,
];

const PARENT: &[Resource] = &[Resource::ParentAttendance];

pub fn permissions(role: Role) -> &'static [Resource] {
    match role {
        Role::Admin => ADMIN,
        Role::Faculty => FACULTY,
        Role::Student => STUDENT,
        Role::Parent => PARENT,
    }
}

/// Whether a user with `role` may open `resource`. No role, no access.
pub fn has_access(role: Option<Role>, resource: Resource) -> bool {
    role.is_some_and(|r| permissions(r).contains(&resource))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("FACULTY"), Some(Role::Faculty));
        assert_eq!(Role::parse("janitor"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_admin_access() {
        assert!(has_access(Some(Role::Admin), Resource::Users));
        assert!(has_access(Some(Role::Admin), Resource::Reports));
        assert!(!has_access(Some(Role::Admin), Resource::MySchedule));
    }

    #[test]
    fn test_faculty_access() {
        assert!(has_access(Some(Role::Faculty), Resource::Attendance));
        assert!(has_access(Some(Role::Faculty), Resource::MyFacultySchedule));
        assert!(!has_access(Some(Role::Faculty), Resource::Users));
        assert!(!has_access(Some(Role::Faculty), Resource::Reports));
    }

    #[test]
    fn test_student_and_parent_access() {
        assert!(has_access(Some(Role::Student), Resource::MyAttendance));
        assert!(!has_access(Some(Role::Student), Resource::Attendance));
        assert!(has_access(Some(Role::Parent), Resource::ParentAttendance));
        assert!(!has_access(Some(Role::Parent), Resource::MyProfile));
    }

    #[test]
    fn test_no_role_has_no_access() {
        assert!(!has_access(None, Resource::Dashboard));
    }

    #[test]
    fn test_deserialize_unknown_role() {
        #[derive(Deserialize)]
        struct User {
            #[serde(default, deserialize_with = "deserialize_role")]
            role: Option<Role>,
        }
        let user: User = serde_json::from_str(r#"{"role":"Student"}"#).unwrap();
        assert_eq!(user.role, Some(Role::Student));
        let user: User = serde_json::from_str(r#"{"role":"ghost"}"#).unwrap();
        assert_eq!(user.role, None);
        let user: User = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(user.role, None);
    }
}
