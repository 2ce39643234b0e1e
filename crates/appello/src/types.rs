use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Backend record identifier.
///
/// The backend hands out string ids, but fixtures and older records may carry
/// numbers; both are kept in their canonical string form so ids compare equal
/// regardless of how they arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Id(s),
            Raw::Number(n) => Id(n.to_string()),
        })
    }
}

/// A reference field on a schedule record.
///
/// Depending on the endpoint the backend returns either the bare id or the
/// populated sub-document. Use [`Reference::id`] wherever ids are compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(Id),
    Expanded(ExpandedRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Reference {
    pub fn id(&self) -> &Id {
        match self {
            Reference::Id(id) => id,
            Reference::Expanded(expanded) => &expanded.id,
        }
    }

    /// A string field of the populated document, if any.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Reference::Id(_) => None,
            Reference::Expanded(expanded) => expanded.fields.get(name).and_then(Value::as_str),
        }
    }
}

/// Days a class can be scheduled on, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Days offered when creating a schedule entry.
    pub const SCHOOL_DAYS: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Case-insensitive lookup of a full day name.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grade: String,
    #[serde(default)]
    pub is_active: bool,
}

impl Section {
    /// "7 - Rizal" style label used in every section selector.
    pub fn label(&self) -> String {
        format!("{} - {}", self.grade, self.name)
    }
}

/// Accepts strings and numbers, used for fields like `grade` that the backend
/// stores either way.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// A scheduled class occurrence: one subject taught by one teacher to one
/// section on a weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    /// Day label as sent by the backend, usually a full English day name.
    #[serde(rename = "week", default)]
    pub weekday: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(rename = "teacherID", default)]
    pub teacher: Option<Reference>,
    #[serde(rename = "subjectID", default)]
    pub subject: Option<Reference>,
    #[serde(rename = "sectionID", default)]
    pub section: Option<Reference>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub teacher_name: Option<String>,
    #[serde(default)]
    pub class_mode: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
}

impl Schedule {
    /// "7 - Rizal" when the section reference came back populated.
    pub fn section_label(&self) -> Option<String> {
        let section = self.section.as_ref()?;
        match (section.field("grade"), section.field("name")) {
            (Some(grade), Some(name)) => Some(format!("{} - {}", grade, name)),
            _ => None,
        }
    }
}

/// Payload for creating or updating a schedule entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleForm {
    #[serde(rename = "sectionID")]
    pub section_id: String,
    pub academic_year: String,
    pub quarter: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(rename = "subjectID")]
    pub subject_id: String,
    pub class_mode: String,
    pub week: String,
    #[serde(default)]
    pub room: String,
    #[serde(rename = "teacherID")]
    pub teacher_id: String,
}

/// Defaults for the schedule screen filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSchedule {
    #[serde(default)]
    pub section_id: Option<Id>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub quarter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolYear {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    pub label: String,
    #[serde(default)]
    pub is_current: bool,
}

/// Finds the school year flagged as current.
pub fn current_school_year(years: &[SchoolYear]) -> Option<&SchoolYear> {
    years.iter().find(|sy| sy.is_current)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub current_quarter: Option<String>,
}

pub const QUARTERS: [&str; 4] = ["First", "Second", "Third", "Fourth"];

pub const CLASS_MODES: [&str; 3] = ["Online", "Face-to-Face", "Hybrid"];

/// Class modes offered when correcting a single attendance record.
pub const ATTENDANCE_CLASS_MODES: [&str; 3] = ["Online", "Homeschool", "Face-to-Face"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Tardy,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Tardy,
        AttendanceStatus::Excused,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Tardy => "Tardy",
            AttendanceStatus::Excused => "Excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown or empty statuses read as "not recorded yet".
fn lenient_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<AttendanceStatus>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(AttendanceStatus::parse))
}

/// One row of the attendance roster for a subject, section and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    /// Student id.
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub attendance_status: Option<AttendanceStatus>,
    #[serde(rename = "attendanceID", default)]
    pub attendance_id: Option<Id>,
    #[serde(rename = "scheduleID", default)]
    pub schedule_id: Option<Id>,
    #[serde(default)]
    pub class_mode: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl RosterEntry {
    pub fn class_mode_label(&self) -> &str {
        self.class_mode
            .as_deref()
            .or(self.program.as_deref())
            .unwrap_or("N/A")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub students: Vec<RosterEntry>,
}

/// Body sent when recording attendance for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePayload {
    pub status: AttendanceStatus,
    #[serde(rename = "studentID")]
    pub student_id: Id,
    #[serde(rename = "scheduleID", skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<Id>,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
}

/// Status counts for one day.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DailySummary {
    #[serde(default)]
    pub present: u32,
    #[serde(default)]
    pub absent: u32,
    #[serde(default)]
    pub tardy: u32,
    #[serde(default)]
    pub excused: u32,
}

impl DailySummary {
    pub fn count(&self, status: AttendanceStatus) -> u32 {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Absent => self.absent,
            AttendanceStatus::Tardy => self.tardy,
            AttendanceStatus::Excused => self.excused,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTally {
    #[serde(rename = "studentID")]
    pub student_id: Id,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub count: u32,
}

/// A row of the attendance reports and of a student's own history.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub section_name: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    /// Flattened subject name used by the student history endpoint.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub class_mode: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl AttendanceRecord {
    /// The date part of the record's timestamp.
    pub fn day(&self) -> Option<chrono::NaiveDate> {
        let raw = self.date.as_deref()?;
        let date_part = raw.get(..10).unwrap_or(raw);
        chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }
}

/// Minimal student view used by selectors and the profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id", alias = "id")]
    pub id: Id,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub section: Option<Reference>,
    #[serde(default)]
    pub date_enrolled: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub parent: Option<Reference>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
