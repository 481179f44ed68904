pub mod config;
pub mod request;
pub mod timetable;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub use config::{
    defaults, ConstraintConfig, MaxConsecutiveRule, SearchParams, SoftRule, WizardConstraints,
};
pub use request::{ExplainRequest, GenerateRequest};
pub use timetable::{
    Assignment, Conflict, ConflictKind, DiagnosticsReport, GenerateOutput, PenaltyBreakdown,
    Severity, SolveStats, Timetable, UnplacedUnit,
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            Serialize,
            Deserialize,
            ToSchema,
            JsonSchema,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}
id_newtype!(SchoolId);
id_newtype!(PeriodId);
id_newtype!(SubjectId);
id_newtype!(TeacherId);
id_newtype!(ClassId);
id_newtype!(RoomId);
id_newtype!(RequirementId);

/// Day of the week. Ordering follows the calendar, Monday first.
#[derive(
    Clone,
    Copy,
    Debug,
    Serialize,
    Deserialize,
    ToSchema,
    JsonSchema,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    #[serde(alias = "monday")]
    Mon,
    #[serde(alias = "tuesday")]
    Tue,
    #[serde(alias = "wednesday")]
    Wed,
    #[serde(alias = "thursday")]
    Thu,
    #[serde(alias = "friday")]
    Fri,
    #[serde(alias = "saturday")]
    Sat,
    #[serde(alias = "sunday")]
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Mon,
        Day::Tue,
        Day::Wed,
        Day::Thu,
        Day::Fri,
        Day::Sat,
        Day::Sun,
    ];

    pub const WEEKDAYS: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
            Day::Sat => "sat",
            Day::Sun => "sun",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time of day with minute resolution, written as `"HH:MM"`.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    pub const NOON: ClockTime = ClockTime { minutes: 12 * 60 };

    pub const fn from_hm(hour: u16, minute: u16) -> Self {
        Self {
            minutes: hour * 60 + minute,
        }
    }

    pub fn minutes(self) -> u16 {
        self.minutes
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseClockTimeError(String);

impl fmt::Display for ParseClockTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day {:?}, expected HH:MM", self.0)
    }
}

impl std::error::Error for ParseClockTimeError {}

impl FromStr for ClockTime {
    type Err = ParseClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockTimeError(s.to_owned());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        let hour: u16 = h.parse().map_err(|_| err())?;
        let minute: u16 = m.parse().map_err(|_| err())?;
        if hour > 23 || minute > 59 {
            return Err(err());
        }
        Ok(Self::from_hm(hour, minute))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Period {
    pub id: PeriodId,
    #[serde(default)]
    pub name: String,
    #[schema(value_type = String, example = "08:00")]
    #[schemars(with = "String")]
    pub start: ClockTime,
    #[schema(value_type = String, example = "08:45")]
    #[schemars(with = "String")]
    pub end: ClockTime,
    #[serde(default)]
    pub is_break: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    /// Operating days.
    pub days: Vec<Day>,
    /// Daily bell schedule, in chronological order.
    pub periods: Vec<Period>,
}

impl School {
    pub fn has_break_period(&self) -> bool {
        self.periods.iter().any(|p| p.is_break)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub weekly_periods: i32,
    #[serde(default)]
    pub is_core: bool,
    #[serde(default)]
    pub is_difficult: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    /// Subjects taught. Empty means the teacher may take any subject.
    #[serde(default)]
    pub subjects: Vec<SubjectId>,
}

impl Teacher {
    pub fn teaches(&self, subject: &SubjectId) -> bool {
        self.subjects.is_empty() || self.subjects.contains(subject)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Classroom {
    pub id: RoomId,
    pub name: String,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ClassGroup {
    pub id: ClassId,
    pub name: String,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub student_count: Option<u32>,
}

/// Weekly demand for one subject in one class.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct LessonRequirement {
    pub id: RequirementId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    /// Overrides the subject's weekly period count.
    #[serde(default)]
    pub periods_per_week: Option<i32>,
    /// Candidate teachers. Empty means every teacher of the subject.
    #[serde(default)]
    pub teacher_ids: Vec<TeacherId>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
}

/// Availability override for a teacher over an inclusive range of periods
/// (`period` through `until`, or just `period`).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct AvailabilityRecord {
    pub teacher_id: TeacherId,
    pub day: Day,
    pub period: PeriodId,
    #[serde(default)]
    pub until: Option<PeriodId>,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct TimetableMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl Default for TimetableMeta {
    fn default() -> Self {
        Self {
            name: None,
            academic_year: None,
            term: None,
            start_date: None,
            end_date: None,
            is_active: true,
        }
    }
}

fn yes() -> bool {
    true
}

/// Read-only snapshot of everything one generation run needs.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Entities {
    pub school: School,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub teachers: Vec<Teacher>,
    #[serde(default)]
    pub classes: Vec<ClassGroup>,
    #[serde(default)]
    pub classrooms: Vec<Classroom>,
    /// When empty, one requirement per (class, subject) pair is derived.
    #[serde(default)]
    pub requirements: Vec<LessonRequirement>,
    #[serde(default)]
    pub availability: Vec<AvailabilityRecord>,
    #[serde(default)]
    pub meta: TimetableMeta,
}
