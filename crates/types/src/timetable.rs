use crate::{ClassId, Day, PeriodId, RequirementId, RoomId, SchoolId, SubjectId, TeacherId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Assignment {
    pub requirement_id: RequirementId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub day: Day,
    pub period_id: PeriodId,
}

/// Result of one generation run. Never edited in place; regenerate instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Timetable {
    pub school_id: SchoolId,
    pub name: String,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub is_active: bool,
    pub assignments: Vec<Assignment>,
}

impl Timetable {
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn for_class<'a>(&'a self, class: &'a ClassId) -> impl Iterator<Item = &'a Assignment> {
        self.assignments.iter().filter(move |a| &a.class_id == class)
    }

    pub fn for_teacher<'a>(
        &'a self,
        teacher: &'a TeacherId,
    ) -> impl Iterator<Item = &'a Assignment> {
        self.assignments.iter().filter(move |a| &a.teacher_id == teacher)
    }

    pub fn for_room<'a>(&'a self, room: &'a RoomId) -> impl Iterator<Item = &'a Assignment> {
        self.assignments
            .iter()
            .filter(move |a| a.room_id.as_ref() == Some(room))
    }

    pub fn at<'a>(
        &'a self,
        day: Day,
        period: &'a PeriodId,
    ) -> impl Iterator<Item = &'a Assignment> {
        self.assignments
            .iter()
            .filter(move |a| a.day == day && &a.period_id == period)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    TeacherDoubleBooked,
    RoomDoubleBooked,
    ClassDoubleBooked,
    TeacherUnavailable,
    BreakPeriodOccupied,
    UnknownReference,
    /// Class, subject, teacher or room disagrees with the assignment's
    /// requirement.
    RequirementMismatch,
    UnsatisfiedRequirement,
}

impl ConflictKind {
    /// Whether the conflict breaks a hard rule, as opposed to a shortfall.
    pub fn is_hard(self) -> bool {
        !matches!(self, ConflictKind::UnsatisfiedRequirement)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_id: Option<PeriodId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<TeacherId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,
    #[serde(default)]
    pub requirement_ids: Vec<RequirementId>,
    pub message: String,
}

/// Weighted soft-rule penalties, one field per rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct PenaltyBreakdown {
    pub back_to_back_same_subject: f64,
    pub core_subject_after_morning: f64,
    pub single_period_gaps: f64,
    pub unbalanced_week: f64,
    pub consecutive_difficult: f64,
    pub excess_consecutive: f64,
}

impl PenaltyBreakdown {
    pub fn total(&self) -> f64 {
        self.back_to_back_same_subject
            + self.core_subject_after_morning
            + self.single_period_gaps
            + self.unbalanced_week
            + self.consecutive_difficult
            + self.excess_consecutive
    }
}

impl Add for PenaltyBreakdown {
    type Output = Self;

    fn add(self, o: Self) -> Self {
        Self {
            back_to_back_same_subject: self.back_to_back_same_subject
                + o.back_to_back_same_subject,
            core_subject_after_morning: self.core_subject_after_morning
                + o.core_subject_after_morning,
            single_period_gaps: self.single_period_gaps + o.single_period_gaps,
            unbalanced_week: self.unbalanced_week + o.unbalanced_week,
            consecutive_difficult: self.consecutive_difficult + o.consecutive_difficult,
            excess_consecutive: self.excess_consecutive + o.excess_consecutive,
        }
    }
}

impl AddAssign for PenaltyBreakdown {
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl Sub for PenaltyBreakdown {
    type Output = Self;

    fn sub(self, o: Self) -> Self {
        Self {
            back_to_back_same_subject: self.back_to_back_same_subject
                - o.back_to_back_same_subject,
            core_subject_after_morning: self.core_subject_after_morning
                - o.core_subject_after_morning,
            single_period_gaps: self.single_period_gaps - o.single_period_gaps,
            unbalanced_week: self.unbalanced_week - o.unbalanced_week,
            consecutive_difficult: self.consecutive_difficult - o.consecutive_difficult,
            excess_consecutive: self.excess_consecutive - o.excess_consecutive,
        }
    }
}

/// One period of a requirement the solver could not place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct UnplacedUnit {
    pub requirement_id: RequirementId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub occurrence: u32,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolveStats {
    pub units: u32,
    pub placed_greedy: u32,
    pub placed_repair: u32,
    pub repair_iterations: u32,
    pub repair_moves: u32,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct DiagnosticsReport {
    pub conflicts: Vec<Conflict>,
    /// Total weighted soft penalty; zero is a perfect timetable.
    pub quality_score: f64,
    pub penalties: PenaltyBreakdown,
    /// Solver's account of what it could not place. Advisory; `conflicts`
    /// is authoritative.
    #[serde(default)]
    pub unplaced: Vec<UnplacedUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SolveStats>,
}

impl DiagnosticsReport {
    pub fn hard_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(|c| c.kind.is_hard())
    }

    pub fn unsatisfied(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::UnsatisfiedRequirement)
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct GenerateOutput {
    pub timetable: Timetable,
    pub diagnostics: DiagnosticsReport,
}

impl GenerateOutput {
    /// Every requirement fully placed without any conflict.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_clean() && self.diagnostics.unplaced.is_empty()
    }
}
