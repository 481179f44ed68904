//! Normalized, index-based snapshot of the input entities.
//!
//! Building a [`Problem`] validates the raw [`Entities`] and resolves every
//! id reference into a dense index, so the engine never looks anything up
//! by string during search.

use std::collections::{HashMap, HashSet};

use types::{
    ClassGroup, ClassId, Classroom, ClockTime, Day, Entities, LessonRequirement, PeriodId,
    RequirementId, RoomId, SchoolId, Subject, SubjectId, Teacher, TeacherId, TimetableMeta,
};

use crate::error::{EntityKind, InputValidationError, ValidationErrorKind};

/// Dense index of a (day, period) cell: `day * periods + period`.
pub type Slot = usize;

#[derive(Debug, Clone)]
pub struct PeriodInfo {
    pub id: PeriodId,
    pub start: ClockTime,
    pub end: ClockTime,
    pub is_break: bool,
}

#[derive(Debug, Clone)]
pub struct RequirementInfo {
    pub id: RequirementId,
    pub class: usize,
    pub subject: usize,
    pub periods: u32,
    /// Candidate teachers, ordered by id.
    pub teachers: Vec<usize>,
    /// Suitable rooms ordered by id, or `None` when the lesson needs no room.
    pub rooms: Option<Vec<usize>>,
}

/// Availability override resolved to indices; covers periods `first..=last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWindow {
    pub teacher: usize,
    pub day: usize,
    pub first: usize,
    pub last: usize,
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct Problem {
    pub school_id: SchoolId,
    pub school_name: String,
    pub days: Vec<Day>,
    pub periods: Vec<PeriodInfo>,
    pub subjects: Vec<Subject>,
    pub teachers: Vec<Teacher>,
    pub classes: Vec<ClassGroup>,
    pub rooms: Vec<Classroom>,
    pub requirements: Vec<RequirementInfo>,
    pub availability: Vec<AvailabilityWindow>,
    pub meta: TimetableMeta,
    teacher_ix: HashMap<TeacherId, usize>,
    class_ix: HashMap<ClassId, usize>,
    subject_ix: HashMap<SubjectId, usize>,
    room_ix: HashMap<RoomId, usize>,
    period_ix: HashMap<PeriodId, usize>,
    requirement_ix: HashMap<RequirementId, usize>,
}

impl Problem {
    /// Validates `entities` and builds the snapshot. Every problem found is
    /// reported, not just the first.
    pub fn build(entities: &Entities) -> Result<Self, Vec<InputValidationError>> {
        let mut errors = Vec::new();

        let days = check_school(entities, &mut errors);
        let period_ix = unique_index(
            EntityKind::Period,
            entities.school.periods.iter().map(|p| &p.id),
            &mut errors,
        );
        let subject_ix = unique_index(
            EntityKind::Subject,
            entities.subjects.iter().map(|s| &s.id),
            &mut errors,
        );
        let teacher_ix = unique_index(
            EntityKind::Teacher,
            entities.teachers.iter().map(|t| &t.id),
            &mut errors,
        );
        let class_ix = unique_index(
            EntityKind::Class,
            entities.classes.iter().map(|c| &c.id),
            &mut errors,
        );
        let room_ix = unique_index(
            EntityKind::Classroom,
            entities.classrooms.iter().map(|r| &r.id),
            &mut errors,
        );

        for s in &entities.subjects {
            if s.weekly_periods <= 0 {
                errors.push(InputValidationError::new(
                    ValidationErrorKind::InvalidValue,
                    EntityKind::Subject,
                    &s.id,
                    format!("weekly_periods must be positive, got {}", s.weekly_periods),
                ));
            }
        }
        for t in &entities.teachers {
            for s in &t.subjects {
                if !subject_ix.contains_key(s) {
                    errors.push(InputValidationError::new(
                        ValidationErrorKind::UnknownReference,
                        EntityKind::Teacher,
                        &t.id,
                        format!("teaches unknown subject {s}"),
                    ));
                }
            }
        }

        let raw_requirements = if entities.requirements.is_empty() {
            derive_requirements(entities)
        } else {
            entities.requirements.clone()
        };
        let requirement_ix = unique_index(
            EntityKind::Requirement,
            raw_requirements.iter().map(|r| &r.id),
            &mut errors,
        );

        let ctx = Lookup {
            entities,
            subject_ix: &subject_ix,
            teacher_ix: &teacher_ix,
            class_ix: &class_ix,
        };
        let requirements: Vec<RequirementInfo> = raw_requirements
            .iter()
            .filter_map(|r| ctx.resolve_requirement(r, &mut errors))
            .collect();

        let availability = resolve_availability(entities, &days, &teacher_ix, &period_ix, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let periods = entities
            .school
            .periods
            .iter()
            .map(|p| PeriodInfo {
                id: p.id.clone(),
                start: p.start,
                end: p.end,
                is_break: p.is_break,
            })
            .collect();

        Ok(Self {
            school_id: entities.school.id.clone(),
            school_name: entities.school.name.clone(),
            days,
            periods,
            subjects: entities.subjects.clone(),
            teachers: entities.teachers.clone(),
            classes: entities.classes.clone(),
            rooms: entities.classrooms.clone(),
            requirements,
            availability,
            meta: entities.meta.clone(),
            teacher_ix,
            class_ix,
            subject_ix,
            room_ix,
            period_ix,
            requirement_ix,
        })
    }

    pub fn slot_count(&self) -> usize {
        self.days.len() * self.periods.len()
    }

    pub fn slot(&self, day: usize, period: usize) -> Slot {
        day * self.periods.len() + period
    }

    pub fn day_of(&self, slot: Slot) -> usize {
        slot / self.periods.len()
    }

    pub fn period_of(&self, slot: Slot) -> usize {
        slot % self.periods.len()
    }

    /// Slots of one day, in period order.
    pub fn day_slots(&self, day: usize) -> std::ops::Range<Slot> {
        let n = self.periods.len();
        day * n..(day + 1) * n
    }

    pub fn teacher_index(&self, id: &TeacherId) -> Option<usize> {
        self.teacher_ix.get(id).copied()
    }

    pub fn class_index(&self, id: &ClassId) -> Option<usize> {
        self.class_ix.get(id).copied()
    }

    pub fn subject_index(&self, id: &SubjectId) -> Option<usize> {
        self.subject_ix.get(id).copied()
    }

    pub fn room_index(&self, id: &RoomId) -> Option<usize> {
        self.room_ix.get(id).copied()
    }

    pub fn period_index(&self, id: &PeriodId) -> Option<usize> {
        self.period_ix.get(id).copied()
    }

    pub fn day_index(&self, day: Day) -> Option<usize> {
        self.days.iter().position(|d| *d == day)
    }

    pub fn requirement_index(&self, id: &RequirementId) -> Option<usize> {
        self.requirement_ix.get(id).copied()
    }

    /// Slot of a (day, period) pair, if the school operates then.
    pub fn slot_of(&self, day: Day, period: &PeriodId) -> Option<Slot> {
        Some(self.slot(self.day_index(day)?, self.period_index(period)?))
    }

    pub fn subject_of(&self, req: usize) -> &Subject {
        &self.subjects[self.requirements[req].subject]
    }

    pub fn total_units(&self) -> u32 {
        self.requirements.iter().map(|r| r.periods).sum()
    }
}

fn check_school(entities: &Entities, errors: &mut Vec<InputValidationError>) -> Vec<Day> {
    let school = &entities.school;
    let school_err = |msg: String| {
        InputValidationError::new(
            ValidationErrorKind::InvalidValue,
            EntityKind::School,
            &school.id,
            msg,
        )
    };

    if school.days.is_empty() {
        errors.push(school_err("no operating days".into()));
    }
    let mut days = school.days.clone();
    days.sort();
    if days.windows(2).any(|w| w[0] == w[1]) {
        errors.push(school_err("an operating day is listed twice".into()));
        days.dedup();
    }

    if school.periods.is_empty() {
        errors.push(school_err("no periods defined".into()));
    } else if school.periods.iter().all(|p| p.is_break) {
        errors.push(school_err("every period is a break".into()));
    }
    for p in &school.periods {
        if p.start >= p.end {
            errors.push(InputValidationError::new(
                ValidationErrorKind::InvalidValue,
                EntityKind::Period,
                &p.id,
                format!("starts at {} but ends at {}", p.start, p.end),
            ));
        }
    }
    for w in school.periods.windows(2) {
        if w[1].start < w[0].end {
            errors.push(InputValidationError::new(
                ValidationErrorKind::InvalidValue,
                EntityKind::Period,
                &w[1].id,
                format!("starts at {} before period {} ends at {}", w[1].start, w[0].id, w[0].end),
            ));
        }
    }
    days
}

fn unique_index<'a, K>(
    entity: EntityKind,
    ids: impl Iterator<Item = &'a K>,
    errors: &mut Vec<InputValidationError>,
) -> HashMap<K, usize>
where
    K: std::hash::Hash + Eq + Clone + std::fmt::Display + 'a,
{
    let mut index = HashMap::new();
    for (i, id) in ids.enumerate() {
        if index.contains_key(id) {
            errors.push(InputValidationError::new(
                ValidationErrorKind::DuplicateId,
                entity,
                id,
                "duplicate id",
            ));
        } else {
            index.insert(id.clone(), i);
        }
    }
    index
}

/// One requirement per (class, subject) pair, each at the subject's weekly
/// period count.
fn derive_requirements(entities: &Entities) -> Vec<LessonRequirement> {
    entities
        .classes
        .iter()
        .flat_map(|c| {
            entities.subjects.iter().map(move |s| LessonRequirement {
                id: RequirementId(format!("{}:{}", c.id, s.id)),
                class_id: c.id.clone(),
                subject_id: s.id.clone(),
                periods_per_week: None,
                teacher_ids: Vec::new(),
                room_type: None,
                equipment: Vec::new(),
            })
        })
        .collect()
}

struct Lookup<'a> {
    entities: &'a Entities,
    subject_ix: &'a HashMap<SubjectId, usize>,
    teacher_ix: &'a HashMap<TeacherId, usize>,
    class_ix: &'a HashMap<ClassId, usize>,
}

impl Lookup<'_> {
    fn resolve_requirement(
        &self,
        r: &LessonRequirement,
        errors: &mut Vec<InputValidationError>,
    ) -> Option<RequirementInfo> {
        let before = errors.len();
        let err = |kind, msg: String| {
            InputValidationError::new(kind, EntityKind::Requirement, &r.id, msg)
        };

        let class = self.class_ix.get(&r.class_id).copied();
        if class.is_none() {
            errors.push(err(
                ValidationErrorKind::UnknownReference,
                format!("references unknown class {}", r.class_id),
            ));
        }
        let subject = self.subject_ix.get(&r.subject_id).copied();
        if subject.is_none() {
            errors.push(err(
                ValidationErrorKind::UnknownReference,
                format!("references unknown subject {}", r.subject_id),
            ));
        }
        if let Some(n) = r.periods_per_week {
            if n <= 0 {
                errors.push(err(
                    ValidationErrorKind::InvalidValue,
                    format!("periods_per_week must be positive, got {n}"),
                ));
            }
        }
        for t in &r.teacher_ids {
            if !self.teacher_ix.contains_key(t) {
                errors.push(err(
                    ValidationErrorKind::UnknownReference,
                    format!("references unknown teacher {t}"),
                ));
            }
        }
        let (class, subject) = (class?, subject?);
        let subj = &self.entities.subjects[subject];

        let mut teachers: Vec<usize> = if r.teacher_ids.is_empty() {
            self.entities
                .teachers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.teaches(&r.subject_id))
                .map(|(i, _)| i)
                .collect()
        } else {
            r.teacher_ids
                .iter()
                .filter_map(|t| self.teacher_ix.get(t).copied())
                .collect()
        };
        teachers.sort_by(|&a, &b| self.entities.teachers[a].id.cmp(&self.entities.teachers[b].id));
        teachers.dedup();
        if teachers.is_empty() {
            errors.push(err(
                ValidationErrorKind::Unschedulable,
                format!("no teacher can take subject {}", subj.name),
            ));
        }

        let rooms = self.suitable_rooms(r, class);
        if matches!(&rooms, Some(v) if v.is_empty()) {
            errors.push(err(
                ValidationErrorKind::Unschedulable,
                "no suitable classroom".into(),
            ));
        }

        if errors.len() > before {
            return None;
        }
        let periods = r.periods_per_week.unwrap_or(subj.weekly_periods).max(0) as u32;
        Some(RequirementInfo {
            id: r.id.clone(),
            class,
            subject,
            periods,
            teachers,
            rooms,
        })
    }

    fn suitable_rooms(&self, r: &LessonRequirement, class: usize) -> Option<Vec<usize>> {
        let needs_room = r.room_type.is_some() || !r.equipment.is_empty();
        if self.entities.classrooms.is_empty() {
            return if needs_room { Some(Vec::new()) } else { None };
        }
        let students = self.entities.classes[class].student_count.unwrap_or(0);
        let mut rooms: Vec<usize> = self
            .entities
            .classrooms
            .iter()
            .enumerate()
            .filter(|(_, room)| {
                room.capacity.map_or(true, |cap| cap >= students)
                    && r.room_type
                        .as_ref()
                        .map_or(true, |ty| room.room_type.as_ref() == Some(ty))
                    && r.equipment.iter().all(|e| room.equipment.contains(e))
            })
            .map(|(i, _)| i)
            .collect();
        rooms.sort_by(|&a, &b| self.entities.classrooms[a].id.cmp(&self.entities.classrooms[b].id));
        Some(rooms)
    }
}

fn resolve_availability(
    entities: &Entities,
    days: &[Day],
    teacher_ix: &HashMap<TeacherId, usize>,
    period_ix: &HashMap<PeriodId, usize>,
    errors: &mut Vec<InputValidationError>,
) -> Vec<AvailabilityWindow> {
    let mut out = Vec::with_capacity(entities.availability.len());
    let mut reported: HashSet<&TeacherId> = HashSet::new();
    for rec in &entities.availability {
        let err = |kind, msg: String| {
            InputValidationError::new(kind, EntityKind::Availability, &rec.teacher_id, msg)
        };
        let teacher = teacher_ix.get(&rec.teacher_id).copied();
        if teacher.is_none() && reported.insert(&rec.teacher_id) {
            errors.push(err(
                ValidationErrorKind::UnknownReference,
                format!("references unknown teacher {}", rec.teacher_id),
            ));
        }
        let first = period_ix.get(&rec.period).copied();
        if first.is_none() {
            errors.push(err(
                ValidationErrorKind::UnknownReference,
                format!("references unknown period {}", rec.period),
            ));
        }
        let last = match &rec.until {
            None => first,
            Some(p) => {
                let last = period_ix.get(p).copied();
                if last.is_none() {
                    errors.push(err(
                        ValidationErrorKind::UnknownReference,
                        format!("references unknown period {p}"),
                    ));
                }
                last
            }
        };
        let (Some(teacher), Some(first), Some(last)) = (teacher, first, last) else {
            continue;
        };
        if last < first {
            errors.push(err(
                ValidationErrorKind::InvalidValue,
                format!("period range {}..{} runs backwards", rec.period, rec.until.as_ref().unwrap_or(&rec.period)),
            ));
            continue;
        }
        // records for days the school is closed have nothing to constrain
        let Some(day) = days.iter().position(|d| *d == rec.day) else {
            continue;
        };
        out.push(AvailabilityWindow {
            teacher,
            day,
            first,
            last,
            available: rec.available,
        });
    }
    out
}
