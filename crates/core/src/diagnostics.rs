//! Independent re-check of a finished timetable.
//!
//! Works from the assignments and the validated input alone; the solver's
//! own bookkeeping is never consulted.

use std::collections::BTreeMap;

use tracing::debug;
use types::{
    Assignment, Conflict, ConflictKind, ConstraintConfig, DiagnosticsReport, Severity, Timetable,
};

use crate::availability::AvailabilityIndex;
use crate::problem::{Problem, Slot};
use crate::schedule::Placement;
use crate::scoring;

struct Resolved<'t> {
    assignment: &'t Assignment,
    placement: Placement,
    class: usize,
}

fn conflict(kind: ConflictKind, a: &Assignment, message: String) -> Conflict {
    Conflict {
        kind,
        severity: if kind.is_hard() {
            Severity::Error
        } else {
            Severity::Warning
        },
        day: Some(a.day),
        period_id: Some(a.period_id.clone()),
        teacher_id: None,
        room_id: None,
        class_id: None,
        requirement_ids: vec![a.requirement_id.clone()],
        message,
    }
}

/// Lists every conflict in `timetable` and prices its soft penalty.
pub fn diagnose(
    problem: &Problem,
    config: &ConstraintConfig,
    timetable: &Timetable,
) -> DiagnosticsReport {
    let index = AvailabilityIndex::build(problem);
    let mut conflicts = Vec::new();
    let mut resolved = Vec::with_capacity(timetable.assignments.len());

    for a in &timetable.assignments {
        match resolve(problem, a) {
            Ok(r) => resolved.push(r),
            Err(what) => conflicts.push(conflict(
                ConflictKind::UnknownReference,
                a,
                format!("assignment for {} references {what}", a.requirement_id),
            )),
        }
    }

    for r in &resolved {
        let found = mismatches(problem, r);
        if !found.is_empty() {
            let mut c = conflict(
                ConflictKind::RequirementMismatch,
                r.assignment,
                format!(
                    "assignment for {} does not match its requirement: {}",
                    r.assignment.requirement_id,
                    found.join("; ")
                ),
            );
            c.class_id = Some(r.assignment.class_id.clone());
            c.teacher_id = Some(r.assignment.teacher_id.clone());
            conflicts.push(c);
        }
    }

    let mut by_teacher: BTreeMap<(usize, Slot), Vec<usize>> = BTreeMap::new();
    let mut by_room: BTreeMap<(usize, Slot), Vec<usize>> = BTreeMap::new();
    let mut by_class: BTreeMap<(usize, Slot), Vec<usize>> = BTreeMap::new();
    for (i, r) in resolved.iter().enumerate() {
        let slot = r.placement.slot;
        by_teacher.entry((r.placement.teacher, slot)).or_default().push(i);
        if let Some(room) = r.placement.room {
            by_room.entry((room, slot)).or_default().push(i);
        }
        by_class.entry((r.class, slot)).or_default().push(i);
    }

    for group in by_teacher.values() {
        for_each_pair(group, |x, y| {
            let (a, b) = (resolved[x].assignment, resolved[y].assignment);
            let mut c = conflict(
                ConflictKind::TeacherDoubleBooked,
                a,
                format!(
                    "teacher {} has {} and {} on {} {}",
                    a.teacher_id, a.requirement_id, b.requirement_id, a.day, a.period_id
                ),
            );
            c.teacher_id = Some(a.teacher_id.clone());
            c.requirement_ids.push(b.requirement_id.clone());
            conflicts.push(c);
        });
    }
    for group in by_room.values() {
        for_each_pair(group, |x, y| {
            let (a, b) = (resolved[x].assignment, resolved[y].assignment);
            let room = a.room_id.as_ref().map_or("-", |r| r.0.as_str());
            let mut c = conflict(
                ConflictKind::RoomDoubleBooked,
                a,
                format!(
                    "room {} holds {} and {} on {} {}",
                    room, a.requirement_id, b.requirement_id, a.day, a.period_id
                ),
            );
            c.room_id = a.room_id.clone();
            c.requirement_ids.push(b.requirement_id.clone());
            conflicts.push(c);
        });
    }
    for group in by_class.values() {
        for_each_pair(group, |x, y| {
            let (a, b) = (resolved[x].assignment, resolved[y].assignment);
            let mut c = conflict(
                ConflictKind::ClassDoubleBooked,
                a,
                format!(
                    "class {} has {} and {} on {} {}",
                    problem.classes[resolved[x].class].id, a.requirement_id, b.requirement_id, a.day, a.period_id
                ),
            );
            c.class_id = Some(problem.classes[resolved[x].class].id.clone());
            c.requirement_ids.push(b.requirement_id.clone());
            conflicts.push(c);
        });
    }

    for r in &resolved {
        let a = r.assignment;
        if config.respect_teacher_availability
            && !index.is_available(r.placement.teacher, r.placement.slot)
        {
            let mut c = conflict(
                ConflictKind::TeacherUnavailable,
                a,
                format!("teacher {} is unavailable on {} {}", a.teacher_id, a.day, a.period_id),
            );
            c.teacher_id = Some(a.teacher_id.clone());
            conflicts.push(c);
        }
        if config.lunch_break_required && index.is_break(r.placement.slot) {
            let mut c = conflict(
                ConflictKind::BreakPeriodOccupied,
                a,
                format!("{} is scheduled in break period {}", a.requirement_id, a.period_id),
            );
            c.class_id = Some(a.class_id.clone());
            conflicts.push(c);
        }
    }

    let mut placed = vec![0u32; problem.requirements.len()];
    for r in &resolved {
        placed[r.placement.requirement] += 1;
    }
    for (i, req) in problem.requirements.iter().enumerate() {
        if placed[i] != req.periods {
            let subject = &problem.subjects[req.subject];
            conflicts.push(Conflict {
                kind: ConflictKind::UnsatisfiedRequirement,
                severity: Severity::Warning,
                day: None,
                period_id: None,
                teacher_id: None,
                room_id: None,
                class_id: Some(problem.classes[req.class].id.clone()),
                requirement_ids: vec![req.id.clone()],
                message: format!(
                    "{} for class {}: placed {} of {} weekly periods",
                    subject.name, problem.classes[req.class].id, placed[i], req.periods
                ),
            });
        }
    }

    let penalties =
        scoring::score_placements(problem, config, resolved.iter().map(|r| &r.placement));
    debug!(
        conflicts = conflicts.len(),
        penalty = penalties.total(),
        "timetable diagnosed"
    );
    DiagnosticsReport {
        conflicts,
        quality_score: penalties.total(),
        penalties,
        unplaced: Vec::new(),
        stats: None,
    }
}

fn resolve<'t>(problem: &Problem, a: &'t Assignment) -> Result<Resolved<'t>, String> {
    let requirement = problem
        .requirement_index(&a.requirement_id)
        .ok_or_else(|| format!("unknown requirement {}", a.requirement_id))?;
    problem
        .class_index(&a.class_id)
        .ok_or_else(|| format!("unknown class {}", a.class_id))?;
    problem
        .subject_index(&a.subject_id)
        .ok_or_else(|| format!("unknown subject {}", a.subject_id))?;
    let teacher = problem
        .teacher_index(&a.teacher_id)
        .ok_or_else(|| format!("unknown teacher {}", a.teacher_id))?;
    let room = match &a.room_id {
        None => None,
        Some(id) => Some(
            problem
                .room_index(id)
                .ok_or_else(|| format!("unknown classroom {id}"))?,
        ),
    };
    let slot = problem
        .slot_of(a.day, &a.period_id)
        .ok_or_else(|| format!("slot {} {} outside the school week", a.day, a.period_id))?;
    Ok(Resolved {
        assignment: a,
        placement: Placement {
            requirement,
            slot,
            teacher,
            room,
        },
        class: problem.requirements[requirement].class,
    })
}

/// Ways `r` disagrees with its own requirement.
fn mismatches(problem: &Problem, r: &Resolved<'_>) -> Vec<String> {
    let a = r.assignment;
    let req = &problem.requirements[r.placement.requirement];
    let mut out = Vec::new();
    let class = &problem.classes[req.class].id;
    if &a.class_id != class {
        out.push(format!("class {} instead of {class}", a.class_id));
    }
    let subject = &problem.subjects[req.subject].id;
    if &a.subject_id != subject {
        out.push(format!("subject {} instead of {subject}", a.subject_id));
    }
    if !req.teachers.contains(&r.placement.teacher) {
        out.push(format!("teacher {} is not a candidate", a.teacher_id));
    }
    if let Some(rooms) = &req.rooms {
        match r.placement.room {
            Some(room) if rooms.contains(&room) => {}
            Some(_) => out.push(format!(
                "classroom {} is not suitable",
                a.room_id.as_ref().map_or("-", |id| id.0.as_str())
            )),
            None => out.push("no classroom although one is required".to_owned()),
        }
    }
    out
}

fn for_each_pair(group: &[usize], mut f: impl FnMut(usize, usize)) {
    for (k, &x) in group.iter().enumerate() {
        for &y in &group[k + 1..] {
            f(x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::fixtures::{class, small_school};
    use types::{
        AvailabilityRecord, ClassId, Classroom, Day, PeriodId, RequirementId, RoomId, SubjectId,
        TeacherId, TimetableMeta,
    };

    fn lesson(req: &str, subject: &str, teacher: &str, day: Day, period: &str) -> Assignment {
        Assignment {
            requirement_id: RequirementId::from(req),
            class_id: ClassId::from("7A"),
            subject_id: SubjectId::from(subject),
            teacher_id: TeacherId::from(teacher),
            room_id: None,
            day,
            period_id: PeriodId::from(period),
        }
    }

    fn timetable(assignments: Vec<Assignment>) -> Timetable {
        let meta = TimetableMeta::default();
        Timetable {
            school_id: "s1".into(),
            name: "test".into(),
            academic_year: meta.academic_year,
            term: meta.term,
            start_date: None,
            end_date: None,
            is_active: true,
            assignments,
        }
    }

    #[test]
    fn clean_timetable_has_no_conflicts() {
        let problem = Problem::build(&small_school()).unwrap();
        let t = timetable(vec![
            lesson("7A-math", "math", "ta", Day::Mon, "p1"),
            lesson("7A-math", "math", "ta", Day::Wed, "p1"),
            lesson("7A-eng", "eng", "tb", Day::Tue, "p1"),
            lesson("7A-eng", "eng", "tb", Day::Thu, "p1"),
        ]);
        let report = diagnose(&problem, &ConstraintConfig::default(), &t);
        assert!(report.is_clean(), "{:?}", report.conflicts);
    }

    #[test]
    fn lists_every_pair_not_first_match() {
        let mut e = small_school();
        e.classrooms.push(Classroom {
            id: RoomId::from("r1"),
            name: "r1".into(),
            capacity: None,
            room_type: None,
            equipment: vec![],
        });
        let problem = Problem::build(&e).unwrap();
        let mut a = lesson("7A-math", "math", "ta", Day::Mon, "p1");
        a.room_id = Some(RoomId::from("r1"));
        let b = a.clone();
        let c = a.clone();
        let t = timetable(vec![a, b, c, lesson("7A-eng", "eng", "tb", Day::Tue, "p1")]);
        let report = diagnose(&problem, &ConstraintConfig::default(), &t);

        let count = |k| report.conflicts.iter().filter(|c| c.kind == k).count();
        // three lessons in one cell form three pairs
        assert_eq!(count(ConflictKind::TeacherDoubleBooked), 3);
        assert_eq!(count(ConflictKind::RoomDoubleBooked), 3);
        assert_eq!(count(ConflictKind::ClassDoubleBooked), 3);
        // math over-placed (3 of 2), eng under-placed (1 of 2)
        assert_eq!(count(ConflictKind::UnsatisfiedRequirement), 2);
        assert!(report
            .unsatisfied()
            .all(|c| c.severity == Severity::Warning));
    }

    #[test]
    fn availability_breaks_and_unknown_references() {
        let mut e = small_school();
        e.school.periods[3].is_break = true;
        e.availability.push(AvailabilityRecord {
            teacher_id: TeacherId::from("ta"),
            day: Day::Mon,
            period: PeriodId::from("p1"),
            until: None,
            available: false,
        });
        let problem = Problem::build(&e).unwrap();
        let cfg = ConstraintConfig {
            lunch_break_required: true,
            ..ConstraintConfig::default()
        };
        let t = timetable(vec![
            lesson("7A-math", "math", "ta", Day::Mon, "p1"),
            lesson("7A-math", "math", "ta", Day::Tue, "p4"),
            lesson("7A-eng", "eng", "nobody", Day::Tue, "p1"),
            lesson("7A-eng", "eng", "tb", Day::Sat, "p1"),
        ]);
        let report = diagnose(&problem, &cfg, &t);
        let kinds: Vec<_> = report.conflicts.iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConflictKind::UnknownReference,
                ConflictKind::UnknownReference,
                ConflictKind::TeacherUnavailable,
                ConflictKind::BreakPeriodOccupied,
                ConflictKind::UnsatisfiedRequirement,
            ]
        );
        assert_eq!(report.hard_conflicts().count(), 4);
    }

    #[test]
    fn assignment_must_agree_with_its_requirement() {
        let mut e = small_school();
        e.classes.push(class("7B"));
        e.teachers[0].subjects = vec![SubjectId::from("math")];
        e.teachers[1].subjects = vec![SubjectId::from("eng")];
        let problem = Problem::build(&e).unwrap();

        // 7A math booked into 7B as english, taught by the english teacher
        let mut wrong = lesson("7A-math", "eng", "tb", Day::Mon, "p1");
        wrong.class_id = ClassId::from("7B");
        let t = timetable(vec![
            wrong,
            lesson("7A-eng", "eng", "tb", Day::Tue, "p1"),
            lesson("7A-eng", "eng", "tb", Day::Mon, "p2"),
            lesson("7A-math", "math", "ta", Day::Mon, "p2"),
        ]);
        let report = diagnose(&problem, &ConstraintConfig::default(), &t);

        let mismatch: Vec<_> = report
            .conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::RequirementMismatch)
            .collect();
        assert_eq!(mismatch.len(), 1);
        assert_eq!(mismatch[0].severity, Severity::Error);
        assert!(mismatch[0].message.contains("class 7B instead of 7A"));
        assert!(mismatch[0].message.contains("subject eng instead of math"));
        assert!(mismatch[0].message.contains("teacher tb is not a candidate"));

        // the class clash at Mon p2 is found through the requirement's class
        let clash: Vec<_> = report
            .conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::ClassDoubleBooked)
            .collect();
        assert_eq!(clash.len(), 1);
        assert_eq!(clash[0].class_id, Some(ClassId::from("7A")));
    }

    #[test]
    fn relabelled_class_does_not_hide_a_clash() {
        let mut e = small_school();
        e.classes.push(class("7B"));
        let problem = Problem::build(&e).unwrap();
        // both lessons belong to 7A; labelling one 7B must not hide the clash
        let mut relabelled = lesson("7A-math", "math", "ta", Day::Mon, "p1");
        relabelled.class_id = ClassId::from("7B");
        let t = timetable(vec![relabelled, lesson("7A-eng", "eng", "tb", Day::Mon, "p1")]);
        let report = diagnose(&problem, &ConstraintConfig::default(), &t);
        let kinds: Vec<_> = report.hard_conflicts().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ConflictKind::RequirementMismatch, ConflictKind::ClassDoubleBooked]
        );
    }
}
