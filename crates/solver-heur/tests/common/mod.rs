#![allow(dead_code)]

use types::*;

pub fn periods(n: usize) -> Vec<Period> {
    (0..n)
        .map(|i| Period {
            id: PeriodId(format!("p{}", i + 1)),
            name: format!("Period {}", i + 1),
            start: ClockTime::from_hm(8 + i as u16, 0),
            end: ClockTime::from_hm(8 + i as u16, 45),
            is_break: false,
        })
        .collect()
}

pub fn school(days: &[Day], n_periods: usize) -> Entities {
    Entities {
        school: School {
            id: SchoolId::from("school"),
            name: "Riverside".into(),
            address: None,
            contact_email: None,
            contact_phone: None,
            days: days.to_vec(),
            periods: periods(n_periods),
        },
        subjects: Vec::new(),
        teachers: Vec::new(),
        classes: Vec::new(),
        classrooms: Vec::new(),
        requirements: Vec::new(),
        availability: Vec::new(),
        meta: TimetableMeta::default(),
    }
}

pub fn subject(id: &str, weekly: i32) -> Subject {
    Subject {
        id: SubjectId::from(id),
        name: id.to_uppercase(),
        code: None,
        color: None,
        description: None,
        weekly_periods: weekly,
        is_core: false,
        is_difficult: false,
    }
}

pub fn teacher(id: &str, subjects: &[&str]) -> Teacher {
    Teacher {
        id: TeacherId::from(id),
        name: id.into(),
        email: None,
        phone: None,
        employee_id: None,
        subjects: subjects.iter().map(|s| SubjectId::from(*s)).collect(),
    }
}

pub fn class(id: &str) -> ClassGroup {
    ClassGroup {
        id: ClassId::from(id),
        name: id.into(),
        grade_level: None,
        student_count: Some(24),
    }
}

pub fn room(id: &str) -> Classroom {
    Classroom {
        id: RoomId::from(id),
        name: id.into(),
        capacity: Some(30),
        room_type: None,
        equipment: Vec::new(),
    }
}

pub fn off(teacher: &str, day: Day, from: &str, until: Option<&str>) -> AvailabilityRecord {
    AvailabilityRecord {
        teacher_id: TeacherId::from(teacher),
        day,
        period: PeriodId::from(from),
        until: until.map(PeriodId::from),
        available: false,
    }
}

/// Mon-Fri x 4 periods, class 7A, math and english at 2 a week, teacher
/// `ta` for math and `tb` for english.
pub fn grade_seven() -> Entities {
    let mut e = school(&Day::WEEKDAYS, 4);
    e.subjects = vec![subject("math", 2), subject("eng", 2)];
    e.teachers = vec![teacher("ta", &["math"]), teacher("tb", &["eng"])];
    e.classes = vec![class("7A")];
    e
}

/// Asserts no teacher, room or class holds two lessons in one cell.
pub fn assert_no_double_booking(t: &Timetable) {
    use std::collections::HashSet;
    let mut teachers = HashSet::new();
    let mut rooms = HashSet::new();
    let mut classes = HashSet::new();
    for a in &t.assignments {
        assert!(
            teachers.insert((a.teacher_id.clone(), a.day, a.period_id.clone())),
            "teacher double booked: {a:?}"
        );
        if let Some(r) = &a.room_id {
            assert!(
                rooms.insert((r.clone(), a.day, a.period_id.clone())),
                "room double booked: {a:?}"
            );
        }
        assert!(
            classes.insert((a.class_id.clone(), a.day, a.period_id.clone())),
            "class double booked: {a:?}"
        );
    }
}
