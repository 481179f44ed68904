mod common;

use common::*;
use proptest::prelude::*;
use solver_heur::generate;
use types::*;

#[derive(Debug, Clone)]
struct Shape {
    days: usize,
    periods: usize,
    classes: usize,
    weekly: Vec<i32>,
    teaches: Vec<Vec<bool>>,
    off: Vec<(usize, usize, usize, bool)>,
    rooms: usize,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        1usize..=5,
        2usize..=6,
        1usize..=3,
        prop::collection::vec(1i32..=4, 1..=4),
        prop::collection::vec(prop::collection::vec(any::<bool>(), 4), 1..=4),
        prop::collection::vec((0usize..4, 0usize..5, 0usize..6, any::<bool>()), 0..12),
        0usize..=3,
    )
        .prop_map(|(days, periods, classes, weekly, teaches, off, rooms)| Shape {
            days,
            periods,
            classes,
            weekly,
            teaches,
            off,
            rooms,
        })
}

fn build(s: &Shape) -> Entities {
    let mut e = school(&Day::ALL[..s.days], s.periods);
    let subject_id = |i: usize| format!("s{i}");
    e.subjects = s
        .weekly
        .iter()
        .enumerate()
        .map(|(i, &w)| subject(&subject_id(i), w))
        .collect();

    let mut lists: Vec<Vec<String>> = s
        .teaches
        .iter()
        .map(|row| {
            (0..s.weekly.len())
                .filter(|&i| row[i])
                .map(subject_id)
                .collect()
        })
        .collect();
    // every subject needs someone to teach it
    for i in 0..s.weekly.len() {
        let id = subject_id(i);
        if lists.iter().all(|l| !l.is_empty() && !l.contains(&id)) {
            lists[0].push(id);
        }
    }
    e.teachers = lists
        .iter()
        .enumerate()
        .map(|(t, l)| {
            let refs: Vec<&str> = l.iter().map(String::as_str).collect();
            teacher(&format!("t{t}"), &refs)
        })
        .collect();

    e.classes = (0..s.classes).map(|c| class(&format!("c{c}"))).collect();
    e.classrooms = (0..s.rooms).map(|r| room(&format!("r{r}"))).collect();
    e.availability = s
        .off
        .iter()
        .map(|&(t, d, p, available)| AvailabilityRecord {
            teacher_id: TeacherId(format!("t{}", t % s.teaches.len())),
            day: Day::ALL[d % s.days],
            period: PeriodId(format!("p{}", p % s.periods + 1)),
            until: None,
            available,
        })
        .collect();
    e
}

/// Availability as the records state it: last matching record wins,
/// no record means available.
fn available(e: &Entities, teacher: &TeacherId, day: Day, period: &PeriodId) -> bool {
    e.availability
        .iter()
        .rev()
        .find(|r| &r.teacher_id == teacher && r.day == day && &r.period == period)
        .map_or(true, |r| r.available)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn never_double_books(s in shape()) {
        let e = build(&s);
        let out = generate(&e, &ConstraintConfig::default()).unwrap();
        assert_no_double_booking(&out.timetable);
        prop_assert_eq!(out.diagnostics.hard_conflicts().count(), 0);

        let units: usize = s.weekly.iter().map(|&w| w as usize).sum::<usize>() * s.classes;
        prop_assert_eq!(out.timetable.len() + out.diagnostics.unplaced.len(), units);
    }

    #[test]
    fn respects_availability(s in shape()) {
        let e = build(&s);
        let out = generate(&e, &ConstraintConfig::default()).unwrap();
        for a in &out.timetable.assignments {
            prop_assert!(
                available(&e, &a.teacher_id, a.day, &a.period_id),
                "{:?} placed while unavailable", a
            );
        }
    }

    #[test]
    fn same_input_same_timetable(s in shape()) {
        let e = build(&s);
        let cfg = ConstraintConfig::default();
        let first = generate(&e, &cfg).unwrap();
        let second = generate(&e, &cfg).unwrap();
        prop_assert_eq!(&first.timetable, &second.timetable);
        prop_assert_eq!(&first.diagnostics.conflicts, &second.diagnostics.conflicts);
        prop_assert_eq!(&first.diagnostics.unplaced, &second.diagnostics.unplaced);
        prop_assert_eq!(first.diagnostics.quality_score, second.diagnostics.quality_score);
    }
}
