//! Hard feasibility and soft penalty of candidate placements.

use types::{ConstraintConfig, PenaltyBreakdown, School};

use crate::availability::AvailabilityIndex;
use crate::error::ConfigurationError;
use crate::problem::Problem;
use crate::schedule::{PartialSchedule, Placement};
use crate::scoring::{self, Lesson, Weights};

/// The first hard rule a candidate breaks, in checking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HardViolation {
    TeacherUnavailable,
    TeacherBusy,
    RoomBusy,
    ClassBusy,
    BreakReserved,
}

/// Rejects configurations that are invalid or cannot hold for `school`.
/// Runs before any placement work.
pub fn validate_config(config: &ConstraintConfig, school: &School) -> Result<(), ConfigurationError> {
    if !config.no_double_booking_teacher {
        return Err(ConfigurationError::HardRuleDisabled("no_double_booking_teacher"));
    }
    if !config.no_double_booking_room {
        return Err(ConfigurationError::HardRuleDisabled("no_double_booking_room"));
    }
    if !config.no_double_booking_class {
        return Err(ConfigurationError::HardRuleDisabled("no_double_booking_class"));
    }
    if config.lunch_break_required && !school.has_break_period() {
        return Err(ConfigurationError::NoBreakPeriod);
    }
    for (rule, _, weight) in config.soft_rules() {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ConfigurationError::InvalidWeight { rule, weight });
        }
    }
    if config.max_consecutive_periods.enabled && config.max_consecutive_periods.limit == 0 {
        return Err(ConfigurationError::ZeroConsecutiveLimit);
    }
    let tol = config.search.swap_tolerance;
    if !tol.is_finite() || tol < 0.0 {
        return Err(ConfigurationError::InvalidTolerance(tol));
    }
    Ok(())
}

pub struct ConstraintEngine<'a> {
    problem: &'a Problem,
    index: &'a AvailabilityIndex,
    config: &'a ConstraintConfig,
    weights: Weights,
    breaks: Vec<bool>,
}

impl<'a> ConstraintEngine<'a> {
    pub fn new(
        problem: &'a Problem,
        index: &'a AvailabilityIndex,
        config: &'a ConstraintConfig,
    ) -> Self {
        Self {
            problem,
            index,
            config,
            weights: Weights::from(config),
            breaks: problem.periods.iter().map(|p| p.is_break).collect(),
        }
    }

    pub fn problem(&self) -> &'a Problem {
        self.problem
    }

    pub fn index(&self) -> &'a AvailabilityIndex {
        self.index
    }

    pub fn config(&self) -> &'a ConstraintConfig {
        self.config
    }

    /// Checks teacher availability, teacher/room/class double booking and
    /// break reservation, stopping at the first broken rule.
    pub fn first_violation(
        &self,
        cand: &Placement,
        schedule: &PartialSchedule,
    ) -> Option<HardViolation> {
        if self.config.respect_teacher_availability
            && !self.index.is_available(cand.teacher, cand.slot)
        {
            return Some(HardViolation::TeacherUnavailable);
        }
        if schedule.teacher_at(cand.teacher, cand.slot).is_some() {
            return Some(HardViolation::TeacherBusy);
        }
        if let Some(room) = cand.room {
            if !self.index.is_room_free(room, cand.slot, schedule) {
                return Some(HardViolation::RoomBusy);
            }
        }
        let class = self.problem.requirements[cand.requirement].class;
        if schedule.class_at(class, cand.slot).is_some() {
            return Some(HardViolation::ClassBusy);
        }
        if self.config.lunch_break_required && self.index.is_break(cand.slot) {
            return Some(HardViolation::BreakReserved);
        }
        None
    }

    pub fn is_hard_feasible(&self, cand: &Placement, schedule: &PartialSchedule) -> bool {
        self.first_violation(cand, schedule).is_none()
    }

    /// Violations that do not depend on what is already placed.
    pub fn static_violation(&self, teacher: usize, slot: usize) -> Option<HardViolation> {
        if self.config.respect_teacher_availability && !self.index.is_available(teacher, slot) {
            return Some(HardViolation::TeacherUnavailable);
        }
        if self.config.lunch_break_required && self.index.is_break(slot) {
            return Some(HardViolation::BreakReserved);
        }
        None
    }

    /// Number of (slot, teacher) pairs open to a requirement before anything
    /// is placed. Lower means more constrained.
    pub fn static_options(&self, requirement: usize) -> usize {
        let req = &self.problem.requirements[requirement];
        (0..self.problem.slot_count())
            .map(|slot| {
                req.teachers
                    .iter()
                    .filter(|&&t| self.static_violation(t, slot).is_none())
                    .count()
            })
            .sum()
    }

    /// Every (slot, teacher, room) combination for a requirement, ordered by
    /// day, period, teacher id, then room id.
    pub fn candidates(&self, requirement: usize) -> impl Iterator<Item = Placement> + 'a {
        let problem: &'a Problem = self.problem;
        let req = &problem.requirements[requirement];
        let rooms: Vec<Option<usize>> = match &req.rooms {
            Some(rooms) => rooms.iter().copied().map(Some).collect(),
            None => vec![None],
        };
        let teachers = &req.teachers;
        (0..problem.slot_count()).flat_map(move |slot| {
            let rooms = rooms.clone();
            teachers.iter().flat_map(move |&teacher| {
                rooms.clone().into_iter().map(move |room| Placement {
                    requirement,
                    slot,
                    teacher,
                    room,
                })
            })
        })
    }

    /// Change in soft penalty if `cand` joined `schedule`.
    pub fn soft_delta(&self, cand: &Placement, schedule: &PartialSchedule) -> PenaltyBreakdown {
        let p = self.problem;
        let w = &self.weights;
        let day = p.day_of(cand.slot);
        let period = p.period_of(cand.slot);
        let lesson = Lesson::of(p, cand.requirement);
        let class = p.requirements[cand.requirement].class;

        let mut class_row: Vec<Option<Lesson>> = p
            .day_slots(day)
            .map(|s| {
                schedule
                    .class_at(class, s)
                    .and_then(|id| schedule.get(id))
                    .map(|o| Lesson::of(p, o.requirement))
            })
            .collect();
        let class_before = scoring::class_day_cost(w, &class_row);
        class_row[period] = Some(lesson);
        let class_after = scoring::class_day_cost(w, &class_row);

        let mut teacher_row: Vec<bool> = p
            .day_slots(day)
            .map(|s| schedule.teacher_at(cand.teacher, s).is_some())
            .collect();
        let teacher_before = scoring::teacher_day_cost(w, &teacher_row, &self.breaks);
        teacher_row[period] = true;
        let teacher_after = scoring::teacher_day_cost(w, &teacher_row, &self.breaks);

        let mut delta = (class_after - class_before) + (teacher_after - teacher_before);

        if w.balance > 0.0 {
            let mut per_day = self.per_day_counts(cand.requirement, schedule);
            let before = scoring::balance_cost(w, &per_day);
            per_day[day] += 1;
            delta.unbalanced_week += scoring::balance_cost(w, &per_day) - before;
        }
        delta.core_subject_after_morning +=
            scoring::placement_cost(w, lesson, p.periods[period].start);
        delta
    }

    pub fn soft_penalty(&self, cand: &Placement, schedule: &PartialSchedule) -> f64 {
        self.soft_delta(cand, schedule).total()
    }

    pub fn total_penalty(&self, schedule: &PartialSchedule) -> PenaltyBreakdown {
        scoring::score_placements(self.problem, self.config, schedule.iter().map(|(_, p)| p))
    }

    fn per_day_counts(&self, requirement: usize, schedule: &PartialSchedule) -> Vec<u32> {
        let p = self.problem;
        let class = p.requirements[requirement].class;
        (0..p.days.len())
            .map(|d| {
                p.day_slots(d)
                    .filter(|&s| {
                        schedule
                            .class_at(class, s)
                            .and_then(|id| schedule.get(id))
                            .is_some_and(|o| o.requirement == requirement)
                    })
                    .count() as u32
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::fixtures::{period, small_school};
    use types::{AvailabilityRecord, Day, PeriodId, TeacherId};

    fn at(requirement: usize, slot: usize, teacher: usize) -> Placement {
        Placement {
            requirement,
            slot,
            teacher,
            room: None,
        }
    }

    #[test]
    fn config_validation() {
        let school = small_school().school;
        assert_eq!(validate_config(&ConstraintConfig::default(), &school), Ok(()));

        let cfg = ConstraintConfig {
            lunch_break_required: true,
            ..ConstraintConfig::default()
        };
        assert_eq!(validate_config(&cfg, &school), Err(ConfigurationError::NoBreakPeriod));

        let mut with_break = school.clone();
        with_break.periods.push(period("lunch", (14, 0), (14, 30), true));
        assert_eq!(validate_config(&cfg, &with_break), Ok(()));

        let cfg = ConstraintConfig {
            no_double_booking_room: false,
            ..ConstraintConfig::default()
        };
        assert_eq!(
            validate_config(&cfg, &school),
            Err(ConfigurationError::HardRuleDisabled("no_double_booking_room"))
        );

        let mut cfg = ConstraintConfig::default();
        cfg.avoid_single_period_gaps.weight = -1.0;
        assert!(matches!(
            validate_config(&cfg, &school),
            Err(ConfigurationError::InvalidWeight { rule: "avoid_single_period_gaps", .. })
        ));

        let mut cfg = ConstraintConfig::default();
        cfg.max_consecutive_periods.limit = 0;
        assert_eq!(validate_config(&cfg, &school), Err(ConfigurationError::ZeroConsecutiveLimit));
    }

    #[test]
    fn hard_checks_in_order() {
        let mut e = small_school();
        e.availability.push(AvailabilityRecord {
            teacher_id: TeacherId::from("ta"),
            day: Day::Mon,
            period: PeriodId::from("p1"),
            until: None,
            available: false,
        });
        let problem = Problem::build(&e).unwrap();
        let index = AvailabilityIndex::build(&problem);
        let cfg = ConstraintConfig::default();
        let engine = ConstraintEngine::new(&problem, &index, &cfg);
        let mut s = PartialSchedule::new(&problem);

        assert_eq!(
            engine.first_violation(&at(0, 0, 0), &s),
            Some(HardViolation::TeacherUnavailable)
        );
        assert!(engine.is_hard_feasible(&at(0, 0, 1), &s));
        s.place(at(0, 0, 1));
        assert_eq!(engine.first_violation(&at(1, 0, 1), &s), Some(HardViolation::TeacherBusy));
        // teacher free, class busy
        assert_eq!(engine.first_violation(&at(1, 1, 0), &s), None);
        s.place(at(1, 1, 0));
        assert_eq!(engine.first_violation(&at(0, 1, 1), &s), Some(HardViolation::ClassBusy));

        let relaxed = ConstraintConfig {
            respect_teacher_availability: false,
            ..ConstraintConfig::default()
        };
        let engine = ConstraintEngine::new(&problem, &index, &relaxed);
        assert_eq!(engine.first_violation(&at(0, 0, 0), &s), Some(HardViolation::ClassBusy));
    }

    #[test]
    fn break_periods_reserved_only_when_required() {
        let mut e = small_school();
        e.school.periods.insert(2, period("brk", (9, 30), (9, 40), true));
        e.school.periods[3].start = types::ClockTime::from_hm(9, 40);
        let problem = Problem::build(&e).unwrap();
        let index = AvailabilityIndex::build(&problem);
        let s = PartialSchedule::new(&problem);

        let cfg = ConstraintConfig::default();
        let engine = ConstraintEngine::new(&problem, &index, &cfg);
        assert!(engine.is_hard_feasible(&at(0, 2, 0), &s));

        let cfg = ConstraintConfig {
            lunch_break_required: true,
            ..ConstraintConfig::default()
        };
        let engine = ConstraintEngine::new(&problem, &index, &cfg);
        assert_eq!(engine.first_violation(&at(0, 2, 0), &s), Some(HardViolation::BreakReserved));
        // 5 days x 4 teaching periods x 2 teachers
        assert_eq!(engine.static_options(0), 40);
    }

    #[test]
    fn candidate_order_is_slot_then_teacher() {
        let problem = Problem::build(&small_school()).unwrap();
        let index = AvailabilityIndex::build(&problem);
        let cfg = ConstraintConfig::default();
        let engine = ConstraintEngine::new(&problem, &index, &cfg);
        let first: Vec<(usize, usize)> = engine
            .candidates(0)
            .take(4)
            .map(|c| (c.slot, c.teacher))
            .collect();
        assert_eq!(first, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(engine.candidates(0).count(), 40);
    }

    #[test]
    fn delta_matches_full_rescore() {
        let problem = Problem::build(&small_school()).unwrap();
        let index = AvailabilityIndex::build(&problem);
        let cfg = ConstraintConfig::default();
        let engine = ConstraintEngine::new(&problem, &index, &cfg);
        let mut s = PartialSchedule::new(&problem);
        s.place(at(0, 0, 0));
        s.place(at(1, 2, 0));

        for cand in [at(0, 1, 0), at(0, 4, 1), at(1, 3, 0)] {
            let before = engine.total_penalty(&s).total();
            let delta = engine.soft_penalty(&cand, &s);
            let mut after = s.clone();
            after.place(cand);
            let expected = engine.total_penalty(&after).total() - before;
            assert!((delta - expected).abs() < 1e-9, "{cand:?}: {delta} vs {expected}");
        }
        // same subject straight after itself costs more than on another day
        assert!(engine.soft_penalty(&at(0, 1, 0), &s) > engine.soft_penalty(&at(0, 4, 1), &s));
    }
}
