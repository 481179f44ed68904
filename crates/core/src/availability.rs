//! Per-teacher availability bitsets over the weekly slot grid.

use types::{Day, PeriodId, RoomId, TeacherId};

use crate::problem::{Problem, Slot};
use crate::schedule::PartialSchedule;

/// Fixed-size bitset indexed by [`Slot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotMask {
    words: Vec<u64>,
    len: usize,
}

impl SlotMask {
    pub fn empty(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn full(len: usize) -> Self {
        let mut m = Self::empty(len);
        for s in 0..len {
            m.set(s, true);
        }
        m
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> bool {
        slot < self.len && self.words[slot / 64] & (1u64 << (slot % 64)) != 0
    }

    #[inline]
    pub fn set(&mut self, slot: Slot, on: bool) {
        let bit = 1u64 << (slot % 64);
        if on {
            self.words[slot / 64] |= bit;
        } else {
            self.words[slot / 64] &= !bit;
        }
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// O(1) availability queries, built once per run from the sparse override
/// records. A (teacher, day, period) without a record is available; when
/// records overlap the later one wins.
#[derive(Debug, Clone)]
pub struct AvailabilityIndex {
    teachers: Vec<SlotMask>,
    breaks: SlotMask,
}

impl AvailabilityIndex {
    pub fn build(problem: &Problem) -> Self {
        let n = problem.slot_count();
        let mut teachers = vec![SlotMask::full(n); problem.teachers.len()];
        for w in &problem.availability {
            for period in w.first..=w.last {
                teachers[w.teacher].set(problem.slot(w.day, period), w.available);
            }
        }

        let mut breaks = SlotMask::empty(n);
        for day in 0..problem.days.len() {
            for (period, info) in problem.periods.iter().enumerate() {
                if info.is_break {
                    breaks.set(problem.slot(day, period), true);
                }
            }
        }

        Self { teachers, breaks }
    }

    #[inline]
    pub fn is_available(&self, teacher: usize, slot: Slot) -> bool {
        self.teachers[teacher].get(slot)
    }

    #[inline]
    pub fn is_break(&self, slot: Slot) -> bool {
        self.breaks.get(slot)
    }

    pub fn teacher_mask(&self, teacher: usize) -> &SlotMask {
        &self.teachers[teacher]
    }

    /// Whether no lesson occupies `room` at `slot` in the schedule built so far.
    #[inline]
    pub fn is_room_free(&self, room: usize, slot: Slot, schedule: &PartialSchedule) -> bool {
        schedule.room_at(room, slot).is_none()
    }

    /// Id-based lookup. Unknown teachers are unavailable; days the school does
    /// not operate are unavailable.
    pub fn is_teacher_available(
        &self,
        problem: &Problem,
        teacher: &TeacherId,
        day: Day,
        period: &PeriodId,
    ) -> bool {
        match (problem.teacher_index(teacher), problem.slot_of(day, period)) {
            (Some(t), Some(s)) => self.is_available(t, s),
            _ => false,
        }
    }

    /// Id-based lookup of room occupancy.
    pub fn is_room_free_by_id(
        &self,
        problem: &Problem,
        room: &RoomId,
        day: Day,
        period: &PeriodId,
        schedule: &PartialSchedule,
    ) -> bool {
        match (problem.room_index(room), problem.slot_of(day, period)) {
            (Some(r), Some(s)) => self.is_room_free(r, s, schedule),
            _ => false,
        }
    }
}
