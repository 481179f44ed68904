use crate::problem::{Problem, Slot};

/// One lesson in one slot: the atomic unit the engine places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub requirement: usize,
    pub slot: Slot,
    pub teacher: usize,
    pub room: Option<usize>,
}

pub type PlacementId = usize;

/// Schedule under construction, with occupancy grids for teachers, rooms
/// and classes. The grids hold at most one placement per cell; callers
/// check hard feasibility before placing.
#[derive(Debug, Clone)]
pub struct PartialSchedule {
    slots: usize,
    requirement_class: Vec<usize>,
    entries: Vec<Option<Placement>>,
    teacher_at: Vec<Option<PlacementId>>,
    room_at: Vec<Option<PlacementId>>,
    class_at: Vec<Option<PlacementId>>,
    counts: Vec<u32>,
    len: usize,
}

impl PartialSchedule {
    pub fn new(problem: &Problem) -> Self {
        let slots = problem.slot_count();
        Self {
            slots,
            requirement_class: problem.requirements.iter().map(|r| r.class).collect(),
            entries: Vec::new(),
            teacher_at: vec![None; problem.teachers.len() * slots],
            room_at: vec![None; problem.rooms.len() * slots],
            class_at: vec![None; problem.classes.len() * slots],
            counts: vec![0; problem.requirements.len()],
            len: 0,
        }
    }

    pub fn place(&mut self, p: Placement) -> PlacementId {
        let id = self.entries.len();
        self.entries.push(None);
        self.occupy(id, p);
        id
    }

    /// Puts a removed placement back under its old id.
    pub fn restore(&mut self, id: PlacementId, p: Placement) {
        if id >= self.entries.len() {
            self.entries.resize(id + 1, None);
        }
        debug_assert!(self.entries[id].is_none());
        self.occupy(id, p);
    }

    fn occupy(&mut self, id: PlacementId, p: Placement) {
        let class = self.requirement_class[p.requirement];
        debug_assert!(self.teacher_at[p.teacher * self.slots + p.slot].is_none());
        debug_assert!(self.class_at[class * self.slots + p.slot].is_none());
        self.teacher_at[p.teacher * self.slots + p.slot] = Some(id);
        self.class_at[class * self.slots + p.slot] = Some(id);
        if let Some(r) = p.room {
            debug_assert!(self.room_at[r * self.slots + p.slot].is_none());
            self.room_at[r * self.slots + p.slot] = Some(id);
        }
        self.counts[p.requirement] += 1;
        self.entries[id] = Some(p);
        self.len += 1;
    }

    /// Takes a placement out of the schedule. The most recent ids may be
    /// handed out again once removed; older ids stay retired.
    pub fn remove(&mut self, id: PlacementId) -> Option<Placement> {
        let p = self.entries.get_mut(id)?.take()?;
        let class = self.requirement_class[p.requirement];
        self.teacher_at[p.teacher * self.slots + p.slot] = None;
        self.class_at[class * self.slots + p.slot] = None;
        if let Some(r) = p.room {
            self.room_at[r * self.slots + p.slot] = None;
        }
        self.counts[p.requirement] -= 1;
        self.len -= 1;
        while matches!(self.entries.last(), Some(None)) {
            self.entries.pop();
        }
        Some(p)
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.entries.get(id)?.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlacementId, &Placement)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|p| (i, p)))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn teacher_at(&self, teacher: usize, slot: Slot) -> Option<PlacementId> {
        self.teacher_at[teacher * self.slots + slot]
    }

    #[inline]
    pub fn room_at(&self, room: usize, slot: Slot) -> Option<PlacementId> {
        self.room_at[room * self.slots + slot]
    }

    #[inline]
    pub fn class_at(&self, class: usize, slot: Slot) -> Option<PlacementId> {
        self.class_at[class * self.slots + slot]
    }

    pub fn class_of(&self, requirement: usize) -> usize {
        self.requirement_class[requirement]
    }

    pub fn placed_count(&self, requirement: usize) -> u32 {
        self.counts[requirement]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::fixtures::small_school;

    #[test]
    fn place_and_remove_keep_grids_in_sync() {
        let problem = Problem::build(&small_school()).unwrap();
        let mut s = PartialSchedule::new(&problem);
        let a = s.place(Placement {
            requirement: 0,
            slot: 3,
            teacher: 1,
            room: None,
        });
        let b = s.place(Placement {
            requirement: 1,
            slot: 4,
            teacher: 1,
            room: None,
        });
        assert_eq!(s.len(), 2);
        assert_eq!(s.teacher_at(1, 3), Some(a));
        assert_eq!(s.class_at(0, 4), Some(b));
        assert_eq!(s.placed_count(0), 1);

        let removed = s.remove(a).unwrap();
        assert_eq!(removed.slot, 3);
        assert!(s.remove(a).is_none());
        assert_eq!(s.teacher_at(1, 3), None);
        assert_eq!(s.class_at(0, 3), None);
        assert_eq!(s.placed_count(0), 0);
        assert_eq!(s.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![b]);

        s.restore(a, removed);
        assert_eq!(s.teacher_at(1, 3), Some(a));
        assert_eq!(s.len(), 2);
        // a trial placement removed straight away leaves no trace
        let t = s.place(Placement {
            requirement: 0,
            slot: 0,
            teacher: 0,
            room: None,
        });
        s.remove(t);
        let again = s.place(Placement {
            requirement: 1,
            slot: 9,
            teacher: 0,
            room: None,
        });
        assert_eq!(again, t);
    }
}
