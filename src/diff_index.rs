use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::mismatch::{CategoryFilter, MismatchCategory, MismatchKind, StatePair};
use crate::spatial::Position;
use crate::state::VoxelState;

/// One row of a mismatch overview: a kind and how many positions exhibit it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KindCount {
    pub kind: MismatchKind,
    pub count: usize,
}

/// What a position was classified as before it was cleared.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Prior {
    Mismatch(MismatchKind),
    Match(VoxelState),
}

impl Prior {
    /// The live state observed when the entry was recorded.
    pub fn found(self) -> VoxelState {
        match self {
            Self::Mismatch(kind) => kind.found,
            Self::Match(state) => state,
        }
    }
}

/// Categorised storage of verification results.
///
/// Each position is held by at most one of: one category map (through its
/// kind), or the matched set. `mismatches` always mirrors the union of the
/// category maps and `matched` backs the correct counters, so every insert and
/// removal goes through [`DiffIndex::record`], [`DiffIndex::record_match`],
/// [`DiffIndex::clear`] or [`DiffIndex::purge_kind`].
#[derive(Clone, Debug, Default)]
pub struct DiffIndex {
    categories: [BTreeMap<StatePair, BTreeSet<Position>>; 4],
    category_counts: [usize; 4],
    mismatches: HashMap<Position, MismatchKind>,
    matched: HashMap<Position, VoxelState>,
    correct_state_counts: HashMap<VoxelState, u32>,
}

impl DiffIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pos` as exhibiting `kind`, replacing whatever it held before.
    pub fn record(&mut self, pos: Position, kind: MismatchKind) -> Option<Prior> {
        let prior = self.clear(pos);
        let slot = kind.category.index();
        self.categories[slot]
            .entry(kind.pair())
            .or_default()
            .insert(pos);
        self.category_counts[slot] += 1;
        self.mismatches.insert(pos, kind);
        prior
    }

    /// Record `pos` as a correct match of a non-empty target state.
    pub fn record_match(&mut self, pos: Position, state: VoxelState) -> Option<Prior> {
        let prior = self.clear(pos);
        self.matched.insert(pos, state);
        *self.correct_state_counts.entry(state).or_insert(0) += 1;
        prior
    }

    /// Remove any entry held by `pos`.
    pub fn clear(&mut self, pos: Position) -> Option<Prior> {
        if let Some(kind) = self.mismatches.remove(&pos) {
            let slot = kind.category.index();
            let map = &mut self.categories[slot];
            if let Some(positions) = map.get_mut(&kind.pair()) {
                positions.remove(&pos);
                if positions.is_empty() {
                    map.remove(&kind.pair());
                }
            }
            self.category_counts[slot] -= 1;
            return Some(Prior::Mismatch(kind));
        }

        let state = self.matched.remove(&pos)?;
        if let Some(count) = self.correct_state_counts.get_mut(&state) {
            *count -= 1;
            if *count == 0 {
                self.correct_state_counts.remove(&state);
            }
        }
        Some(Prior::Match(state))
    }

    /// Drop every position recorded under `kind`. Returns how many were removed.
    pub fn purge_kind(&mut self, kind: MismatchKind) -> usize {
        let slot = kind.category.index();
        let Some(positions) = self.categories[slot].remove(&kind.pair()) else {
            return 0;
        };
        for pos in &positions {
            self.mismatches.remove(pos);
        }
        self.category_counts[slot] -= positions.len();
        positions.len()
    }

    /// Kind counts for `filter`, most frequent first.
    pub fn summary(&self, filter: CategoryFilter) -> Vec<KindCount> {
        let mut out = Vec::new();
        for category in MismatchCategory::ALL {
            if !filter.includes(category) {
                continue;
            }
            for (&(expected, found), positions) in &self.categories[category.index()] {
                out.push(KindCount {
                    kind: MismatchKind::new(category, expected, found),
                    count: positions.len(),
                });
            }
        }
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.kind.cmp(&b.kind)));
        out
    }

    pub fn mismatch_at(&self, pos: Position) -> Option<MismatchKind> {
        self.mismatches.get(&pos).copied()
    }

    /// Whether `pos` currently holds a mismatch or a correct match.
    pub fn is_recorded(&self, pos: Position) -> bool {
        self.mismatches.contains_key(&pos) || self.matched.contains_key(&pos)
    }

    pub fn positions_of_kind(&self, kind: MismatchKind) -> impl Iterator<Item = Position> + '_ {
        self.categories[kind.category.index()]
            .get(&kind.pair())
            .into_iter()
            .flat_map(|positions| positions.iter().copied())
    }

    pub fn positions_in(&self, category: MismatchCategory) -> impl Iterator<Item = Position> + '_ {
        self.categories[category.index()]
            .values()
            .flat_map(|positions| positions.iter().copied())
    }

    pub fn kind_count(&self, kind: MismatchKind) -> usize {
        self.categories[kind.category.index()]
            .get(&kind.pair())
            .map_or(0, BTreeSet::len)
    }

    pub fn count(&self, category: MismatchCategory) -> usize {
        self.category_counts[category.index()]
    }

    pub fn total_mismatches(&self) -> usize {
        self.category_counts.iter().sum()
    }

    /// Positions matched with a non-empty target state.
    pub fn correct_count(&self) -> usize {
        self.matched.len()
    }

    /// Correct matches per non-empty state.
    pub fn correct_state_counts(&self) -> &HashMap<VoxelState, u32> {
        &self.correct_state_counts
    }

    pub fn clear_all(&mut self) {
        for map in &mut self.categories {
            map.clear();
        }
        self.category_counts = [0; 4];
        self.mismatches.clear();
        self.matched.clear();
        self.correct_state_counts.clear();
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut union = 0;
        for category in MismatchCategory::ALL {
            let map = &self.categories[category.index()];
            let size: usize = map.values().map(BTreeSet::len).sum();
            assert_eq!(size, self.count(category), "{category:?} counter drifted");
            for (&(expected, found), positions) in map {
                assert!(!positions.is_empty(), "empty kind left behind");
                for pos in positions {
                    assert_eq!(
                        self.mismatches.get(pos),
                        Some(&MismatchKind::new(category, expected, found))
                    );
                    assert!(!self.matched.contains_key(pos));
                }
            }
            union += size;
        }
        assert_eq!(union, self.mismatches.len());
        let counted: u32 = self.correct_state_counts.values().sum();
        assert_eq!(counted as usize, self.matched.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STONE: VoxelState = VoxelState::new(1, 0);
    const DIRT: VoxelState = VoxelState::new(2, 0);
    const GLASS: VoxelState = VoxelState::new(3, 0);

    fn missing(expected: VoxelState) -> MismatchKind {
        MismatchKind::new(MismatchCategory::Missing, expected, VoxelState::EMPTY)
    }

    fn wrong(expected: VoxelState, found: VoxelState) -> MismatchKind {
        MismatchKind::new(MismatchCategory::WrongType, expected, found)
    }

    #[test]
    fn record_replaces_previous_entry() {
        let mut index = DiffIndex::new();
        let pos = Position::new(1, 2, 3);

        assert_eq!(index.record(pos, missing(STONE)), None);
        assert_eq!(
            index.record(pos, wrong(STONE, DIRT)),
            Some(Prior::Mismatch(missing(STONE)))
        );
        assert_eq!(index.count(MismatchCategory::Missing), 0);
        assert_eq!(index.count(MismatchCategory::WrongType), 1);
        assert_eq!(index.mismatch_at(pos), Some(wrong(STONE, DIRT)));

        assert_eq!(
            index.record_match(pos, STONE),
            Some(Prior::Mismatch(wrong(STONE, DIRT)))
        );
        assert_eq!(index.total_mismatches(), 0);
        assert_eq!(index.correct_count(), 1);
        assert_eq!(index.correct_state_counts().get(&STONE), Some(&1));
        index.assert_consistent();
    }

    #[test]
    fn clear_uses_reverse_map() {
        let mut index = DiffIndex::new();
        let a = Position::new(0, 0, 0);
        let b = Position::new(5, 0, 0);
        index.record(a, missing(STONE));
        index.record(b, missing(STONE));
        index.record_match(Position::new(9, 9, 9), DIRT);

        assert_eq!(index.clear(a), Some(Prior::Mismatch(missing(STONE))));
        assert_eq!(index.clear(a), None);
        assert_eq!(index.kind_count(missing(STONE)), 1);
        assert_eq!(index.clear(Position::new(9, 9, 9)), Some(Prior::Match(DIRT)));
        assert!(index.correct_state_counts().is_empty());
        index.assert_consistent();
    }

    #[test]
    fn purge_kind_removes_all_positions_of_that_kind_only() {
        let mut index = DiffIndex::new();
        for x in 0..4 {
            index.record(Position::new(x, 0, 0), wrong(STONE, DIRT));
        }
        index.record(Position::new(0, 1, 0), wrong(STONE, GLASS));
        index.record(Position::new(0, 2, 0), missing(STONE));

        assert_eq!(index.purge_kind(wrong(STONE, DIRT)), 4);
        assert_eq!(index.purge_kind(wrong(STONE, DIRT)), 0);
        assert_eq!(index.count(MismatchCategory::WrongType), 1);
        assert_eq!(index.total_mismatches(), 2);
        assert_eq!(index.mismatch_at(Position::new(2, 0, 0)), None);
        assert!(index
            .summary(CategoryFilter::All)
            .iter()
            .all(|row| row.kind != wrong(STONE, DIRT)));
        index.assert_consistent();
    }

    #[test]
    fn summary_orders_by_count_descending() {
        let mut index = DiffIndex::new();
        index.record(Position::new(0, 0, 0), missing(DIRT));
        for x in 0..3 {
            index.record(Position::new(x, 1, 0), missing(STONE));
        }
        for x in 0..2 {
            index.record(Position::new(x, 2, 0), wrong(STONE, GLASS));
        }

        let all = index.summary(CategoryFilter::All);
        let counts: Vec<_> = all.iter().map(|row| row.count).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(all[0].kind, missing(STONE));

        let only_wrong = index.summary(MismatchCategory::WrongType.into());
        assert_eq!(only_wrong.len(), 1);
        assert_eq!(only_wrong[0].kind, wrong(STONE, GLASS));
    }

    #[test]
    fn reverse_map_tracks_union_under_random_edits() {
        let kinds = [missing(STONE), missing(DIRT), wrong(STONE, DIRT), wrong(DIRT, GLASS)];
        let mut index = DiffIndex::new();
        let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let pos = Position::new((state % 7) as i32, ((state >> 8) % 3) as i32, 0);
            match (state >> 16) % 5 {
                0 => {
                    index.clear(pos);
                }
                1 => {
                    index.record_match(pos, STONE);
                }
                2 => {
                    index.purge_kind(kinds[((state >> 24) % 4) as usize]);
                }
                _ => {
                    index.record(pos, kinds[((state >> 24) % 4) as usize]);
                }
            }
        }
        index.assert_consistent();
    }
}
