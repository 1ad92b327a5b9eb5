use std::collections::HashSet;

use crate::diff_index::DiffIndex;
use crate::mismatch::{classify, Classification, ClassifyPolicy, MismatchKind, StatePair};
use crate::source::{LiveSource, TargetSource};
use crate::spatial::{IntBox, LayerRange, Position, RegionPos};
use crate::state::{StateCatalog, VoxelState};

/// Raw per-position counters accumulated while scanning.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanTotals {
    pub target_voxels: u64,
    pub live_voxels: u64,
    /// Empty-target positions whose live state is also empty.
    pub empty_matches: u64,
}

/// Expected/found pairs the user chose to ignore.
#[derive(Clone, Debug, Default)]
pub struct IgnoredPairs {
    pairs: HashSet<StatePair>,
}

impl IgnoredPairs {
    pub fn contains(&self, pair: StatePair) -> bool {
        self.pairs.contains(&pair)
    }

    pub fn insert(&mut self, pair: StatePair) -> bool {
        self.pairs.insert(pair)
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = StatePair> + '_ {
        self.pairs.iter().copied()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Correct,
    Mismatch(MismatchKind),
    Suppressed,
    Ignored,
}

/// Classify-and-record step shared by the first scan and by reconciliation,
/// so both paths apply the same ignore and classification rules.
pub struct StateChecker<'a> {
    pub index: &'a mut DiffIndex,
    pub ignored: &'a IgnoredPairs,
    pub policy: ClassifyPolicy,
    pub catalog: &'a dyn StateCatalog,
}

impl StateChecker<'_> {
    pub fn check(
        &mut self,
        pos: Position,
        expected: VoxelState,
        found: VoxelState,
        totals: &mut ScanTotals,
    ) -> CheckOutcome {
        if expected != found && self.ignored.contains((expected, found)) {
            self.index.clear(pos);
            return CheckOutcome::Ignored;
        }

        match classify(expected, found, self.policy, self.catalog) {
            Classification::Correct => {
                if expected.is_empty() {
                    self.index.clear(pos);
                    totals.empty_matches += 1;
                } else {
                    self.index.record_match(pos, found);
                }
                CheckOutcome::Correct
            }
            Classification::Mismatch(kind) => {
                self.index.record(pos, kind);
                CheckOutcome::Mismatch(kind)
            }
            Classification::Suppressed => {
                self.index.clear(pos);
                CheckOutcome::Suppressed
            }
        }
    }
}

/// Walks placement boxes and feeds every position through a [`StateChecker`].
pub struct RegionScanner<'a> {
    target: &'a dyn TargetSource,
    live: &'a dyn LiveSource,
    layer_range: Option<LayerRange>,
}

impl<'a> RegionScanner<'a> {
    pub fn new(
        target: &'a dyn TargetSource,
        live: &'a dyn LiveSource,
        layer_range: Option<LayerRange>,
    ) -> Self {
        Self {
            target,
            live,
            layer_range,
        }
    }

    /// Scan one box. Returns the number of positions visited.
    pub fn scan_box(
        &self,
        bounds: IntBox,
        checker: &mut StateChecker<'_>,
        totals: &mut ScanTotals,
    ) -> u64 {
        let bounds = match self.layer_range {
            Some(range) => match range.clip(&bounds) {
                Some(clipped) => clipped,
                None => return 0,
            },
            None => bounds,
        };

        let mut visited = 0;
        for pos in bounds.positions() {
            let expected = self.target.state_at(pos);
            let found = self.live.state_at(pos);
            checker.check(pos, expected, found, totals);

            if !expected.is_empty() {
                totals.target_voxels += 1;
            }
            if !found.is_empty() {
                totals.live_voxels += 1;
            }
            visited += 1;
        }
        visited
    }

    /// Scan every placement box intersecting `region`.
    pub fn scan_region(
        &self,
        region: RegionPos,
        checker: &mut StateChecker<'_>,
        totals: &mut ScanTotals,
    ) -> u64 {
        let mut visited = 0;
        for bounds in self.target.boxes_within_region(region) {
            visited += self.scan_box(bounds, checker, totals);
        }
        visited
    }
}
